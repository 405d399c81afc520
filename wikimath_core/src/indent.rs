use once_cell::sync::Lazy;
use regex::Regex;

static INDENTED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^:+.+$").unwrap());

/// Put a blank line after every `:`-indented line that is directly followed
/// by an ordinary line.
///
/// The renderer moves a paragraph that follows an indented line above the
/// indentation; the blank line keeps them in order. Consecutive indented
/// lines and lines already followed by a blank line are left alone, so the
/// adjustment is idempotent. One pass over the text, no recursion.
pub fn adjust_indentation(text: &str) -> String {
	let bytes = text.as_bytes();
	let mut output = String::with_capacity(text.len());
	let mut offset = 0;

	for line in INDENTED_LINE.find_iter(text) {
		// `line.end()` is the newline, if there is one.
		let next = line.end() + 1;
		if next > text.len() {
			continue;
		}
		if matches!(bytes.get(next), Some(b) if *b != b':' && *b != b'\n') {
			output.push_str(&text[offset..next]);
			output.push('\n');
			offset = next;
		}
	}

	output.push_str(&text[offset..]);
	output
}
