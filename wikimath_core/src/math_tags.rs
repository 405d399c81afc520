use once_cell::sync::Lazy;
use regex::Regex;

use crate::scope::Delimiters;

const MATH_OPEN_PATTERN: &str = r#"<math(?: display="?(?P<kind>inline|block)"?)?>"#;
const MATH_CLOSE_PATTERN: &str = "</math>";

static MATH_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(MATH_OPEN_PATTERN).unwrap());
static MATH_SCOPE: Lazy<Delimiters> = Lazy::new(|| {
	Delimiters::new(MATH_OPEN_PATTERN, MATH_CLOSE_PATTERN)
		.unwrap_or_else(|e| panic!("math tag delimiters: {e}"))
});

/// How a `<math>` tag is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathDisplay {
	Inline,
	Block,
}

impl MathDisplay {
	fn open(self) -> &'static str {
		match self {
			Self::Inline => "$",
			Self::Block => "$$",
		}
	}

	/// Inline math is followed by a space, the renderer otherwise glues the
	/// next word onto the closing `$`.
	fn close(self) -> &'static str {
		match self {
			Self::Inline => "$ ",
			Self::Block => "$$",
		}
	}
}

/// Convert `<math>` tags into TeX delimiters.
///
/// `<math display="inline">` becomes `$...$ `; `display="block"` and the bare
/// tag become `$$...$$`. The inner text is not touched. A tag that is never
/// closed is kept as written and scanning resumes right after it.
///
/// Every tag is paired in a single walk over `text`, so a page full of
/// unclosed tags costs one scan rather than one per tag.
pub fn replace_math_tags(text: &str) -> String {
	if !MATH_OPEN.is_match(text) {
		return text.to_string();
	}

	let closes = MATH_SCOPE.closes_by_open(text);
	let mut output = String::with_capacity(text.len());
	let mut offset = 0;

	while let Some(captures) = MATH_OPEN.captures(&text[offset..]) {
		let Some(tag) = captures.get(0) else {
			break;
		};
		let open_start = offset + tag.start();
		let open_end = offset + tag.end();

		let Some(close) = closes.get(&open_start) else {
			tracing::debug!(offset = open_start, "unterminated <math> tag");
			output.push_str(&text[offset..open_end]);
			offset = open_end;
			continue;
		};

		let display = match captures.name("kind").map(|m| m.as_str()) {
			Some("inline") => MathDisplay::Inline,
			_ => MathDisplay::Block,
		};

		output.push_str(&text[offset..open_start]);
		output.push_str(display.open());
		output.push_str(&text[open_end..close.start]);
		output.push_str(display.close());
		offset = close.end;
	}

	output.push_str(&text[offset..]);
	output
}
