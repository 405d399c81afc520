//! Balanced-delimiter scope resolution.
//!
//! Wikitext has no grammar we can lean on, so finding the end of a template
//! or tag means walking forward from its opening delimiter and counting
//! nested openings until the matching close brings the depth back to zero.
//!
//! Every offset returned here is relative to the start of the `text` handed
//! to the scanner. Callers that scan a suffix of a larger document add the
//! suffix offset back themselves.

use std::collections::HashMap;
use std::ops::Range;

use regex::Regex;

use crate::WikiMathError;
use crate::WikiMathResult;

/// The delimiter pair used to resolve a scope.
#[derive(Debug, Clone)]
#[allow(variant_size_differences)]
pub enum Delimiters {
	/// MediaWiki template braces. `{{` opens a template scope, a lone `{`
	/// opens a single-brace scope that must be closed before `}}` can close
	/// the template.
	Braces,
	/// Arbitrary opening and closing patterns, stored anchored so they only
	/// match at the scan cursor.
	Pattern { open: Regex, close: Regex },
}

impl Delimiters {
	/// Build delimiters from an opening and closing regex. The literal
	/// double-brace pair dispatches to the dedicated [`Delimiters::Braces`]
	/// scanner.
	pub fn new(open: &str, close: &str) -> WikiMathResult<Self> {
		if is_double_open(open) && is_double_close(close) {
			return Ok(Self::Braces);
		}

		Ok(Self::Pattern {
			open: anchored(open)?,
			close: anchored(close)?,
		})
	}

	/// Find the close that matches the opening delimiter at the start of
	/// `text`. See [`find_scope_end`].
	pub fn find_close(&self, text: &str) -> Option<Range<usize>> {
		match self {
			Self::Braces => find_brace_close(text),
			Self::Pattern { open, close } => find_pattern_close(text, open, close),
		}
	}

	/// Resolve every scope in `text` in one pass. Maps the start of each
	/// opening delimiter to the range of the close that pairs with it.
	///
	/// An entry agrees with [`Delimiters::find_close`] run from the same
	/// offset whenever the close lies inside the slice handed to
	/// `find_close`. Openings the walk stepped over, and `{{` scopes that were
	/// popped by a stray `}`, have no entry.
	pub fn closes_by_open(&self, text: &str) -> HashMap<usize, Range<usize>> {
		match self {
			Self::Braces => pair_brace_closes(text),
			Self::Pattern { open, close } => pair_pattern_closes(text, open, close),
		}
	}
}

fn is_double_open(pattern: &str) -> bool {
	matches!(pattern, "{{" | r"\{\{")
}

fn is_double_close(pattern: &str) -> bool {
	matches!(pattern, "}}" | r"\}\}")
}

fn anchored(pattern: &str) -> WikiMathResult<Regex> {
	Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
		WikiMathError::InvalidPattern {
			pattern: pattern.to_string(),
			reason: e.to_string(),
		}
	})
}

/// Locate the delimiter that closes the scope opened at the start of `text`.
///
/// Returns the byte range of the closing delimiter, or `None` when the scope
/// is never closed. An unterminated scope is not an error: callers stop
/// rewriting at that point and pass the remainder through unchanged.
pub fn find_scope_end(text: &str, delimiters: &Delimiters) -> Option<Range<usize>> {
	delimiters.find_close(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BraceScope {
	Single,
	Double,
}

/// Single pass over the bytes of `text` tracking a stack of open brace
/// scopes. Braces are ASCII so every offset produced is a char boundary.
///
/// A `}` that does not close a `{{` pops whatever scope is innermost, even a
/// `{{`, and an empty stack is left empty. Malformed input therefore tends to
/// under-match and fall through to plain text instead of swallowing the rest
/// of the document.
fn find_brace_close(text: &str) -> Option<Range<usize>> {
	let bytes = text.as_bytes();
	let mut scopes: Vec<BraceScope> = Vec::new();
	let mut i = 0;

	while i + 1 < bytes.len() {
		match bytes[i] {
			b'{' => {
				if bytes[i + 1] == b'{' {
					scopes.push(BraceScope::Double);
					i += 1;
				} else {
					scopes.push(BraceScope::Single);
				}
			}
			b'}' => {
				if bytes[i + 1] == b'}' && scopes.last() == Some(&BraceScope::Double) {
					scopes.pop();
					i += 1;
					if scopes.is_empty() {
						return Some(i - 1..i + 1);
					}
				} else {
					scopes.pop();
				}
			}
			_ => {}
		}
		i += 1;
	}

	None
}

fn pair_brace_closes(text: &str) -> HashMap<usize, Range<usize>> {
	let bytes = text.as_bytes();
	let mut scopes: Vec<(BraceScope, usize)> = Vec::new();
	let mut closes = HashMap::new();
	let mut i = 0;

	while i + 1 < bytes.len() {
		match bytes[i] {
			b'{' => {
				if bytes[i + 1] == b'{' {
					scopes.push((BraceScope::Double, i));
					i += 1;
				} else {
					scopes.push((BraceScope::Single, i));
				}
			}
			b'}' => {
				let innermost = scopes.last().map(|(scope, _)| *scope);
				if bytes[i + 1] == b'}' && innermost == Some(BraceScope::Double) {
					if let Some((_, start)) = scopes.pop() {
						closes.insert(start, i..i + 2);
					}
					i += 1;
				} else {
					scopes.pop();
				}
			}
			_ => {}
		}
		i += 1;
	}

	closes
}

fn pair_pattern_closes(text: &str, open: &Regex, close: &Regex) -> HashMap<usize, Range<usize>> {
	let mut starts: Vec<usize> = Vec::new();
	let mut closes = HashMap::new();
	let mut cursor = 0;

	while cursor < text.len() {
		let rest = &text[cursor..];

		if let Some(found) = open.find(rest) {
			starts.push(cursor);
			cursor += advance(rest, found.end());
			continue;
		}

		if let Some(found) = close.find(rest) {
			if let Some(start) = starts.pop() {
				closes.insert(start, cursor..cursor + found.end());
			}
			cursor += advance(rest, found.end());
			continue;
		}

		cursor += advance(rest, 0);
	}

	closes
}

/// Depth-counting walk for arbitrary delimiter patterns. Both regexes are
/// anchored, so each check costs at most the length of one delimiter.
fn find_pattern_close(text: &str, open: &Regex, close: &Regex) -> Option<Range<usize>> {
	let mut depth: isize = 0;
	let mut cursor = 0;

	while cursor < text.len() {
		let rest = &text[cursor..];

		if let Some(found) = open.find(rest) {
			depth += 1;
			cursor += advance(rest, found.end());
			continue;
		}

		if let Some(found) = close.find(rest) {
			depth -= 1;
			let start = cursor;
			let end = cursor + found.end();
			if depth == 0 {
				return Some(start..end);
			}
			cursor += advance(rest, found.end());
			continue;
		}

		cursor += advance(rest, 0);
	}

	None
}

/// Step past a match, always moving at least one character so empty matches
/// cannot stall the walk.
fn advance(rest: &str, matched: usize) -> usize {
	if matched > 0 {
		matched
	} else {
		rest.chars().next().map_or(1, char::len_utf8)
	}
}

/// Split template arguments on the `|` separators that sit at the top level,
/// ignoring pipes nested inside `{{...}}` templates or `[[...]]` links.
pub fn split_arguments(inner: &str) -> Vec<&str> {
	let bytes = inner.as_bytes();
	let mut arguments = Vec::new();
	let mut depth: usize = 0;
	let mut start = 0;
	let mut i = 0;

	while i < bytes.len() {
		let pair = bytes.get(i..i + 2);
		match pair {
			Some(b"{{" | b"[[") => {
				depth += 1;
				i += 2;
				continue;
			}
			Some(b"}}" | b"]]") => {
				depth = depth.saturating_sub(1);
				i += 2;
				continue;
			}
			_ => {}
		}

		if bytes[i] == b'|' && depth == 0 {
			arguments.push(&inner[start..i]);
			start = i + 1;
		}
		i += 1;
	}

	arguments.push(&inner[start..]);
	arguments
}
