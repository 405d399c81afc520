use regex::Regex;

use crate::WikiMathError;
use crate::WikiMathResult;
use crate::scope::Delimiters;

/// A matched template or tag span handed to a rewrite callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matched<'a> {
	/// The whole span, opening and closing delimiters included.
	pub source: &'a str,
	/// The text strictly between the end of the opening match and the start
	/// of the closing delimiter.
	pub inner: &'a str,
}

/// Find every match of `opening`, resolve its closing delimiter with
/// `delimiters`, and replace the whole span with whatever `render` returns.
///
/// Text outside matched spans is copied through byte for byte. When a scope
/// is never closed, rewriting stops and the remainder of `text` is appended
/// untouched.
pub fn rewrite_spans<F>(text: &str, opening: &Regex, delimiters: &Delimiters, mut render: F) -> String
where
	F: FnMut(Matched<'_>) -> String,
{
	let mut output = String::with_capacity(text.len());
	let mut offset = 0;

	while let Some(found) = opening.find(&text[offset..]) {
		let open_start = offset + found.start();
		let open_end = offset + found.end();
		let Some(close) = delimiters.find_close(&text[open_start..]) else {
			break;
		};
		let close_start = open_start + close.start;
		let close_end = open_start + close.end;
		if close_end <= offset {
			break;
		}

		output.push_str(&text[offset..open_start]);
		output.push_str(&render(Matched {
			source: &text[open_start..close_end],
			inner: text.get(open_end..close_start).unwrap_or_default(),
		}));
		offset = close_end;
	}

	output.push_str(&text[offset..]);
	output
}

/// Replace each matched span with `start + inner + end`. With `recursive`
/// set, `inner` is rewritten the same way before it is wrapped, which lets
/// nested spans of the same kind (`<sup>` inside `<sup>`) convert too.
pub fn replace_template(
	text: &str,
	opening: &Regex,
	delimiters: &Delimiters,
	start: &str,
	end: &str,
	recursive: bool,
) -> String {
	if recursive {
		return replace_nested(text, opening, delimiters, start, end);
	}

	rewrite_spans(text, opening, delimiters, |matched| {
		format!("{start}{}{end}", matched.inner)
	})
}

/// A region still being rewritten: `offset..hi` of the original text.
#[derive(Debug, Clone, Copy)]
struct Frame {
	offset: usize,
	hi: usize,
}

/// The recursive form of [`replace_template`], driven by an explicit stack of
/// frames so nesting depth is bounded by memory rather than the call stack.
/// Each frame behaves like [`rewrite_spans`] over its region; scopes come
/// from a single pairing pass and fall back to [`Delimiters::find_close`]
/// where that pass has no answer.
fn replace_nested(text: &str, opening: &Regex, delimiters: &Delimiters, start: &str, end: &str) -> String {
	if !opening.is_match(text) {
		return text.to_string();
	}

	let closes = delimiters.closes_by_open(text);
	let mut output = String::with_capacity(text.len());
	let mut frames = vec![Frame {
		offset: 0,
		hi: text.len(),
	}];

	while let Some(&Frame { offset, hi }) = frames.last() {
		let next = opening.find(&text[offset..hi]).and_then(|found| {
			let open_start = offset + found.start();
			let open_end = offset + found.end();
			let close = match closes.get(&open_start) {
				Some(close) if close.end <= hi => close.clone(),
				_ => {
					let close = delimiters.find_close(&text[open_start..hi])?;
					open_start + close.start..open_start + close.end
				}
			};
			(close.end > offset).then_some((open_start, open_end, close))
		});

		let Some((open_start, open_end, close)) = next else {
			output.push_str(&text[offset..hi]);
			frames.pop();
			if !frames.is_empty() {
				output.push_str(end);
			}
			continue;
		};

		output.push_str(&text[offset..open_start]);
		output.push_str(start);
		if let Some(frame) = frames.last_mut() {
			frame.offset = close.end;
		}
		frames.push(Frame {
			offset: open_end.min(close.start),
			hi: close.start,
		});
	}

	output
}

/// Declarative description of a rewrite rule. Tables of these are compiled
/// into [`Rule`]s once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSpec {
	/// Stable identifier used to order rules in a pipeline.
	pub name: &'static str,
	/// Regex for the opening delimiter, e.g. `\{\{[Rr]adic ?\|`.
	pub opening: &'static str,
	/// Closing delimiter regex.
	pub closing: &'static str,
	/// Literal emitted in place of the opening delimiter.
	pub start: &'static str,
	/// Literal emitted in place of the closing delimiter.
	pub end: &'static str,
	/// Opening regex used while counting nesting. Defaults to `opening`.
	pub nest_open: Option<&'static str>,
	/// Closing regex used while counting nesting. Defaults to `closing`.
	pub nest_close: Option<&'static str>,
	/// Rewrite the inner text with the same rule before wrapping it.
	pub recursive: bool,
}

impl RuleSpec {
	/// A rule for a `{{name|...}}` template family: nesting is resolved with
	/// the brace scanner regardless of how specific the opening pattern is.
	pub const fn template(
		name: &'static str,
		opening: &'static str,
		start: &'static str,
		end: &'static str,
	) -> Self {
		Self {
			name,
			opening,
			closing: r"\}\}",
			start,
			end,
			nest_open: Some(r"\{\{"),
			nest_close: None,
			recursive: false,
		}
	}

	/// A rule for an HTML-like tag pair such as `<sup>...</sup>`.
	pub const fn tag(
		name: &'static str,
		opening: &'static str,
		closing: &'static str,
		start: &'static str,
		end: &'static str,
	) -> Self {
		Self {
			name,
			opening,
			closing,
			start,
			end,
			nest_open: None,
			nest_close: None,
			recursive: false,
		}
	}

	pub const fn recursive(mut self) -> Self {
		self.recursive = true;
		self
	}
}

/// A compiled [`RuleSpec`].
#[derive(Debug, Clone)]
pub struct Rule {
	pub name: &'static str,
	opening: Regex,
	delimiters: Delimiters,
	start: &'static str,
	end: &'static str,
	recursive: bool,
}

impl Rule {
	pub fn compile(spec: &RuleSpec) -> WikiMathResult<Self> {
		let opening = Regex::new(spec.opening).map_err(|e| {
			WikiMathError::InvalidPattern {
				pattern: spec.opening.to_string(),
				reason: e.to_string(),
			}
		})?;
		let delimiters = Delimiters::new(
			spec.nest_open.unwrap_or(spec.opening),
			spec.nest_close.unwrap_or(spec.closing),
		)?;

		Ok(Self {
			name: spec.name,
			opening,
			delimiters,
			start: spec.start,
			end: spec.end,
			recursive: spec.recursive,
		})
	}

	pub fn apply(&self, text: &str) -> String {
		replace_template(
			text,
			&self.opening,
			&self.delimiters,
			self.start,
			self.end,
			self.recursive,
		)
	}

	pub fn opening(&self) -> &Regex {
		&self.opening
	}

	pub fn delimiters(&self) -> &Delimiters {
		&self.delimiters
	}
}
