//! Extract templates out of wikitext and splice replacements back in.
//!
//! The renderer only speaks plain text, so extracted templates are
//! represented in the text by a sentinel marker. Reinsertion pairs the i-th
//! marker with the i-th replacement. The markers are rare code points that
//! the renderer passes through untouched; if one ever occurs in real input
//! the positional correspondence is lost, which is why the pipeline refuses
//! such documents up front.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::WikiMathError;
use crate::WikiMathResult;
use crate::document::Section;
use crate::scope::Delimiters;

/// ᙭᙭᙭ (Canadian Syllabics Chi Sign) stands in for an extracted math
/// template.
pub const MATH_MARKER: &str = "\u{166D}\u{166D}\u{166D}";
/// ⇭⇭⇭ (Upwards White Arrow On Pedestal With Vertical Bar). Reserved.
pub const SECOND_MARKER: &str = "\u{21ED}\u{21ED}\u{21ED}";
/// ¦¦¦ (Broken Bar) stands in for a literal `|` inside converted math.
pub const PIPE_MARKER: &str = "\u{00A6}\u{00A6}\u{00A6}";

/// Templates that carry math. Symbol templates without arguments are
/// deliberately absent: they only ever appear inside other math.
pub const MATH_TEMPLATES: &[&str] = &[
	"±",
	"×",
	"10^",
	"x10^",
	"abs",
	"alpha/Fe",
	"angle bracket",
	"angbr",
	"bigmath",
	"Binom",
	"bra",
	"bra-ket",
	"braket",
	"ceil",
	"closed-closed",
	"closed-open",
	"DBra",
	"Dbraket",
	"degree",
	"subst:degree",
	"Devanagari",
	"dirprod",
	"Dket",
	"e-sp",
	"ell",
	"epsilon",
	"EqNote",
	"EquationNote",
	"Equation",
	"Equation box 1",
	"EquationRef",
	"#expr:",
	"Fe/H",
	"floor",
	"Function",
	"gamma",
	"hub",
	"intmath",
	"intorient",
	"kappa",
	"ket",
	"lambda",
	"langle",
	"ldelim",
	"Lg-start",
	"M/H",
	"Mapsto",
	"math",
	"Math theorem",
	"Math proof",
	"math-link",
	"mathbb",
	"mathcal",
	"mexp",
	"minteg",
	"mset",
	"mu",
	"mvar",
	"mvar-link",
	"N-ary",
	"nary",
	"norm",
	"Numbered block",
	"oiiint",
	"oiint",
	"open-closed",
	"open-open",
	"otimes",
	"overarc",
	"overline",
	"overset",
	"overunderset",
	"Pars",
	"phi",
	"pi",
	"pnsign",
	"radic",
	"rangle",
	"rdelim",
	"rndhands",
	"scinote",
	"sigma",
	"smallmath",
	"starred",
	"su",
	"su2",
	"sub",
	"subsub",
	"subsup",
	"sup",
	"sup sub",
	"tau",
	"theta",
	"tmath",
	"tombstone",
	"underoverset",
	"underset",
	"upsilon",
	"Urdu numeral",
	"val",
	"varepsilon",
	"varphi",
	"varsigma",
	"vartheta",
	"vec",
	"xi",
	"xor",
	"φ",
	"All",
	"And",
	"Eqv",
	"Exist",
	"False",
	"Ident",
	"Imp",
	"In",
	"Models",
	"Nand",
	"Nor-",
	"Not",
	"Or-",
	"Tee",
	"True",
];

static MATH_TEMPLATE_SET: Lazy<TemplateSet> =
	Lazy::new(|| TemplateSet::new(MATH_TEMPLATES).unwrap_or_else(|e| panic!("{e}")));

/// A template pulled out of the text, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
	/// The template name as written, e.g. `Math` or `radic`.
	pub name: String,
	/// The full original span, `{{` and `}}` included.
	pub source: String,
}

/// The result of [`extract_templates`]: text with one marker per template,
/// and the templates themselves in the same order as their markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
	pub text: String,
	pub templates: Vec<Template>,
}

impl Extraction {
	/// The original template spans, ready to hand to [`reinsert`] unchanged.
	pub fn sources(&self) -> Vec<&str> {
		self.templates.iter().map(|t| t.source.as_str()).collect()
	}
}

/// A compiled allowlist of template names.
#[derive(Debug, Clone)]
pub struct TemplateSet {
	opening: Regex,
}

impl TemplateSet {
	/// Compile `names` into a single `{{name|` opening pattern. The first
	/// letter of each name matches in either case, as MediaWiki does.
	pub fn new<S: AsRef<str>>(names: &[S]) -> WikiMathResult<Self> {
		let alternatives: Vec<String> = names
			.iter()
			.map(|name| name_pattern(name.as_ref()))
			.collect();
		// An empty alternation would match every `{{...|`.
		let body = if alternatives.is_empty() {
			"[^\\s\\S]".to_string()
		} else {
			alternatives.join("|")
		};
		let pattern = format!(r"\{{\{{(?P<name>{body}) ?\|");
		let opening = Regex::new(&pattern).map_err(|e| {
			WikiMathError::InvalidPattern {
				pattern,
				reason: e.to_string(),
			}
		})?;

		Ok(Self { opening })
	}

	/// The built-in math allowlist.
	pub fn math() -> &'static Self {
		&MATH_TEMPLATE_SET
	}

	pub fn extract(&self, text: &str, marker: &str) -> WikiMathResult<Extraction> {
		let mut output = String::with_capacity(text.len());
		let mut templates = Vec::new();
		let mut offset = 0;

		while let Some(captures) = self.opening.captures(&text[offset..]) {
			let Some(found) = captures.get(0) else {
				break;
			};
			let start = offset + found.start();
			// A template that is opened and never closed is left in place
			// along with everything after it.
			let Some(close) = Delimiters::Braces.find_close(&text[start..]) else {
				break;
			};
			let end = start + close.end;

			output.push_str(&text[offset..start]);
			output.push_str(marker);
			templates.push(Template {
				name: captures
					.name("name")
					.map_or_else(String::new, |m| m.as_str().to_string()),
				source: text[start..end].to_string(),
			});
			offset = end;
		}

		output.push_str(&text[offset..]);

		let markers = count_markers(&output, marker);
		if markers != templates.len() {
			return Err(WikiMathError::MarkerCountMismatch {
				markers,
				templates: templates.len(),
			});
		}

		tracing::debug!(templates = templates.len(), "extracted templates");
		Ok(Extraction {
			text: output,
			templates,
		})
	}
}

fn name_pattern(name: &str) -> String {
	let mut chars = name.chars();
	let Some(first) = chars.next() else {
		return String::new();
	};
	let rest = regex::escape(chars.as_str());
	let lower = first.to_lowercase().to_string();
	let upper = first.to_uppercase().to_string();

	if lower == upper {
		format!("{}{rest}", regex::escape(&first.to_string()))
	} else {
		format!(
			"(?:{}|{}){rest}",
			regex::escape(&lower),
			regex::escape(&upper)
		)
	}
}

/// Replace every template whose name is in `names` with `marker`.
///
/// The number of markers in the returned text always equals the number of
/// returned templates; if `text` already contained `marker` that cannot
/// hold and a [`WikiMathError::MarkerCountMismatch`] is returned.
pub fn extract_templates<S: AsRef<str>>(
	text: &str,
	names: &[S],
	marker: &str,
) -> WikiMathResult<Extraction> {
	TemplateSet::new(names)?.extract(text, marker)
}

/// Extract the built-in math templates with [`MATH_MARKER`].
pub fn extract_math_templates(text: &str) -> WikiMathResult<Extraction> {
	TemplateSet::math().extract(text, MATH_MARKER)
}

/// Walk the markers in `text` left to right, replacing the i-th one with the
/// i-th replacement.
///
/// Replacements beyond the number of markers are dropped. That means the
/// caller lost a marker somewhere, which is logged but not fatal. Markers
/// beyond the number of replacements are left in the text.
pub fn reinsert<S: AsRef<str>>(text: &str, replacements: &[S], marker: &str) -> String {
	let (output, used) = splice(text, replacements, marker);
	warn_surplus(replacements.len() - used);
	output
}

/// [`reinsert`] across every section title and text in order, so the
/// markers of a section that is later dropped still consume their
/// replacements.
pub fn reinsert_sections<S: AsRef<str>>(sections: &mut [Section], replacements: &[S], marker: &str) {
	let mut remaining = replacements;

	for section in sections {
		for field in [&mut section.title, &mut section.text] {
			let (output, used) = splice(field, remaining, marker);
			*field = output;
			remaining = &remaining[used..];
		}
	}

	warn_surplus(remaining.len());
}

fn splice<S: AsRef<str>>(text: &str, replacements: &[S], marker: &str) -> (String, usize) {
	let mut output = String::with_capacity(text.len());
	let mut rest = text;
	let mut used = 0;

	for replacement in replacements {
		let Some(index) = rest.find(marker) else {
			break;
		};
		output.push_str(&rest[..index]);
		output.push_str(replacement.as_ref());
		rest = &rest[index + marker.len()..];
		used += 1;
	}

	output.push_str(rest);
	(output, used)
}

fn warn_surplus(dropped: usize) {
	if dropped > 0 {
		tracing::warn!(dropped, "more replacements than markers, surplus dropped");
	}
}

/// Number of non-overlapping occurrences of `marker` in `text`.
pub fn count_markers(text: &str, marker: &str) -> usize {
	if marker.is_empty() {
		return 0;
	}
	text.matches(marker).count()
}
