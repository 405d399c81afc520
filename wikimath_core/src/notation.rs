//! Template-to-LaTeX notation rules.
//!
//! Nearly every rule is a row in [`RULE_SPECS`]: an opening pattern and the
//! literals that replace the opening and closing delimiters. The few
//! conversions that need to look at template arguments (fractions, braket)
//! or that are plain substitutions (equals signs, symbols, pipe escapes) are
//! their own [`Stage`]s. [`PIPELINE`] fixes the order everything runs in.
//!
//! Applying the pipeline twice is not guaranteed to be a no-op: a rule's
//! output can in principle match a later opening pattern.

use once_cell::sync::Lazy;
use regex::NoExpand;
use regex::Regex;

use crate::markers::PIPE_MARKER;
use crate::rewrite::Matched;
use crate::rewrite::Rule;
use crate::rewrite::RuleSpec;
use crate::rewrite::rewrite_spans;
use crate::scope::Delimiters;
use crate::scope::split_arguments;

/// Every wrap-style rule, in no particular order. [`PIPELINE`] decides when
/// each one runs.
pub const RULE_SPECS: &[RuleSpec] = &[
	// Formatting wrappers that only get in the renderer's way.
	RuleSpec::template("var", r"\{\{[Vv]ar ?\|", "", ""),
	RuleSpec::template("nobreak", r"\{\{[Nn]obreak ?\|", "", ""),
	RuleSpec::template("nowrap", r"\{\{[Nn]owrap ?\|", "", ""),
	RuleSpec::template("mvar", r"\{\{[Mm]var ?\|", "", ""),
	RuleSpec::template("linktext", r"\{\{[Ll]inktext ?\|", "", ""),
	RuleSpec::template("em", r"\{\{[Ee]m ?\|", "", ""),
	RuleSpec::template("italics correction", r"\{\{[Ii]talics correction ?\|", "", ""),
	// Decorations.
	RuleSpec::template("prime", r"\{\{(?:[Pp]rime|′) ?\|", "", "'"),
	RuleSpec::template("overline", r"\{\{[Oo]verline ?\|?", r"\overline{", "}"),
	RuleSpec::template("overbar", r"\{\{[Oo]verbar ?\|", r"\overbar{", "}"),
	RuleSpec::template("overarc", r"\{\{[Oo]verarc ?\|", r"\overarc{", "}"),
	RuleSpec::template("radical", r"\{\{[Rr]adic(?:al)? ?\|", r"\sqrt{", "}"),
	// Fonts.
	RuleSpec::template("mathcal", r"\{\{[Mm]athcal ?\|", r"\mathcal{", "}"),
	RuleSpec::template("mathbb", r"\{\{[Mm]athbb ?\|", r"\mathbb{", "}"),
	RuleSpec::template("strong", r"\{\{[Ss]trong ?\|", r"\mathbf{", "}"),
	// Brackets.
	RuleSpec::template("ceil", r"\{\{[Cc]eil ?\|", r"\lceil ", r"\rceil"),
	RuleSpec::template("floor", r"\{\{[Ff]loor ?\|", r"\lfloor ", r"\rfloor"),
	RuleSpec::template("norm", r"\{\{[Nn]orm ?\|", r"\|", r"\|"),
	RuleSpec::template("open-closed", r"\{\{[Oo]pen-[Cc]losed ?\|", "(", "]"),
	RuleSpec::template("open-open", r"\{\{[Oo]pen-[Oo]pen ?\|", "(", ")"),
	RuleSpec::template("closed-closed", r"\{\{[Cc]losed-[Cc]losed ?\|", "[", "]"),
	RuleSpec::template("closed-open", r"\{\{[Cc]losed-[Oo]pen ?\|", "[", ")"),
	RuleSpec::template("bra", r"\{\{[Bb]ra ?\|", r"\langle ", PIPE_MARKER),
	RuleSpec::template("ket", r"\{\{[Kk]et ?\|", PIPE_MARKER, r"\rangle"),
	RuleSpec::template("brace", r"\{\{[Bb]race ?\|", r"\{", r"\}"),
	RuleSpec::template(
		"angle bracket",
		r"\{\{(?:[Aa]ngle ?[Bb]racket|[Aa]ngbr) ?\|",
		r"\langle ",
		r"\rangle",
	),
	RuleSpec::template("mset", r"\{\{[Mm]set\|?", r"\{", r"\}").recursive(),
	RuleSpec::template("abs", r"\{\{[Mm]?[Aa]bs ?\|?", PIPE_MARKER, PIPE_MARKER).recursive(),
	// Exponents nest, so these recurse.
	RuleSpec::tag("sup", "<sup>", "</sup>", "^{", "}").recursive(),
	RuleSpec::tag("sub", "<sub>", "</sub>", "_{", "}").recursive(),
	// Whatever is left of the outer `{{math|...}}` wrapper.
	RuleSpec::template(
		"math shell",
		r"\{\{(?:[Mm]ath|[Tt]math|[Bb]igmath|[Ss]mallmath) ?\|(?:1=)?",
		"",
		"",
	),
];

/// Symbol templates and their LaTeX. The key is a regex for the template
/// name, matched against the whole `{{name}}`.
pub const CHAR_SYMBOLS: &[(&str, &str)] = &[
	("[Pp]hi", r"\phi"),
	(r"\)", ")"),
	(r"\(", "("),
	("[Dd]elta", r"\delta"),
	("[Pp]i", r"\pi"),
	("[Gg]amma", r"\gamma"),
	("[Ee]psilon", r"\epsilon"),
	("[Ss]igma", r"\sigma"),
	("[Tt]heta", r"\theta"),
	("[Vv]arepsilon", r"\epsilon"),
	("[Vv]arphi", r"\phi"),
	("[Vv]arsigma", r"\sigma"),
	("[Vv]artheta", r"\theta"),
	("[Ee]ll", r"\ell"),
	("[Kk]appa", r"\kappa"),
	("[Ll]ambda", r"\lambda"),
	("[Mm]u", r"\mu"),
	("[Xx]i", r"\xi"),
	("[Tt]au", r"\tau"),
	("[Uu]psilon", r"\upsilon"),
	("φ", r"\phi"),
	("±", r"\pm"),
	("×", r"\times"),
];

/// One step of the notation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	/// `{{=}}` and `<nowiki>=</nowiki>` become `=`, and `{{math|` becomes
	/// `{{math|1=` so the bare `=` is not read as a named argument.
	Equals,
	/// Apply the [`RULE_SPECS`] entry with this name.
	Rule(&'static str),
	/// Rename `frac`, `fract` and `fraction` to `sfrac` and convert it.
	Fraction,
	/// `{{braket|...}}` in its bra, ket and bra-ket forms.
	Braket,
	/// Replace every symbol template in [`CHAR_SYMBOLS`].
	Symbols,
	/// Turn `{{!}}` and `<nowiki>|</nowiki>` into the pipe marker.
	PipeEscapes,
}

impl Stage {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Equals => "equals",
			Self::Rule(name) => *name,
			Self::Fraction => "fraction",
			Self::Braket => "braket",
			Self::Symbols => "symbols",
			Self::PipeEscapes => "pipe escapes",
		}
	}
}

/// The order rules run in. Structural rewrites come before symbol
/// substitution, and the equals normalization comes first of all.
pub const PIPELINE: &[Stage] = &[
	Stage::Equals,
	Stage::Rule("var"),
	Stage::Rule("nobreak"),
	Stage::Rule("nowrap"),
	Stage::Rule("mvar"),
	Stage::Rule("linktext"),
	Stage::Rule("em"),
	Stage::Rule("italics correction"),
	Stage::Fraction,
	Stage::Rule("prime"),
	Stage::Rule("overline"),
	Stage::Rule("overbar"),
	Stage::Rule("overarc"),
	Stage::Rule("radical"),
	Stage::Rule("mathcal"),
	Stage::Rule("mathbb"),
	Stage::Rule("strong"),
	Stage::Rule("ceil"),
	Stage::Rule("floor"),
	Stage::Rule("norm"),
	Stage::Rule("open-closed"),
	Stage::Rule("open-open"),
	Stage::Rule("closed-closed"),
	Stage::Rule("closed-open"),
	Stage::Braket,
	Stage::Rule("bra"),
	Stage::Rule("ket"),
	Stage::Rule("brace"),
	Stage::Rule("angle bracket"),
	Stage::Symbols,
	Stage::Rule("sup"),
	Stage::Rule("sub"),
	Stage::Rule("mset"),
	Stage::PipeEscapes,
	Stage::Rule("abs"),
	Stage::Rule("math shell"),
];

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
	RULE_SPECS
		.iter()
		.map(|spec| Rule::compile(spec).unwrap_or_else(|e| panic!("built-in rule: {e}")))
		.collect()
});

static SYMBOLS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
	CHAR_SYMBOLS
		.iter()
		.map(|(name, latex)| {
			let pattern = format!(r"\{{\{{(?:{name})\}}\}}");
			(Regex::new(&pattern).unwrap(), *latex)
		})
		.collect()
});

static EQUALS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{ ?= ?\}\}|<nowiki>=</nowiki>").unwrap());
static MATH_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{[Mm]ath ?\|(?:1=)?").unwrap());
static FRACTION_ALIAS: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"\{\{(?:[Ff]rac(?:t(?:ion)?)?(?:/sandbox)?|[Ss]frac/sandbox) ?\|").unwrap()
});
static SFRAC_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{[Ss]frac ?\|").unwrap());
static BRAKET_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{[Bb]raket ?\|").unwrap());

/// Look up a compiled rule by its [`RuleSpec::name`].
pub fn rule(name: &str) -> Option<&'static Rule> {
	RULES.iter().find(|rule| rule.name == name)
}

/// Run the whole notation pipeline over `text`.
pub fn fix_math(text: &str) -> String {
	PIPELINE
		.iter()
		.fold(text.to_string(), |text, stage| apply_stage(*stage, &text))
}

/// Run a single pipeline stage.
pub fn apply_stage(stage: Stage, text: &str) -> String {
	match stage {
		Stage::Equals => fix_equals(text),
		Stage::Rule(name) => {
			match rule(name) {
				Some(rule) => rule.apply(text),
				None => text.to_string(),
			}
		}
		Stage::Fraction => replace_fraction(text),
		Stage::Braket => replace_braket(text),
		Stage::Symbols => replace_symbols(text),
		Stage::PipeEscapes => replace_pipe_escapes(text),
	}
}

/// The renderer understands `{{math|1=...}}` but not a bare `{{=}}` inside
/// `{{math|...}}`.
pub fn fix_equals(text: &str) -> String {
	if !EQUALS.is_match(text) {
		return text.to_string();
	}

	let text = MATH_OPEN.replace_all(text, NoExpand("{{math|1="));
	EQUALS.replace_all(&text, NoExpand("=")).into_owned()
}

/// `{{sfrac|b}}` is `1/b`, `{{sfrac|a|b}}` is `a/b` and `{{sfrac|w|a|b}}` is
/// the mixed number `w a/b`. Other argument counts are left alone.
pub fn replace_fraction(text: &str) -> String {
	let text = FRACTION_ALIAS.replace_all(text, NoExpand("{{sfrac|"));

	rewrite_spans(&text, &SFRAC_OPEN, &Delimiters::Braces, |matched| {
		match trimmed_arguments(matched).as_slice() {
			[denominator] => format!(r"\frac{{1}}{{{denominator}}}"),
			[numerator, denominator] => format!(r"\frac{{{numerator}}}{{{denominator}}}"),
			[whole, numerator, denominator] => {
				format!(r"{whole}\frac{{{numerator}}}{{{denominator}}}")
			}
			_ => matched.source.to_string(),
		}
	})
}

/// `{{braket|bra|x}}`, `{{braket|ket|x}}` and `{{braket|x|y}}`. The inner
/// bar is the pipe marker so the renderer does not read it as table syntax.
pub fn replace_braket(text: &str) -> String {
	rewrite_spans(text, &BRAKET_OPEN, &Delimiters::Braces, |matched| {
		match trimmed_arguments(matched).as_slice() {
			["bra", value] => format!(r"\langle {value}{PIPE_MARKER}"),
			["ket", value] => format!(r"{PIPE_MARKER}{value}\rangle"),
			[value] => format!(r"\langle {value}\rangle"),
			[left, right] => format!(r"\langle {left}{PIPE_MARKER}{right}\rangle"),
			_ => matched.source.to_string(),
		}
	})
}

fn trimmed_arguments<'a>(matched: Matched<'a>) -> Vec<&'a str> {
	split_arguments(matched.inner)
		.into_iter()
		.map(str::trim)
		.collect()
}

/// Replace every occurrence of each symbol template.
pub fn replace_symbols(text: &str) -> String {
	SYMBOLS.iter().fold(text.to_string(), |text, (pattern, latex)| {
		pattern.replace_all(&text, NoExpand(latex)).into_owned()
	})
}

/// `|` means too much in wikitext, so escaped pipes become the pipe marker
/// until the text is final.
pub fn replace_pipe_escapes(text: &str) -> String {
	text.replace("{{!}}", PIPE_MARKER)
		.replace("<nowiki>||</nowiki>", &PIPE_MARKER.repeat(2))
		.replace("<nowiki>|</nowiki>", PIPE_MARKER)
}
