use std::ops::Range;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::*;
use crate::notation::PIPELINE;
use crate::notation::RULE_SPECS;
use crate::notation::fix_equals;
use crate::notation::rule;

/// Inputs for the properties that must hold for any text.
const CORPUS: &[&str] = &[
	"",
	"plain text without any markup",
	"{{math|x}}",
	"A {{math|x}} and {{radic|2}}.",
	"a {{math|{{radic|2}}}} b {{mvar|y}} c",
	"{{math|x",
	"{{math|a}b}}",
	"{{{{math|x}}}}",
	"unicode é {{Math|ü}} ✓ {{cite web|url=x}}",
	"{{math|{{!}}x{{!}}}}\n:indented\nnext line\n",
	"<math>x</math> {{overline|AB}} }} {{",
];

#[rstest]
#[case::single("{{a}}", Some(3..5))]
#[case::nested("{{a|{{b}}}} tail", Some(9..11))]
#[case::single_brace("{{a{b}c}}", Some(7..9))]
#[case::unterminated("{{a|{{b}}", None)]
#[case::stray_close_under_matches("{{a}b}}", None)]
#[case::empty("", None)]
fn brace_scope_end(#[case] text: &str, #[case] expected: Option<Range<usize>>) {
	assert_eq!(find_scope_end(text, &Delimiters::Braces), expected);
}

#[test]
fn double_brace_patterns_use_brace_scanner() -> WikiMathResult<()> {
	assert!(matches!(Delimiters::new(r"\{\{", r"\}\}")?, Delimiters::Braces));
	assert!(matches!(Delimiters::new("{{", "}}")?, Delimiters::Braces));
	assert!(matches!(
		Delimiters::new("<sup>", "</sup>")?,
		Delimiters::Pattern { .. }
	));

	Ok(())
}

#[test]
fn pattern_scope_end_counts_depth() -> WikiMathResult<()> {
	let delimiters = Delimiters::new("<sup>", "</sup>")?;
	let text = "<sup>a<sup>b</sup></sup>c";
	assert_eq!(find_scope_end(text, &delimiters), Some(18..24));
	assert_eq!(find_scope_end("<sup>a<sup>b</sup>", &delimiters), None);

	Ok(())
}

#[test]
fn invalid_pattern_is_reported() {
	let result = Delimiters::new("(", "</sup>");
	assert!(matches!(result, Err(WikiMathError::InvalidPattern { .. })));
}

#[rstest]
fn scope_end_ignores_surroundings(
	#[values(("{{", "}}"), ("<sup>", "</sup>"))] pair: (&str, &str),
	#[values(0, 1, 3)] depth: usize,
	#[values("", "after }} text", "\n{{x}} <sup>y</sup>")] suffix: &str,
) -> WikiMathResult<()> {
	let (open, close) = pair;
	let delimiters = Delimiters::new(&regex::escape(open), &regex::escape(close))?;
	let nested = format!("{open}x{close}").repeat(depth);
	let scope = format!("{open}a{nested}b{close}");
	let text = format!("prefix text {scope}{suffix}");
	let start = text.len() - scope.len() - suffix.len();

	let close_range = find_scope_end(&text[start..], &delimiters);
	assert_eq!(close_range, Some(scope.len() - close.len()..scope.len()));

	Ok(())
}

#[test]
fn split_arguments_respects_nesting() {
	assert_eq!(
		split_arguments("a|{{b|c}}|[[d|e]]"),
		vec!["a", "{{b|c}}", "[[d|e]]"]
	);
	assert_eq!(split_arguments(""), vec![""]);
}

#[rstest]
#[case::between_text(
	"pre {{overline|x}} mid {{overline|y}} post",
	r"pre \overline{x} mid \overline{y} post"
)]
#[case::nested_argument("{{overline|{{radic|2}}}}", r"\overline{{{radic|2}}}")]
#[case::unterminated("a {{overline|x} b", "a {{overline|x} b")]
#[case::stops_at_unterminated(
	"{{overline|x}} {{overline|y",
	r"\overline{x} {{overline|y"
)]
fn rewrite_preserves_text_outside_spans(#[case] input: &str, #[case] expected: &str) {
	let overline = rule("overline").unwrap();
	assert_eq!(overline.apply(input), expected);
}

#[test]
fn recursive_rewrite_converts_nested_spans() -> WikiMathResult<()> {
	let spec = RuleSpec::tag("sup", "<sup>", "</sup>", "^{", "}");
	let flat = Rule::compile(&spec)?;
	let nested = Rule::compile(&spec.recursive())?;
	let input = "x<sup>2<sup>n</sup></sup>";

	assert_eq!(flat.apply(input), "x^{2<sup>n</sup>}");
	assert_eq!(nested.apply(input), "x^{2^{n}}");

	Ok(())
}

/// Nested rewriting written as plain recursion over [`rewrite_spans`].
fn nested_by_recursion(text: &str, rule_name: &str, start: &str, end: &str) -> String {
	let rule = rule(rule_name).unwrap();
	rewrite_spans(text, rule.opening(), rule.delimiters(), |matched| {
		format!(
			"{start}{}{end}",
			nested_by_recursion(matched.inner, rule_name, start, end)
		)
	})
}

#[rstest]
#[case::sup("sup", "^{", "}", "a<sup>1<sup>2</sup></sup> b<sup>3</sup>")]
#[case::sup_unterminated_inner("sup", "^{", "}", "a<sup>1<sup>2</sup> tail")]
#[case::sup_siblings("sup", "^{", "}", "<sup><sup>a</sup><sup>b</sup></sup><sup>c")]
#[case::mset("mset", r"\{", r"\}", "{{mset|a, {{mset|b}}, {{x|c}}}} {{mset|d}}")]
#[case::mset_stray_close("mset", r"\{", r"\}", "{{mset|a}b {{mset|c}}}} {{mset|d}}")]
#[case::mset_single_braces("mset", r"\{", r"\}", "{{mset|{a {{mset|b}} }}}")]
#[case::abs("abs", PIPE_MARKER, PIPE_MARKER, "{{abs|{{abs|x}}-{{Mabs|y}}}} {{abs|")]
fn nested_rewrite_matches_recursive_form(
	#[case] rule_name: &str,
	#[case] start: &str,
	#[case] end: &str,
	#[case] input: &str,
) {
	assert_eq!(
		rule(rule_name).unwrap().apply(input),
		nested_by_recursion(input, rule_name, start, end)
	);
}

#[test]
fn nested_rewrite_matches_recursive_form_over_corpus() {
	for input in CORPUS {
		let expected = nested_by_recursion(input, "mset", r"\{", r"\}");
		assert_eq!(rule("mset").unwrap().apply(input), expected, "input: {input:?}");
	}
}

#[test]
fn deeply_nested_sup_converts_on_a_small_stack() {
	const DEPTH: usize = 50_000;
	let input = format!(
		"{{{{math|x{}1{}}}}}",
		"<sup>".repeat(DEPTH),
		"</sup>".repeat(DEPTH)
	);
	let expected = format!("x{}1{}", "^{".repeat(DEPTH), "}".repeat(DEPTH));

	let output = std::thread::Builder::new()
		.stack_size(512 * 1024)
		.spawn(move || fix_math(&input))
		.unwrap()
		.join()
		.unwrap();

	assert!(output == expected, "deeply nested exponents did not convert");
}

#[test]
fn rewrite_spans_hands_over_inner_text() {
	let opening = regex::Regex::new(r"\{\{[Xx] ?\|").unwrap();
	let mut seen = Vec::new();
	let output = rewrite_spans("a {{x|1}} b {{X |2}}", &opening, &Delimiters::Braces, |m| {
		seen.push((m.source.to_string(), m.inner.to_string()));
		m.inner.to_uppercase()
	});

	assert_eq!(output, "a 1 b 2");
	assert_eq!(
		seen,
		vec![
			("{{x|1}}".to_string(), "1".to_string()),
			("{{X |2}}".to_string(), "2".to_string()),
		]
	);
}

#[rstest]
#[case::radical("{{radic|2}}", r"\sqrt{2}")]
#[case::overline("{{overline|AB}}", r"\overline{AB}")]
#[case::symbol("{{phi}}", r"\phi")]
#[case::every_symbol("{{pi}}+{{pi}}", r"\pi+\pi")]
#[case::symbol_table_extras("{{mu}}{{±}}{{lambda}}", r"\mu\pm\lambda")]
#[case::nested_sup("x<sup>2<sup>n</sup></sup>", "x^{2^{n}}")]
#[case::sub("a<sub>i</sub>", "a_{i}")]
#[case::sfrac_one("{{sfrac|2}}", r"\frac{1}{2}")]
#[case::frac_two("{{frac|1|2}}", r"\frac{1}{2}")]
#[case::fraction_mixed("{{fraction|3|1|2}}", r"3\frac{1}{2}")]
#[case::fraction_too_many("{{sfrac|1|2|3|4}}", "{{sfrac|1|2|3|4}}")]
#[case::prime("{{prime|f}}", "f'")]
#[case::ceil("{{ceil|x}}", r"\lceil x\rceil")]
#[case::floor("{{floor|x}}", r"\lfloor x\rfloor")]
#[case::norm("{{norm|v}}", r"\|v\|")]
#[case::open_closed("{{open-closed|a, b}}", "(a, b]")]
#[case::closed_open("{{closed-open|a, b}}", "[a, b)")]
#[case::mathbb("{{mathbb|R}}", r"\mathbb{R}")]
#[case::strong("{{strong|v}}", r"\mathbf{v}")]
#[case::brace("{{brace|x}}", r"\{x\}")]
#[case::angle_bracket("{{angbr|x}}", r"\langle x\rangle")]
#[case::mset("{{mset|1, 2}}", r"\{1, 2\}")]
#[case::var_stripped("{{math|{{var|x}} + 1}}", "x + 1")]
#[case::equals("{{math|a{{=}}b}}", "a=b")]
#[case::math_shell("{{math|{{radic|2}}}}", r"\sqrt{2}")]
#[case::tmath_shell("{{tmath|1=x}}", "x")]
fn notation_rules(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(fix_math(input), expected);
}

#[rstest]
#[case::abs("{{abs|x}}", "$|x|$")]
#[case::abs_pipe_escapes("{{math|{{!}}x{{!}}}}", "$|x|$")]
#[case::nowiki_pipes("{{math|<nowiki>||</nowiki>v<nowiki>||</nowiki>}}", "$||v||$")]
#[case::braket("{{braket|x|y}}", r"$\langle x|y\rangle$")]
#[case::braket_bra("{{braket|bra|x}}", r"$\langle x|$")]
#[case::braket_ket("{{braket|ket|x}}", r"$|x\rangle$")]
#[case::bra("{{bra|x}}", r"$\langle x|$")]
#[case::ket("{{ket|x}}", r"$|x\rangle$")]
#[case::trims("{{math| x^2 }}", "$x^2$")]
#[case::sup("{{math|x<sup>2</sup>}}", "$x^{2}$")]
fn math_template_rendering(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(render_math_template(input), expected);
}

#[rstest]
#[case::no_equals("{{math|a}}", "{{math|a}}")]
#[case::template_equals("{{math|a{{=}}b}}", "{{math|1=a=b}}")]
#[case::nowiki_equals("{{Math|a<nowiki>=</nowiki>b}}", "{{math|1=a=b}}")]
#[case::already_positional("{{math|1=a{{=}}b}}", "{{math|1=a=b}}")]
fn equals_normalization(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(fix_equals(input), expected);
}

#[test]
fn pipeline_order_is_pinned() {
	let order = PIPELINE
		.iter()
		.map(|stage| stage.name())
		.collect::<Vec<_>>()
		.join("\n");

	insta::assert_snapshot!(order, @r"
	equals
	var
	nobreak
	nowrap
	mvar
	linktext
	em
	italics correction
	fraction
	prime
	overline
	overbar
	overarc
	radical
	mathcal
	mathbb
	strong
	ceil
	floor
	norm
	open-closed
	open-open
	closed-closed
	closed-open
	braket
	bra
	ket
	brace
	angle bracket
	symbols
	sup
	sub
	mset
	pipe escapes
	abs
	math shell
	");
}

#[test]
fn every_rule_is_scheduled_once() {
	for spec in RULE_SPECS {
		let scheduled = PIPELINE
			.iter()
			.filter(|stage| **stage == notation::Stage::Rule(spec.name))
			.count();
		assert_eq!(scheduled, 1, "rule `{}`", spec.name);
		assert!(rule(spec.name).is_some());
	}
}

#[test]
fn nested_math_shell_needs_a_second_pass() {
	let once = fix_math("{{math|{{math|{{pi}}}}}}");
	assert_eq!(once, r"{{math|\pi}}");
	assert_eq!(fix_math(&once), r"\pi");
}

#[rstest]
#[case::bare("<math>x^2</math>", "$$x^2$$")]
#[case::inline(r#"<math display="inline">x</math>"#, "$x$ ")]
#[case::block(r#"<math display="block">x</math>"#, "$$x$$")]
#[case::unquoted("<math display=inline>x</math>", "$x$ ")]
#[case::unterminated("<math>unterminated", "<math>unterminated")]
#[case::several(
	r#"a <math>b</math> and <math display="inline">c</math>."#,
	"a $$b$$ and $c$ ."
)]
#[case::continues_after_unterminated("<math>a <math>b</math>", "<math>a $$b$$")]
#[case::inner_untouched("<math>{{pi}}</math>", "$${{pi}}$$")]
fn math_tags(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(replace_math_tags(input), expected);
}

#[test]
fn many_unclosed_math_tags_pass_through() {
	let talk = "mention of <math> here, ".repeat(20_000);
	let input = format!("{talk}<math>x</math>");

	assert!(replace_math_tags(&talk) == talk);
	assert!(replace_math_tags(&input) == format!("{talk}$$x$$"));
}

#[test]
fn extract_replaces_templates_with_markers() -> WikiMathResult<()> {
	let extraction = extract_math_templates("A {{math|x}} and {{radic|2}}, {{cite|x}}.")?;

	assert_eq!(
		extraction.text,
		format!("A {MATH_MARKER} and {MATH_MARKER}, {{{{cite|x}}}}.")
	);
	assert_eq!(extraction.sources(), vec!["{{math|x}}", "{{radic|2}}"]);
	assert_eq!(extraction.templates[0].name, "math");
	assert_eq!(extraction.templates[1].name, "radic");

	Ok(())
}

#[rstest]
#[case::first_letter_case("{{Math|x}}", 1)]
#[case::space_before_pipe("{{math |x}}", 1)]
#[case::rest_is_case_sensitive("{{MATH|x}}", 0)]
#[case::nested_counts_once("{{math|{{radic|2}}}}", 1)]
#[case::unterminated("{{math|x", 0)]
#[case::no_arguments("{{pi}}", 0)]
#[case::escaped_name("{{10^|3}}", 1)]
fn extract_matches_allowlist(#[case] input: &str, #[case] expected: usize) -> WikiMathResult<()> {
	let extraction = extract_math_templates(input)?;
	assert_eq!(extraction.templates.len(), expected);

	Ok(())
}

#[test]
fn extract_with_custom_names() -> WikiMathResult<()> {
	let extraction = extract_templates("{{math|x}} {{radic|2}}", &["radic"], SECOND_MARKER)?;
	assert_eq!(extraction.text, format!("{{{{math|x}}}} {SECOND_MARKER}"));

	let none = extract_templates::<&str>("{{math|x}}", &[], MATH_MARKER)?;
	assert_eq!(none.text, "{{math|x}}");
	assert!(none.templates.is_empty());

	Ok(())
}

#[test]
fn extract_rejects_marker_already_in_text() {
	let text = format!("{MATH_MARKER} {{{{math|x}}}}");
	let result = extract_math_templates(&text);

	assert!(matches!(
		result,
		Err(WikiMathError::MarkerCountMismatch {
			markers: 2,
			templates: 1
		})
	));
}

#[test]
fn marker_round_trip_is_identity() -> WikiMathResult<()> {
	for text in CORPUS {
		let extraction = extract_math_templates(text)?;
		let restored = reinsert(&extraction.text, &extraction.sources(), MATH_MARKER);
		assert_eq!(&restored, text);
	}

	Ok(())
}

#[test]
fn marker_count_matches_templates() -> WikiMathResult<()> {
	for text in CORPUS {
		let extraction = extract_math_templates(text)?;
		assert_eq!(
			count_markers(&extraction.text, MATH_MARKER),
			extraction.templates.len(),
			"{text:?}"
		);
	}

	Ok(())
}

#[test]
#[traced_test]
fn reinsert_drops_surplus_replacements() {
	let text = format!("a {MATH_MARKER} b");
	assert_eq!(reinsert(&text, &["X", "Y"], MATH_MARKER), "a X b");
	assert!(logs_contain("surplus dropped"));
}

#[test]
fn reinsert_leaves_unmatched_markers_and_trailing_text() {
	let text = format!("{MATH_MARKER} {MATH_MARKER} end");
	assert_eq!(
		reinsert(&text, &["X"], MATH_MARKER),
		format!("X {MATH_MARKER} end")
	);
	assert_eq!(reinsert::<&str>("no markers", &[], MATH_MARKER), "no markers");
}

#[test]
fn markers_are_distinct_and_stable() {
	assert_eq!(MATH_MARKER, "\u{166D}".repeat(3));
	assert_eq!(SECOND_MARKER, "\u{21ED}".repeat(3));
	assert_eq!(PIPE_MARKER, "\u{00A6}".repeat(3));
	assert_ne!(MATH_MARKER, PIPE_MARKER);
}

#[test]
fn format_document_drops_boilerplate() {
	let sections = vec![Section::new("Intro", "Hello"), Section::new("See also", "X")];
	assert_eq!(format_document(&sections, "Page"), "Page\n\nIntro\nHello");
}

#[rstest]
#[case::untitled(vec![Section::new("", "Body")], "", "Body")]
#[case::empty_text(vec![Section::new("Empty", ""), Section::new("A", "b")], "T", "T\n\nA\nb")]
#[case::case_insensitive(vec![Section::new("REFERENCES", "r"), Section::new("A", "b")], "", "A\nb")]
#[case::nothing(vec![], "", "")]
#[case::title_only(vec![Section::new("Notes", "n")], "Title", "Title")]
fn format_document_cases(#[case] sections: Vec<Section>, #[case] title: &str, #[case] expected: &str) {
	assert_eq!(format_document(&sections, title), expected);
}

#[test]
fn custom_blocklist() {
	let sections = vec![Section::new("Proofs", "p"), Section::new("See also", "s")];
	let blocklist = SectionBlocklist::new(&["proofs"]);
	assert_eq!(format_document_with(&sections, "", &blocklist), "See also\ns");
}

#[rstest]
#[case::paragraph_after_indent(":a\nb", ":a\n\nb")]
#[case::consecutive_indents(":a\n:b\nc", ":a\n:b\n\nc")]
#[case::already_separated(":a\n\nb", ":a\n\nb")]
#[case::last_line(":a", ":a")]
#[case::trailing_newline(":a\n", ":a\n")]
#[case::deep_indent("::a\nb", "::a\n\nb")]
#[case::not_at_line_start("a:b\nc", "a:b\nc")]
fn indentation(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(adjust_indentation(input), expected);
}

#[test]
fn indentation_is_idempotent() {
	for text in CORPUS.iter().chain(&[":a\nb\n:c\n:d\ne", "::\n:x\ny"]) {
		let once = adjust_indentation(text);
		assert_eq!(adjust_indentation(&once), once);
	}
}

#[test]
fn indentation_handles_long_documents() {
	let text = ":indent\nline\n".repeat(50_000);
	let adjusted = adjust_indentation(&text);
	assert_eq!(adjusted, ":indent\n\nline\n".repeat(50_000));
}

struct FixedRenderer(RenderResponse);

impl Renderer for FixedRenderer {
	fn render(&self, _request: &RenderRequest<'_>) -> WikiMathResult<RenderResponse> {
		Ok(self.0.clone())
	}
}

struct FailingRenderer;

impl Renderer for FailingRenderer {
	fn render(&self, _request: &RenderRequest<'_>) -> WikiMathResult<RenderResponse> {
		Err(WikiMathError::Renderer("connection refused".to_string()))
	}
}

struct DoublingRenderer;

impl Renderer for DoublingRenderer {
	fn render(&self, request: &RenderRequest<'_>) -> WikiMathResult<RenderResponse> {
		Ok(RenderResponse::Legacy {
			text: format!("{0} {0}", request.wikitext),
		})
	}
}

#[test]
fn process_document_end_to_end() -> WikiMathResult<()> {
	let document = WikiDocument::new("Let {{math|x<sup>2</sup>}} be <math>y</math>.");
	let text = process_document(&IdentityRenderer::default(), &document)?;
	assert_eq!(text, "Let $x^{2}$ be $$y$$.");

	Ok(())
}

#[test]
fn process_document_prefixes_title() -> WikiMathResult<()> {
	let mut document = WikiDocument::new("Body {{radic|2}}");
	document
		.metadata
		.insert("title".to_string(), serde_json::Value::from("Page"));
	let text = process_document(&IdentityRenderer::default(), &document)?;
	assert_eq!(text, "Page\n\nBody $\\sqrt{2}$");

	Ok(())
}

#[test]
fn process_document_defaults_missing_text() -> WikiMathResult<()> {
	let text = process_document(&IdentityRenderer::default(), &WikiDocument::default())?;
	assert_eq!(text, "");

	Ok(())
}

#[test]
fn process_document_rejects_marker_in_input() {
	let document = WikiDocument::new(format!("already {MATH_MARKER}"));
	let result = process_document(&IdentityRenderer::default(), &document);
	assert!(matches!(result, Err(WikiMathError::MarkerInInput { .. })));
}

#[test]
fn process_document_propagates_renderer_failure() {
	let document = WikiDocument::new("{{math|x}}");
	let result = process_document(&FailingRenderer, &document);
	assert!(matches!(result, Err(WikiMathError::Renderer(_))));
}

#[test]
fn process_document_fails_on_duplicated_markers() {
	let document = WikiDocument::new("{{math|x}}");
	let result = Pipeline::new(&DoublingRenderer)
		.with_mode(RenderMode::Legacy)
		.process(&document);
	assert!(matches!(
		result,
		Err(WikiMathError::MarkerCountMismatch {
			markers: 2,
			templates: 1
		})
	));
}

#[test]
#[traced_test]
fn process_document_tolerates_dropped_markers() -> WikiMathResult<()> {
	let renderer = FixedRenderer(RenderResponse::Sections {
		document: vec![Section::new("Intro", format!("Value {MATH_MARKER}"))],
	});
	let document = WikiDocument::new("{{math|a}} {{math|b}}");
	let text = process_document(&renderer, &document)?;

	assert_eq!(text, "Intro\nValue $a$");
	assert!(logs_contain("surplus dropped"));

	Ok(())
}

#[test]
#[traced_test]
fn skipped_sections_keep_their_replacements() -> WikiMathResult<()> {
	let renderer = FixedRenderer(RenderResponse::Sections {
		document: vec![
			Section::new("Notes", format!("note {MATH_MARKER}")),
			Section::new(format!("Proof {MATH_MARKER}"), format!("proof {MATH_MARKER}")),
		],
	});
	let document = WikiDocument::new("note {{math|a}}\n==Proof {{math|b}}==\nproof {{math|c}}");
	let text = process_document(&renderer, &document)?;

	assert_eq!(text, "Proof $b$\nproof $c$");
	assert!(!logs_contain("surplus dropped"));

	Ok(())
}

#[test]
fn reinsert_sections_walks_titles_then_text() {
	let mut sections = vec![
		Section::new("A", format!("{MATH_MARKER} and {MATH_MARKER}")),
		Section::new(MATH_MARKER, "none"),
		Section::new("C", MATH_MARKER),
	];
	reinsert_sections(&mut sections, &["1", "2", "3", "4"], MATH_MARKER);

	assert_eq!(
		sections,
		vec![
			Section::new("A", "1 and 2"),
			Section::new("3", "none"),
			Section::new("C", "4"),
		]
	);
}

#[test]
fn legacy_mode_uses_text_directly() -> WikiMathResult<()> {
	let renderer = IdentityRenderer::new(RenderMode::Legacy);
	let document = WikiDocument::new("{{math|{{phi}}}}");

	let text = Pipeline::new(&renderer)
		.with_mode(RenderMode::Legacy)
		.process(&document)?;
	assert_eq!(text, r"$\phi$");

	let mismatch = Pipeline::new(&renderer).process(&document);
	assert!(matches!(mismatch, Err(WikiMathError::MalformedResponse(_))));

	Ok(())
}

#[test]
fn render_response_shapes() -> WikiMathResult<()> {
	let sections: RenderResponse =
		serde_json::from_str(r#"{"document": [{"title": "A", "text": "b"}, {"text": "c"}]}"#)?;
	assert_eq!(
		sections,
		RenderResponse::Sections {
			document: vec![Section::new("A", "b"), Section::new("", "c")],
		}
	);

	let legacy: RenderResponse = serde_json::from_str(r#"{"text": "plain"}"#)?;
	assert_eq!(
		legacy,
		RenderResponse::Legacy {
			text: "plain".to_string()
		}
	);

	assert!(serde_json::from_str::<RenderResponse>(r#"{"other": 1}"#).is_err());

	Ok(())
}

#[test]
fn render_request_serializes_wire_names() -> WikiMathResult<()> {
	let request = RenderRequest {
		wikitext: "w",
		id: "1",
		source: "wiki",
	};
	assert_eq!(
		serde_json::to_value(request)?,
		serde_json::json!({ "wikitext": "w", "id": "1", "source": "wiki" })
	);

	Ok(())
}

#[test]
fn wiki_document_keeps_unknown_fields() -> WikiMathResult<()> {
	let raw = serde_json::json!({
		"id": "1",
		"text": "t",
		"source": "wiki",
		"added": "2024-01-01",
		"metadata": { "title": "T", "license": "CC BY-SA" }
	});
	let document: WikiDocument = serde_json::from_value(raw.clone())?;

	assert_eq!(document.title(), "T");
	assert_eq!(document.id(), "1");
	assert!(document.extra.contains_key("added"));
	assert_eq!(serde_json::to_value(&document)?, raw);

	let missing: WikiDocument = serde_json::from_str(r#"{"id": "2", "text": null}"#)?;
	assert_eq!(missing.text, None);
	assert_eq!(missing.title(), "");

	Ok(())
}

#[test]
fn wiki_document_omits_fields_it_never_had() -> WikiMathResult<()> {
	let raw = serde_json::json!({ "text": "t", "added": "2024-01-01" });
	let document: WikiDocument = serde_json::from_value(raw.clone())?;

	assert_eq!(serde_json::to_value(&document)?, raw);
	assert_eq!(serde_json::to_string(&document)?, r#"{"text":"t","added":"2024-01-01"}"#);

	Ok(())
}

#[test]
fn config_absent_is_none() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	assert!(WikiMathConfig::load(tmp.path())?.is_none());

	Ok(())
}

#[test]
fn config_loads_all_sections() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("wikimath.toml"),
		r#"
workers = 4

[renderer]
url = "http://renderer:5000"
timeout_secs = 5
mode = "legacy"

[extract]
templates = ["radic"]

[sections]
skip = ["proofs"]

[input]
patterns = ["**/*.jsonl"]
"#,
	)?;

	let config = WikiMathConfig::load(tmp.path())?.unwrap();
	assert_eq!(config.workers, Some(4));
	assert_eq!(config.renderer.url, "http://renderer:5000");
	assert_eq!(config.renderer.timeout_secs, 5);
	assert_eq!(config.renderer.mode, RenderMode::Legacy);
	assert_eq!(config.extract.templates, Some(vec!["radic".to_string()]));
	assert!(config.sections.blocklist().contains("Proofs"));
	assert!(!config.sections.blocklist().contains("see also"));
	assert_eq!(config.input.patterns, vec!["**/*.jsonl".to_string()]);

	Ok(())
}

#[test]
fn config_defaults() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join(".config"))?;
	std::fs::write(tmp.path().join(".config/wikimath.toml"), "")?;

	let config = WikiMathConfig::load(tmp.path())?.unwrap();
	assert_eq!(config.renderer.url, DEFAULT_RENDERER_URL);
	assert_eq!(config.renderer.timeout_secs, DEFAULT_TIMEOUT_SECS);
	assert_eq!(config.renderer.mode, RenderMode::Sections);
	assert_eq!(config.extract.templates, None);
	assert!(config.sections.blocklist().contains("see also"));
	assert_eq!(
		config.input.patterns,
		vec!["*.jsonl".to_string(), "*.jsonl.gz".to_string()]
	);
	assert_eq!(config.workers, None);

	Ok(())
}

#[test]
fn config_discovery_prefers_first_candidate() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join(".wikimath.toml"), "workers = 2")?;
	std::fs::write(tmp.path().join("wikimath.toml"), "workers = 1")?;

	let path = WikiMathConfig::resolve_path(tmp.path()).unwrap();
	assert!(path.ends_with("wikimath.toml"));
	assert!(!path.ends_with(".wikimath.toml"));
	assert_eq!(WikiMathConfig::load(tmp.path())?.unwrap().workers, Some(1));

	Ok(())
}

#[test]
fn config_parse_error() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("wikimath.toml"), "[renderer\nurl = 1")?;

	let result = WikiMathConfig::load(tmp.path());
	assert!(matches!(result, Err(WikiMathError::ConfigParse(_))));

	Ok(())
}

#[test]
fn pipeline_from_config_uses_custom_allowlist() -> AnyEmptyResult {
	let config: WikiMathConfig = toml::from_str("[extract]\ntemplates = [\"radic\"]")?;
	let renderer = IdentityRenderer::default();
	let pipeline = Pipeline::from_config(&renderer, &config)?;

	let text = pipeline.process(&WikiDocument::new("{{math|x}} {{radic|2}}"))?;
	assert_eq!(text, r"{{math|x}} $\sqrt{2}$");

	Ok(())
}
