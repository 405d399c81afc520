//! The per-document pipeline.
//!
//! ```text
//! <math> tags -> indentation -> extract templates -> render
//!     -> convert extracted templates -> reinsert -> assemble
//! ```
//!
//! Rendering is the only step that leaves the process. It goes through the
//! [`Renderer`] trait so the pipeline can run against the HTTP service, an
//! in-process stand-in, or a test double.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::WikiMathError;
use crate::WikiMathResult;
use crate::config::RenderMode;
use crate::config::WikiMathConfig;
use crate::document::Section;
use crate::document::SectionBlocklist;
use crate::document::format_document_with;
use crate::indent::adjust_indentation;
use crate::markers::MATH_MARKER;
use crate::markers::PIPE_MARKER;
use crate::markers::TemplateSet;
use crate::markers::count_markers;
use crate::markers::reinsert_sections;
use crate::math_tags::replace_math_tags;
use crate::notation::fix_math;

/// A dolma-style record. Everything but `text` is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WikiDocument {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub metadata: Map<String, Value>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl WikiDocument {
	pub fn new(text: impl Into<String>) -> Self {
		Self {
			text: Some(text.into()),
			..Self::default()
		}
	}

	/// `metadata.title`, or the empty string.
	pub fn title(&self) -> &str {
		self.metadata
			.get("title")
			.and_then(Value::as_str)
			.unwrap_or_default()
	}

	pub fn id(&self) -> &str {
		self.id.as_deref().unwrap_or_default()
	}

	pub fn source(&self) -> &str {
		self.source.as_deref().unwrap_or_default()
	}
}

/// Body of a renderer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderRequest<'a> {
	pub wikitext: &'a str,
	pub id: &'a str,
	pub source: &'a str,
}

/// What a renderer answers with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RenderResponse {
	Sections { document: Vec<Section> },
	Legacy { text: String },
}

impl RenderResponse {
	/// The rendered sections. Legacy text comes back as one untitled
	/// section. The response shape must agree with `mode`.
	pub fn into_sections(self, mode: RenderMode) -> WikiMathResult<Vec<Section>> {
		match (mode, self) {
			(RenderMode::Sections, Self::Sections { document }) => Ok(document),
			(RenderMode::Legacy, Self::Legacy { text }) => Ok(vec![Section::new("", text)]),
			(RenderMode::Sections, Self::Legacy { .. }) => {
				Err(WikiMathError::MalformedResponse(
					"expected a sectioned `document`, got legacy `text`".to_string(),
				))
			}
			(RenderMode::Legacy, Self::Sections { .. }) => {
				Err(WikiMathError::MalformedResponse(
					"expected legacy `text`, got a sectioned `document`".to_string(),
				))
			}
		}
	}
}

/// Turns marker-bearing wikitext into plain text.
pub trait Renderer: Send + Sync {
	fn render(&self, request: &RenderRequest<'_>) -> WikiMathResult<RenderResponse>;
}

/// Hands the wikitext back unrendered, as a single untitled section (or as
/// legacy text). Useful offline and for testing the rest of the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRenderer {
	pub mode: RenderMode,
}

impl IdentityRenderer {
	pub fn new(mode: RenderMode) -> Self {
		Self { mode }
	}
}

impl Renderer for IdentityRenderer {
	fn render(&self, request: &RenderRequest<'_>) -> WikiMathResult<RenderResponse> {
		let text = request.wikitext.to_string();
		Ok(match self.mode {
			RenderMode::Sections => {
				RenderResponse::Sections {
					document: vec![Section::new("", text)],
				}
			}
			RenderMode::Legacy => RenderResponse::Legacy { text },
		})
	}
}

/// Convert one extracted template into inline TeX.
pub fn render_math_template(source: &str) -> String {
	let latex = fix_math(source).replace(PIPE_MARKER, "|");
	format!("${}$", latex.trim())
}

/// A configured pipeline. Shareable across threads.
pub struct Pipeline<'r> {
	renderer: &'r dyn Renderer,
	templates: TemplateSet,
	blocklist: SectionBlocklist,
	mode: RenderMode,
}

impl<'r> Pipeline<'r> {
	/// A pipeline with the built-in allowlist and blocklist.
	pub fn new(renderer: &'r dyn Renderer) -> Self {
		Self {
			renderer,
			templates: TemplateSet::math().clone(),
			blocklist: SectionBlocklist::default(),
			mode: RenderMode::default(),
		}
	}

	pub fn from_config(renderer: &'r dyn Renderer, config: &WikiMathConfig) -> WikiMathResult<Self> {
		Ok(Self {
			renderer,
			templates: config.extract.template_set()?,
			blocklist: config.sections.blocklist(),
			mode: config.renderer.mode,
		})
	}

	pub fn with_templates(mut self, templates: TemplateSet) -> Self {
		self.templates = templates;
		self
	}

	pub fn with_blocklist(mut self, blocklist: SectionBlocklist) -> Self {
		self.blocklist = blocklist;
		self
	}

	pub fn with_mode(mut self, mode: RenderMode) -> Self {
		self.mode = mode;
		self
	}

	/// Run every step for one document and return its new text.
	pub fn process(&self, document: &WikiDocument) -> WikiMathResult<String> {
		let text = document.text.as_deref().unwrap_or_default();
		if text.contains(MATH_MARKER) {
			return Err(WikiMathError::MarkerInInput {
				marker: MATH_MARKER.to_string(),
			});
		}

		let text = adjust_indentation(&replace_math_tags(text));
		let extraction = self.templates.extract(&text, MATH_MARKER)?;

		let response = self.renderer.render(&RenderRequest {
			wikitext: &extraction.text,
			id: document.id(),
			source: document.source(),
		})?;
		let mut sections = response.into_sections(self.mode)?;

		let replacements: Vec<String> = extraction
			.templates
			.iter()
			.map(|template| render_math_template(&template.source))
			.collect();

		let markers: usize = sections
			.iter()
			.map(|section| {
				count_markers(&section.title, MATH_MARKER) + count_markers(&section.text, MATH_MARKER)
			})
			.sum();
		if markers > replacements.len() {
			return Err(WikiMathError::MarkerCountMismatch {
				markers,
				templates: replacements.len(),
			});
		}

		tracing::debug!(
			id = document.id(),
			templates = replacements.len(),
			markers,
			"processed document"
		);
		reinsert_sections(&mut sections, &replacements, MATH_MARKER);

		Ok(match self.mode {
			RenderMode::Sections => format_document_with(&sections, document.title(), &self.blocklist),
			RenderMode::Legacy => sections.into_iter().map(|section| section.text).collect(),
		})
	}
}

/// [`Pipeline::process`] with the default allowlist and blocklist.
pub fn process_document(renderer: &dyn Renderer, document: &WikiDocument) -> WikiMathResult<String> {
	Pipeline::new(renderer).process(document)
}
