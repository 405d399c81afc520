use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum WikiMathError {
	#[error(transparent)]
	#[diagnostic(code(wikimath::io_error))]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	#[diagnostic(code(wikimath::json))]
	Json(#[from] serde_json::Error),

	#[error("extracted {templates} template(s) but the text holds {markers} marker(s)")]
	#[diagnostic(
		code(wikimath::marker_count_mismatch),
		help("the renderer or an earlier stage duplicated or removed a marker")
	)]
	MarkerCountMismatch { markers: usize, templates: usize },

	#[error("input text already contains the marker `{marker}`")]
	#[diagnostic(
		code(wikimath::marker_in_input),
		help("markers must never occur in ordinary input, skip this document")
	)]
	MarkerInInput { marker: String },

	#[error("renderer request failed: {0}")]
	#[diagnostic(
		code(wikimath::renderer),
		help("check that the wikitext renderer is running and reachable")
	)]
	Renderer(String),

	#[error("renderer returned a malformed response: {0}")]
	#[diagnostic(
		code(wikimath::malformed_response),
		help("expected `{{\"document\": [...]}}` or `{{\"text\": \"...\"}}`")
	)]
	MalformedResponse(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(wikimath::config_parse),
		help("check that wikimath.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("invalid pattern `{pattern}`: {reason}")]
	#[diagnostic(code(wikimath::invalid_pattern))]
	InvalidPattern { pattern: String, reason: String },
}

pub type WikiMathResult<T> = Result<T, WikiMathError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
