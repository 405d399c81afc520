use std::time::Duration;

use ureq::Agent;
use ureq::AgentBuilder;
use wikimath_core::RenderRequest;
use wikimath_core::RenderResponse;
use wikimath_core::Renderer;
use wikimath_core::WikiMathError;
use wikimath_core::WikiMathResult;

/// Posts documents to a running wikitext renderer service.
pub struct HttpRenderer {
	agent: Agent,
	url: String,
}

impl HttpRenderer {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
		Self {
			agent: AgentBuilder::new().timeout(timeout).build(),
			url: url.into(),
		}
	}

	pub fn url(&self) -> &str {
		&self.url
	}
}

impl Renderer for HttpRenderer {
	fn render(&self, request: &RenderRequest<'_>) -> WikiMathResult<RenderResponse> {
		let response = self
			.agent
			.post(&self.url)
			.send_json(request)
			.map_err(|e| WikiMathError::Renderer(e.to_string()))?;

		response
			.into_json::<RenderResponse>()
			.map_err(|e| WikiMathError::MalformedResponse(e.to_string()))
	}
}
