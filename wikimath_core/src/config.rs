use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::WikiMathError;
use crate::WikiMathResult;
use crate::document::SKIP_SECTIONS;
use crate::document::SectionBlocklist;
use crate::markers::MATH_TEMPLATES;
use crate::markers::TemplateSet;

/// Default renderer endpoint.
pub const DEFAULT_RENDERER_URL: &str = "http://localhost:3000";

/// Default renderer timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = [
	"wikimath.toml",
	".wikimath.toml",
	".config/wikimath.toml",
];

/// Configuration loaded from a `wikimath.toml` file.
///
/// ```toml
/// [renderer]
/// url = "http://localhost:3000"
/// timeout_secs = 60
/// mode = "sections"
///
/// [extract]
/// templates = ["math", "radic"]
///
/// [sections]
/// skip = ["notes", "references"]
///
/// [input]
/// patterns = ["*.jsonl", "*.jsonl.gz"]
///
/// workers = 8
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WikiMathConfig {
	#[serde(default)]
	pub renderer: RendererConfig,
	#[serde(default)]
	pub extract: ExtractConfig,
	#[serde(default)]
	pub sections: SectionsConfig,
	#[serde(default)]
	pub input: InputConfig,
	/// Number of documents processed in parallel. Defaults to the number of
	/// available CPUs.
	#[serde(default)]
	pub workers: Option<usize>,
}

/// Which response shape the renderer produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
	/// `{"document": [{"title": ..., "text": ...}, ...]}`, assembled with the
	/// section blocklist.
	#[default]
	Sections,
	/// `{"text": ...}`, used as is.
	Legacy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
	#[serde(default = "default_renderer_url")]
	pub url: String,
	#[serde(default = "default_timeout_secs")]
	pub timeout_secs: u64,
	#[serde(default)]
	pub mode: RenderMode,
}

impl Default for RendererConfig {
	fn default() -> Self {
		Self {
			url: default_renderer_url(),
			timeout_secs: default_timeout_secs(),
			mode: RenderMode::default(),
		}
	}
}

fn default_renderer_url() -> String {
	DEFAULT_RENDERER_URL.to_string()
}

fn default_timeout_secs() -> u64 {
	DEFAULT_TIMEOUT_SECS
}

/// Template names that are pulled out before rendering. An absent list means
/// the built-in math allowlist.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractConfig {
	#[serde(default)]
	pub templates: Option<Vec<String>>,
}

impl ExtractConfig {
	pub fn template_set(&self) -> WikiMathResult<TemplateSet> {
		match &self.templates {
			Some(names) => TemplateSet::new(names),
			None => TemplateSet::new(MATH_TEMPLATES),
		}
	}
}

/// Section titles dropped while assembling documents. An absent list means
/// the built-in boilerplate blocklist.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionsConfig {
	#[serde(default)]
	pub skip: Option<Vec<String>>,
}

impl SectionsConfig {
	pub fn blocklist(&self) -> SectionBlocklist {
		match &self.skip {
			Some(titles) => SectionBlocklist::new(titles),
			None => SectionBlocklist::new(SKIP_SECTIONS),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
	/// Glob patterns, relative to the input directory, for shard files.
	#[serde(default = "default_input_patterns")]
	pub patterns: Vec<String>,
}

impl Default for InputConfig {
	fn default() -> Self {
		Self {
			patterns: default_input_patterns(),
		}
	}
}

fn default_input_patterns() -> Vec<String> {
	vec!["*.jsonl".to_string(), "*.jsonl.gz".to_string()]
}

impl WikiMathConfig {
	/// Resolve the first existing config file path under `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> WikiMathResult<Option<WikiMathConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		Self::load_from(&config_path).map(Some)
	}

	/// Load the config from an explicit file path.
	pub fn load_from(path: &Path) -> WikiMathResult<WikiMathConfig> {
		let content = std::fs::read_to_string(path)?;
		let config: WikiMathConfig =
			toml::from_str(&content).map_err(|e| WikiMathError::ConfigParse(e.to_string()))?;

		tracing::debug!(path = %path.display(), "loaded config");
		Ok(config)
	}
}
