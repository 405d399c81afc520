use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

/// Boilerplate sections that never carry article prose.
pub const SKIP_SECTIONS: &[&str] = &[
	"notes",
	"bibliography",
	"sources",
	"citations",
	"references",
	"see also",
	"external links",
	"further reading",
	"tertiary sources",
	"secondary sources",
	"primary sources",
	"general and cited sources",
	"footnotes",
	"works cited",
];

/// One titled block of rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
	pub title: String,
	pub text: String,
}

impl Section {
	pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
		Self {
			title: title.into(),
			text: text.into(),
		}
	}
}

/// Lower-cased section titles to drop while assembling a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBlocklist {
	titles: BTreeSet<String>,
}

impl SectionBlocklist {
	pub fn new<S: AsRef<str>>(titles: &[S]) -> Self {
		Self {
			titles: titles
				.iter()
				.map(|title| title.as_ref().to_lowercase())
				.collect(),
		}
	}

	pub fn contains(&self, title: &str) -> bool {
		self.titles.contains(&title.to_lowercase())
	}
}

impl Default for SectionBlocklist {
	fn default() -> Self {
		Self::new(SKIP_SECTIONS)
	}
}

/// `title\ntext`, bare `text` for an untitled section, or nothing at all when
/// the section has no text.
pub fn format_section(section: &Section) -> String {
	if section.text.is_empty() {
		String::new()
	} else if section.title.is_empty() {
		section.text.clone()
	} else {
		format!("{}\n{}", section.title, section.text)
	}
}

/// Join the sections that survive `blocklist` into one text, led by the
/// document title and separated by blank lines.
pub fn format_document_with(sections: &[Section], title: &str, blocklist: &SectionBlocklist) -> String {
	let mut parts = vec![title.to_string()];
	parts.extend(
		sections
			.iter()
			.filter(|section| !blocklist.contains(&section.title))
			.map(format_section)
			.filter(|text| !text.is_empty()),
	);

	parts.join("\n\n").trim().to_string()
}

/// [`format_document_with`] using [`SKIP_SECTIONS`].
pub fn format_document(sections: &[Section], title: &str) -> String {
	format_document_with(sections, title, &SectionBlocklist::default())
}
