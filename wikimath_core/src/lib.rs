//! `wikimath_core` turns the math in MediaWiki wikitext into TeX while the
//! rest of the page goes through an external wikitext-to-text renderer.
//!
//! The renderer drops most templates, and math lives almost entirely in
//! templates. So before rendering, math templates are pulled out of the text
//! and replaced by sentinel markers; afterwards each template is converted to
//! TeX and spliced back in at its marker.
//!
//! ## Processing Pipeline
//!
//! ```text
//! wikitext
//!   → <math> tags become $...$ / $$...$$
//!   → indentation workaround for the renderer
//!   → allowlisted templates are replaced by markers
//!   → Renderer (sections of plain text)
//!   → each template is rewritten to TeX and reinserted at its marker
//!   → sections are assembled, boilerplate dropped
//! ```
//!
//! ## Modules
//!
//! - [`scope`]: Balanced-delimiter scanning, including the lenient brace scanner.
//! - [`rewrite`]: The generic span rewriter and the [`RuleSpec`] rule record.
//! - [`notation`]: The rule table and the ordered notation pipeline.
//! - [`markers`]: Template extraction and positional reinsertion.
//! - [`math_tags`]: `<math>` tag conversion.
//! - [`document`]: Section assembly and the boilerplate blocklist.
//! - [`indent`]: The `:`-indentation workaround.
//! - [`pipeline`]: The per-document pipeline and the [`Renderer`] trait.
//! - [`config`]: Configuration loading from `wikimath.toml`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wikimath_core::IdentityRenderer;
//! use wikimath_core::WikiDocument;
//! use wikimath_core::process_document;
//!
//! let renderer = IdentityRenderer::default();
//! let document = WikiDocument::new("Area is {{math|{{pi}} r<sup>2</sup>}}.");
//! let text = process_document(&renderer, &document).unwrap();
//! assert_eq!(text, r"Area is $\pi r^{2}$.");
//! ```

pub use config::*;
pub use document::*;
pub use error::*;
pub use indent::*;
pub use markers::*;
pub use math_tags::*;
pub use notation::fix_math;
pub use pipeline::*;
pub use rewrite::*;
pub use scope::*;

pub mod config;
pub mod document;
#[allow(unused_assignments)]
mod error;
pub mod indent;
pub mod markers;
pub mod math_tags;
pub mod notation;
pub mod pipeline;
pub mod rewrite;
pub mod scope;

#[cfg(test)]
mod __tests;
