//! Content parsing pipeline: pure functions from raw document text to
//! structured records. No I/O, no storage knowledge.

pub mod document;
pub mod headings;
pub mod links;
pub mod sanitize;
pub mod tags;

pub use document::{ParsedContent, parse_document};
pub use headings::{Heading, extract_headings, slugify};
pub use links::extract_links;
pub use sanitize::{normalize_typography, sanitize_for_search, strip_code_blocks};
pub use tags::{extract_tags, normalize_tag};
