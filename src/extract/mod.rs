//! Document extraction for Reel-Harvest
//!
//! This module turns fetched HTML into data:
//! - `Document`: selector-queryable page with text/attribute accessors
//! - listing pages: total result count and linked title ids
//! - parental-guide pages: the certificate
//! - title pages: the full record
//! - output extensions that add or override record fields

mod document;
mod extension;
pub mod listing;
pub mod title;

pub use document::Document;
pub use extension::{ExtensionError, ExtensionResult, OutputExtension, SelectorExtension};
pub use listing::{item_title_ids, page_offsets, parse_total_count, total_result_count, PAGE_SIZE};
pub use title::{extract_certificate, extract_title_record};
