//! URL handling module
//!
//! This module provides URL canonicalization, domain extraction, allowed-domain
//! matching and feed pagination helpers.

mod domain;
mod normalize;
mod pagination;

// Re-export main functions
pub use domain::{extract_domain, is_allowed_domain, matches_wildcard};
pub use normalize::canonicalize_url;
pub use pagination::{resolve_link, slug_from_url, synthesize_page_url, PAGE_PARAM};
