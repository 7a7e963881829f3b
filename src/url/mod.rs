//! URL handling module for Site-Audit
//!
//! This module provides input URL validation, normalization for cache-key
//! derivation, host extraction and wildcard host matching.

mod domain;
mod matcher;
mod normalize;

pub use domain::{bare_domain, extract_domain};
pub use matcher::{host_matches, host_matches_any};
pub use normalize::{normalize_url, validate_url};
