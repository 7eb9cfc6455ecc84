//! URL handling module for Newt
//!
//! This module provides URL canonicalization, domain extraction and blocked-domain
//! matching.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_domain, same_host};
pub use matcher::{is_blocked_domain, matches_wildcard};
pub use normalize::{canonicalize_parsed, canonicalize_url, path_extension};
