//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UrlState`: lifecycle state of a frontier URL record (pending, processing, crawled)
//! - `DomainFetchState`: per-domain fetch history used for politeness

mod domain_state;
mod url_state;

pub use domain_state::DomainFetchState;
pub use url_state::UrlState;
