//! Data models for CMR search results.
//!
//! - `Collection`, `Granule`: entries of the JSON search feed
//! - `Reference`: a hit of the XML reference search
//! - `Feed`: the response envelope both JSON searches share

pub mod collection;
pub mod feed;
pub mod granule;

pub use collection::Collection;
pub use feed::{Feed, Link, Reference};
pub use granule::Granule;
