//! Compiled pattern cache: UA regex and CIDR compilation, membership tests.

pub mod cidr;
pub mod pattern_cache;

pub use cidr::{AddressFamily, ParsedCidrRange};
pub use pattern_cache::PatternCache;
