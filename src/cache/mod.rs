//! Query-result caching.

pub mod query;

#[cfg(test)]
mod tests;

pub use query::{CachedQuery, QueryCache};
