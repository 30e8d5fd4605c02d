//! Search retrieval: provider results formatted into prompt context, memoized per sub-question.

pub mod cache;
pub mod format;

pub use cache::{LruStore, SearchStore, get_or_fetch};
pub use format::unique_sources;
