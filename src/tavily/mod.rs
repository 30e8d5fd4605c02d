pub mod client;
pub mod types;

pub use client::{TavilyClient, WebSearch, WebSearchError};
pub use types::SearchHit;
