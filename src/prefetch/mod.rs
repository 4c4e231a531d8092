//! Calendar prefetch cache
//!
//! Hides calendar provider latency from the conversation. Preloads are:
//! - limited to `max_concurrent` fetches process-wide
//! - deduplicated to one in-flight fetch per session
//! - raced against a fixed timeout
//! - never allowed to replace cached data when they fail or time out

mod cache;

pub use cache::PrefetchCache;
