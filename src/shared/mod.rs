pub mod cache;
pub mod global_context;

pub use cache::{CacheConfig, CacheEntry, CacheService, SharedCache};
pub use global_context::{GlobalConfig, GlobalContext, GlobalContextBuilder, ModelConfig};
