//! Memory Layer - In-Memory State Management
//!
//! 驻留模型与 clone prompt 的内存态管理，以及系统内存探测。
//! ModelResourceManager 与 ClonePromptCache 是仅有的两个
//! 内部持有共享可变状态的组件，访问各自内部串行化。

mod model_manager;
mod prompt_cache;
pub mod sysmem;

pub use model_manager::{ModelResourceManager, ResourceError, DEFAULT_HEADROOM};
pub use prompt_cache::{
    content_hash, CacheError, CacheStats, ClonePromptCache, PromptMetadata,
};
