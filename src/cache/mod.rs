pub mod disk;
pub mod memory;
pub mod tiered;
pub mod vector;

pub use disk::DiskTier;
pub use memory::LruTier;
pub use tiered::{CacheEntry, CacheHit, CacheStats, StorageTier, TieredContextCache};
pub use vector::ContextVector;
