pub mod allocator;
pub mod tree;

pub use allocator::BlockAllocator;
pub use tree::BlockForest;
