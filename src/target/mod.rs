mod adapter;
mod memory;

pub use adapter::{LockState, TargetAdapter, TargetError};
pub use memory::MemoryTarget;
