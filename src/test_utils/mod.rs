/// In-process fake backend implementing the driver contract
pub mod memory;
/// Helper utilities for testing and development
pub mod test_helpers;

pub use memory::{MemoryConnection, MemoryDriver};
pub use test_helpers::*;
