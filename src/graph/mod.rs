//! Relationship graph logic: direct-edge admission and bounded BFS traversal.
//!
//! Both engines read edges through the relationship store and hold no state of
//! their own.

mod consistency;
mod traversal;

pub(crate) use consistency::check_direct_cycle_tx;
pub use consistency::{check_direct_cycle, has_direct_edge};
pub use traversal::traverse;
