//! Document tree: in-memory nodes and the id/path index over them.

pub mod index;
pub mod node;

pub use index::TreeIndex;
pub use node::DocumentNode;
