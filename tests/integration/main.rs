//! Integration tests for the doctree document store

mod sled_store;
mod support;
mod tree_index;
mod versioning;
