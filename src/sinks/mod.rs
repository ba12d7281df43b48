//! Illustrative sink collaborators (§1 out-of-scope, implemented here as a
//! minimal boundary consumer for tests and the demo binary).

pub mod memory;

pub use memory::CollectingSink;
