//! Boundary to the page-level B-tree engine.

pub mod btree;
