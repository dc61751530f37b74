// src/content/mod.rs

pub mod render;
pub mod tree;

pub use render::{DisplayFragment, render};
pub use tree::ContentTree;
