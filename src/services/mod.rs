// src/services/mod.rs

pub mod blob;
pub mod directory;
pub mod notify;
