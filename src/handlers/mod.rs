// src/handlers/mod.rs

pub mod auth;
pub mod content;
pub mod courses;
pub mod exam;
pub mod files;
