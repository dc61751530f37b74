// src/models/mod.rs

pub mod attempt;
pub mod content;
pub mod course;
pub mod exam;
pub mod question;
pub mod topic;
pub mod user;
