// src/grading/mod.rs

pub mod attempts;
pub mod evaluator;

pub use attempts::ExamEngine;
pub use evaluator::{Evaluation, evaluate};
