// src/lib.rs
pub mod backend;
pub mod cli;
pub mod diag;
pub mod error;
pub mod frontend;
pub mod middle;
pub mod pipeline;
pub mod project;
pub mod utils;
