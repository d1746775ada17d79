// src/backend/mod.rs
pub mod emit;
pub mod mangle;
pub mod templates;
