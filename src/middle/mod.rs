// src/middle/mod.rs
pub mod matcher;
pub mod tables;
