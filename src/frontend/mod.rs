// src/frontend/mod.rs
pub mod ast;
pub mod ddl;
pub mod native;
pub mod span;
pub mod util;
