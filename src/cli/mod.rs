// src/cli/mod.rs
// CLI 模块导出

pub mod colors;
pub mod output;
pub mod args;

pub use colors::ColorSupport;
pub use output::OutputFormatter;
pub use args::CliArgs;
