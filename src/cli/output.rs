// src/cli/output.rs
use std::path::Path;
use crate::cli::colors::{ColorSupport, ansi};

/// 输出格式化器
pub struct OutputFormatter {
    color_support: ColorSupport,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(quiet: bool) -> Self {
        Self {
            color_support: ColorSupport::detect(),
            quiet,
        }
    }

    pub fn colors(&self) -> ColorSupport {
        self.color_support
    }

    fn paint(&self, color: &str, message: &str) -> String {
        if self.color_support.is_enabled() {
            format!("{color}{message}{}", ansi::RESET)
        } else {
            message.to_string()
        }
    }

    /// 单元生成成功
    pub fn unit_ok(&self, name: &str, detail: &str) {
        if self.quiet {
            return;
        }
        println!("{} {}  {}", self.paint(ansi::GREEN, "generated"), name, self.paint(ansi::DIM, detail));
    }

    /// 单元被跳过
    pub fn unit_skip(&self, name: &str, reason: &str) {
        if self.quiet {
            return;
        }
        println!("{} {}  ({})", self.paint(ansi::DIM, "skipped  "), name, reason);
    }

    /// 单元失败（quiet 下也输出）
    pub fn unit_failed(&self, name: &str, err: &str) {
        eprintln!("{} {}: {}", self.paint(ansi::RED, "failed   "), name, err);
    }

    /// 文件解析结果
    pub fn parsed(&self, path: &Path, count: usize, what: &str) {
        if self.quiet {
            return;
        }
        println!("  parsed {}: {} {}", path.display(), count, what);
    }

    /// 汇总
    pub fn success(&self, emitted: usize, header: &Path, source: &Path) {
        let msg = format!(
            "{} units  -> {}, {}",
            emitted,
            header.display(),
            source.display()
        );
        println!("{}", self.paint(&format!("{}{}", ansi::BOLD, ansi::GREEN), &msg));
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.paint(ansi::RED, message));
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{}", self.paint(ansi::YELLOW, message));
    }

    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        eprintln!("{}", self.paint(ansi::BLUE, message));
    }
}
