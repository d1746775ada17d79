// src/cli/colors.rs
use std::env;

/// 终端颜色支持
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorSupport {
    Enabled,
    Disabled,
}

impl ColorSupport {
    pub fn detect() -> Self {
        Self::from_env(
            env::var("NO_COLOR").ok().as_deref(),
            env::var("FORCE_COLOR").ok().as_deref(),
            env::var("TERM").ok().as_deref(),
        )
    }

    /// 优先级：NO_COLOR > FORCE_COLOR > TERM=dumb
    pub fn from_env(no_color: Option<&str>, force: Option<&str>, term: Option<&str>) -> Self {
        if no_color.is_some() {
            return Self::Disabled;
        }
        if let Some(f) = force {
            return if f == "0" { Self::Disabled } else { Self::Enabled };
        }
        if term == Some("dumb") {
            return Self::Disabled;
        }
        Self::Enabled
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

pub mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_precedence() {
        assert_eq!(ColorSupport::from_env(Some(""), Some("1"), None), ColorSupport::Disabled);
        assert_eq!(ColorSupport::from_env(None, Some("0"), None), ColorSupport::Disabled);
        assert_eq!(ColorSupport::from_env(None, Some("1"), Some("dumb")), ColorSupport::Enabled);
        assert_eq!(ColorSupport::from_env(None, None, Some("dumb")), ColorSupport::Disabled);
        assert_eq!(ColorSupport::from_env(None, None, Some("xterm")), ColorSupport::Enabled);
    }
}
