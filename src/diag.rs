// src/diag.rs
use std::fmt;

use ariadne::{sources, Color, Config, Label, Report, ReportKind};

pub use crate::frontend::span::{FileId, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub code: String,
    pub file_id: String,       // 用于显示的文件路径
    pub span: Option<Span>,
    pub message: String,
    pub severity: Severity,
}

#[derive(Default, Clone)]
pub struct DiagSink {
    buf: Vec<Diagnostic>,
}

impl DiagSink {
    #[inline]
    pub fn new() -> Self { Self { buf: Vec::new() } }

    fn push<S: Into<String>>(&mut self, severity: Severity, code: &str, file_id: &str, span: Option<Span>, msg: S) {
        self.buf.push(Diagnostic {
            code: code.to_string(),
            file_id: file_id.to_string(),
            span,
            message: msg.into(),
            severity,
        });
    }

    pub fn error<S: Into<String>>(&mut self, code: &str, file_id: &str, span: Option<Span>, msg: S) {
        self.push(Severity::Error, code, file_id, span, msg);
    }

    pub fn warn<S: Into<String>>(&mut self, code: &str, file_id: &str, span: Option<Span>, msg: S) {
        self.push(Severity::Warning, code, file_id, span, msg);
    }

    pub fn note<S: Into<String>>(&mut self, code: &str, file_id: &str, span: Option<Span>, msg: S) {
        self.push(Severity::Note, code, file_id, span, msg);
    }

    #[inline] pub fn is_empty(&self) -> bool { self.buf.is_empty() }
    #[inline] pub fn len(&self) -> usize { self.buf.len() }
    #[inline] pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> { self.buf.iter() }
    #[inline] pub fn into_vec(self) -> Vec<Diagnostic> { self.buf }

    pub fn count(&self, severity: Severity) -> usize {
        self.buf.iter().filter(|d| d.severity == severity).count()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        };
        if let Some(sp) = self.span {
            write!(
                f,
                "[{} {}] {} @{}..{}: {}",
                sev, self.code, self.file_id, sp.start, sp.end, self.message
            )
        } else {
            write!(f, "[{} {}] {}: {}", sev, self.code, self.file_id, self.message)
        }
    }
}

/* ================================
 * SourceMap：FileId -> (名字, 源码)
 * ================================ */

#[derive(Default, Clone)]
pub struct SourceMap {
    files: Vec<(String, String)>,
}

impl SourceMap {
    pub fn new() -> Self { Self::default() }

    pub fn add_file(&mut self, name: String, src: String) -> FileId {
        self.files.push((name, src));
        FileId(self.files.len() - 1)
    }

    pub fn name(&self, id: FileId) -> Option<&str> {
        self.files.get(id.0).map(|(n, _)| n.as_str())
    }

    pub fn source(&self, id: FileId) -> Option<&str> {
        self.files.get(id.0).map(|(_, s)| s.as_str())
    }
}

/// 带源码片段的诊断走 ariadne；其余按一行文本输出
pub fn render_diagnostics_colored(diags: &[Diagnostic], sm: &SourceMap, color: bool) {
    for d in diags {
        let located = d.span.and_then(|sp| Some((sp, sm.name(sp.file)?, sm.source(sp.file)?)));
        let Some((sp, name, src)) = located else {
            eprintln!("{d}");
            continue;
        };

        let (kind, label_color) = match d.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
            Severity::Note => (ReportKind::Advice, Color::Blue),
        };
        let name = name.to_string();
        let report = Report::build(kind, (name.clone(), sp.range()))
            .with_config(Config::default().with_color(color))
            .with_code(&d.code)
            .with_message(&d.message)
            .with_label(
                Label::new((name.clone(), sp.range()))
                    .with_message(&d.message)
                    .with_color(label_color),
            )
            .finish();
        let _ = report.eprint(sources(vec![(name, src.to_string())]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_counts_by_severity() {
        let mut d = DiagSink::new();
        d.warn("W0001", "a.sql", None, "missing");
        d.error("E0101", "a.sql", Some(Span::new(FileId(0), 1, 4)), "bad type");
        d.note("N0001", "a.c", None, "unused");
        assert_eq!(d.len(), 3);
        assert_eq!(d.count(Severity::Error), 1);
        assert_eq!(d.count(Severity::Warning), 1);
        let text: Vec<String> = d.iter().map(|x| x.to_string()).collect();
        assert_eq!(text[1], "[error E0101] a.sql @1..4: bad type");
    }

    #[test]
    fn source_map_lookup() {
        let mut sm = SourceMap::new();
        let a = sm.add_file("a.sql".into(), "x".into());
        let b = sm.add_file("b.c".into(), "y".into());
        assert_eq!(b, FileId(1));
        assert_eq!(sm.name(a), Some("a.sql"));
        assert_eq!(sm.source(b), Some("y"));
        assert_eq!(sm.name(FileId::DUMMY), None);
    }
}
