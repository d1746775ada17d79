// src/pipeline.rs
//! 编排：读文件 -> 两种方言解析 -> 匹配消歧 -> 逐单元发射 -> 内存汇总 -> 写出并放置

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::emit::{EmitConfig, EmittedUnit, Emitter, Skip};
use crate::backend::templates;
use crate::cli::OutputFormatter;
use crate::diag::{DiagSink, SourceMap};
use crate::frontend::ast::{DdlUnit, NativeImplementation};
use crate::frontend::ddl::parse_ddl;
use crate::frontend::native::parse_native;
use crate::middle::matcher::{match_and_disambiguate, MatchResult};
use crate::middle::tables::{CategoryTable, TypeMap};
use crate::project::Project;

/// 汇总后的两份生成文件
#[derive(Debug, Clone)]
pub struct Generated {
    pub header: String,
    pub source: String,
    pub units: Vec<EmittedUnit>,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub emitted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub placeholders: usize,
    /// 写出的文件（输出目录 + 目标工程中的拷贝）
    pub written: Vec<PathBuf>,
}

pub struct Pipeline<'a> {
    project: &'a Project,
    out: &'a OutputFormatter,
    categories: CategoryTable,
    pub diags: DiagSink,
    pub sm: SourceMap,
}

impl<'a> Pipeline<'a> {
    pub fn new(project: &'a Project, out: &'a OutputFormatter) -> Self {
        Self {
            project,
            out,
            categories: CategoryTable::default(),
            diags: DiagSink::new(),
            sm: SourceMap::new(),
        }
    }

    /// 读不到的文件记一条警告，按空结果继续
    fn read(&mut self, path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(s) => Some(s),
            Err(e) => {
                let shown = path.display().to_string();
                self.out.warning(&format!("warning: cannot read `{shown}`: {e}"));
                self.diags.warn("W0001", &shown, None, format!("cannot read file: {e}"));
                None
            }
        }
    }

    pub fn load_declarations(&mut self, files: &[PathBuf]) -> Result<DdlUnit> {
        let mut all = DdlUnit::default();
        for f in files {
            let path = self.project.sql_path(f);
            let Some(src) = self.read(&path) else { continue };
            let shown = path.display().to_string();
            let fid = self.sm.add_file(shown.clone(), src);
            let text = self.sm.source(fid).unwrap_or_default();
            let unit = parse_ddl(text, fid, &self.categories)
                .with_context(|| format!("parse `{shown}` failed"))?;
            self.out.parsed(&path, unit.decls.len(), "functions");

            all.decls.extend(unit.decls);
            all.marks.extend(unit.marks);
            all.casts.extend(unit.casts);
            all.types.extend(unit.types);
            all.operators.extend(unit.operators);
        }
        Ok(all)
    }

    pub fn load_natives(&mut self, files: &[PathBuf]) -> Result<Vec<NativeImplementation>> {
        let mut all = Vec::new();
        for f in files {
            let path = self.project.src_path(f);
            let Some(src) = self.read(&path) else { continue };
            let shown = path.display().to_string();
            let fid = self.sm.add_file(shown.clone(), src);
            let text = self.sm.source(fid).unwrap_or_default();
            let unit = parse_native(text, fid).with_context(|| format!("parse `{shown}` failed"))?;
            self.out.parsed(&path, unit.functions.len(), "functions");

            for sym in &unit.dropped {
                self.diags.note("N0001", &shown, None, format!("`{sym}` is exported but has no body"));
            }
            all.extend(unit.functions);
        }
        Ok(all)
    }

    fn file_name(&self, file: crate::frontend::span::FileId) -> String {
        self.sm.name(file).unwrap_or("<unknown>").to_string()
    }

    fn match_units<'d>(
        &mut self,
        ddl: &'d DdlUnit,
        natives: &'d [NativeImplementation],
    ) -> Result<MatchResult<'d>> {
        let matched = match match_and_disambiguate(&ddl.decls, natives) {
            Ok(m) => m,
            Err(e) => {
                self.diags.error(e.code(), "<match>", None, e.to_string());
                return Err(e).context("disambiguation failed");
            }
        };
        for d in &matched.unmatched {
            let file = self.file_name(d.span.file);
            self.diags.note("N0002", &file, Some(d.span), format!("no native implementation for `{}`", d.symbol));
        }
        Ok(matched)
    }

    /// 匹配 + 发射 + 汇总；不写文件
    pub fn generate(&mut self, ddl: &DdlUnit, natives: &[NativeImplementation]) -> Result<Generated> {
        let matched = self.match_units(ddl, natives)?;

        let mut types: TypeMap = self.project.types.clone();
        types.declare_types(&ddl.types);
        let config = EmitConfig {
            struct_name: self.project.struct_name.clone(),
            placeholder: self.project.placeholder,
        };
        let emitter = Emitter::new(&types, &self.categories, &config);

        let mut units = Vec::new();
        let mut skipped = 0;
        let mut failed = 0;

        // 声明出现顺序
        for m in &matched.units {
            for key in &m.keys {
                if let Some(reason) = emitter.skip_reason(m.decl, key) {
                    skipped += 1;
                    self.out.unit_skip(key, &skip_text(&reason));
                    continue;
                }
                match emitter.emit(m.decl, m.native, key) {
                    Ok(Some(u)) => {
                        self.out.unit_ok(&u.function, m.native.shape.label());
                        if u.placeholder {
                            let file = self.file_name(m.native.span.file);
                            self.diags.warn(
                                "W0104",
                                &file,
                                Some(m.native.span),
                                format!("`{}` needs manual completion: unrecognized body shape", m.native.symbol),
                            );
                        }
                        units.push(u);
                    }
                    Ok(None) => skipped += 1,
                    Err(e) => {
                        failed += 1;
                        self.out.unit_failed(key, &e.to_string());
                        let file = self.file_name(m.decl.span.file);
                        self.diags.error(e.code(), &file, Some(m.decl.span), e.to_string());
                    }
                }
            }
        }

        let decls: Vec<String> = units.iter().map(|u| u.declaration.clone()).collect();
        let bodies: Vec<String> = units.iter().map(|u| u.source.clone()).collect();
        Ok(Generated {
            header: templates::header_file(&self.project.struct_name, &decls),
            source: templates::source_file(&self.project.includes, &self.project.module, &bodies),
            units,
            skipped,
            failed,
        })
    }

    /// 写到输出目录，再拷贝到目标工程的生成目录
    pub fn write(&self, generated: &Generated, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let header_name = self.project.header_name();
        let source_name = self.project.source_name();

        fs::create_dir_all(output_dir)
            .with_context(|| format!("create_dir_all({}) failed", output_dir.display()))?;
        let header = output_dir.join(&header_name);
        let source = output_dir.join(&source_name);
        write_file(&header, &generated.header)?;
        write_file(&source, &generated.source)?;
        let mut written = vec![header.clone(), source.clone()];

        if let Some(root) = &self.project.project_root {
            let h_dir = root.join(&self.project.header_dest);
            let s_dir = root.join(&self.project.source_dest);
            for (from, dir, name) in [(&header, h_dir, &header_name), (&source, s_dir, &source_name)] {
                fs::create_dir_all(&dir).with_context(|| format!("create_dir_all({}) failed", dir.display()))?;
                let to = dir.join(name);
                fs::copy(from, &to)
                    .with_context(|| format!("copy {} -> {} failed", from.display(), to.display()))?;
                written.push(to);
            }
        }
        Ok(written)
    }

    /// 一次完整运行
    pub fn run(
        &mut self,
        sql_files: &[PathBuf],
        c_files: &[PathBuf],
        output_dir: &Path,
        dry_run: bool,
    ) -> Result<RunSummary> {
        let ddl = self.load_declarations(sql_files)?;
        let natives = self.load_natives(c_files)?;

        if dry_run {
            let matched = self.match_units(&ddl, &natives)?;
            for line in dry_run_lines(&matched) {
                println!("{line}");
            }
            return Ok(RunSummary::default());
        }

        let generated = self.generate(&ddl, &natives)?;
        let written = self.write(&generated, output_dir)?;
        Ok(RunSummary {
            emitted: generated.units.len(),
            skipped: generated.skipped,
            failed: generated.failed,
            placeholders: generated.units.iter().filter(|u| u.placeholder).count(),
            written,
        })
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("write {} failed", path.display()))
}

fn skip_text(s: &Skip) -> String {
    match s {
        Skip::Category(c) => format!("category `{c}`"),
        Skip::WireFunction => "binary send/recv".to_string(),
        Skip::CastOnly => "cast only".to_string(),
    }
}

/// `--dry-run`：每条匹配到的声明一行
pub fn dry_run_lines(m: &MatchResult) -> Vec<String> {
    let mut v = Vec::with_capacity(m.units.len() + m.unmatched.len());
    for u in &m.units {
        let op = u
            .decl
            .operator_symbol
            .as_deref()
            .map(|s| format!(" op `{s}`"))
            .unwrap_or_default();
        let keys: Vec<&str> = u.keys.iter().map(String::as_str).collect();
        v.push(format!(
            "{}  [{}]{}  shape={}  keys={}",
            u.decl,
            u.decl.category,
            op,
            u.native.shape.label(),
            keys.join(",")
        ));
    }
    for d in &m.unmatched {
        v.push(format!("{d}  [{}]  (no native implementation)", d.category));
    }
    v
}
