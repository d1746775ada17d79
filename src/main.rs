// src/main.rs
use anyhow::Result;
use clap::Parser;
use std::process;

use mdgen::cli::{CliArgs, OutputFormatter};
use mdgen::diag::{render_diagnostics_colored, Severity};
use mdgen::pipeline::Pipeline;
use mdgen::project::{self, sanitize_ident};

fn main() -> Result<()> {
    let args = CliArgs::parse();

    // 1) 配置：--config 优先，否则 ./Generator.toml（可选）
    let (mut proj, warnings) = match &args.config {
        Some(path) => project::load(path)?,
        None => project::load_from_cwd()?,
    };
    if let Some(s) = &args.struct_name {
        proj.struct_name = sanitize_ident(s);
    }
    if let Some(m) = &args.module {
        proj.module = sanitize_ident(m);
    }

    let out = OutputFormatter::new(args.quiet);
    for w in &warnings {
        out.warning(&format!("warning: {w}"));
    }

    // 2) 解析 -> 匹配 -> 发射 -> 写出
    let mut pipeline = Pipeline::new(&proj, &out);
    let result = pipeline.run(&args.sql_files, &args.c_files, &args.output_dir, args.dry_run);

    let color = out.colors().is_enabled();
    let diags = pipeline.diags.clone().into_vec();
    render_diagnostics_colored(&diags, &pipeline.sm, color);

    let summary = match result {
        Ok(s) => s,
        Err(e) => {
            out.error(&format!("error: {e:#}"));
            process::exit(1);
        }
    };
    if args.dry_run {
        return Ok(());
    }

    // 3) 汇总
    out.info(&format!(
        "{} emitted, {} skipped, {} failed, {} placeholder(s), {} warning(s)",
        summary.emitted,
        summary.skipped,
        summary.failed,
        summary.placeholders,
        pipeline.diags.count(Severity::Warning)
    ));
    let header = proj.header_name();
    let source = proj.source_name();
    out.success(summary.emitted, &args.output_dir.join(header), &args.output_dir.join(source));
    for p in summary.written.iter().skip(2) {
        out.info(&format!("placed {}", p.display()));
    }
    Ok(())
}
