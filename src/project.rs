// src/project.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::emit::PlaceholderPolicy;
use crate::backend::templates::DEFAULT_INCLUDES;
use crate::middle::tables::{BlobSize, CustomType, TypeMap};

pub const CONFIG_FILE: &str = "Generator.toml";
pub const ENV_SQL_DIR: &str = "MOBILITYDB_SQL_DIR";
pub const ENV_SRC_DIR: &str = "MOBILITYDB_SRC_DIR";

#[derive(Debug, Default, Deserialize)]
struct GeneratorToml {
    #[serde(default)]
    generator: GeneratorTable,
    #[serde(default)]
    paths: PathsTable,
    #[serde(default)]
    emit: EmitTable,
    #[serde(default)]
    types: TypesTable,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratorTable {
    #[serde(default)]
    struct_name: Option<String>,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    placeholder: Option<PlaceholderPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct PathsTable {
    #[serde(default)]
    sql_dir: Option<PathBuf>,
    #[serde(default)]
    src_dir: Option<PathBuf>,
    #[serde(default)]
    project_root: Option<PathBuf>,
    #[serde(default)]
    header_dest: Option<PathBuf>,
    #[serde(default)]
    source_dest: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct EmitTable {
    #[serde(default)]
    includes: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct TypesTable {
    // [types.custom] tnpoint = { c_type = "Temporal *", size = "varlena" }
    #[serde(default)]
    custom: std::collections::BTreeMap<String, CustomTypeEntry>,
    // [types.scalar] numeric = "double"
    #[serde(default)]
    scalar: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CustomTypeEntry {
    c_type: String,
    #[serde(default)]
    size: Option<String>,
}

/// 一次运行的全部配置
#[derive(Debug, Clone)]
pub struct Project {
    /// 配置所在目录；相对路径都基于它
    pub root: PathBuf,
    pub struct_name: String,
    /// 输出文件名（不含扩展名）
    pub module: String,
    pub placeholder: PlaceholderPolicy,
    pub sql_dir: Option<PathBuf>,
    pub src_dir: Option<PathBuf>,
    /// 目标工程根；为空时不做拷贝
    pub project_root: Option<PathBuf>,
    pub header_dest: PathBuf,
    pub source_dest: PathBuf,
    pub includes: Vec<String>,
    pub types: TypeMap,
}

impl Default for Project {
    fn default() -> Self {
        Project {
            root: PathBuf::from("."),
            struct_name: "TemporaryStruct".into(),
            module: "generated_functions".into(),
            placeholder: PlaceholderPolicy::Warn,
            sql_dir: None,
            src_dir: None,
            project_root: None,
            header_dest: PathBuf::from("src/include/gen"),
            source_dest: PathBuf::from("src/gen"),
            includes: DEFAULT_INCLUDES.iter().map(|s| s.to_string()).collect(),
            types: TypeMap::default(),
        }
    }
}

impl Project {
    /// SQL 声明文件的实际路径
    pub fn sql_path(&self, p: &Path) -> PathBuf {
        join_root(self.sql_dir.as_deref(), p)
    }

    /// C 源文件的实际路径
    pub fn src_path(&self, p: &Path) -> PathBuf {
        join_root(self.src_dir.as_deref(), p)
    }

    pub fn header_name(&self) -> String {
        format!("{}.hpp", self.module)
    }

    pub fn source_name(&self) -> String {
        format!("{}.cpp", self.module)
    }
}

fn join_root(root: Option<&Path>, p: &Path) -> PathBuf {
    match root {
        Some(r) if p.is_relative() => r.join(p),
        _ => p.to_path_buf(),
    }
}

/// 从当前工作目录加载 Generator.toml（可选）
pub fn load_from_cwd() -> Result<(Project, Vec<String>)> {
    let root = std::env::current_dir().context("current_dir() failed")?;
    load(&root.join(CONFIG_FILE))
}

/// 读取指定配置文件；不存在时全部取默认。
/// 返回的第二项是加载过程中的警告（TOML 解析失败等）。
pub fn load(path: &Path) -> Result<(Project, Vec<String>)> {
    let env = |k: &str| std::env::var_os(k).map(PathBuf::from);
    load_with_env(path, env(ENV_SQL_DIR), env(ENV_SRC_DIR))
}

pub fn load_with_env(
    path: &Path,
    env_sql: Option<PathBuf>,
    env_src: Option<PathBuf>,
) -> Result<(Project, Vec<String>)> {
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut warnings = Vec::new();

    let cfg = match fs::read_to_string(path) {
        Ok(s) => match toml::from_str::<GeneratorToml>(&s) {
            Ok(cfg) => cfg,
            Err(e) => {
                warnings.push(format!("parse `{}` as TOML failed: {e}", path.display()));
                GeneratorToml::default()
            }
        },
        // 没有配置文件；完全默认
        Err(_) => GeneratorToml::default(),
    };

    let mut p = Project { root: root.clone(), ..Project::default() };
    let rel = |x: PathBuf| if x.is_relative() { root.join(x) } else { x };

    if let Some(s) = cfg.generator.struct_name.filter(|s| !s.trim().is_empty()) {
        p.struct_name = sanitize_ident(&s);
    }
    if let Some(m) = cfg.generator.module.filter(|s| !s.trim().is_empty()) {
        p.module = sanitize_ident(&m);
    }
    if let Some(ph) = cfg.generator.placeholder {
        p.placeholder = ph;
    }

    p.sql_dir = env_sql.or(cfg.paths.sql_dir.map(rel));
    p.src_dir = env_src.or(cfg.paths.src_dir.map(rel));
    p.project_root = cfg.paths.project_root.map(rel);
    if let Some(h) = cfg.paths.header_dest {
        p.header_dest = h;
    }
    if let Some(s) = cfg.paths.source_dest {
        p.source_dest = s;
    }
    if let Some(inc) = cfg.emit.includes {
        p.includes = inc;
    }

    for (name, entry) in cfg.types.custom {
        let size = match entry.size.as_deref() {
            None => BlobSize::Varlena,
            Some(s) => match BlobSize::parse(s) {
                Some(b) => b,
                None => {
                    warnings.push(format!("[types.custom] {name}: unknown size `{s}`, using varlena"));
                    BlobSize::Varlena
                }
            },
        };
        p.types.add_custom(&name, CustomType { c_type: entry.c_type, size });
    }
    for (sql, host) in cfg.types.scalar {
        p.types.add_scalar(&sql, &host);
    }

    Ok((p, warnings))
}

/// 仅保留字母数字与下划线；首字符不是字母/下划线则前置 'G'
pub fn sanitize_ident(s: &str) -> String {
    let s = s.trim();
    let mut out = String::with_capacity(s.len() + 1);
    if !s.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        out.push('G');
    }
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (p, w) = load_with_env(&dir.path().join(CONFIG_FILE), None, None).unwrap();
        assert!(w.is_empty());
        assert_eq!(p.struct_name, "TemporaryStruct");
        assert_eq!(p.module, "generated_functions");
        assert_eq!(p.header_dest, PathBuf::from("src/include/gen"));
        assert_eq!(p.placeholder, PlaceholderPolicy::Warn);
    }

    #[test]
    fn reads_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
[generator]
struct_name = "TboxFunctions"
module = "tbox_functions"
placeholder = "deny"

[paths]
sql_dir = "mobilitydb/sql"
project_root = "/abs/mobilityduck"

[emit]
includes = ["meos_wrapper_simple.hpp"]

[types.custom]
tnpoint = { c_type = "Temporal *", size = "varlena" }
stbox2 = { c_type = "STBox *", size = "fixed:STBox" }

[types.scalar]
numeric = "double"
"#,
        )
        .unwrap();
        let (p, w) = load_with_env(&path, None, Some(PathBuf::from("/env/src"))).unwrap();
        assert!(w.is_empty());
        assert_eq!(p.struct_name, "TboxFunctions");
        assert_eq!(p.header_name(), "tbox_functions.hpp");
        assert_eq!(p.placeholder, PlaceholderPolicy::Deny);
        assert_eq!(p.sql_dir, Some(dir.path().join("mobilitydb/sql")));
        assert_eq!(p.src_dir, Some(PathBuf::from("/env/src")));
        assert_eq!(p.project_root, Some(PathBuf::from("/abs/mobilityduck")));
        assert_eq!(p.includes, vec!["meos_wrapper_simple.hpp".to_string()]);
        assert!(p.types.is_custom("tnpoint"));
        assert_eq!(p.types.custom("stbox2").map(|c| c.size.clone()), Some(BlobSize::Fixed("STBox".into())));
        assert_eq!(p.types.executor_type("numeric"), Some("double"));
        assert_eq!(p.sql_path(Path::new("tbox.sql")), dir.path().join("mobilitydb/sql/tbox.sql"));
        assert_eq!(p.src_path(Path::new("/x/tbox.c")), PathBuf::from("/x/tbox.c"));
    }

    #[test]
    fn malformed_file_warns_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[generator\nstruct_name = ").unwrap();
        let (p, w) = load_with_env(&path, None, None).unwrap();
        assert_eq!(w.len(), 1);
        assert_eq!(p.struct_name, "TemporaryStruct");
    }

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(sanitize_ident("tbox-functions"), "tbox_functions");
        assert_eq!(sanitize_ident("1gen"), "G1gen");
    }
}
