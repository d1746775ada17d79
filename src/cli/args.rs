// src/cli/args.rs
// 命令行参数

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mdgen")]
#[command(about = "Generate DuckDB vectorized wrappers from MobilityDB SQL and fmgr C sources", long_about = None)]
pub struct CliArgs {
    /// 生成文件的输出目录
    #[arg(long, default_value = "generated")]
    pub output_dir: PathBuf,

    /// SQL 声明文件（相对路径基于 sql_dir）
    #[arg(long, num_args = 0..)]
    pub sql_files: Vec<PathBuf>,

    /// C 源文件（相对路径基于 src_dir）
    #[arg(long, num_args = 0..)]
    pub c_files: Vec<PathBuf>,

    /// 配置文件，默认 ./Generator.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 覆盖 [generator].struct_name
    #[arg(long)]
    pub struct_name: Option<String>,

    /// 覆盖 [generator].module
    #[arg(long)]
    pub module: Option<String>,

    /// 只输出汇总，不打印逐单元 trace
    #[arg(long)]
    pub quiet: bool,

    /// 只解析与匹配，不写文件
    #[arg(long)]
    pub dry_run: bool,
}
