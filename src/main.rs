//! # syncdeploy
//!
//! 把本地目录增量同步到 FTP / WebDAV / S3 / 本地目录。
//!
//! ```bash
//! syncdeploy --config deploy.json
//! syncdeploy --config deploy.json --dry-run
//! syncdeploy --config deploy.json --dangerous-clean-slate --log-level verbose
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use syncdeploy_lib::config::RunConfig;
use syncdeploy_lib::logging::{self, LogLevel};

/// 基于状态文件的增量同步工具
#[derive(Parser, Debug)]
#[command(name = "syncdeploy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON 配置文件
    #[arg(long, short)]
    config: PathBuf,

    /// 覆盖配置中的本地目录
    #[arg(long)]
    local_dir: Option<PathBuf>,

    /// 只计算差异，不修改远程
    #[arg(long)]
    dry_run: bool,

    /// 先清空远程目录再完整上传
    #[arg(long)]
    dangerous_clean_slate: bool,

    /// 覆盖配置中的日志级别
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// 额外写一份日志文件到该目录
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RunConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    if let Some(dir) = cli.local_dir {
        config.local_dir = dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    config.dry_run |= cli.dry_run;
    config.dangerous_clean_slate |= cli.dangerous_clean_slate;

    let _guard = logging::init(config.log_level, cli.log_dir.as_deref());

    let report = syncdeploy_lib::run_with_config(&config, None)
        .await
        .context("Sync failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
