//! 日志模块 - 日志级别与 tracing 订阅器初始化

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 日志详细程度
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 只输出警告和错误
    Minimal,
    #[default]
    Standard,
    /// 输出每个文件的操作
    Verbose,
}

impl LogLevel {
    /// 将日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Minimal => tracing::Level::WARN,
            LogLevel::Standard => tracing::Level::INFO,
            LogLevel::Verbose => tracing::Level::DEBUG,
        }
    }
}

/// 初始化日志系统
///
/// 控制台始终输出；传入 `log_dir` 时另写一份到 `syncdeploy.log`。
/// 返回的 guard 必须在程序退出前一直持有，否则文件日志会丢失。
pub fn init(level: LogLevel, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(level.tracing_level().into())
        .add_directive("suppaftp=warn".parse().expect("static directive"))
        .add_directive("reqwest=warn".parse().expect("static directive"))
        .add_directive("hyper=warn".parse().expect("static directive"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("无法创建日志目录 {}: {}", dir.display(), e);
                (None, None)
            } else {
                let appender = tracing_appender::rolling::never(dir, "syncdeploy.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false);
                (Some(layer), Some(guard))
            }
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);

    guard
}
