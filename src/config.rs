//! 运行配置模块

use crate::error::{Result, SyncError};
use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认状态文件名
pub const DEFAULT_STATE_NAME: &str = ".syncdeploy-state.json";

/// 远程协议类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ftp,
    WebDav,
    S3,
    Fs,
}

/// 远程存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub protocol: Protocol,
    /// FTP: host:port；WebDAV: URL；S3: 自定义 endpoint；Fs: 目标目录
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// 远程同步根目录
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    crate::storage::OP_TIMEOUT_SECS
}

impl RemoteConfig {
    fn require<'a>(&self, field: &'a Option<String>, name: &str) -> Result<&'a str> {
        field
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SyncError::Config(format!("{:?} server requires {}", self.protocol, name)))
    }

    pub fn endpoint(&self) -> Result<&str> {
        self.require(&self.endpoint, "endpoint")
    }

    pub fn username(&self) -> Result<&str> {
        self.require(&self.username, "username")
    }

    pub fn password(&self) -> Result<&str> {
        self.require(&self.password, "password")
    }

    pub fn bucket(&self) -> Result<&str> {
        self.require(&self.bucket, "bucket")
    }

    pub fn region(&self) -> Result<&str> {
        self.require(&self.region, "region")
    }

    /// 检查协议所需字段
    pub fn validate(&self) -> Result<()> {
        match self.protocol {
            Protocol::Ftp | Protocol::WebDav => {
                self.endpoint()?;
                self.username()?;
                self.password()?;
            }
            Protocol::S3 => {
                self.bucket()?;
                self.region()?;
                self.username()?;
                self.password()?;
            }
            Protocol::Fs => {
                self.endpoint()?;
            }
        }
        Ok(())
    }
}

/// 一次同步运行的完整配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub server: RemoteConfig,
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
    #[serde(default = "default_state_name")]
    pub state_name: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    /// 先清空远程目录再完整上传
    #[serde(default)]
    pub dangerous_clean_slate: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default = "default_max_concurrent_hashes")]
    pub max_concurrent_hashes: usize,
}

fn default_local_dir() -> PathBuf {
    PathBuf::from("./")
}

fn default_state_name() -> String {
    DEFAULT_STATE_NAME.to_string()
}

pub fn default_exclude() -> Vec<String> {
    vec![
        "**/.git*".to_string(),
        "**/.git*/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}

fn default_max_concurrent_hashes() -> usize {
    8
}

impl RunConfig {
    /// 从 JSON 配置文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| SyncError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;

        if self.state_name.is_empty() || self.state_name.contains('/') || self.state_name.contains('\\') {
            return Err(SyncError::Config(format!(
                "stateName must be a plain file name, got {:?}",
                self.state_name
            )));
        }

        if !self.local_dir.is_dir() {
            return Err(SyncError::Config(format!(
                "localDir {} is not a directory",
                self.local_dir.display()
            )));
        }

        if self.max_concurrent_hashes == 0 {
            return Err(SyncError::Config("maxConcurrentHashes must be at least 1".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config: RunConfig = serde_json::from_str(
            r#"{"server": {"protocol": "ftp", "endpoint": "ftp.example.com:21", "username": "u", "password": "p"}}"#,
        )
        .unwrap();

        assert_eq!(config.state_name, DEFAULT_STATE_NAME);
        assert_eq!(config.exclude, default_exclude());
        assert!(config.include.is_empty());
        assert!(!config.dry_run);
        assert!(!config.dangerous_clean_slate);
        assert_eq!(config.log_level, LogLevel::Standard);
        assert_eq!(config.max_concurrent_hashes, 8);
        assert_eq!(config.server.timeout_secs, 60);
        assert!(config.server.validate().is_ok());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config: RemoteConfig =
            serde_json::from_str(r#"{"protocol": "webdav", "endpoint": "https://dav.example.com"}"#)
                .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn test_state_name_with_slash_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config: RunConfig = serde_json::from_str(
            r#"{"server": {"protocol": "fs", "endpoint": "/tmp/out"}}"#,
        )
        .unwrap();
        config.local_dir = dir.path().to_path_buf();
        assert!(config.validate().is_ok());

        config.state_name = "nested/state.json".to_string();
        assert!(config.validate().is_err());
    }
}
