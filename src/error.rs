//! 错误类型

use crate::storage::TransferError;
use std::fmt;
use thiserror::Error;

/// 同步阶段（用于错误上下文和日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Bootstrap,
    ClearKindChanges,
    CreateFolders,
    UploadFiles,
    ReplaceFiles,
    DeleteFiles,
    DeleteFolders,
    WriteState,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Bootstrap => write!(f, "bootstrap"),
            Phase::ClearKindChanges => write!(f, "clear_kind_changes"),
            Phase::CreateFolders => write!(f, "create_folders"),
            Phase::UploadFiles => write!(f, "upload_files"),
            Phase::ReplaceFiles => write!(f, "replace_files"),
            Phase::DeleteFiles => write!(f, "delete_files"),
            Phase::DeleteFolders => write!(f, "delete_folders"),
            Phase::WriteState => write!(f, "write_state"),
        }
    }
}

/// 同步运行中的错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 本地文件无法读取（计算 hash 时）
    #[error("hash failed for {path}: {source}")]
    Hash {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 遍历本地目录失败
    #[error("inventory failed at {path}: {message}")]
    Inventory { path: String, message: String },

    /// 状态文件无法解析
    #[error("state document decode failed: {0}")]
    StateDecode(String),

    /// 状态文件无法序列化
    #[error("state document encode failed: {0}")]
    StateEncode(String),

    /// 连接远程存储失败
    #[error("connect failed: {0}")]
    Connect(String),

    /// 远程操作失败
    #[error("{phase} failed for {path}: {source}")]
    Transfer {
        phase: Phase,
        path: String,
        #[source]
        source: TransferError,
    },

    /// 写入本地状态文件失败
    #[error("writing local state document {path} failed: {source}")]
    LocalState {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 配置无效
    #[error("invalid config: {0}")]
    Config(String),
}

impl SyncError {
    pub(crate) fn transfer(phase: Phase, path: &str, source: TransferError) -> Self {
        SyncError::Transfer {
            phase,
            path: path.to_string(),
            source,
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
