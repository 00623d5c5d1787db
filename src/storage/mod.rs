pub mod mock;
pub mod remote;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

pub use mock::MockClient;
pub use remote::RemoteClient;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, delete 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 远程操作错误
#[derive(Debug, Error)]
pub enum TransferError {
    /// 连接或认证失败
    #[error("connection failed: {0}")]
    Connect(String),

    /// 远程路径不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// 本地文件读取失败（上传时）
    #[error("local read failed for {path}: {source}")]
    Local {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 其他远程错误（权限、协议等）
    #[error("{0}")]
    Other(String),
}

impl TransferError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransferError::NotFound(_))
    }
}

/// 删除操作的结果：已删除，或远程本来就不存在
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    AlreadyAbsent,
}

impl DeleteOutcome {
    /// 把 NotFound 折叠成 `AlreadyAbsent`，其余错误原样返回
    pub fn tolerate(result: Result<(), TransferError>) -> Result<Self, TransferError> {
        match result {
            Ok(()) => Ok(DeleteOutcome::Removed),
            Err(e) if e.is_not_found() => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(e),
        }
    }
}

/// 远程传输会话
///
/// 会话持有一个可变的"当前目录"游标，所有相对路径都基于它解析。
/// 方法都要求 `&mut self`，同一时刻只能有一个操作在进行。
#[async_trait]
pub trait TransferClient: Send {
    /// 确保目录存在（逐级创建），并把当前目录切换到该目录
    async fn ensure_dir(&mut self, path: &str) -> Result<(), TransferError>;

    /// 上传本地文件到当前目录下的 `remote_name`，已存在则覆盖
    async fn upload_file(&mut self, local_path: &Path, remote_name: &str)
        -> Result<(), TransferError>;

    /// 把远程文件整个读到内存
    async fn download_to_memory(&mut self, remote_path: &str) -> Result<Vec<u8>, TransferError>;

    /// 删除文件
    async fn remove_file(&mut self, remote_path: &str) -> Result<(), TransferError>;

    /// 删除（空）目录
    async fn remove_dir(&mut self, remote_path: &str) -> Result<(), TransferError>;

    /// 当前目录回到上一级
    async fn change_to_parent(&mut self) -> Result<(), TransferError>;

    /// 清空同步根目录下的所有内容
    async fn wipe_root(&mut self) -> Result<(), TransferError>;

    /// 关闭会话
    async fn close(&mut self) -> Result<(), TransferError>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 拆分路径为（父目录段, 文件名）
pub fn split_parent(path: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let name = parts.pop().unwrap_or("");
    (parts, name)
}
