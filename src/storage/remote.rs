use super::{TransferClient, TransferError, IO_TIMEOUT_SECS};
use crate::config::{Protocol, RemoteConfig};
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Operator};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// 上传时每次读取的块大小
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// 基于 opendal 的远程存储会话
///
/// opendal 没有"当前目录"的概念，这里用 `cwd` 模拟 FTP 会话的游标。
pub struct RemoteClient {
    operator: Operator,
    cwd: Vec<String>,
    name: String,
}

fn remote_err(path: &str, e: opendal::Error) -> TransferError {
    match e.kind() {
        opendal::ErrorKind::NotFound => TransferError::NotFound(path.to_string()),
        _ => TransferError::Other(format!("{}: {}", path, e)),
    }
}

fn config_err(e: crate::error::SyncError) -> TransferError {
    TransferError::Connect(e.to_string())
}

fn build<A: opendal::raw::Access>(
    builder: opendal::Result<opendal::OperatorBuilder<A>>,
) -> Result<Operator, TransferError> {
    Ok(builder
        .map_err(|e| TransferError::Connect(e.to_string()))?
        .finish())
}

impl RemoteClient {
    /// 建立连接并检查远程根目录可访问
    pub async fn connect(config: &RemoteConfig) -> Result<Self, TransferError> {
        let root = config.root.clone().unwrap_or_else(|| "/".to_string());

        let (operator, name) = match config.protocol {
            #[cfg(feature = "ftp")]
            Protocol::Ftp => {
                use opendal::services::Ftp;

                let endpoint = config.endpoint().map_err(config_err)?;
                let builder = Ftp::default()
                    .endpoint(endpoint)
                    .user(config.username().map_err(config_err)?)
                    .password(config.password().map_err(config_err)?)
                    .root(&root);
                let name = format!("ftp://{}{}", endpoint, root);
                (build(Operator::new(builder))?, name)
            }
            #[cfg(not(feature = "ftp"))]
            Protocol::Ftp => {
                return Err(TransferError::Connect(
                    "built without FTP support (enable the `ftp` feature)".to_string(),
                ))
            }
            Protocol::WebDav => {
                use opendal::services::Webdav;

                let endpoint = config.endpoint().map_err(config_err)?;
                let builder = Webdav::default()
                    .endpoint(endpoint)
                    .username(config.username().map_err(config_err)?)
                    .password(config.password().map_err(config_err)?)
                    .root(&root);
                let name = format!("webdav://{}{}", endpoint.trim_end_matches('/'), root);
                (build(Operator::new(builder))?, name)
            }
            Protocol::S3 => {
                use opendal::services::S3;

                let bucket = config.bucket().map_err(config_err)?;
                let mut builder = S3::default()
                    .bucket(bucket)
                    .region(config.region().map_err(config_err)?)
                    .access_key_id(config.username().map_err(config_err)?)
                    .secret_access_key(config.password().map_err(config_err)?)
                    .root(&root);
                if let Some(ref ep) = config.endpoint {
                    builder = builder.endpoint(ep);
                }
                let name = format!("s3://{}{}", bucket, root);
                (build(Operator::new(builder))?, name)
            }
            Protocol::Fs => {
                use opendal::services::Fs;

                let endpoint = config.endpoint().map_err(config_err)?;
                std::fs::create_dir_all(endpoint)
                    .map_err(|e| TransferError::Connect(format!("{}: {}", endpoint, e)))?;
                let builder = Fs::default().root(endpoint);
                let name = format!("local:{}", endpoint);
                (build(Operator::new(builder))?, name)
            }
        };

        // 添加超时层
        let operator = operator.layer(
            TimeoutLayer::default()
                .with_timeout(Duration::from_secs(config.timeout_secs))
                .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
        );

        operator
            .check()
            .await
            .map_err(|e| TransferError::Connect(format!("{}: {}", name, e)))?;

        info!("已连接远程存储: {}", name);

        Ok(Self {
            operator,
            cwd: Vec::new(),
            name,
        })
    }

    /// 基于当前目录解析路径
    fn resolve(&self, path: &str) -> String {
        let mut parts = self.cwd.clone();
        parts.extend(path.split('/').filter(|s| !s.is_empty()).map(String::from));
        parts.join("/")
    }
}

#[async_trait]
impl TransferClient for RemoteClient {
    async fn ensure_dir(&mut self, path: &str) -> Result<(), TransferError> {
        let full = self.resolve(path);

        // 逐级创建（某些服务器不支持一次创建多级目录）
        let mut current = String::new();
        for part in full.split('/').filter(|s| !s.is_empty()) {
            current.push_str(part);
            current.push('/');
            self.operator
                .create_dir(&current)
                .await
                .map_err(|e| remote_err(&current, e))?;
        }

        self.cwd = full
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Ok(())
    }

    async fn upload_file(
        &mut self,
        local_path: &Path,
        remote_name: &str,
    ) -> Result<(), TransferError> {
        let full = self.resolve(remote_name);
        let local_err = |source: std::io::Error| TransferError::Local {
            path: local_path.display().to_string(),
            source,
        };

        let mut file = tokio::fs::File::open(local_path).await.map_err(local_err)?;
        let mut writer = self
            .operator
            .writer(&full)
            .await
            .map_err(|e| remote_err(&full, e))?;

        let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buffer).await.map_err(local_err)?;
            if n == 0 {
                break;
            }
            writer
                .write(buffer[..n].to_vec())
                .await
                .map_err(|e| remote_err(&full, e))?;
        }
        writer.close().await.map_err(|e| remote_err(&full, e))?;

        debug!("上传完成: {}", full);
        Ok(())
    }

    async fn download_to_memory(&mut self, remote_path: &str) -> Result<Vec<u8>, TransferError> {
        let full = self.resolve(remote_path);
        let data = self
            .operator
            .read(&full)
            .await
            .map_err(|e| remote_err(&full, e))?;
        Ok(data.to_vec())
    }

    async fn remove_file(&mut self, remote_path: &str) -> Result<(), TransferError> {
        let full = self.resolve(remote_path);

        // 多数服务删除不存在的文件不会报错，先 stat 区分"已不存在"
        self.operator.stat(&full).await.map_err(|e| remote_err(&full, e))?;
        self.operator
            .delete(&full)
            .await
            .map_err(|e| remote_err(&full, e))
    }

    async fn remove_dir(&mut self, remote_path: &str) -> Result<(), TransferError> {
        let dir = format!("{}/", self.resolve(remote_path));

        self.operator.stat(&dir).await.map_err(|e| remote_err(&dir, e))?;
        self.operator.delete(&dir).await.map_err(|e| remote_err(&dir, e))
    }

    async fn change_to_parent(&mut self) -> Result<(), TransferError> {
        self.cwd.pop();
        Ok(())
    }

    async fn wipe_root(&mut self) -> Result<(), TransferError> {
        self.cwd.clear();

        let entries: Vec<_> = self
            .operator
            .lister("/")
            .await
            .map_err(|e| remote_err("/", e))?
            .try_collect()
            .await
            .map_err(|e| remote_err("/", e))?;

        for entry in entries {
            let path = entry.path();
            if path.is_empty() || path == "/" {
                continue;
            }
            debug!("清除: {}", path);
            self.operator
                .remove_all(path)
                .await
                .map_err(|e| remote_err(path, e))?;
        }

        info!("已清空远程目录: {}", self.name);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransferError> {
        self.cwd.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
