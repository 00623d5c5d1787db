//! 内存中的假远程存储，用于测试
//!
//! 记录每一次操作，并可以让指定操作失败。

use super::{TransferClient, TransferError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// 假远程存储
///
/// 克隆出来的实例共享同一份状态，测试可以在同步结束后检查。
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Debug, Default)]
struct MockInner {
    cwd: Vec<String>,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    ops: Vec<String>,
    /// 操作名 + 路径 -> 错误信息
    failures: HashMap<String, String>,
    /// 删除非空目录时报错
    strict_rmdir: bool,
    closed: bool,
}

impl MockInner {
    fn resolve(&self, path: &str) -> String {
        let mut parts = self.cwd.clone();
        parts.extend(path.split('/').filter(|s| !s.is_empty()).map(String::from));
        parts.join("/")
    }

    fn check_failure(&mut self, op: &str, path: &str) -> Result<(), TransferError> {
        match self.failures.remove(&format!("{} {}", op, path)) {
            Some(message) => Err(TransferError::Other(message)),
            None => Ok(()),
        }
    }

    fn has_children(&self, dir: &str) -> bool {
        let prefix = format!("{}/", dir);
        self.files.keys().any(|p| p.starts_with(&prefix))
            || self.dirs.iter().any(|p| p.starts_with(&prefix))
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 删除非空目录时返回错误（模拟 FTP 的 RMD）
    pub fn with_strict_rmdir(self) -> Self {
        self.inner.lock().unwrap().strict_rmdir = true;
        self
    }

    /// 预置远程文件
    pub fn put_file(&self, path: &str, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.files.insert(path.to_string(), data.to_vec());
    }

    /// 预置远程目录
    pub fn put_dir(&self, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.dirs.insert(path.to_string());
    }

    /// 让下一次 `op`（"mkdir" / "put" / "get" / "rm" / "rmdir" / "wipe"）
    /// 作用在 `path` 上时失败
    pub fn fail_on(&self, op: &str, path: &str, message: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .failures
            .insert(format!("{} {}", op, path), message.to_string());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().files.get(path).cloned()
    }

    pub fn files(&self) -> Vec<String> {
        self.inner.lock().unwrap().files.keys().cloned().collect()
    }

    pub fn dirs(&self) -> Vec<String> {
        self.inner.lock().unwrap().dirs.iter().cloned().collect()
    }

    /// 所有执行过的操作，如 "mkdir a/b"、"put a/b/c.txt"、"cdup"
    pub fn ops(&self) -> Vec<String> {
        self.inner.lock().unwrap().ops.clone()
    }

    /// 只包含修改远程内容的操作
    pub fn mutations(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter(|op| !op.starts_with("cd") && !op.starts_with("get") && op != "close")
            .collect()
    }

    /// 当前目录（以 `/` 连接）
    pub fn cwd(&self) -> String {
        self.inner.lock().unwrap().cwd.join("/")
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

#[async_trait]
impl TransferClient for MockClient {
    async fn ensure_dir(&mut self, path: &str) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().unwrap();
        let full = inner.resolve(path);
        inner.check_failure("mkdir", &full)?;

        let mut current = String::new();
        for part in full.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            if inner.files.contains_key(&current) {
                return Err(TransferError::Other(format!("{} is a file", current)));
            }
            inner.dirs.insert(current.clone());
        }

        inner.ops.push(format!("mkdir {}", full));
        inner.cwd = full
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        inner.ops.push(format!("cd {}", full));
        Ok(())
    }

    async fn upload_file(
        &mut self,
        local_path: &Path,
        remote_name: &str,
    ) -> Result<(), TransferError> {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|source| TransferError::Local {
                path: local_path.display().to_string(),
                source,
            })?;

        let mut inner = self.inner.lock().unwrap();
        let full = inner.resolve(remote_name);
        inner.check_failure("put", &full)?;
        if inner.dirs.contains(&full) {
            return Err(TransferError::Other(format!("{} is a directory", full)));
        }
        inner.files.insert(full.clone(), data);
        inner.ops.push(format!("put {}", full));
        Ok(())
    }

    async fn download_to_memory(&mut self, remote_path: &str) -> Result<Vec<u8>, TransferError> {
        let mut inner = self.inner.lock().unwrap();
        let full = inner.resolve(remote_path);
        inner.ops.push(format!("get {}", full));
        inner.check_failure("get", &full)?;
        inner
            .files
            .get(&full)
            .cloned()
            .ok_or(TransferError::NotFound(full))
    }

    async fn remove_file(&mut self, remote_path: &str) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().unwrap();
        let full = inner.resolve(remote_path);
        inner.check_failure("rm", &full)?;
        if inner.files.remove(&full).is_none() {
            return Err(TransferError::NotFound(full));
        }
        inner.ops.push(format!("rm {}", full));
        Ok(())
    }

    async fn remove_dir(&mut self, remote_path: &str) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().unwrap();
        let full = inner.resolve(remote_path);
        inner.check_failure("rmdir", &full)?;
        if !inner.dirs.contains(&full) {
            return Err(TransferError::NotFound(full));
        }
        if inner.strict_rmdir && inner.has_children(&full) {
            return Err(TransferError::Other(format!("{} is not empty", full)));
        }
        let prefix = format!("{}/", full);
        inner.files.retain(|p, _| !p.starts_with(&prefix));
        inner.dirs.retain(|p| p != &full && !p.starts_with(&prefix));
        inner.ops.push(format!("rmdir {}", full));
        Ok(())
    }

    async fn change_to_parent(&mut self) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().unwrap();
        inner.cwd.pop();
        inner.ops.push("cdup".to_string());
        Ok(())
    }

    async fn wipe_root(&mut self) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_failure("wipe", "")?;
        inner.files.clear();
        inner.dirs.clear();
        inner.cwd.clear();
        inner.ops.push("wipe".to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransferError> {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.ops.push("close".to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cursor_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("c.txt");
        std::fs::write(&local, b"data").unwrap();

        let mut client = MockClient::new();
        client.ensure_dir("a/b").await.unwrap();
        client.upload_file(&local, "c.txt").await.unwrap();
        client.change_to_parent().await.unwrap();
        client.change_to_parent().await.unwrap();

        assert_eq!(client.cwd(), "");
        assert_eq!(client.file("a/b/c.txt"), Some(b"data".to_vec()));
        assert_eq!(client.dirs(), vec!["a", "a/b"]);
    }

    #[tokio::test]
    async fn test_missing_paths_are_not_found() {
        let mut client = MockClient::new();
        assert!(client.remove_file("x").await.unwrap_err().is_not_found());
        assert!(client.remove_dir("d").await.unwrap_err().is_not_found());
        assert!(client.download_to_memory("s.json").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_strict_rmdir_refuses_non_empty() {
        let mut client = MockClient::new().with_strict_rmdir();
        client.put_dir("d");
        client.put_file("d/f", b"1");

        let err = client.remove_dir("d").await.unwrap_err();
        assert!(!err.is_not_found());

        client.remove_file("d/f").await.unwrap();
        client.remove_dir("d").await.unwrap();
        assert!(client.dirs().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let mut client = MockClient::new();
        client.put_file("a", b"1");
        client.fail_on("rm", "a", "permission denied");

        assert!(client.remove_file("a").await.is_err());
        client.remove_file("a").await.unwrap();
    }
}
