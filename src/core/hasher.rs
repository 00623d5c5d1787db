//! 文件内容指纹（BLAKE3）

use crate::error::{Result, SyncError};
use std::io::{self, Read};
use std::path::Path;

/// 读取缓冲区大小
const BUFFER_SIZE: usize = 64 * 1024;

/// 流式计算内容 hash，返回 64 位小写十六进制字符串
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// 计算文件 hash
pub fn hash_file(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|source| SyncError::Hash {
        path: path.display().to_string(),
        source,
    })?;

    hash_reader(file).map_err(|source| SyncError::Hash {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::Other, "disk gone"));
            }
            self.served = true;
            buf[..4].copy_from_slice(b"data");
            Ok(4)
        }
    }

    #[test]
    fn test_hash_matches_one_shot() {
        let data = vec![7u8; BUFFER_SIZE * 3 + 17];
        let streamed = hash_reader(&data[..]).unwrap();
        assert_eq!(streamed, blake3::hash(&data).to_hex().to_string());
        assert_eq!(streamed.len(), 64);
        assert!(streamed.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_hash_deterministic() {
        let h1 = hash_reader(&b"hello world"[..]).unwrap();
        let h2 = hash_reader(&b"hello world"[..]).unwrap();
        let h3 = hash_reader(&b"hello there"[..]).unwrap();
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_read_error_returns_no_digest() {
        let result = hash_reader(FailingReader { served: false });
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_hash_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(&dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, SyncError::Hash { .. }));
    }
}
