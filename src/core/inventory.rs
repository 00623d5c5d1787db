//! 目录快照：某一时刻同步根目录下所有文件和目录的清单

use serde::{Deserialize, Serialize};

/// 当前快照格式版本
pub const FORMAT_VERSION: &str = "1.0.0";

/// 快照中的一个条目
///
/// 序列化格式与状态文件中的 `data` 数组元素一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    File {
        #[serde(rename = "name")]
        path: String,
        size: u64,
        #[serde(rename = "hash")]
        fingerprint: String,
    },
    Folder {
        #[serde(rename = "name")]
        path: String,
    },
}

impl Entry {
    pub fn file(path: impl Into<String>, size: u64, fingerprint: impl Into<String>) -> Self {
        Entry::File {
            path: path.into(),
            size,
            fingerprint: fingerprint.into(),
        }
    }

    pub fn folder(path: impl Into<String>) -> Self {
        Entry::Folder { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            Entry::File { path, .. } | Entry::Folder { path } => path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Entry::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Entry::Folder { .. })
    }

    /// 文件大小；目录为 0
    pub fn size(&self) -> u64 {
        match self {
            Entry::File { size, .. } => *size,
            Entry::Folder { .. } => 0,
        }
    }

    /// 路径深度（"a" 为 1，"a/b" 为 2）
    pub fn depth(&self) -> usize {
        self.path().split('/').filter(|s| !s.is_empty()).count()
    }
}

/// 不可变的目录快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    pub format_version: String,
    /// 生成时间（Unix 毫秒）
    pub generated_at: i64,
    pub entries: Vec<Entry>,
}

impl Inventory {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            generated_at: chrono::Utc::now().timestamp_millis(),
            entries,
        }
    }

    /// 空快照（首次同步时作为"上一次"的状态）
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path() == path)
    }

    /// 所有文件的总大小
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(Entry::size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_accessors() {
        let file = Entry::file("docs/a.txt", 10, "h1");
        assert!(file.is_file());
        assert_eq!(file.path(), "docs/a.txt");
        assert_eq!(file.size(), 10);
        assert_eq!(file.depth(), 2);

        let folder = Entry::folder("docs");
        assert!(folder.is_folder());
        assert_eq!(folder.size(), 0);
        assert_eq!(folder.depth(), 1);
    }

    #[test]
    fn test_entry_wire_shape() {
        let json = serde_json::to_value(Entry::file("a.txt", 10, "h1")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "file", "name": "a.txt", "size": 10, "hash": "h1"})
        );

        let json = serde_json::to_value(Entry::folder("docs")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "folder", "name": "docs"}));
    }

    #[test]
    fn test_total_bytes_ignores_folders() {
        let inv = Inventory::new(vec![
            Entry::folder("d"),
            Entry::file("d/a", 3, "x"),
            Entry::file("b", 4, "y"),
        ]);
        assert_eq!(inv.total_bytes(), 7);
        assert_eq!(inv.len(), 3);
        assert!(inv.get("d/a").is_some());
        assert!(inv.get("missing").is_none());
    }
}
