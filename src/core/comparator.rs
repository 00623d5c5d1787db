use crate::core::inventory::{Entry, Inventory};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// 两次快照之间的差异
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    /// 本次新增（上次没有）
    pub to_upload: Vec<Entry>,
    /// 两边都有但内容不同
    pub to_replace: Vec<Entry>,
    /// 上次有、本次没有
    pub to_delete: Vec<Entry>,
    pub bytes_upload: u64,
    pub bytes_replace: u64,
    pub bytes_delete: u64,
}

impl EditScript {
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_replace.is_empty() && self.to_delete.is_empty()
    }

    /// 去掉某个路径（状态文件不参与常规上传/删除）
    pub fn without_path(mut self, path: &str) -> Self {
        let keep = |e: &Entry| e.path() != path;
        self.to_upload.retain(keep);
        self.to_replace.retain(keep);
        self.to_delete.retain(keep);
        self.recount();
        self
    }

    fn recount(&mut self) {
        self.bytes_upload = self.to_upload.iter().map(Entry::size).sum();
        self.bytes_replace = self.to_replace.iter().map(Entry::size).sum();
        self.bytes_delete = self.to_delete.iter().map(Entry::size).sum();
    }

    /// 统计
    pub fn summary(&self) -> ActionSummary {
        fn count(list: &[Entry], files: bool) -> usize {
            list.iter().filter(|e| e.is_file() == files).count()
        }

        ActionSummary {
            folders_to_create: count(&self.to_upload, false),
            files_to_upload: count(&self.to_upload, true),
            files_to_replace: count(&self.to_replace, true),
            files_to_delete: count(&self.to_delete, true),
            folders_to_delete: count(&self.to_delete, false),
            bytes_upload: self.bytes_upload,
            bytes_replace: self.bytes_replace,
            bytes_delete: self.bytes_delete,
        }
    }
}

/// 动作统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    pub folders_to_create: usize,
    pub files_to_upload: usize,
    pub files_to_replace: usize,
    pub files_to_delete: usize,
    pub folders_to_delete: usize,
    pub bytes_upload: u64,
    pub bytes_replace: u64,
    pub bytes_delete: u64,
}

impl ActionSummary {
    pub fn total_transfer_bytes(&self) -> u64 {
        self.bytes_upload + self.bytes_replace
    }
}

/// 比较两个快照，返回需要执行的差异
///
/// 每个列表都按路径升序排列，与输入顺序无关。
pub fn diff(previous: &Inventory, current: &Inventory) -> EditScript {
    let prev: BTreeMap<&str, &Entry> = previous.entries.iter().map(|e| (e.path(), e)).collect();
    let curr: BTreeMap<&str, &Entry> = current.entries.iter().map(|e| (e.path(), e)).collect();

    // 收集所有路径（BTreeSet 保证有序）
    let all_paths: BTreeSet<&str> = prev.keys().chain(curr.keys()).copied().collect();

    let mut script = EditScript::default();

    for path in all_paths {
        match (prev.get(path), curr.get(path)) {
            (None, Some(new)) => script.to_upload.push((*new).clone()),
            (Some(old), None) => script.to_delete.push((*old).clone()),
            (Some(old), Some(new)) => match (old, new) {
                (
                    Entry::File {
                        size: old_size,
                        fingerprint: old_hash,
                        ..
                    },
                    Entry::File {
                        size: new_size,
                        fingerprint: new_hash,
                        ..
                    },
                ) => {
                    if old_size != new_size || old_hash != new_hash {
                        script.to_replace.push((*new).clone());
                    }
                }
                (Entry::Folder { .. }, Entry::Folder { .. }) => {}
                // 文件和目录互换：删掉旧的，再上传新的
                _ => {
                    script.to_delete.push((*old).clone());
                    script.to_upload.push((*new).clone());
                }
            },
            (None, None) => unreachable!(),
        }
    }

    script.recount();
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(entries: Vec<Entry>) -> Inventory {
        Inventory::new(entries)
    }

    fn paths(list: &[Entry]) -> Vec<&str> {
        list.iter().map(Entry::path).collect()
    }

    fn mixed() -> Inventory {
        inv(vec![
            Entry::folder("docs"),
            Entry::file("docs/a.txt", 10, "h1"),
            Entry::file("b.txt", 4, "h2"),
            Entry::folder("img"),
        ])
    }

    #[test]
    fn test_identical_inventories_produce_nothing() {
        let i = mixed();
        let script = diff(&i, &i);
        assert!(script.is_empty());
        assert_eq!(
            (script.bytes_upload, script.bytes_replace, script.bytes_delete),
            (0, 0, 0)
        );
    }

    #[test]
    fn test_bootstrap_uploads_everything() {
        let current = mixed();
        let script = diff(&Inventory::empty(), &current);
        assert_eq!(paths(&script.to_upload), vec!["b.txt", "docs", "docs/a.txt", "img"]);
        assert!(script.to_replace.is_empty());
        assert!(script.to_delete.is_empty());
        assert_eq!(script.bytes_upload, 14);
    }

    #[test]
    fn test_scenario_new_file() {
        let script = diff(&inv(vec![]), &inv(vec![Entry::file("a.txt", 10, "h1")]));
        assert_eq!(paths(&script.to_upload), vec!["a.txt"]);
        assert!(script.to_replace.is_empty());
        assert!(script.to_delete.is_empty());
        assert_eq!(script.bytes_upload, 10);
    }

    #[test]
    fn test_scenario_changed_file() {
        let script = diff(
            &inv(vec![Entry::file("a.txt", 10, "h1")]),
            &inv(vec![Entry::file("a.txt", 12, "h2")]),
        );
        assert_eq!(script.to_replace, vec![Entry::file("a.txt", 12, "h2")]);
        assert_eq!(script.bytes_replace, 12);
        assert!(script.to_upload.is_empty());
        assert!(script.to_delete.is_empty());
    }

    #[test]
    fn test_same_size_different_hash_is_replaced() {
        let script = diff(
            &inv(vec![Entry::file("a.txt", 10, "h1")]),
            &inv(vec![Entry::file("a.txt", 10, "h9")]),
        );
        assert_eq!(paths(&script.to_replace), vec!["a.txt"]);
    }

    #[test]
    fn test_scenario_everything_removed() {
        let script = diff(
            &inv(vec![Entry::file("a.txt", 10, "h1"), Entry::folder("docs")]),
            &inv(vec![]),
        );
        assert_eq!(paths(&script.to_delete), vec!["a.txt", "docs"]);
        assert_eq!(script.bytes_delete, 10);
        assert!(script.to_upload.is_empty());
        assert!(script.to_replace.is_empty());
    }

    #[test]
    fn test_scenario_unchanged_file() {
        let same = inv(vec![Entry::file("a.txt", 10, "h1")]);
        assert!(diff(&same, &same.clone()).is_empty());
    }

    #[test]
    fn test_kind_change_is_delete_plus_upload() {
        let script = diff(
            &inv(vec![Entry::file("x", 5, "h")]),
            &inv(vec![Entry::folder("x")]),
        );
        assert_eq!(script.to_delete, vec![Entry::file("x", 5, "h")]);
        assert_eq!(script.to_upload, vec![Entry::folder("x")]);
        assert!(script.to_replace.is_empty());
        assert_eq!(script.bytes_delete, 5);
        assert_eq!(script.bytes_upload, 0);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let prev_a = inv(vec![
            Entry::file("z.txt", 1, "a"),
            Entry::file("m.txt", 2, "b"),
            Entry::folder("old"),
        ]);
        let mut prev_b = prev_a.clone();
        prev_b.entries.reverse();

        let curr_a = inv(vec![
            Entry::file("m.txt", 3, "c"),
            Entry::file("b.txt", 1, "d"),
            Entry::file("a.txt", 1, "e"),
        ]);
        let mut curr_b = curr_a.clone();
        curr_b.entries.reverse();

        let s1 = diff(&prev_a, &curr_a);
        let s2 = diff(&prev_b, &curr_b);
        assert_eq!(s1, s2);
        assert_eq!(paths(&s1.to_upload), vec!["a.txt", "b.txt"]);
        assert_eq!(paths(&s1.to_delete), vec!["old", "z.txt"]);
    }

    #[test]
    fn test_every_path_lands_in_exactly_one_bucket() {
        let previous = inv(vec![
            Entry::file("same", 1, "s"),
            Entry::file("changed", 1, "c1"),
            Entry::file("gone", 7, "g"),
            Entry::folder("dir"),
            Entry::folder("flip"),
        ]);
        let current = inv(vec![
            Entry::file("same", 1, "s"),
            Entry::file("changed", 2, "c2"),
            Entry::file("new", 3, "n"),
            Entry::folder("dir"),
            Entry::file("flip", 4, "f"),
        ]);
        let script = diff(&previous, &current);

        assert_eq!(paths(&script.to_upload), vec!["flip", "new"]);
        assert_eq!(paths(&script.to_replace), vec!["changed"]);
        assert_eq!(paths(&script.to_delete), vec!["flip", "gone"]);

        let summary = script.summary();
        assert_eq!(summary.files_to_upload, 2);
        assert_eq!(summary.folders_to_delete, 1);
        assert_eq!(summary.files_to_delete, 1);
        assert_eq!(summary.total_transfer_bytes(), 9);
    }

    #[test]
    fn test_without_path_drops_state_file() {
        let script = diff(
            &inv(vec![Entry::file(".state.json", 5, "old")]),
            &inv(vec![Entry::file(".state.json", 6, "new"), Entry::file("a", 1, "x")]),
        )
        .without_path(".state.json");

        assert_eq!(paths(&script.to_upload), vec!["a"]);
        assert!(script.to_replace.is_empty());
        assert_eq!(script.bytes_replace, 0);
    }
}
