use crate::core::events::{emit, EventSink, SyncEvent};
use crate::core::hasher::hash_file;
use crate::core::inventory::{Entry, Inventory};
use crate::error::{Result, SyncError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 编译后的 glob 模式
#[derive(Debug, Clone)]
struct GlobPattern {
    regex: Regex,
    /// 不含 `/` 的模式也匹配最后一段文件名
    match_base: bool,
}

impl GlobPattern {
    fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(pattern))
            .map_err(|e| SyncError::Config(format!("invalid pattern {:?}: {}", pattern, e)))?;
        Ok(Self {
            regex,
            match_base: !pattern.contains('/'),
        })
    }

    fn is_match(&self, path: &str) -> bool {
        if self.regex.is_match(path) {
            return true;
        }
        if self.match_base {
            if let Some(base) = path.rsplit('/').next() {
                return self.regex.is_match(base);
            }
        }
        false
    }
}

/// 把 glob 转成锚定的正则
///
/// `**` 跨越任意层目录（包括零层），`*` 和 `?` 不跨越 `/`。
fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == '/';
                let slash_follows = chars.get(i + 2) == Some(&'/');
                let at_end = i + 2 == chars.len();

                if at_segment_start && slash_follows {
                    // "**/x" 也匹配 "x"
                    re.push_str("(?:.*/)?");
                    i += 3;
                    continue;
                }
                if at_segment_start && at_end && i > 0 {
                    // "x/**" 也匹配 "x"
                    re.pop();
                    re.push_str("(?:/.*)?");
                    i += 2;
                    continue;
                }
                re.push_str(".*");
                i += 2;
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    re.push('$');
    re
}

/// 包含 / 排除规则
///
/// 注意：包含列表只是"追加"性质的。命中排除规则的路径一定被排除；
/// 其余路径无论是否命中包含规则都会保留。已有的部署依赖这个行为，
/// 不要把包含列表改成白名单。
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    include: Vec<GlobPattern>,
    exclude: Vec<GlobPattern>,
}

impl FilterRules {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: include.iter().map(|p| GlobPattern::new(p)).collect::<Result<_>>()?,
            exclude: exclude.iter().map(|p| GlobPattern::new(p)).collect::<Result<_>>()?,
        })
    }

    /// 判断路径是否保留
    pub fn keep(&self, path: &str) -> bool {
        if self.exclude.iter().any(|p| p.is_match(path)) {
            return false;
        }
        if self.include.iter().any(|p| p.is_match(path)) {
            return true;
        }
        // 未命中包含规则同样保留
        true
    }
}

/// 文件扫描器配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// 包含规则（glob patterns）
    pub include_patterns: Vec<String>,
    /// 排除规则（glob patterns）
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_patterns: vec![],
            exclude_patterns: crate::config::default_exclude(),
        }
    }
}

/// walkdir 阶段得到的原始条目
enum Walked {
    Folder(String),
    File { path: String, full: PathBuf, size: u64 },
}

/// 等待 hash 的条目
enum Pending {
    Ready(Entry),
    Hashing(JoinHandle<Result<Entry>>),
}

/// 文件扫描器：遍历本地目录并生成快照
pub struct FileScanner {
    max_concurrent: usize,
    rules: FilterRules,
    events: EventSink,
}

impl FileScanner {
    /// 使用默认排除规则
    pub fn new(max_concurrent: usize) -> Result<Self> {
        Self::with_config(max_concurrent, ScanConfig::default())
    }

    pub fn with_config(max_concurrent: usize, config: ScanConfig) -> Result<Self> {
        Ok(Self {
            max_concurrent: max_concurrent.max(1),
            rules: FilterRules::new(&config.include_patterns, &config.exclude_patterns)?,
            events: None,
        })
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// 扫描目录并返回按路径排序的快照
    pub async fn scan(&self, root: &Path) -> Result<Inventory> {
        info!("开始扫描本地目录: {}", root.display());

        let walk_root = root.to_path_buf();
        let rules = self.rules.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let (walked, skipped) = tokio::task::spawn_blocking(move || walk(&walk_root, &rules))
            .await
            .map_err(|e| SyncError::Inventory {
                path: root.display().to_string(),
                message: format!("walk task failed: {}", e),
            })??;

        for event in skipped {
            match &event {
                SyncEvent::SymlinkSkipped { path } => warn!("不支持符号链接，已跳过: {}", path),
                SyncEvent::SpecialFileSkipped { path } => warn!("跳过非普通文件: {}", path),
                _ => {}
            }
            emit(&self.events, event);
        }

        let mut entries = self.hash_all(root, walked).await?;
        entries.sort_by(|a, b| a.path().cmp(b.path()));

        let files = entries.iter().filter(|e| e.is_file()).count();
        let folders = entries.len() - files;
        info!("扫描完成: {} 个文件, {} 个目录", files, folders);
        emit(&self.events, SyncEvent::Scanned { files, folders });

        Ok(Inventory::new(entries))
    }

    /// 并发计算文件 hash，任何一个文件读不了都让整个扫描失败
    async fn hash_all(&self, root: &Path, walked: Vec<Walked>) -> Result<Vec<Entry>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut pending = Vec::with_capacity(walked.len());

        for item in walked {
            match item {
                Walked::Folder(path) => pending.push(Pending::Ready(Entry::folder(path))),
                Walked::File { path, full, size } => {
                    let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                        SyncError::Inventory {
                            path: path.clone(),
                            message: e.to_string(),
                        }
                    })?;

                    let handle = tokio::task::spawn_blocking(move || -> Result<Entry> {
                        let fingerprint = hash_file(&full);
                        drop(permit);
                        Ok(Entry::file(path, size, fingerprint?))
                    });
                    pending.push(Pending::Hashing(handle));
                }
            }
        }

        let mut entries = Vec::with_capacity(pending.len());
        for item in pending {
            let entry = match item {
                Pending::Ready(entry) => entry,
                Pending::Hashing(handle) => handle.await.map_err(|e| SyncError::Inventory {
                    path: root.display().to_string(),
                    message: format!("hash task failed: {}", e),
                })??,
            };
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// 把绝对路径转成以 `/` 分隔的相对路径
fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|e| SyncError::Inventory {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| SyncError::Inventory {
            path: path.display().to_string(),
            message: "path is not valid UTF-8".to_string(),
        })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn walk(root: &Path, rules: &FilterRules) -> Result<(Vec<Walked>, Vec<SyncEvent>)> {
    let mut walked = Vec::new();
    let mut skipped = Vec::new();

    let mut iter = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(next) = iter.next() {
        let entry = next.map_err(|e| SyncError::Inventory {
            path: e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| root.display().to_string()),
            message: e.to_string(),
        })?;

        let path = relative_path(root, entry.path())?;
        let file_type = entry.file_type();

        if !rules.keep(&path) {
            debug!("排除: {}", path);
            if file_type.is_dir() {
                iter.skip_current_dir();
            }
            continue;
        }

        if file_type.is_symlink() {
            skipped.push(SyncEvent::SymlinkSkipped { path });
        } else if file_type.is_dir() {
            walked.push(Walked::Folder(path));
        } else if file_type.is_file() {
            let metadata = entry.metadata().map_err(|e| SyncError::Inventory {
                path: path.clone(),
                message: e.to_string(),
            })?;
            walked.push(Walked::File {
                path,
                full: entry.path().to_path_buf(),
                size: metadata.len(),
            });
        } else {
            skipped.push(SyncEvent::SpecialFileSkipped { path });
        }
    }

    Ok((walked, skipped))
}
