use crate::config::RunConfig;
use crate::core::comparator::{diff, ActionSummary, EditScript};
use crate::core::events::{emit, EventSink, SyncEvent};
use crate::core::inventory::{Entry, Inventory};
use crate::core::scanner::{FileScanner, ScanConfig};
use crate::core::state;
use crate::error::{Phase, Result, SyncError};
use crate::storage::{split_parent, DeleteOutcome, RemoteClient, TransferClient, TransferError};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 本地同步根目录
    pub local_dir: PathBuf,
    /// 状态文件名（位于本地和远程的根目录下）
    pub state_name: String,
    /// 扫描配置
    pub scan_config: ScanConfig,
    /// 同时计算 hash 的最大文件数
    pub max_concurrent_hashes: usize,
    /// 先清空远程目录
    pub dangerous_clean_slate: bool,
    /// 只计算差异，不修改远程
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from("./"),
            state_name: crate::config::DEFAULT_STATE_NAME.to_string(),
            scan_config: ScanConfig::default(),
            max_concurrent_hashes: 8,
            dangerous_clean_slate: false,
            dry_run: false,
        }
    }
}

impl From<&RunConfig> for SyncConfig {
    fn from(config: &RunConfig) -> Self {
        Self {
            local_dir: config.local_dir.clone(),
            state_name: config.state_name.clone(),
            scan_config: ScanConfig {
                include_patterns: config.include.clone(),
                exclude_patterns: config.exclude.clone(),
            },
            max_concurrent_hashes: config.max_concurrent_hashes,
            dangerous_clean_slate: config.dangerous_clean_slate,
            dry_run: config.dry_run,
        }
    }
}

/// 实际执行的修改
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedResult {
    pub folders_created: usize,
    pub files_uploaded: usize,
    pub files_replaced: usize,
    pub files_deleted: usize,
    pub folders_deleted: usize,
    /// 删除时远程已不存在
    pub already_absent: usize,
    pub bytes_transferred: u64,
    pub state_written: bool,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: String,
    pub remote: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: u64,
    pub dry_run: bool,
    /// 没有可用的上次状态，按首次同步处理
    pub bootstrap: bool,
    pub summary: ActionSummary,
    pub applied: AppliedResult,
}

/// 同步引擎
pub struct SyncEngine {
    config: SyncConfig,
    events: EventSink,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// 运行一次完整同步：扫描、读取上次状态、比较、执行、写入新状态
    pub async fn run(&self, client: &mut dyn TransferClient) -> Result<SyncReport> {
        let started = Instant::now();
        let start_time = chrono::Utc::now().timestamp_millis();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(
            "开始同步: {} -> {} (run {}){}",
            self.config.local_dir.display(),
            client.name(),
            run_id,
            if self.config.dry_run { " [dry run]" } else { "" }
        );

        let scanner =
            FileScanner::with_config(self.config.max_concurrent_hashes, self.config.scan_config.clone())?
                .with_events(self.events.clone());
        let mut current = scanner.scan(&self.config.local_dir).await?;
        current.entries.retain(|e| e.path() != self.config.state_name);

        let (previous, bootstrap) = self.load_previous(client).await?;

        let script = diff(&previous, &current).without_path(&self.config.state_name);
        let summary = script.summary();
        info!(
            "比较完成: 新建目录 {}, 上传 {} ({} 字节), 替换 {} ({} 字节), 删除文件 {}, 删除目录 {}",
            summary.folders_to_create,
            summary.files_to_upload,
            summary.bytes_upload,
            summary.files_to_replace,
            summary.bytes_replace,
            summary.files_to_delete,
            summary.folders_to_delete
        );

        let applied = if self.config.dry_run {
            self.preview(&script);
            AppliedResult::default()
        } else {
            let mut applied = self.apply(&script, client).await?;
            self.write_state(&current, client).await?;
            applied.state_written = true;
            applied
        };

        let end_time = chrono::Utc::now().timestamp_millis();
        info!(
            "同步完成: 上传 {}, 替换 {}, 删除 {}, 传输 {} 字节",
            applied.files_uploaded,
            applied.files_replaced,
            applied.files_deleted + applied.folders_deleted,
            applied.bytes_transferred
        );

        Ok(SyncReport {
            run_id,
            remote: client.name().to_string(),
            start_time,
            end_time,
            duration_ms: started.elapsed().as_millis() as u64,
            dry_run: self.config.dry_run,
            bootstrap,
            summary,
            applied,
        })
    }

    /// 读取上次成功同步的状态；读不到或解析失败时返回空快照
    async fn load_previous(&self, client: &mut dyn TransferClient) -> Result<(Inventory, bool)> {
        if self.config.dangerous_clean_slate {
            if self.config.dry_run {
                warn!("[dry run] 将清空远程目录: {}", client.name());
            } else {
                warn!("清空远程目录: {}", client.name());
                client
                    .wipe_root()
                    .await
                    .map_err(|e| SyncError::transfer(Phase::Bootstrap, "/", e))?;
            }
            return Ok(self.bootstrap("clean slate requested"));
        }

        match client.download_to_memory(&self.config.state_name).await {
            Ok(bytes) => match state::decode(&bytes) {
                Ok(previous) => {
                    info!(
                        "读取上次同步状态: {} 个条目 (生成于 {})",
                        previous.len(),
                        previous.generated_at
                    );
                    Ok((previous, false))
                }
                Err(e) => {
                    info!("状态文件无法解析，按首次同步处理: {}", e);
                    Ok(self.bootstrap(&e.to_string()))
                }
            },
            Err(TransferError::NotFound(_)) => {
                info!("远程没有状态文件，按首次同步处理");
                Ok(self.bootstrap("state document not found"))
            }
            Err(e) => {
                warn!("读取状态文件失败，按首次同步处理: {}", e);
                Ok(self.bootstrap(&e.to_string()))
            }
        }
    }

    fn bootstrap(&self, reason: &str) -> (Inventory, bool) {
        emit(
            &self.events,
            SyncEvent::Bootstrap {
                reason: reason.to_string(),
            },
        );
        (Inventory::empty(), true)
    }

    /// 按固定顺序执行差异（不包括写状态文件）
    ///
    /// 0. 清除类型变化（文件 <-> 目录）的旧条目 1. 创建目录 2. 上传新文件
    /// 3. 覆盖修改过的文件 4. 删除文件 5. 删除目录。
    /// 出错时立即停止，已经执行的修改不会回滚。
    pub async fn apply(
        &self,
        script: &EditScript,
        client: &mut dyn TransferClient,
    ) -> Result<AppliedResult> {
        let mut applied = AppliedResult::default();
        let root = &self.config.local_dir;

        // 0. 同一路径换了类型：旧条目（连同其下的内容）挡住了新条目，先删掉
        let cleared = kind_change_deletes(script);
        self.phase_started(Phase::ClearKindChanges, cleared.len());
        for entry in &cleared {
            self.delete_entry(Phase::ClearKindChanges, entry, client, &mut applied)
                .await?;
        }
        let cleared: HashSet<&str> = cleared.iter().map(|e| e.path()).collect();

        // 1. 创建目录
        let folders: Vec<&Entry> = script.to_upload.iter().filter(|e| e.is_folder()).collect();
        self.phase_started(Phase::CreateFolders, folders.len());
        for entry in folders {
            let path = entry.path();
            debug!("创建目录: {}", path);
            self.guard(Phase::CreateFolders, path, create_folder(client, path).await)?;
            applied.folders_created += 1;
            self.applied(Phase::CreateFolders, path);
        }

        // 2. 上传新文件
        let uploads: Vec<&Entry> = script.to_upload.iter().filter(|e| e.is_file()).collect();
        self.phase_started(Phase::UploadFiles, uploads.len());
        for entry in uploads {
            let path = entry.path();
            debug!("上传: {} ({} 字节)", path, entry.size());
            self.guard(Phase::UploadFiles, path, upload_entry(client, root, path).await)?;
            applied.files_uploaded += 1;
            applied.bytes_transferred += entry.size();
            self.applied(Phase::UploadFiles, path);
        }

        // 3. 覆盖修改过的文件（旧文件在新文件上传完成前一直可用）
        let replaces: Vec<&Entry> = script.to_replace.iter().filter(|e| e.is_file()).collect();
        self.phase_started(Phase::ReplaceFiles, replaces.len());
        for entry in replaces {
            let path = entry.path();
            debug!("替换: {} ({} 字节)", path, entry.size());
            self.guard(Phase::ReplaceFiles, path, upload_entry(client, root, path).await)?;
            applied.files_replaced += 1;
            applied.bytes_transferred += entry.size();
            self.applied(Phase::ReplaceFiles, path);
        }

        // 4. 删除文件
        let deletes: Vec<&Entry> = script
            .to_delete
            .iter()
            .filter(|e| e.is_file() && !cleared.contains(e.path()))
            .collect();
        self.phase_started(Phase::DeleteFiles, deletes.len());
        for entry in deletes {
            self.delete_entry(Phase::DeleteFiles, entry, client, &mut applied)
                .await?;
        }

        // 5. 删除目录，深的先删
        let mut folders: Vec<&Entry> = script
            .to_delete
            .iter()
            .filter(|e| e.is_folder() && !cleared.contains(e.path()))
            .collect();
        sort_deepest_first(&mut folders);
        self.phase_started(Phase::DeleteFolders, folders.len());
        for entry in folders {
            self.delete_entry(Phase::DeleteFolders, entry, client, &mut applied)
                .await?;
        }

        Ok(applied)
    }

    /// 删除一个远程条目；远程已不存在时只记录
    async fn delete_entry(
        &self,
        phase: Phase,
        entry: &Entry,
        client: &mut dyn TransferClient,
        applied: &mut AppliedResult,
    ) -> Result<()> {
        let path = entry.path();
        let result = if entry.is_file() {
            debug!("删除文件: {}", path);
            client.remove_file(path).await
        } else {
            debug!("删除目录: {}", path);
            client.remove_dir(path).await
        };

        match self.guard(phase, path, DeleteOutcome::tolerate(result))? {
            DeleteOutcome::Removed => {
                if entry.is_file() {
                    applied.files_deleted += 1;
                } else {
                    applied.folders_deleted += 1;
                }
                self.applied(phase, path);
            }
            DeleteOutcome::AlreadyAbsent => {
                applied.already_absent += 1;
                self.already_absent(phase, path);
            }
        }
        Ok(())
    }

    /// 6. 保存当前快照到本地并上传为新的状态文件
    async fn write_state(&self, current: &Inventory, client: &mut dyn TransferClient) -> Result<()> {
        let name = &self.config.state_name;
        let local_path = self.config.local_dir.join(name);
        let bytes = state::encode(current)?;

        tokio::fs::write(&local_path, &bytes)
            .await
            .map_err(|source| SyncError::LocalState {
                path: local_path.display().to_string(),
                source,
            })?;

        let result = client.upload_file(&local_path, name).await;
        self.guard(Phase::WriteState, name, result)?;

        info!("已上传状态文件: {} ({} 个条目)", name, current.len());
        emit(&self.events, SyncEvent::StateWritten { path: name.clone() });
        Ok(())
    }

    /// dry run：只输出将要执行的操作
    fn preview(&self, script: &EditScript) {
        let files = |list: &[Entry], folders: bool| {
            list.iter()
                .filter(|e| e.is_folder() == folders)
                .map(|e| e.path().to_string())
                .collect::<Vec<_>>()
        };

        for path in files(&script.to_upload, true) {
            info!("[dry run] 创建目录: {}", path);
        }
        for path in files(&script.to_upload, false) {
            info!("[dry run] 上传: {}", path);
        }
        for path in files(&script.to_replace, false) {
            info!("[dry run] 替换: {}", path);
        }
        for path in files(&script.to_delete, false) {
            info!("[dry run] 删除文件: {}", path);
        }
        for path in files(&script.to_delete, true) {
            info!("[dry run] 删除目录: {}", path);
        }
        info!("[dry run] 不修改远程，也不更新状态文件");
    }

    /// 把远程错误转成带阶段和路径的致命错误
    fn guard<T>(
        &self,
        phase: Phase,
        path: &str,
        result: std::result::Result<T, TransferError>,
    ) -> Result<T> {
        result.map_err(|e| {
            error!("{} 失败: {} - {}（已执行的修改保留，状态文件未更新）", phase, path, e);
            SyncError::transfer(phase, path, e)
        })
    }

    fn phase_started(&self, phase: Phase, count: usize) {
        if count > 0 {
            info!("{}: {} 项", phase, count);
        }
        emit(&self.events, SyncEvent::PhaseStarted { phase, count });
    }

    fn applied(&self, phase: Phase, path: &str) {
        emit(
            &self.events,
            SyncEvent::Applied {
                phase,
                path: path.to_string(),
            },
        );
    }

    fn already_absent(&self, phase: Phase, path: &str) {
        debug!("远程已不存在，跳过: {}", path);
        emit(
            &self.events,
            SyncEvent::AlreadyAbsent {
                phase,
                path: path.to_string(),
            },
        );
    }
}

/// 深的先删，同深度按路径
fn sort_deepest_first(entries: &mut [&Entry]) {
    entries.sort_by(|a, b| b.depth().cmp(&a.depth()).then_with(|| a.path().cmp(b.path())));
}

/// 需要在创建新条目之前删除的旧条目：路径与新条目相同，或位于新条目之下
fn kind_change_deletes(script: &EditScript) -> Vec<&Entry> {
    let uploads: HashSet<&str> = script.to_upload.iter().map(Entry::path).collect();

    let mut blocking: Vec<&Entry> = script
        .to_delete
        .iter()
        .filter(|e| {
            let path = e.path();
            uploads.contains(path)
                || path
                    .match_indices('/')
                    .any(|(i, _)| uploads.contains(&path[..i]))
        })
        .collect();
    sort_deepest_first(&mut blocking);
    blocking
}

/// 把 `/` 分隔的相对路径拼到本地根目录
fn local_path(root: &Path, path: &str) -> PathBuf {
    let mut full = root.to_path_buf();
    for part in path.split('/').filter(|s| !s.is_empty()) {
        full.push(part);
    }
    full
}

/// 当前目录回到同步根目录
async fn return_to_root(
    client: &mut dyn TransferClient,
    depth: usize,
) -> std::result::Result<(), TransferError> {
    for _ in 0..depth {
        client.change_to_parent().await?;
    }
    Ok(())
}

async fn create_folder(
    client: &mut dyn TransferClient,
    path: &str,
) -> std::result::Result<(), TransferError> {
    let depth = path.split('/').filter(|s| !s.is_empty()).count();
    client.ensure_dir(path).await?;
    return_to_root(client, depth).await
}

async fn upload_entry(
    client: &mut dyn TransferClient,
    root: &Path,
    path: &str,
) -> std::result::Result<(), TransferError> {
    let (parents, name) = split_parent(path);
    if !parents.is_empty() {
        client.ensure_dir(&parents.join("/")).await?;
    }
    client.upload_file(&local_path(root, path), name).await?;
    return_to_root(client, parents.len()).await
}

/// 按配置连接远程存储并运行一次同步
pub async fn run_with_config(config: &RunConfig, events: EventSink) -> Result<SyncReport> {
    config.validate()?;

    let mut client = RemoteClient::connect(&config.server).await.map_err(|e| {
        error!("连接远程存储失败: {}", e);
        SyncError::Connect(e.to_string())
    })?;

    let engine = SyncEngine::new(SyncConfig::from(config)).with_events(events);
    let result = engine.run(&mut client).await;

    if let Err(e) = client.close().await {
        warn!("关闭连接失败: {}", e);
    }

    result
}
