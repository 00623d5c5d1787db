//! 同步过程中向调用方报告的事件

use crate::error::Phase;
use tokio::sync::mpsc;

/// 同步事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// 符号链接不受支持，已跳过
    SymlinkSkipped { path: String },
    /// 非普通文件（socket、FIFO 等），已跳过
    SpecialFileSkipped { path: String },
    /// 本地扫描完成
    Scanned { files: usize, folders: usize },
    /// 远程没有可用的状态文件，按首次同步处理
    Bootstrap { reason: String },
    /// 某个阶段开始
    PhaseStarted { phase: Phase, count: usize },
    /// 某个条目已处理完成
    Applied { phase: Phase, path: String },
    /// 删除时远程已不存在
    AlreadyAbsent { phase: Phase, path: String },
    /// 新的状态文件已上传
    StateWritten { path: String },
}

/// 事件接收端；`None` 表示不关心事件
pub type EventSink = Option<mpsc::UnboundedSender<SyncEvent>>;

/// 发送事件，接收端已关闭时静默丢弃
pub(crate) fn emit(sink: &EventSink, event: SyncEvent) {
    if let Some(tx) = sink {
        let _ = tx.send(event);
    }
}
