//! 状态文件编解码
//!
//! 状态文件保存上一次成功同步时的目录快照，放在远程同步根目录下，
//! 每次同步开始时读取、结束时重写。

use crate::core::inventory::{Entry, Inventory};
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 状态文件的固定说明字段
pub const STATE_DESCRIPTION: &str = "DO NOT DELETE THIS FILE. It records which files were synced \
by the most recent deployment. If it is deleted the next run uploads everything again.";

/// 可以读取的主版本号
const SUPPORTED_MAJOR: &str = "1";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateDocument {
    description: String,
    version: String,
    generated_time: i64,
    data: Vec<Entry>,
}

/// 序列化快照
pub fn encode(inventory: &Inventory) -> Result<Vec<u8>> {
    let document = StateDocument {
        description: STATE_DESCRIPTION.to_string(),
        version: inventory.format_version.clone(),
        generated_time: inventory.generated_at,
        data: inventory.entries.clone(),
    };

    serde_json::to_vec_pretty(&document).map_err(|e| SyncError::StateEncode(e.to_string()))
}

/// 反序列化快照，任何结构问题都整体失败
pub fn decode(bytes: &[u8]) -> Result<Inventory> {
    let document: StateDocument =
        serde_json::from_slice(bytes).map_err(|e| SyncError::StateDecode(e.to_string()))?;

    let major = document.version.split('.').next().unwrap_or_default();
    if major != SUPPORTED_MAJOR {
        return Err(SyncError::StateDecode(format!(
            "unsupported state version {}",
            document.version
        )));
    }

    let mut seen = HashSet::with_capacity(document.data.len());
    for entry in &document.data {
        if !is_plain_relative(entry.path()) {
            return Err(SyncError::StateDecode(format!(
                "invalid path {:?}",
                entry.path()
            )));
        }
        if !seen.insert(entry.path()) {
            return Err(SyncError::StateDecode(format!(
                "duplicate path {}",
                entry.path()
            )));
        }
    }

    Ok(Inventory {
        format_version: document.version,
        generated_at: document.generated_time,
        entries: document.data,
    })
}

/// 只接受同步根目录下以 `/` 分隔的普通相对路径
fn is_plain_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}
