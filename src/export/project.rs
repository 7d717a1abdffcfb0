//! 项目备份（JSON）导出与导入
//!
//! 导入兼容两种记录形态：当前的 `theme` 与旧版的 `systemName`。
//! 任何一条记录缺少 `id`、`file` 或标签，或标签含路径字符，整次导入失败，收藏保持不变。

use std::collections::HashSet;

use chrono::{DateTime, TimeZone};
use serde::Deserialize;

use crate::compositor::ImageVariants;
use crate::db::{is_safe_theme, normalize_theme, CollectionRecord, CollectionStore};
use crate::error::AppError;

const INVALID_FORMAT: &str = "Invalid data format";

/// 导入时的宽松记录形态
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectItem {
    id: Option<i64>,
    theme: Option<String>,
    system_name: Option<String>,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    manufacturer: String,
    file: Option<ImageVariants>,
}

impl ProjectItem {
    fn into_record(self) -> Option<CollectionRecord> {
        let id = self.id.filter(|id| *id != 0)?;
        let file = self.file.filter(|f| !f.normal.is_empty())?;
        let theme = self
            .theme
            .or(self.system_name)
            .map(|t| normalize_theme(&t))
            .filter(|t| !t.is_empty() && is_safe_theme(t))?;

        Some(CollectionRecord {
            id,
            theme,
            full_name: self.full_name,
            manufacturer: self.manufacturer,
            file,
        })
    }
}

fn invalid(detail: impl std::fmt::Display) -> AppError {
    log::warn!("⚠️ 项目文件无效: {}", detail);
    AppError::Export(INVALID_FORMAT.to_string())
}

/// `AlbedoBackup.<YYYYMMDDHHMMSS>.awc.json`
pub fn default_project_file_name<Tz>(now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("AlbedoBackup.{}.awc.json", now.format("%Y%m%d%H%M%S"))
}

pub fn export_project(records: &[CollectionRecord]) -> Result<String, AppError> {
    serde_json::to_string_pretty(records)
        .map_err(|e| AppError::Export(format!("序列化项目失败: {}", e)))
}

/// 解析并校验项目文件内容，不触碰数据库。
pub fn parse_project(content: &str) -> Result<Vec<CollectionRecord>, AppError> {
    let items: Vec<ProjectItem> = serde_json::from_str(content).map_err(invalid)?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let record = item
            .into_record()
            .ok_or_else(|| invalid(format!("第 {} 条记录缺少 id、file 或有效标签", index)))?;
        if !seen.insert(record.theme.clone()) {
            return Err(invalid(format!("标签 {} 重复", record.theme)));
        }
        records.push(record);
    }
    Ok(records)
}

/// 校验通过后整体替换收藏，返回导入条数。
pub fn import_project(store: &CollectionStore, content: &str) -> Result<usize, AppError> {
    let records = parse_project(content)?;
    store.replace_all(&records)?;
    Ok(records.len())
}
