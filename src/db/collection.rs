//! 系统收藏子模块
//!
//! ## 职责
//! - 存储契约：`select` / `upsert` / `remove`
//! - 收藏规则：添加（拒绝空名、重名、无图）、改名与替换图片、移除、清空
//! - 标签会成为导出文件名，含路径分隔符或 `..` 的标签一律拒绝
//! - 导入时整表替换（单事务）
//!
//! ## 错误语义
//! - SQL 失败映射为 `AppError::Database`
//! - 违反收藏规则映射为 `AppError::Collection`，数据库保持不变

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::compositor::ImageVariants;
use crate::error::AppError;

use super::{CollectionKey, CollectionRecord, CollectionStore};

/// 待添加的系统描述
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSystem {
    pub theme: String,
    pub full_name: String,
    pub manufacturer: String,
}

impl NewSystem {
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            ..Self::default()
        }
    }

    pub fn with_details(mut self, full_name: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self.manufacturer = manufacturer.into();
        self
    }
}

/// 标签统一去空白并转小写。
pub(crate) fn normalize_theme(theme: &str) -> String {
    theme.trim().to_lowercase()
}

/// 标签能否安全地用作文件名。
pub(crate) fn is_safe_theme(theme: &str) -> bool {
    !theme.contains(['/', '\\'])
        && !theme.contains("..")
        && !theme.chars().any(char::is_control)
}

fn check_theme(theme: &str) -> Result<(), AppError> {
    if is_safe_theme(theme) {
        Ok(())
    } else {
        Err(AppError::Collection("Invalid system name".to_string()))
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<CollectionRecord> {
    Ok(CollectionRecord {
        id: row.get(0)?,
        theme: row.get(1)?,
        full_name: row.get(2)?,
        manufacturer: row.get(3)?,
        file: ImageVariants {
            normal: row.get(4)?,
            blurred: row.get(5)?,
            thumbnail: row.get(6)?,
        },
    })
}

const SELECT_COLUMNS: &str =
    "SELECT id, theme, full_name, manufacturer, normal, blurred, thumbnail FROM system_collection";

pub(super) fn select(conn: &Connection, key: CollectionKey) -> Result<Vec<CollectionRecord>, AppError> {
    let (sql, id) = match key {
        CollectionKey::Id(id) => (format!("{SELECT_COLUMNS} WHERE id = ?1"), Some(id)),
        CollectionKey::All => (format!("{SELECT_COLUMNS} ORDER BY id ASC"), None),
    };

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| AppError::Database(format!("准备查询失败: {}", e)))?;

    let rows = match id {
        Some(id) => stmt.query_map(params![id], map_row),
        None => stmt.query_map([], map_row),
    }
    .map_err(|e| AppError::Database(format!("查询收藏失败: {}", e)))?
    .collect::<Result<Vec<_>, _>>()
    .map_err(|e| AppError::Database(format!("读取行失败: {}", e)))?;

    Ok(rows)
}

pub(super) fn upsert(conn: &Connection, record: &CollectionRecord) -> Result<(), AppError> {
    check_theme(&record.theme)?;
    conn.execute(
        "INSERT INTO system_collection (id, theme, full_name, manufacturer, normal, blurred, thumbnail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            theme = excluded.theme,
            full_name = excluded.full_name,
            manufacturer = excluded.manufacturer,
            normal = excluded.normal,
            blurred = excluded.blurred,
            thumbnail = excluded.thumbnail",
        params![
            record.id,
            record.theme,
            record.full_name,
            record.manufacturer,
            record.file.normal,
            record.file.blurred,
            record.file.thumbnail,
        ],
    ).map_err(|e| AppError::Database(format!("写入收藏失败: {}", e)))?;
    Ok(())
}

pub(super) fn remove(conn: &Connection, key: CollectionKey) -> Result<usize, AppError> {
    let removed = match key {
        CollectionKey::Id(id) => conn.execute("DELETE FROM system_collection WHERE id = ?1", params![id]),
        CollectionKey::All => conn.execute("DELETE FROM system_collection", []),
    }
    .map_err(|e| AppError::Database(format!("删除收藏失败: {}", e)))?;
    Ok(removed)
}

fn find_by_theme(conn: &Connection, theme: &str) -> Result<Option<i64>, AppError> {
    conn.query_row(
        "SELECT id FROM system_collection WHERE theme = ?1",
        params![theme],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| AppError::Database(format!("查询标签失败: {}", e)))
}

/// 以当前毫秒时间为 id，与已有 id 冲突时顺延。
fn next_id(conn: &Connection) -> Result<i64, AppError> {
    let now = chrono::Utc::now().timestamp_millis();
    let max: Option<i64> = conn
        .query_row("SELECT MAX(id) FROM system_collection", [], |row| row.get(0))
        .map_err(|e| AppError::Database(format!("查询最大 id 失败: {}", e)))?;
    Ok(match max {
        Some(max) if max >= now => max + 1,
        _ => now,
    })
}

impl CollectionStore {
    /// 把当前合成结果加入收藏。
    pub fn add_system(
        &self,
        system: &NewSystem,
        image: Option<&ImageVariants>,
    ) -> Result<CollectionRecord, AppError> {
        let Some(image) = image else {
            return Err(AppError::Collection("No image loaded".to_string()));
        };

        let theme = normalize_theme(&system.theme);
        if theme.is_empty() {
            return Err(AppError::Collection("Please insert a system name".to_string()));
        }
        check_theme(&theme)?;

        self.with_conn(|conn| {
            if find_by_theme(conn, &theme)?.is_some() {
                return Err(AppError::Collection("Already at collection".to_string()));
            }

            let record = CollectionRecord {
                id: next_id(conn)?,
                theme,
                full_name: system.full_name.clone(),
                manufacturer: system.manufacturer.clone(),
                file: image.clone(),
            };
            upsert(conn, &record)?;
            log::info!("➕ 已加入收藏 - 标签: {} id: {}", record.theme, record.id);
            Ok(record)
        })
    }

    /// 改名；传入 `replacement` 时同时替换图片。空名直接忽略。
    pub fn edit_system(
        &self,
        id: i64,
        name: &str,
        replacement: Option<&ImageVariants>,
    ) -> Result<Option<CollectionRecord>, AppError> {
        let theme = normalize_theme(name);
        if theme.is_empty() {
            return Ok(None);
        }
        check_theme(&theme)?;

        self.with_conn(|conn| {
            let Some(mut record) = select(conn, CollectionKey::Id(id))?.into_iter().next() else {
                return Err(AppError::Collection(format!("收藏中不存在 id {}", id)));
            };

            if let Some(owner) = find_by_theme(conn, &theme)? {
                if owner != id {
                    return Err(AppError::Collection("Already at collection".to_string()));
                }
            }

            record.theme = theme;
            if let Some(image) = replacement {
                record.file = image.clone();
            }
            upsert(conn, &record)?;
            log::info!("✏️ 已更新收藏 - id: {} 标签: {}", id, record.theme);
            Ok(Some(record))
        })
    }

    /// 返回是否真的删除了记录。
    pub fn remove_system(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.delete(CollectionKey::Id(id))? > 0)
    }

    pub fn clear(&self) -> Result<usize, AppError> {
        let removed = self.delete(CollectionKey::All)?;
        log::info!("🧹 已清空收藏 - 共 {} 条", removed);
        Ok(removed)
    }

    pub fn find_by_theme(&self, theme: &str) -> Result<Option<CollectionRecord>, AppError> {
        let theme = normalize_theme(theme);
        self.with_conn(|conn| {
            let Some(id) = find_by_theme(conn, &theme)? else {
                return Ok(None);
            };
            Ok(select(conn, CollectionKey::Id(id))?.into_iter().next())
        })
    }

    /// 用导入的记录整体替换收藏；任一条写入失败则全部回滚。
    pub fn replace_all(&self, records: &[CollectionRecord]) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(|e| {
                AppError::Database(format!("开始事务失败: {}", e))
            })?;

            remove(&tx, CollectionKey::All)?;
            for record in records {
                upsert(&tx, record)?;
            }

            tx.commit().map_err(|e| AppError::Database(format!("提交事务失败: {}", e)))?;
            log::info!("📥 收藏已替换 - 共 {} 条", records.len());
            Ok(())
        })
    }
}
