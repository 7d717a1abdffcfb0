//! Schema 初始化子模块
//!
//! ## 职责
//! - 创建系统收藏表 `system_collection`
//! - 通过 `PRAGMA user_version` 记录版本，便于后续迁移
//!
//! ## 错误语义
//! - DDL 失败统一映射为 `AppError::Database`

use rusqlite::Connection;

use crate::error::AppError;

const SCHEMA_VERSION: i64 = 1;

fn get_user_version(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| AppError::Database(format!("读取数据库版本失败: {}", e)))
}

fn set_user_version(conn: &Connection, version: i64) -> Result<(), AppError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| AppError::Database(format!("写入数据库版本失败: {}", e)))
}

fn create_collection_table(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS system_collection (
            id INTEGER PRIMARY KEY,
            theme TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL DEFAULT '',
            manufacturer TEXT NOT NULL DEFAULT '',
            normal TEXT NOT NULL,
            blurred TEXT NOT NULL,
            thumbnail TEXT NOT NULL DEFAULT ''
        );"
    ).map_err(|e| AppError::Database(format!("创建收藏表失败: {}", e)))
}

pub(super) fn initialize_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(|e| AppError::Database(format!("设置数据库参数失败: {}", e)))?;

    let version = get_user_version(conn)?;
    if version > SCHEMA_VERSION {
        log::warn!("⚠️ 数据库版本 {} 高于当前支持的 {}，按现有结构继续", version, SCHEMA_VERSION);
        return Ok(());
    }

    create_collection_table(conn)?;

    if version < SCHEMA_VERSION {
        set_user_version(conn, SCHEMA_VERSION)?;
        log::info!("🗄️ 数据库结构已升级到 v{}", SCHEMA_VERSION);
    }

    Ok(())
}
