//! 数据库模块
//!
//! # 设计思路
//!
//! 系统收藏（每个游戏系统对应一张裁剪好的壁纸）持久化在 SQLite 中，
//! 使用 `rusqlite` 直接操作，连接由 `Mutex` 串行化。
//!
//! 存储契约只有三个动作：按 id 或全部读取、按 id 覆盖写入、按 id 或全部删除。
//! 添加 / 改名 / 替换图片等收藏规则建立在这三个动作之上（见 `collection`）。

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::compositor::ImageVariants;
use crate::error::AppError;

mod collection;
mod schema;

pub use collection::NewSystem;
pub(crate) use collection::{is_safe_theme, normalize_theme};

// ============================================================================
// 数据模型
// ============================================================================

/// 收藏中的一条系统记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    /// 创建时间（毫秒），兼作主键
    pub id: i64,
    /// 系统标签（小写），收藏内唯一
    pub theme: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub manufacturer: String,
    /// 合成结果的 Data URL 三元组
    pub file: ImageVariants,
}

/// 读取 / 删除的目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKey {
    Id(i64),
    All,
}

// ============================================================================
// 连接封装
// ============================================================================

pub struct CollectionStore {
    conn: Mutex<Connection>,
}

impl CollectionStore {
    /// 打开（必要时创建）数据库文件并初始化表结构。
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Database(format!("创建数据库目录失败: {}", e))
            })?;
        }
        log::info!("数据库路径: {}", path.display());

        let conn = Connection::open(path).map_err(|e| {
            AppError::Database(format!("打开数据库失败: {}", e))
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AppError::Database(format!("打开内存数据库失败: {}", e))
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        schema::initialize_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub(crate) fn with_conn<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let conn = self.conn.lock().map_err(|e| {
            AppError::Database(format!("获取数据库锁失败: {}", e))
        })?;
        op(&conn)
    }

    /// 按 id 或全部读取，按 id 升序（即添加顺序）。
    pub fn get(&self, key: CollectionKey) -> Result<Vec<CollectionRecord>, AppError> {
        self.with_conn(|conn| collection::select(conn, key))
    }

    /// 按 id 覆盖写入；id 不存在时插入。
    pub fn put(&self, record: &CollectionRecord) -> Result<(), AppError> {
        self.with_conn(|conn| collection::upsert(conn, record))
    }

    /// 按 id 或全部删除，返回删除条数。
    pub fn delete(&self, key: CollectionKey) -> Result<usize, AppError> {
        self.with_conn(|conn| collection::remove(conn, key))
    }
}
