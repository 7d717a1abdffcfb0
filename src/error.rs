//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，作为所有对外 API 的错误类型，
//! 替代各模块中分散的 `.map_err(|e| e.to_string())` 与 `expect()`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ImageError` / `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，宿主 UI 经 IPC 直接展示。

use serde::Serialize;

use crate::compositor::ImageError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片处理流水线错误（导入 / 解码 / 合成 / 编码）
    #[error("{0}")]
    Image(#[from] ImageError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置值越界或无效
    #[error("设置无效: {0}")]
    Settings(String),

    /// 设置文件读写失败
    #[error("存储不可用: {0}")]
    Storage(String),

    /// 数据库操作失败
    #[error("数据库错误: {0}")]
    Database(String),

    /// 收藏操作被拒绝（重复、空名、无图、不存在）
    #[error("{0}")]
    Collection(String),

    /// 导出 / 导入失败
    #[error("导出失败: {0}")]
    Export(String),

    /// 调度器无法启动（不在 tokio 运行时内）
    #[error("调度器错误: {0}")]
    Scheduler(String),
}

/// 宿主 IPC 要求返回值实现 `Serialize`。
/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
