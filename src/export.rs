//! 导出模块
//!
//! # 设计思路
//!
//! 收藏里的记录以 Data URL 保存，导出时有两种形态：
//! - 壁纸包（ZIP）：正常图放在根目录，模糊图放在 `blurred/` 子目录；
//! - 项目备份（JSON）：完整记录数组，可再导入恢复收藏。
//!
//! # 实现思路
//!
//! - 构建内容的函数只做纯数据变换（记录 → 字节 / 字符串），便于测试；
//! - `save_*` 系列负责落盘，文件名按规则生成。

use std::fs;
use std::path::{Path, PathBuf};

use crate::db::{CollectionKey, CollectionStore};
use crate::error::AppError;

mod archive;
mod project;

pub use archive::{build_zip, ExportArchive, ZipTarget};
pub use project::{default_project_file_name, export_project, import_project, parse_project};

fn write_output(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    // 只接受单层文件名，导出结果不能落到目录之外
    if Path::new(file_name).file_name().and_then(|name| name.to_str()) != Some(file_name) {
        return Err(AppError::Export(format!("导出文件名无效: {}", file_name)));
    }
    fs::create_dir_all(dir)
        .map_err(|e| AppError::Export(format!("创建导出目录失败: {}", e)))?;
    let path = dir.join(file_name);
    fs::write(&path, bytes)
        .map_err(|e| AppError::Export(format!("写入导出文件失败: {}", e)))?;
    log::info!("📦 导出完成 - 路径: {} 大小: {} 字节", path.display(), bytes.len());
    Ok(path)
}

/// 把壁纸包写入目录，返回文件路径。
pub fn save_zip(store: &CollectionStore, target: ZipTarget<'_>, dir: &Path) -> Result<PathBuf, AppError> {
    let records = store.get(CollectionKey::All)?;
    let archive = build_zip(&records, target)?;
    write_output(dir, &archive.file_name, &archive.bytes)
}

/// 把项目备份写入目录，文件名带本地时间戳。
pub fn save_project(store: &CollectionStore, dir: &Path) -> Result<PathBuf, AppError> {
    let records = store.get(CollectionKey::All)?;
    let content = export_project(&records)?;
    let file_name = default_project_file_name(chrono::Local::now());
    write_output(dir, &file_name, content.as_bytes())
}

/// 从文件导入项目备份，返回导入条数。
pub fn load_project(store: &CollectionStore, path: &Path) -> Result<usize, AppError> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::Export(format!("读取项目文件失败: {}", e)))?;
    import_project(store, &content)
}
