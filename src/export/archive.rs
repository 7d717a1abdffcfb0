//! 壁纸包（ZIP）构建
//!
//! 布局：
//! ```text
//! <tag>.jpg
//! blurred/<tag>.blurred.jpg
//! ```

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::compositor::encode::decode_data_uri;
use crate::db::{is_safe_theme, normalize_theme, CollectionRecord};
use crate::error::AppError;

const ALL_ARCHIVE_NAME: &str = "wallpapers.zip";
const BLURRED_DIR: &str = "blurred";

/// 导出全部或单个标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipTarget<'a> {
    All,
    Tag(&'a str),
}

/// 已构建好的压缩包
#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

fn decode_entry(record: &CollectionRecord, data_uri: &str, kind: &str) -> Result<Vec<u8>, AppError> {
    decode_data_uri(data_uri).map_err(|e| {
        AppError::Export(format!("{} 的 {} 图片无法解码: {}", record.theme, kind, e))
    })
}

fn write_entry(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    path: &str,
    data: &[u8],
    options: FileOptions,
) -> Result<(), AppError> {
    zip.start_file(path, options)
        .map_err(|e| AppError::Export(format!("写入压缩条目 {} 失败: {}", path, e)))?;
    zip.write_all(data)
        .map_err(|e| AppError::Export(format!("写入压缩数据 {} 失败: {}", path, e)))?;
    Ok(())
}

/// 按目标挑选记录并打包。空收藏或找不到标签时报错。
pub fn build_zip(records: &[CollectionRecord], target: ZipTarget<'_>) -> Result<ExportArchive, AppError> {
    let (selected, file_name): (Vec<&CollectionRecord>, String) = match target {
        ZipTarget::All => (records.iter().collect(), ALL_ARCHIVE_NAME.to_string()),
        ZipTarget::Tag(tag) => {
            let tag = normalize_theme(tag);
            let found: Vec<_> = records.iter().filter(|r| r.theme == tag).collect();
            if found.is_empty() {
                return Err(AppError::Export(format!("收藏中没有标签 {}", tag)));
            }
            (found, format!("{}.zip", tag))
        }
    };

    if selected.is_empty() {
        return Err(AppError::Export("收藏为空，没有可导出的壁纸".to_string()));
    }
    if let Some(record) = selected.iter().find(|r| !is_safe_theme(&r.theme)) {
        return Err(AppError::Export(format!("标签 {:?} 不能用作文件名", record.theme)));
    }

    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for record in &selected {
        let normal = decode_entry(record, &record.file.normal, "normal")?;
        let blurred = decode_entry(record, &record.file.blurred, "blurred")?;

        write_entry(&mut zip, &format!("{}.jpg", record.theme), &normal, options)?;
        write_entry(
            &mut zip,
            &format!("{}/{}.blurred.jpg", BLURRED_DIR, record.theme),
            &blurred,
            options,
        )?;
    }

    let bytes = zip
        .finish()
        .map_err(|e| AppError::Export(format!("完成压缩包失败: {}", e)))?
        .into_inner();

    log::debug!("🗜️ 壁纸包已构建 - 文件: {} 条目: {}", file_name, selected.len() * 2);
    Ok(ExportArchive { file_name, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::ImageVariants;
    use std::io::Read;

    fn record(id: i64, theme: &str, normal: &str, blurred: &str) -> CollectionRecord {
        CollectionRecord {
            id,
            theme: theme.to_string(),
            full_name: String::new(),
            manufacturer: String::new(),
            file: ImageVariants {
                normal: format!("data:image/jpeg;base64,{normal}"),
                blurred: format!("data:image/jpeg;base64,{blurred}"),
                thumbnail: String::new(),
            },
        }
    }

    fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("open archive");
        let mut file = archive.by_name(name).expect("entry exists");
        let mut out = Vec::new();
        file.read_to_end(&mut out).expect("read entry");
        out
    }

    #[test]
    fn all_target_packs_every_record_with_blurred_subdir() {
        let records = vec![record(1, "nes", "AQID", "BAUG"), record(2, "snes", "BwgJ", "CgsM")];
        let archive = build_zip(&records, ZipTarget::All).expect("zip");

        assert_eq!(archive.file_name, "wallpapers.zip");
        assert_eq!(read_entry(&archive.bytes, "nes.jpg"), vec![1, 2, 3]);
        assert_eq!(read_entry(&archive.bytes, "blurred/nes.blurred.jpg"), vec![4, 5, 6]);
        assert_eq!(read_entry(&archive.bytes, "snes.jpg"), vec![7, 8, 9]);

        let archive = zip::ZipArchive::new(Cursor::new(archive.bytes.as_slice())).expect("open");
        assert_eq!(archive.len(), 4);
    }

    #[test]
    fn tag_target_only_contains_that_record() {
        let records = vec![record(1, "nes", "AQID", "BAUG"), record(2, "snes", "BwgJ", "CgsM")];
        let archive = build_zip(&records, ZipTarget::Tag("SNES")).expect("zip");

        assert_eq!(archive.file_name, "snes.zip");
        let reader = zip::ZipArchive::new(Cursor::new(archive.bytes.as_slice())).expect("open");
        assert_eq!(reader.len(), 2);
        assert_eq!(read_entry(&archive.bytes, "blurred/snes.blurred.jpg"), vec![10, 11, 12]);
    }

    #[test]
    fn empty_collection_and_unknown_tag_are_errors() {
        assert!(matches!(build_zip(&[], ZipTarget::All), Err(AppError::Export(_))));

        let records = vec![record(1, "nes", "AQID", "BAUG")];
        assert!(matches!(build_zip(&records, ZipTarget::Tag("gba")), Err(AppError::Export(_))));
    }

    #[test]
    fn path_like_tags_never_become_entry_names() {
        let records = vec![record(1, "nes", "AQID", "BAUG"), record(2, "../escaped", "BwgJ", "CgsM")];
        assert!(matches!(build_zip(&records, ZipTarget::All), Err(AppError::Export(_))));
        assert!(matches!(
            build_zip(&records, ZipTarget::Tag("../escaped")),
            Err(AppError::Export(_))
        ));
        assert!(build_zip(&records, ZipTarget::Tag("nes")).is_ok());
    }

    #[test]
    fn corrupt_payload_is_reported_per_record() {
        let records = vec![record(1, "nes", "@@@", "BAUG")];
        let err = build_zip(&records, ZipTarget::All).unwrap_err();
        assert!(err.to_string().contains("nes"));
    }
}
