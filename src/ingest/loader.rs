//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（本地文件 / 宿主传入的字节 / Base64）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验，尽快失败，减少不必要的内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 文件：metadata 体积限制 + 异步读取。
//! - Base64：格式解析 + 解码前体积估算 + 解码后体积限制。
//! - 所有来源最后都做一次文件签名探测，非图片内容直接拒绝。

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use super::IngestConfig;
use crate::compositor::ImageError;

/// 加载后的原始图片数据。
#[derive(Debug, Clone)]
pub struct RawImageData {
    pub bytes: Vec<u8>,
    /// 显示名（不含扩展名）。
    pub name: String,
    /// 由文件签名推断的扩展名（如 `png`）。
    pub extension: String,
    pub source_hint: &'static str,
}

/// 从本地路径加载图片原始字节。
pub async fn load_from_file(path: &Path, config: &IngestConfig) -> Result<RawImageData, ImageError> {
    log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        ImageError::FileSystem(format!("无法读取文件信息：{}（{}）", path.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(ImageError::FileSystem(format!("不是文件：{}", path.display())));
    }
    validate_file_size(metadata.len(), config)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ImageError::FileSystem(format!("无法读取图片文件：{}", e)))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    from_bytes(&file_name, bytes, config, "file")
}

/// 宿主已读出的文件内容（例如 Web 端的 `File` 对象）。
pub fn load_from_bytes(
    file_name: &str,
    bytes: Vec<u8>,
    config: &IngestConfig,
) -> Result<RawImageData, ImageError> {
    log::info!("📦 开始处理图片字节 - 文件名: {} 大小: {} B", file_name, bytes.len());
    from_bytes(file_name, bytes, config, "bytes")
}

/// 从 Base64 字符串（可带 Data URL 头）加载图片原始字节。
pub fn load_from_base64(
    file_name: &str,
    data: &str,
    config: &IngestConfig,
) -> Result<RawImageData, ImageError> {
    log::info!("📝 开始处理 base64 图片");
    let bytes = parse_base64_with_limit(data, config.max_file_size)?;
    from_bytes(file_name, bytes, config, "base64")
}

fn from_bytes(
    file_name: &str,
    bytes: Vec<u8>,
    config: &IngestConfig,
    source_hint: &'static str,
) -> Result<RawImageData, ImageError> {
    validate_file_size(bytes.len() as u64, config)?;
    let extension = validate_image_signature(&bytes)?;

    Ok(RawImageData {
        bytes,
        name: display_name(file_name),
        extension,
        source_hint,
    })
}

fn validate_file_size(len: u64, config: &IngestConfig) -> Result<(), ImageError> {
    if len > config.max_file_size {
        return Err(ImageError::ResourceLimit(format!(
            "文件过大：{:.2} MB（限制：{:.2} MB）",
            len as f64 / 1024.0 / 1024.0,
            config.max_file_size as f64 / 1024.0 / 1024.0
        )));
    }
    Ok(())
}

/// 去掉最后一个扩展名作为显示名；没有扩展名时原样保留。
pub fn display_name(file_name: &str) -> String {
    let trimmed = file_name.trim();
    match trimmed.rfind('.') {
        Some(index) if index > 0 => trimmed[..index].to_string(),
        _ => trimmed.to_string(),
    }
}

/// 校验文件签名，返回推断出的扩展名。
///
/// 空内容与无法识别的内容视为格式错误，识别出的非图片类型视为不支持的输入。
pub fn validate_image_signature(bytes: &[u8]) -> Result<String, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::InvalidFormat("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| ImageError::InvalidFormat("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(ImageError::Unsupported(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(kind.extension().to_string())
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, ImageError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| ImageError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| ImageError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, ImageError> {
    let normalized = data.trim();

    let payload = if normalized.starts_with("data:") {
        if !normalized.starts_with("data:image/") {
            return Err(ImageError::Unsupported("Data URL 不是图片类型".to_string()));
        }
        let base64_start = normalized
            .find(";base64,")
            .ok_or_else(|| ImageError::InvalidFormat("缺少 base64 标记".to_string()))?;
        &normalized[base64_start + 8..]
    } else {
        normalized
    };

    let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
    if estimated_len > max_file_size {
        return Err(ImageError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ImageError::Decode(format!("Base64 解码失败：{}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::encode::{encode_png, to_data_uri};
    use image::{Rgb, RgbImage};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("albedo_loader_test_{}", nanos));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn png_bytes() -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]))).expect("png")
    }

    #[test]
    fn display_name_strips_last_extension() {
        assert_eq!(display_name("snes.png"), "snes");
        assert_eq!(display_name("game.boy.advance.jpg"), "game.boy.advance");
        assert_eq!(display_name("noext"), "noext");
        assert_eq!(display_name(".hidden"), ".hidden");
    }

    #[test]
    fn signature_check_accepts_images_and_reports_extension() {
        assert_eq!(validate_image_signature(&png_bytes()).expect("png"), "png");
    }

    #[test]
    fn signature_check_rejects_non_images() {
        assert!(matches!(validate_image_signature(&[]), Err(ImageError::InvalidFormat(_))));
        assert!(matches!(
            validate_image_signature(b"plain text, not an image"),
            Err(ImageError::InvalidFormat(_))
        ));
        // PDF 签名：能识别但不是图片
        assert!(matches!(
            validate_image_signature(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3"),
            Err(ImageError::Unsupported(_))
        ));
    }

    #[test]
    fn base64_data_url_is_decoded() {
        let uri = to_data_uri("image/png", &png_bytes());
        let raw = load_from_base64("pasted.png", &uri, &IngestConfig::default()).expect("load");
        assert_eq!(raw.bytes, png_bytes());
        assert_eq!(raw.name, "pasted");
        assert_eq!(raw.extension, "png");
        assert_eq!(raw.source_hint, "base64");
    }

    #[test]
    fn base64_over_limit_is_rejected_before_decode() {
        let config = IngestConfig {
            max_file_size: 8,
            ..IngestConfig::default()
        };
        let result = load_from_base64("big", &"A".repeat(64), &config);
        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    #[test]
    fn non_image_data_url_is_unsupported() {
        let result = load_from_base64("note", "data:text/plain;base64,aGVsbG8=", &IngestConfig::default());
        assert!(matches!(result, Err(ImageError::Unsupported(_))));
    }

    #[tokio::test]
    async fn file_loading_checks_size_and_signature() {
        let dir = unique_temp_dir();
        let image_path = dir.join("gba.png");
        fs::write(&image_path, png_bytes()).expect("write png");

        let raw = load_from_file(&image_path, &IngestConfig::default()).await.expect("load");
        assert_eq!(raw.name, "gba");
        assert_eq!(raw.source_hint, "file");

        let small_limit = IngestConfig {
            max_file_size: 4,
            ..IngestConfig::default()
        };
        assert!(matches!(
            load_from_file(&image_path, &small_limit).await,
            Err(ImageError::ResourceLimit(_))
        ));

        let missing = load_from_file(&dir.join("missing.png"), &IngestConfig::default()).await;
        assert!(matches!(missing, Err(ImageError::FileSystem(_))));

        let _ = fs::remove_dir_all(&dir);
    }
}
