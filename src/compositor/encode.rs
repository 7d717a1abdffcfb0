//! # 编码模块
//!
//! 位图 → JPEG/PNG 字节 → Data URL，以及 Data URL 的反向解析。
//!
//! - JPEG 用于 normal / blurred / thumbnail 三份输出，质量由配置给出
//! - PNG 仅用于源图回显，保证无损
//! - Data URL 头部剥离与 Base64 解码供导出与项目导入复用

use base64::{Engine as _, engine::general_purpose};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

use super::source::EncodedImage;
use super::ImageError;

pub const JPEG_MIME: &str = "image/jpeg";
pub const PNG_MIME: &str = "image/png";

/// 匹配 `data:<mime>;base64,` 前缀。
static DATA_URI_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:[^,]*,").expect("data uri header pattern"));

/// 以指定质量编码为 JPEG。
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<EncodedImage, ImageError> {
    let (width, height) = image.dimensions();
    let mut bytes = Vec::with_capacity((width as usize * height as usize) / 4);

    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder
        .encode_image(image)
        .map_err(|e| ImageError::Encode(format!("JPEG 编码失败：{}", e)))?;

    Ok(EncodedImage {
        width,
        height,
        mime: JPEG_MIME,
        bytes,
    })
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ImageError> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| ImageError::Encode(format!("PNG 编码失败：{}", e)))?;
    Ok(cursor.into_inner())
}

pub fn png_data_uri(image: &RgbImage) -> Result<String, ImageError> {
    let bytes = encode_png(image)?;
    Ok(to_data_uri(PNG_MIME, &bytes))
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// 去掉 Data URL 头部，返回 Base64 正文；没有头部时原样返回。
pub fn strip_data_uri_header(data_uri: &str) -> &str {
    let trimmed = data_uri.trim();
    match DATA_URI_HEADER.find(trimmed) {
        Some(header) => &trimmed[header.end()..],
        None => trimmed,
    }
}

/// 解析 Data URL（或裸 Base64）为原始字节。
pub fn decode_data_uri(data_uri: &str) -> Result<Vec<u8>, ImageError> {
    let payload = strip_data_uri_header(data_uri);
    if payload.is_empty() {
        return Err(ImageError::InvalidFormat("Data URL 内容为空".to_string()));
    }

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ImageError::Decode(format!("Base64 解码失败：{}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn jpeg_output_keeps_dimensions_and_signature() {
        let image = RgbImage::from_pixel(48, 32, Rgb([120, 60, 30]));
        let encoded = encode_jpeg(&image, 90).expect("encode");

        assert_eq!((encoded.width, encoded.height), (48, 32));
        assert_eq!(encoded.mime, JPEG_MIME);
        assert_eq!(&encoded.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn jpeg_encoding_is_deterministic() {
        let image = RgbImage::from_fn(40, 24, |x, y| Rgb([(x * 6) as u8, (y * 9) as u8, 77]));
        let first = encode_jpeg(&image, 90).expect("encode");
        let second = encode_jpeg(&image, 90).expect("encode");
        assert_eq!(first, second);
    }

    #[test]
    fn data_uri_round_trips_through_header_stripping() {
        let uri = to_data_uri(JPEG_MIME, &[1, 2, 3, 250]);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert_eq!(strip_data_uri_header(&uri), "AQID+g==");
        assert_eq!(decode_data_uri(&uri).expect("decode"), vec![1, 2, 3, 250]);
    }

    #[test]
    fn bare_base64_is_accepted() {
        assert_eq!(strip_data_uri_header("  AQID  "), "AQID");
        assert_eq!(decode_data_uri("AQID").expect("decode"), vec![1, 2, 3]);
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(
            decode_data_uri("data:image/jpeg;base64,"),
            Err(ImageError::InvalidFormat(_))
        ));
        assert!(matches!(decode_data_uri("data:image/jpeg;base64,@@@"), Err(ImageError::Decode(_))));
    }

    #[test]
    fn png_data_uri_decodes_back_to_same_pixels() {
        let image = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8 * 40, y as u8 * 80, 5]));
        let uri = png_data_uri(&image).expect("png");
        let bytes = decode_data_uri(&uri).expect("decode");
        let decoded = image::load_from_memory(&bytes).expect("load").to_rgb8();
        assert_eq!(decoded, image);
    }
}
