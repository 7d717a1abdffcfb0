//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 图片链路（导入 → 解码 → 合成 → 编码）的所有失败共用一个枚举，
//! 调用侧按分支匹配，而不是解析字符串。
//! 合成器内部的失败在 `Compositor::recompute` 处被吞掉（仅记日志），
//! 导入阶段的失败则原样返回给宿主 UI 作为用户可见提示。

/// 图片处理统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    /// 非图片输入（剪贴板里的文本、非图片文件等）。
    #[error("不支持的输入类型：{0}")]
    Unsupported(String),

    #[error("剪贴板错误：{0}")]
    Clipboard(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    /// 画布无法准备（零尺寸、超出上限或缓冲区分配失败）。
    #[error("画布不可用：{0}")]
    Canvas(String),

    #[error("编码错误：{0}")]
    Encode(String),
}

impl ImageError {
    /// 稳定的错误码，供宿主 UI 做本地化或埋点。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Unsupported(_) => "unsupported",
            Self::Clipboard(_) => "clipboard",
            Self::FileSystem(_) => "file_system",
            Self::ResourceLimit(_) => "resource_limit",
            Self::Canvas(_) => "canvas",
            Self::Encode(_) => "encode",
        }
    }
}

impl From<ImageError> for String {
    fn from(error: ImageError) -> Self {
        error.to_string()
    }
}
