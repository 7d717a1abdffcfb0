//! 整数缩放系数计算
//!
//! 纯函数：给定源边长与目标边长，求最小的整数倍数使源图覆盖目标。
//! 调用方保证源边长为正。

/// 最小整数 `k`，满足 `source_dimension * k >= target_dimension`。
///
/// 即 `ceil(target / source)`；目标为 0 时返回 0。
pub fn scale_factor_to_cover(source_dimension: u32, target_dimension: u32) -> u32 {
    debug_assert!(source_dimension > 0);
    target_dimension.div_ceil(source_dimension)
}

/// 两个方向各自求覆盖系数后取最大值，保证缩放后的图在宽高上都覆盖画布。
pub fn auto_scale_factor(source: (u32, u32), target: (u32, u32)) -> u32 {
    let (source_width, source_height) = source;
    let (target_width, target_height) = target;
    scale_factor_to_cover(source_height, target_height)
        .max(scale_factor_to_cover(source_width, target_width))
}
