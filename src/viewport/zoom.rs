//! 屏幕显示缩放
//!
//! 仅影响画布在屏幕上的显示比例（纯视图变换），不会触发重新合成。

pub const MIN_DISPLAY_ZOOM: u32 = 10;
pub const MAX_DISPLAY_ZOOM: u32 = 300;
pub const DISPLAY_ZOOM_STEP: u32 = 5;
pub const DEFAULT_DISPLAY_ZOOM: u32 = 50;

/// 显示缩放百分比，保证落在 10%–300% 之间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayZoom(u32);

impl DisplayZoom {
    /// 超出范围的值被拒绝，返回 `None`。
    #[must_use]
    pub fn new(percent: u32) -> Option<Self> {
        (MIN_DISPLAY_ZOOM..=MAX_DISPLAY_ZOOM)
            .contains(&percent)
            .then_some(Self(percent))
    }

    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }

    /// 作为 CSS/视图缩放系数（100% → 1.0）。
    #[must_use]
    pub fn as_factor(self) -> f32 {
        self.0 as f32 / 100.0
    }

    #[must_use]
    pub fn zoom_in(self) -> Self {
        Self((self.0 + DISPLAY_ZOOM_STEP).min(MAX_DISPLAY_ZOOM))
    }

    #[must_use]
    pub fn zoom_out(self) -> Self {
        Self(self.0.saturating_sub(DISPLAY_ZOOM_STEP).max(MIN_DISPLAY_ZOOM))
    }

    /// 滚轮向上放大、向下缩小，零位移不变。
    #[must_use]
    pub fn apply_wheel(self, delta_y: f64) -> Self {
        if delta_y < 0.0 {
            self.zoom_in()
        } else if delta_y > 0.0 {
            self.zoom_out()
        } else {
            self
        }
    }
}

impl Default for DisplayZoom {
    fn default() -> Self {
        Self(DEFAULT_DISPLAY_ZOOM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fifty_percent() {
        assert_eq!(DisplayZoom::default().value(), 50);
        assert!((DisplayZoom::default().as_factor() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(DisplayZoom::new(9).is_none());
        assert!(DisplayZoom::new(301).is_none());
        assert_eq!(DisplayZoom::new(300).map(DisplayZoom::value), Some(300));
    }

    #[test]
    fn wheel_steps_by_five_and_stops_at_bounds() {
        let zoom = DisplayZoom::default();
        assert_eq!(zoom.apply_wheel(-1.0).value(), 55);
        assert_eq!(zoom.apply_wheel(3.0).value(), 45);
        assert_eq!(zoom.apply_wheel(0.0).value(), 50);

        let max = DisplayZoom::new(300).expect("max");
        assert_eq!(max.zoom_in().value(), 300);
        let min = DisplayZoom::new(10).expect("min");
        assert_eq!(min.zoom_out().value(), 10);
    }
}
