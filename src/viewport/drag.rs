//! 拖拽状态
//!
//! 记录拖拽起点与起始平移量，按指针位移计算新的平移量。

use crate::compositor::PanOffset;

/// 拖拽状态
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub is_dragging: bool,

    /// 按下时的指针位置（画布坐标）
    pub start_position: Option<(f64, f64)>,

    /// 按下时的平移量，取消拖拽时据此还原
    pub start_pan: Option<PanOffset>,
}

impl DragState {
    pub fn start(&mut self, position: (f64, f64), pan: PanOffset) {
        self.is_dragging = true;
        self.start_position = Some(position);
        self.start_pan = Some(pan);
    }

    /// 结束拖拽，返回起始平移量。
    pub fn stop(&mut self) -> Option<PanOffset> {
        self.is_dragging = false;
        self.start_position = None;
        self.start_pan.take()
    }

    /// 图像跟随指针移动：新平移量 = 起始平移量 + 指针位移。
    #[must_use]
    pub fn calculate_pan(&self, current_position: (f64, f64)) -> Option<PanOffset> {
        if !self.is_dragging {
            return None;
        }

        let (start_x, start_y) = self.start_position?;
        let start_pan = self.start_pan?;

        Some(start_pan.translated(current_position.0 - start_x, current_position.1 - start_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_drag_state_is_not_dragging() {
        let state = DragState::default();
        assert!(!state.is_dragging);
        assert!(state.calculate_pan((10.0, 10.0)).is_none());
    }

    #[test]
    fn pan_follows_pointer_delta() {
        let mut state = DragState::default();
        state.start((200.0, 150.0), PanOffset::new(240.0, 160.0));

        let pan = state.calculate_pan((180.0, 170.0));
        assert_eq!(pan, Some(PanOffset::new(220.0, 180.0)));
    }

    #[test]
    fn stop_returns_start_pan_and_clears_state() {
        let mut state = DragState::default();
        state.start((1.0, 2.0), PanOffset::new(3.0, 4.0));

        assert_eq!(state.stop(), Some(PanOffset::new(3.0, 4.0)));
        assert!(!state.is_dragging);
        assert!(state.start_position.is_none());
        assert!(state.stop().is_none());
    }
}
