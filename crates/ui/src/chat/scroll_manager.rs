use gpui::{Pixels, ScrollHandle, point};

/// Owns the transcript scroll handle and the deferred scroll-to-bottom request.
///
/// Requests are only fulfilled once the frame that lays out the new content has been
/// painted, so the target offset accounts for the rows that were just added.
pub struct ScrollManager {
    scroll_handle: ScrollHandle,
    pending_scroll_to_bottom: bool,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            scroll_handle: ScrollHandle::new(),
            pending_scroll_to_bottom: false,
        }
    }

    pub fn handle(&self) -> &ScrollHandle {
        &self.scroll_handle
    }

    pub fn request_scroll_to_bottom(&mut self) {
        self.pending_scroll_to_bottom = true;
    }

    pub fn has_pending_scroll(&self) -> bool {
        self.pending_scroll_to_bottom
    }

    /// Moves the viewport to the tail when a request is pending. Returns whether it did.
    pub fn apply_pending_scroll(&mut self) -> bool {
        if !std::mem::take(&mut self.pending_scroll_to_bottom) {
            return false;
        }

        let max_offset = self.scroll_handle.max_offset().height;
        let current_x = self.scroll_handle.offset().x;
        // GPUI scrolls down with negative Y offsets.
        let target_y = if max_offset > Pixels::ZERO {
            -max_offset
        } else {
            Pixels::ZERO
        };
        self.scroll_handle.set_offset(point(current_x, target_y));
        true
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_request_is_applied_once() {
        let mut manager = ScrollManager::new();
        assert!(!manager.apply_pending_scroll());

        manager.request_scroll_to_bottom();
        manager.request_scroll_to_bottom();
        assert!(manager.has_pending_scroll());
        assert!(manager.apply_pending_scroll());
        assert!(!manager.has_pending_scroll());
        assert!(!manager.apply_pending_scroll());
    }

    #[test]
    fn empty_content_keeps_offset_at_origin() {
        let mut manager = ScrollManager::new();
        manager.request_scroll_to_bottom();
        manager.apply_pending_scroll();

        assert_eq!(manager.handle().offset().y, Pixels::ZERO);
    }
}
