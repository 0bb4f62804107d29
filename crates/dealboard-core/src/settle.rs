//! Layout-settle barrier: hold measurement requests until the host has
//! painted a number of consecutive frames since the layout change.

/// Requests waiting for the layout to stop moving.
#[derive(Debug)]
pub struct LayoutSettleBarrier<T> {
    frames_required: u8,
    waiting: Vec<(u8, T)>,
}

impl<T> LayoutSettleBarrier<T> {
    pub fn new(frames_required: u8) -> Self {
        Self {
            frames_required: frames_required.max(1),
            waiting: Vec::new(),
        }
    }

    /// Queue `request`; it is released after `frames_required` painted frames.
    pub fn arm(&mut self, request: T) {
        self.waiting.push((self.frames_required, request));
    }

    /// Report one painted frame. Returns the requests whose wait is over,
    /// oldest first.
    pub fn frame_painted(&mut self) -> Vec<T> {
        let mut released = Vec::new();
        let mut still_waiting = Vec::with_capacity(self.waiting.len());
        for (remaining, request) in self.waiting.drain(..) {
            if remaining <= 1 {
                released.push(request);
            } else {
                still_waiting.push((remaining - 1, request));
            }
        }
        self.waiting = still_waiting;
        released
    }

    /// The layout moved again (e.g. the viewport was resized): restart the
    /// count for everything still waiting.
    pub fn invalidate(&mut self) {
        for (remaining, _) in &mut self.waiting {
            *remaining = self.frames_required;
        }
    }

    pub fn clear(&mut self) {
        self.waiting.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_after_three_frames() {
        let mut b = LayoutSettleBarrier::new(3);
        b.arm("align");
        assert!(b.frame_painted().is_empty());
        assert!(b.frame_painted().is_empty());
        assert_eq!(b.frame_painted(), vec!["align"]);
        assert!(b.is_empty());
    }

    #[test]
    fn requests_count_independently() {
        let mut b = LayoutSettleBarrier::new(3);
        b.arm(1);
        b.frame_painted();
        b.arm(2);
        b.frame_painted();
        assert_eq!(b.frame_painted(), vec![1]);
        assert_eq!(b.frame_painted(), vec![2]);
    }

    #[test]
    fn invalidate_restarts_the_count() {
        let mut b = LayoutSettleBarrier::new(3);
        b.arm(1);
        b.frame_painted();
        b.frame_painted();
        b.invalidate();
        assert!(b.frame_painted().is_empty());
        assert!(b.frame_painted().is_empty());
        assert_eq!(b.frame_painted(), vec![1]);
    }

    #[test]
    fn zero_frames_means_one() {
        let mut b = LayoutSettleBarrier::new(0);
        b.arm(());
        assert_eq!(b.frame_painted().len(), 1);
    }
}
