/// Reference double-press window in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 500;

/// Classifies cancel presses into single and double presses.
///
/// The last press time is private to this type. Callers that hand the cancel
/// key to another interaction call [`GestureDetector::reset_timer`] so that a
/// stray earlier press is never promoted to a double on return.
#[derive(Debug, Clone)]
pub struct GestureDetector {
    window_ms: u64,
    last_press: Option<u64>,
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

impl GestureDetector {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last_press: None,
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Register a press at `now_ms`. Returns true when it completes a double press.
    pub fn on_cancel_pressed(&mut self, now_ms: u64) -> bool {
        let is_double = match self.last_press {
            Some(last) => now_ms
                .checked_sub(last)
                .is_some_and(|dt| dt > 0 && dt <= self.window_ms),
            None => false,
        };
        self.last_press = Some(now_ms);
        is_double
    }

    pub fn reset_timer(&mut self) {
        self.last_press = None;
    }
}
