/// Settings applied to every capture session.
///
/// Settings the platform rejects are logged and skipped, they never fail a start.
/// # Examples
/// ```
/// use rusty_window_capture::CaptureOptions;
///
/// let options = CaptureOptions::default().cursor_capture(false);
/// assert_eq!(options.frame_pool_buffers, 2);
/// assert!(!options.cursor_capture);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
  /// Number of buffers in the platform's frame pool.
  pub frame_pool_buffers: i32,
  /// Draw the mouse cursor into captured frames.
  pub cursor_capture: bool,
  /// Let the system draw a border around the captured window.
  pub border_required: bool,
}

impl Default for CaptureOptions {
  fn default() -> Self {
    Self {
      frame_pool_buffers: 2,
      cursor_capture: true,
      border_required: true,
    }
  }
}

impl CaptureOptions {
  /// Values below 1 are raised to 1.
  pub const fn frame_pool_buffers(mut self, buffers: i32) -> Self {
    self.frame_pool_buffers = if buffers < 1 { 1 } else { buffers };
    self
  }

  pub const fn cursor_capture(mut self, enabled: bool) -> Self {
    self.cursor_capture = enabled;
    self
  }

  pub const fn border_required(mut self, required: bool) -> Self {
    self.border_required = required;
    self
  }
}
