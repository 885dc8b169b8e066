use crate::{CaptureDevice, Error, Frame, FrameExchange, Result, SessionManager};
use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex, MutexGuard, PoisonError,
};
use tracing::warn;

/// The capture target type of a [`Platform`].
pub type TargetOf<P> = <<P as Platform>::Device as CaptureDevice>::Target;

type SlotOf<P> = <<P as Platform>::Device as CaptureDevice>::Slot;

/// Process level collaborators of [`Capture`].
pub trait Platform {
  type Device: CaptureDevice;

  /// Make sure the capture runtime is initialized.
  /// Must be idempotent, a failure may be retried.
  fn ensure_ready(&self) -> Result<()>;

  fn create_device(&self) -> Result<Self::Device>;

  /// Look up a window by title and class name.
  /// Return [`None`] if nothing matches.
  fn find_window(&self, title: &str, class_name: &str) -> Result<Option<TargetOf<Self>>>;

  fn is_visible(&self, target: &TargetOf<Self>) -> bool;
}

/// The message of the most recent failure.
/// Overwritten, never appended.
#[derive(Debug, Default)]
pub struct LastError(Mutex<String>);

impl LastError {
  fn lock(&self) -> MutexGuard<'_, String> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Empty if there is no error.
  pub fn get(&self) -> String {
    self.lock().clone()
  }

  fn set(&self, err: &Error) {
    *self.lock() = err.to_string();
  }

  fn clear(&self) {
    self.lock().clear();
  }
}

/// Continuous capture of one window at a time.
///
/// [`Self::start`] and [`Self::stop`] are serialized by a lifecycle lock.
/// [`Self::poll`] only takes the lock of the frame buffers,
/// so it never waits for a start or stop in progress on another thread.
/// # Examples
/// ```no_run
/// # #[cfg(windows)] {
/// use rusty_window_capture::WindowCapture;
///
/// let capture = WindowCapture::default();
/// if capture.start("Untitled - Notepad", "Notepad").is_err() {
///   println!("{}", capture.last_error());
/// }
/// if let Some(frame) = capture.poll() {
///   println!("{}x{}", frame.width, frame.height);
/// }
/// capture.stop();
/// # }
/// ```
pub struct Capture<P: Platform> {
  platform: P,
  /// [`None`] until the first start, or after device creation failed.
  lifecycle: Mutex<Option<SessionManager<P::Device>>>,
  exchange: Arc<FrameExchange<SlotOf<P>>>,
  active: AtomicBool,
  last_error: LastError,
}

impl<P: Platform + Default> Default for Capture<P> {
  fn default() -> Self {
    Self::new(P::default())
  }
}

impl<P: Platform> Capture<P> {
  pub fn new(platform: P) -> Self {
    Self {
      platform,
      lifecycle: Mutex::new(None),
      exchange: Arc::new(FrameExchange::new()),
      active: AtomicBool::new(false),
      last_error: LastError::default(),
    }
  }

  #[inline]
  pub const fn platform(&self) -> &P {
    &self.platform
  }

  fn lock_lifecycle(&self) -> MutexGuard<'_, Option<SessionManager<P::Device>>> {
    self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Start capturing the window matching `title` and `class_name`.
  ///
  /// A capture in progress is stopped first, even if the new one fails.
  /// On failure the message is also available from [`Self::last_error`].
  pub fn start(&self, title: &str, class_name: &str) -> Result<()> {
    let mut lifecycle = self.lock_lifecycle();
    self.last_error.clear();

    self.active.store(false, Ordering::Release);
    if let Some(manager) = lifecycle.as_mut() {
      manager.stop();
    }

    let result = self.start_locked(&mut lifecycle, title, class_name);
    match &result {
      Ok(()) => self.active.store(true, Ordering::Release),
      Err(e) => {
        warn!(title, class_name, error = %e, "failed to start capture");
        self.last_error.set(e);
      }
    }
    result
  }

  fn start_locked(
    &self,
    lifecycle: &mut Option<SessionManager<P::Device>>,
    title: &str,
    class_name: &str,
  ) -> Result<()> {
    self.platform.ensure_ready().map_err(|e| match e {
      Error::Bootstrap(_) => e,
      e => Error::bootstrap(e),
    })?;

    let manager =
      lifecycle.get_or_insert_with(|| SessionManager::new(Arc::clone(&self.exchange)));
    if let Err(e) = manager
      .ensure_device_ready(|| self.platform.create_device())
      .map(|_| ())
    {
      // a manager whose device creation failed is replaced, not retried
      *lifecycle = None;
      return Err(e);
    }

    let target = self
      .platform
      .find_window(title, class_name)?
      .ok_or_else(|| Error::TargetNotFound {
        title: title.to_string(),
        class_name: class_name.to_string(),
      })?;

    if !self.platform.is_visible(&target) {
      return Err(Error::TargetNotVisible);
    }

    manager.start(&target)
  }

  /// Stop capturing. Does nothing if not capturing.
  ///
  /// When this returns, no frame delivered for the stopped capture can be polled.
  pub fn stop(&self) {
    let mut lifecycle = self.lock_lifecycle();
    self.active.store(false, Ordering::Release);
    if let Some(manager) = lifecycle.as_mut() {
      manager.stop();
    }
  }

  /// Return the latest frame without waiting for a new one.
  /// Return [`None`] if not capturing or no frame has arrived yet.
  ///
  /// A failed readback also returns [`None`], see [`Self::last_error`].
  pub fn poll(&self) -> Option<Frame> {
    if !self.active.load(Ordering::Acquire) {
      return None;
    }

    match self.exchange.try_read() {
      Ok(frame) => frame,
      Err(e) => {
        warn!(error = %e, "failed to read frame");
        self.last_error.set(&e);
        None
      }
    }
  }

  #[inline]
  pub fn is_capturing(&self) -> bool {
    self.active.load(Ordering::Acquire)
  }

  /// Frames received since the last successful [`Self::start`].
  #[inline]
  pub fn frame_count(&self) -> u64 {
    self.exchange.frame_count()
  }

  /// Size of the frames of the current capture.
  pub fn frame_size(&self) -> Option<(u32, u32)> {
    self.lock_lifecycle().as_ref().and_then(|m| m.frame_size())
  }

  /// Message of the most recent failure, or empty.
  ///
  /// Set by a failed [`Self::start`] and by a readback failure in [`Self::poll`].
  /// Only [`Self::start`] clears it, a successful poll leaves it in place.
  #[inline]
  pub fn last_error(&self) -> String {
    self.last_error.get()
  }
}
