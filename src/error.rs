use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone)]
pub enum Error {
  #[error("invalid buffer length")]
  InvalidBufferLength,

  /// The capture runtime could not be initialized.
  /// This can be retried.
  #[error("runtime init failed: {0}")]
  Bootstrap(Box<Error>),

  #[error("window capture is not supported on this system")]
  Unsupported,

  /// No usable GPU device.
  /// The [`SessionManager`](crate::SessionManager) that reported this can't be reused.
  #[error("device creation failed: {0}")]
  DeviceCreation(Box<Error>),

  #[error("capture device is not ready")]
  DeviceNotReady,

  #[error("window not found: {title:?} ({class_name:?})")]
  TargetNotFound { title: String, class_name: String },

  #[error("window not visible")]
  TargetNotVisible,

  /// Usually the window is minimized.
  #[error("invalid window size: {width}x{height}")]
  InvalidTargetSize { width: i32, height: i32 },

  #[error("start capture failed: {0}")]
  SessionStart(Box<Error>),

  #[error("readback failed: {0}")]
  Readback(Box<Error>),

  #[error("failed to allocate {0} bytes for a frame")]
  Allocation(usize),

  /// A Windows error.
  #[cfg(windows)]
  #[error("{api}: {err}")]
  Windows {
    api: &'static str,
    err: windows::core::Error,
  },
}

impl Error {
  #[inline]
  pub(crate) fn bootstrap(err: Error) -> Self {
    Self::Bootstrap(Box::new(err))
  }

  #[inline]
  pub(crate) fn device_creation(err: Error) -> Self {
    Self::DeviceCreation(Box::new(err))
  }

  /// Wrap `err` as a session start failure, unless it already names a more specific stage.
  pub(crate) fn session_start(err: Error) -> Self {
    match err {
      Self::InvalidTargetSize { .. } | Self::SessionStart(_) | Self::Allocation(_) => err,
      err => Self::SessionStart(Box::new(err)),
    }
  }

  #[inline]
  pub(crate) fn readback(err: Error) -> Self {
    Self::Readback(Box::new(err))
  }

  /// Create a new Windows error.
  #[cfg(windows)]
  #[inline]
  const fn windows(api: &'static str, err: windows::core::Error) -> Self {
    Self::Windows { api, err }
  }

  /// Create a new Windows error from `GetLastError`.
  #[cfg(windows)]
  #[inline]
  pub(crate) fn last_win_err(api: &'static str) -> Self {
    Self::windows(api, windows::core::Error::from_win32())
  }

  /// Return an error mapper to convert a Windows error to an [`Error`].
  #[cfg(windows)]
  #[inline]
  pub(crate) fn from_win_err(api: &'static str) -> impl FnOnce(windows::core::Error) -> Self {
    move |e| Self::windows(api, e)
  }
}
