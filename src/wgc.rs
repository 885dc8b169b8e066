mod device;
mod slot;

pub use device::*;
pub use slot::*;

use crate::{window, CaptureOptions, Error, Platform, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use windows::{
  Graphics::Capture::GraphicsCaptureSession,
  Win32::{
    Foundation::{HWND, RPC_E_CHANGED_MODE},
    System::WinRT::{RoInitialize, RO_INIT_MULTITHREADED},
  },
};

/// [`Platform`] backed by Windows.Graphics.Capture and Direct3D 11.
///
/// Every [`Capture`](crate::Capture) owns its own instance,
/// so independent captures never share a device or error state.
/// # Examples
/// ```no_run
/// use rusty_window_capture::{Capture, CaptureOptions, Wgc};
///
/// let capture = Capture::new(Wgc::new(CaptureOptions::default().cursor_capture(false)));
/// capture.start("Untitled - Notepad", "Notepad").unwrap();
/// ```
#[derive(Debug, Default)]
pub struct Wgc {
  options: CaptureOptions,
  ready: AtomicBool,
}

impl Wgc {
  pub fn new(options: CaptureOptions) -> Self {
    Self {
      options,
      ready: AtomicBool::new(false),
    }
  }

  #[inline]
  pub const fn options(&self) -> &CaptureOptions {
    &self.options
  }
}

impl Platform for Wgc {
  type Device = WgcDevice;

  /// Initialize the Windows Runtime and check that window capture is supported.
  /// Only a success is remembered.
  fn ensure_ready(&self) -> Result<()> {
    if self.ready.load(Ordering::Acquire) {
      return Ok(());
    }

    initialize_runtime()?;
    self.ready.store(true, Ordering::Release);
    Ok(())
  }

  fn create_device(&self) -> Result<WgcDevice> {
    WgcDevice::new(self.options)
  }

  fn find_window(&self, title: &str, class_name: &str) -> Result<Option<HWND>> {
    window::find_capturable_window(title, class_name)
  }

  fn is_visible(&self, target: &HWND) -> bool {
    window::is_visible(*target)
  }
}

fn initialize_runtime() -> Result<()> {
  match unsafe { RoInitialize(RO_INIT_MULTITHREADED) } {
    Ok(()) => {}
    // the thread already lives in a single threaded apartment, the runtime is usable
    Err(e) if e.code() == RPC_E_CHANGED_MODE => {
      debug!("thread apartment already initialized in another mode")
    }
    Err(e) => return Err(Error::from_win_err(stringify!(RoInitialize))(e)),
  }

  let supported = GraphicsCaptureSession::IsSupported().map_err(Error::from_win_err(
    stringify!(GraphicsCaptureSession.IsSupported),
  ))?;
  if !supported {
    return Err(Error::Unsupported);
  }
  Ok(())
}
