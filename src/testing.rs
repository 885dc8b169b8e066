//! In-memory doubles of the platform layer.

use crate::{
  copy_rows, matches_window, CaptureDevice, Error, Frame, Platform, Publisher, Result,
  StagingSlot, BYTES_PER_PIXEL,
};
use std::sync::{
  atomic::{AtomicBool, AtomicUsize, Ordering},
  Arc, Mutex,
};

/// Rows of a slot are aligned like a GPU does.
const ROW_ALIGNMENT: usize = 256;

/// A packed BGRA frame as the compositor would deliver it.
#[derive(Debug, Clone)]
pub struct Surface {
  pub width: u32,
  pub height: u32,
  pub data: Vec<u8>,
}

impl Surface {
  pub fn filled(width: u32, height: u32, value: u8) -> Self {
    Self {
      width,
      height,
      data: vec![value; Frame::buffer_size(width, height)],
    }
  }

  /// Every pixel is unique, so a sheared copy can't match.
  pub fn gradient(width: u32, height: u32) -> Self {
    let mut data = Vec::with_capacity(Frame::buffer_size(width, height));
    for y in 0..height {
      for x in 0..width {
        data.extend_from_slice(&[x as u8, (x >> 8) as u8, y as u8, (y >> 8) as u8]);
      }
    }
    Self {
      width,
      height,
      data,
    }
  }
}

/// A staging slot whose rows are padded to [`ROW_ALIGNMENT`].
#[derive(Debug)]
pub struct MemorySlot {
  width: u32,
  height: u32,
  row_pitch: usize,
  pixels: Mutex<Vec<u8>>,
  fail_reads: Arc<AtomicBool>,
}

impl MemorySlot {
  pub fn new(width: u32, height: u32) -> Self {
    Self::with_failure(width, height, Arc::default())
  }

  fn with_failure(width: u32, height: u32, fail_reads: Arc<AtomicBool>) -> Self {
    let line_bytes = width as usize * BYTES_PER_PIXEL;
    let row_pitch = line_bytes.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT;
    Self {
      width,
      height,
      row_pitch,
      pixels: Mutex::new(vec![0xEE; row_pitch * height as usize]),
      fail_reads,
    }
  }

  pub fn fail_reads(&self, fail: bool) {
    self.fail_reads.store(fail, Ordering::SeqCst);
  }
}

impl StagingSlot for MemorySlot {
  type Source = Surface;

  fn copy_from(&self, source: &Surface) -> Result<()> {
    if source.width != self.width || source.height != self.height {
      return Err(Error::InvalidBufferLength);
    }

    let line_bytes = self.width as usize * BYTES_PER_PIXEL;
    let mut pixels = self.pixels.lock().unwrap();
    for (dest, src) in pixels
      .chunks_mut(self.row_pitch)
      .zip(source.data.chunks(line_bytes))
    {
      dest[..line_bytes].copy_from_slice(src);
    }
    Ok(())
  }

  fn read(&self) -> Result<Frame> {
    if self.fail_reads.load(Ordering::SeqCst) {
      return Err(Error::readback(Error::Unsupported));
    }
    let pixels = self.pixels.lock().unwrap();
    copy_rows(&pixels, self.row_pitch, self.width, self.height).map_err(Error::readback)
  }
}

/// A window known to [`FakePlatform`].
#[derive(Debug, Clone)]
pub struct Window {
  pub title: String,
  pub class_name: String,
  pub width: i32,
  pub height: i32,
  pub visible: bool,
}

impl Window {
  pub fn new(title: &str, class_name: &str, width: i32, height: i32) -> Self {
    Self {
      title: title.to_string(),
      class_name: class_name.to_string(),
      width,
      height,
      visible: true,
    }
  }

  pub fn hidden(mut self) -> Self {
    self.visible = false;
    self
  }
}

#[derive(Debug, Default)]
struct DeviceState {
  /// Every publisher ever handed out, stopped sessions included.
  publishers: Vec<Publisher<MemorySlot>>,
  live: usize,
  started: usize,
  fail_next_session: bool,
}

/// A device that delivers frames when the test calls [`FakeDevice::deliver`].
#[derive(Debug, Clone, Default)]
pub struct FakeDevice {
  state: Arc<Mutex<DeviceState>>,
  fail_reads: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct FakeSession;

impl FakeDevice {
  /// Deliver `surface` to every session that ever started, like a late callback would.
  pub fn deliver(&self, surface: &Surface) {
    let publishers = self.state.lock().unwrap().publishers.clone();
    for publisher in publishers {
      publisher.publish(surface);
    }
  }

  pub fn live_sessions(&self) -> usize {
    self.state.lock().unwrap().live
  }

  pub fn sessions_started(&self) -> usize {
    self.state.lock().unwrap().started
  }

  pub fn fail_next_session(&self) {
    self.state.lock().unwrap().fail_next_session = true;
  }

  pub fn fail_reads(&self, fail: bool) {
    self.fail_reads.store(fail, Ordering::SeqCst);
  }
}

impl CaptureDevice for FakeDevice {
  type Target = Window;
  type Slot = MemorySlot;
  type Item = (i32, i32);
  type Session = FakeSession;

  fn create_item(&self, target: &Window) -> Result<(i32, i32)> {
    Ok((target.width, target.height))
  }

  fn item_size(&self, item: &(i32, i32)) -> Result<(i32, i32)> {
    Ok(*item)
  }

  fn create_slot(&self, width: u32, height: u32) -> Result<MemorySlot> {
    Ok(MemorySlot::with_failure(
      width,
      height,
      Arc::clone(&self.fail_reads),
    ))
  }

  fn start_session(
    &self,
    _item: &(i32, i32),
    _width: u32,
    _height: u32,
    publisher: Publisher<MemorySlot>,
  ) -> Result<FakeSession> {
    let mut state = self.state.lock().unwrap();
    // the callback is registered before the platform refuses to start
    state.publishers.push(publisher);
    if std::mem::take(&mut state.fail_next_session) {
      return Err(Error::Unsupported);
    }
    state.live += 1;
    state.started += 1;
    Ok(FakeSession)
  }

  fn stop_session(&self, _session: FakeSession) {
    self.state.lock().unwrap().live -= 1;
  }
}

#[derive(Debug, Default)]
pub struct FakePlatform {
  windows: Mutex<Vec<Window>>,
  device: FakeDevice,
  devices_created: AtomicUsize,
  bootstrap_failures: AtomicUsize,
  device_failures: AtomicUsize,
}

impl FakePlatform {
  pub fn add_window(&self, window: Window) {
    self.windows.lock().unwrap().push(window);
  }

  /// The device every successful [`Platform::create_device`] returns.
  pub fn device(&self) -> FakeDevice {
    self.device.clone()
  }

  pub fn devices_created(&self) -> usize {
    self.devices_created.load(Ordering::SeqCst)
  }

  /// Fail the next `times` bootstraps.
  pub fn fail_bootstrap(&self, times: usize) {
    self.bootstrap_failures.store(times, Ordering::SeqCst);
  }

  /// Fail the next `times` device creations.
  pub fn fail_device(&self, times: usize) {
    self.device_failures.store(times, Ordering::SeqCst);
  }
}

fn take_failure(counter: &AtomicUsize) -> bool {
  counter
    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
    .is_ok()
}

impl Platform for FakePlatform {
  type Device = FakeDevice;

  fn ensure_ready(&self) -> Result<()> {
    if take_failure(&self.bootstrap_failures) {
      return Err(Error::Unsupported);
    }
    Ok(())
  }

  fn create_device(&self) -> Result<FakeDevice> {
    if take_failure(&self.device_failures) {
      return Err(Error::Unsupported);
    }
    self.devices_created.fetch_add(1, Ordering::SeqCst);
    Ok(self.device.clone())
  }

  fn find_window(&self, title: &str, class_name: &str) -> Result<Option<Window>> {
    Ok(
      self
        .windows
        .lock()
        .unwrap()
        .iter()
        .find(|w| matches_window(&w.title, &w.class_name, title, class_name))
        .cloned(),
    )
  }

  fn is_visible(&self, target: &Window) -> bool {
    target.visible
  }
}

#[cfg(windows)]
pub use self::win32::TestWindow;

#[cfg(windows)]
mod win32 {
  use windows::{
    core::HSTRING,
    Win32::{
      Foundation::HWND,
      UI::WindowsAndMessaging::{CreateWindowExW, DestroyWindow, WINDOW_EX_STYLE, WINDOW_STYLE},
    },
  };

  /// A top-level `STATIC` window owned by the test thread, destroyed on drop.
  pub struct TestWindow(pub HWND);

  impl TestWindow {
    pub fn new(title: &str, style: WINDOW_STYLE) -> Self {
      let handle = unsafe {
        CreateWindowExW(
          WINDOW_EX_STYLE::default(),
          &HSTRING::from("STATIC"),
          &HSTRING::from(title),
          style,
          0,
          0,
          801,
          600,
          None,
          None,
          None,
          None,
        )
      }
      .unwrap();
      Self(handle)
    }
  }

  impl Drop for TestWindow {
    fn drop(&mut self) {
      unsafe { DestroyWindow(self.0) }.unwrap();
    }
  }
}
