use crate::{Error, FrameExchange, Publisher, Result, StagingSlot, SLOT_COUNT};
use std::sync::Arc;
use tracing::{info, warn};

/// A GPU device that can subscribe to the frames of a capture target.
pub trait CaptureDevice {
  /// What to capture, e.g. a window handle.
  type Target;
  type Slot: StagingSlot;
  /// The platform's representation of the target's visual content.
  type Item;
  /// A live frame subscription.
  type Session;

  fn create_item(&self, target: &Self::Target) -> Result<Self::Item>;

  /// Width and height of the captured area.
  fn item_size(&self, item: &Self::Item) -> Result<(i32, i32)>;

  fn create_slot(&self, width: u32, height: u32) -> Result<Self::Slot>;

  /// Start delivering every frame of `item` to `publisher`.
  fn start_session(
    &self,
    item: &Self::Item,
    width: u32,
    height: u32,
    publisher: Publisher<Self::Slot>,
  ) -> Result<Self::Session>;

  /// Deregister the frame callback and release the session.
  /// No callback invocation may start after this returns.
  /// Failures are swallowed.
  fn stop_session(&self, session: Self::Session);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Uninitialized,
  DeviceReady,
  SessionActive,
  /// Device creation failed, create a new manager to retry.
  Failed,
}

struct Active<Item, Session> {
  item: Item,
  session: Session,
  width: u32,
  height: u32,
}

/// Owns the GPU device and at most one capture session.
///
/// The device is created once and reused by every session,
/// staging slots are created per session and sized to its captured area.
pub struct SessionManager<D: CaptureDevice> {
  device: Option<D>,
  failure: Option<Error>,
  exchange: Arc<FrameExchange<D::Slot>>,
  active: Option<Active<D::Item, D::Session>>,
}

impl<D: CaptureDevice> SessionManager<D> {
  /// Create a manager publishing frames into `exchange`.
  pub fn new(exchange: Arc<FrameExchange<D::Slot>>) -> Self {
    Self {
      device: None,
      failure: None,
      exchange,
      active: None,
    }
  }

  pub fn state(&self) -> SessionState {
    if self.active.is_some() {
      SessionState::SessionActive
    } else if self.device.is_some() {
      SessionState::DeviceReady
    } else if self.failure.is_some() {
      SessionState::Failed
    } else {
      SessionState::Uninitialized
    }
  }

  #[inline]
  pub fn is_active(&self) -> bool {
    self.active.is_some()
  }

  #[inline]
  pub fn exchange(&self) -> &Arc<FrameExchange<D::Slot>> {
    &self.exchange
  }

  /// Size of the active session's frames.
  pub fn frame_size(&self) -> Option<(u32, u32)> {
    self.active.as_ref().map(|a| (a.width, a.height))
  }

  /// Create the device with `create` unless it exists.
  ///
  /// A failure is remembered and returned by every later call.
  pub fn ensure_device_ready(&mut self, create: impl FnOnce() -> Result<D>) -> Result<&D> {
    if let Some(err) = &self.failure {
      return Err(err.clone());
    }

    if self.device.is_none() {
      match create() {
        Ok(device) => self.device = Some(device),
        Err(e) => {
          let err = match e {
            Error::DeviceCreation(_) => e,
            e => Error::device_creation(e),
          };
          self.failure = Some(err.clone());
          return Err(err);
        }
      }
    }

    self.device.as_ref().ok_or(Error::DeviceNotReady)
  }

  /// Start capturing `target`. An active session is stopped first.
  ///
  /// On failure nothing of the new session is left behind
  /// and the manager is back to [`SessionState::DeviceReady`].
  pub fn start(&mut self, target: &D::Target) -> Result<()> {
    self.stop();

    let device = self.device.as_ref().ok_or(Error::DeviceNotReady)?;
    let active = open(device, &self.exchange, target).map_err(Error::session_start)?;

    info!(
      width = active.width,
      height = active.height,
      "capture session started"
    );
    self.active = Some(active);
    Ok(())
  }

  /// Stop the active session, if any.
  pub fn stop(&mut self) {
    let Some(active) = self.active.take() else {
      return;
    };

    match &self.device {
      Some(device) => device.stop_session(active.session),
      None => warn!("capture session outlived its device"),
    }
    drop(active.item);
    self.exchange.clear();

    info!("capture session stopped");
  }
}

impl<D: CaptureDevice> Drop for SessionManager<D> {
  fn drop(&mut self) {
    self.stop();
  }
}

fn open<D: CaptureDevice>(
  device: &D,
  exchange: &Arc<FrameExchange<D::Slot>>,
  target: &D::Target,
) -> Result<Active<D::Item, D::Session>> {
  let item = device.create_item(target)?;

  let (width, height) = device.item_size(&item)?;
  if width <= 0 || height <= 0 {
    return Err(Error::InvalidTargetSize { width, height });
  }
  let (width, height) = (width as u32, height as u32);

  let slots: [D::Slot; SLOT_COUNT] = [
    device.create_slot(width, height)?,
    device.create_slot(width, height)?,
  ];

  let publisher = exchange.install(slots);
  match device.start_session(&item, width, height, publisher) {
    Ok(session) => Ok(Active {
      item,
      session,
      width,
      height,
    }),
    Err(e) => {
      exchange.clear();
      Err(e)
    }
  }
}
