use crate::{CaptureDevice, CaptureOptions, Error, Publisher, Result, SizeInt32Ext, TextureSlot};
use std::{fmt, ptr::null_mut};
use tracing::{debug, warn};
use windows::{
  core::{factory, IInspectable, Interface},
  Foundation::TypedEventHandler,
  Graphics::{
    Capture::{
      Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem,
      GraphicsCaptureSession,
    },
    DirectX::{Direct3D11::IDirect3DDevice, DirectXPixelFormat},
    SizeInt32,
  },
  Win32::{
    Foundation::{HMODULE, HWND},
    Graphics::{
      Direct3D::D3D_DRIVER_TYPE_HARDWARE,
      Direct3D11::{
        D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D,
        D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_SDK_VERSION,
      },
      Dxgi::IDXGIDevice,
    },
    System::WinRT::{
      Direct3D11::{CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess},
      Graphics::Capture::IGraphicsCaptureItemInterop,
    },
  },
};

/// A hardware Direct3D 11 device,
/// shared by every session of one [`SessionManager`](crate::SessionManager).
#[derive(Debug)]
pub struct WgcDevice {
  device: ID3D11Device,
  context: ID3D11DeviceContext,
  direct3d: IDirect3DDevice,
  options: CaptureOptions,
}

// SAFETY: the device itself is thread safe.
// The immediate context is only used by the texture slots, see `TextureSlot`.
unsafe impl Send for WgcDevice {}

impl WgcDevice {
  pub fn new(options: CaptureOptions) -> Result<Self> {
    let mut device = None;
    let mut context = None;
    unsafe {
      D3D11CreateDevice(
        None,
        D3D_DRIVER_TYPE_HARDWARE,
        HMODULE(null_mut()),
        D3D11_CREATE_DEVICE_BGRA_SUPPORT,
        None,
        D3D11_SDK_VERSION,
        Some(&mut device),
        None,
        Some(&mut context),
      )
    }
    .map_err(Error::from_win_err(stringify!(D3D11CreateDevice)))?;
    let (Some(device), Some(context)) = (device, context) else {
      return Err(Error::last_win_err(stringify!(D3D11CreateDevice)));
    };

    let dxgi_device: IDXGIDevice = device
      .cast()
      .map_err(Error::from_win_err(stringify!(ID3D11Device.cast)))?;
    let direct3d = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device) }
      .map_err(Error::from_win_err(stringify!(
        CreateDirect3D11DeviceFromDXGIDevice
      )))?
      .cast()
      .map_err(Error::from_win_err(stringify!(IInspectable.cast)))?;

    Ok(Self {
      device,
      context,
      direct3d,
      options,
    })
  }

  #[inline]
  pub const fn d3d_device(&self) -> &ID3D11Device {
    &self.device
  }

  fn apply_options(&self, session: &GraphicsCaptureSession) {
    if let Err(e) = session.SetIsCursorCaptureEnabled(self.options.cursor_capture) {
      warn!(error = %e, "failed to configure cursor capture");
    }
    // the system draws a border unless told otherwise
    if !self.options.border_required {
      if let Err(e) = session.SetIsBorderRequired(false) {
        warn!(error = %e, "failed to disable the capture border");
      }
    }
  }
}

/// A running frame subscription.
pub struct WgcSession {
  pool: Direct3D11CaptureFramePool,
  session: GraphicsCaptureSession,
  remove_handler: Box<dyn FnOnce() -> windows::core::Result<()> + Send>,
}

impl fmt::Debug for WgcSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WgcSession")
      .field("pool", &self.pool)
      .field("session", &self.session)
      .finish_non_exhaustive()
  }
}

impl CaptureDevice for WgcDevice {
  type Target = HWND;
  type Slot = TextureSlot;
  type Item = GraphicsCaptureItem;
  type Session = WgcSession;

  fn create_item(&self, target: &HWND) -> Result<GraphicsCaptureItem> {
    let interop = factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>().map_err(
      Error::from_win_err(stringify!(IGraphicsCaptureItemInterop)),
    )?;
    unsafe { interop.CreateForWindow(*target) }.map_err(Error::from_win_err(stringify!(
      IGraphicsCaptureItemInterop.CreateForWindow
    )))
  }

  fn item_size(&self, item: &GraphicsCaptureItem) -> Result<(i32, i32)> {
    let size = item
      .Size()
      .map_err(Error::from_win_err(stringify!(GraphicsCaptureItem.Size)))?;
    if size.is_empty() {
      debug!(
        width = size.Width,
        height = size.Height,
        "window has no area, probably minimized"
      );
    }
    Ok((size.Width, size.Height))
  }

  fn create_slot(&self, width: u32, height: u32) -> Result<TextureSlot> {
    TextureSlot::new(&self.device, &self.context, width, height)
  }

  fn start_session(
    &self,
    item: &GraphicsCaptureItem,
    width: u32,
    height: u32,
    publisher: Publisher<TextureSlot>,
  ) -> Result<WgcSession> {
    let pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
      &self.direct3d,
      DirectXPixelFormat::B8G8R8A8UIntNormalized,
      self.options.frame_pool_buffers,
      SizeInt32 {
        Width: width as i32,
        Height: height as i32,
      },
    )
    .map_err(Error::from_win_err(stringify!(
      Direct3D11CaptureFramePool.CreateFreeThreaded
    )))?;

    let session = match pool.CreateCaptureSession(item) {
      Ok(session) => session,
      Err(e) => {
        close_pool(&pool);
        return Err(Error::from_win_err(stringify!(
          Direct3D11CaptureFramePool.CreateCaptureSession
        ))(e));
      }
    };
    self.apply_options(&session);

    let handler = TypedEventHandler::<Direct3D11CaptureFramePool, IInspectable>::new(
      move |sender: &Option<Direct3D11CaptureFramePool>, _| {
        if let Some(pool) = sender {
          deliver(pool, &publisher);
        }
        Ok(())
      },
    );
    let token = match pool.FrameArrived(&handler) {
      Ok(token) => token,
      Err(e) => {
        close_session(&session);
        close_pool(&pool);
        return Err(Error::from_win_err(stringify!(
          Direct3D11CaptureFramePool.FrameArrived
        ))(e));
      }
    };

    let remove_handler = {
      let pool = pool.clone();
      Box::new(move || pool.RemoveFrameArrived(token))
    };
    let capture = WgcSession {
      pool,
      session,
      remove_handler,
    };

    if let Err(e) = capture.session.StartCapture() {
      self.stop_session(capture);
      return Err(Error::from_win_err(stringify!(
        GraphicsCaptureSession.StartCapture
      ))(e));
    }
    Ok(capture)
  }

  fn stop_session(&self, capture: WgcSession) {
    let WgcSession {
      pool,
      session,
      remove_handler,
    } = capture;

    if let Err(e) = remove_handler() {
      warn!(error = %e, "failed to remove frame handler");
    }
    close_session(&session);
    close_pool(&pool);
  }
}

/// Runs on a thread of the frame pool.
fn deliver(pool: &Direct3D11CaptureFramePool, publisher: &Publisher<TextureSlot>) {
  let frame = match pool.TryGetNextFrame() {
    Ok(frame) => frame,
    Err(e) => {
      debug!(error = %e, "no frame to deliver");
      return;
    }
  };

  match frame_texture(&frame) {
    Ok(texture) => {
      publisher.publish(&texture);
    }
    Err(e) => debug!(error = %e, "drop frame, no texture"),
  }

  if let Err(e) = frame.Close() {
    debug!(error = %e, "failed to close frame");
  }
}

fn frame_texture(frame: &Direct3D11CaptureFrame) -> windows::core::Result<ID3D11Texture2D> {
  let access: IDirect3DDxgiInterfaceAccess = frame.Surface()?.cast()?;
  unsafe { access.GetInterface() }
}

fn close_session(session: &GraphicsCaptureSession) {
  if let Err(e) = session.Close() {
    warn!(error = %e, "failed to close capture session");
  }
}

fn close_pool(pool: &Direct3D11CaptureFramePool) {
  if let Err(e) = pool.Close() {
    warn!(error = %e, "failed to close frame pool");
  }
}
