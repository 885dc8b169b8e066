mod capture;
mod error;
mod exchange;
mod frame;
mod options;
mod session;
mod window;

#[cfg(windows)]
mod ext;
#[cfg(windows)]
mod wgc;

#[cfg(test)]
mod testing;

pub use capture::*;
pub use error::*;
pub use exchange::*;
pub use frame::*;
pub use options::*;
pub use session::*;
pub use window::*;

#[cfg(windows)]
pub use ext::*;
#[cfg(windows)]
pub use wgc::*;

/// Window capture backed by Windows.Graphics.Capture.
#[cfg(windows)]
pub type WindowCapture = Capture<Wgc>;
