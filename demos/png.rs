//! Capture one frame of a window and save it as a PNG.
//!
//! `cargo run --example png -- "Untitled - Notepad" Notepad`

#[cfg(windows)]
fn main() {
  use image::{ImageBuffer, RgbaImage};
  use rusty_window_capture::WindowCapture;
  use std::{env, thread, time::Duration};
  use tracing_subscriber::EnvFilter;

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut args = env::args().skip(1);
  let title = args.next().unwrap_or_else(|| "Untitled - Notepad".to_string());
  let class_name = args.next().unwrap_or_else(|| "Notepad".to_string());

  let capture = WindowCapture::default();
  if capture.start(&title, &class_name).is_err() {
    eprintln!("{}", capture.last_error());
    return;
  }

  // frames arrive on another thread, wait for the first one
  let mut frame = None;
  for _ in 0..500 {
    frame = capture.poll();
    if frame.is_some() {
      break;
    }
    thread::sleep(Duration::from_millis(10));
  }
  capture.stop();

  let Some(frame) = frame else {
    eprintln!("no frame received");
    return;
  };

  let img: RgbaImage = ImageBuffer::from_raw(frame.width, frame.height, frame.to_rgba()).unwrap();
  img.save("window.png").unwrap();
}

#[cfg(not(windows))]
fn main() {
  eprintln!("window capture is only available on Windows");
}
