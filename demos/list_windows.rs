#[cfg(windows)]
fn main() {
  use tracing_subscriber::EnvFilter;

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  for window in rusty_window_capture::enumerate_windows().unwrap() {
    println!("{:?}\t{}\t{}", window.handle.0, window.class_name, window.title);
  }
}

#[cfg(not(windows))]
fn main() {
  eprintln!("window capture is only available on Windows");
}
