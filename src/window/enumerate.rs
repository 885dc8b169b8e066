use super::{is_capturable, matches_window, WindowTraits, SHELL_CLOAKABLE_CLASSES};
use crate::{Error, Result};
use std::{ffi::c_void, mem::size_of};
use tracing::debug;
use windows::{
  core::{HSTRING, PCWSTR},
  Win32::{
    Foundation::{BOOL, HWND, LPARAM, TRUE},
    Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_CLOAKED, DWM_CLOAKED_SHELL},
    UI::WindowsAndMessaging::{
      EnumWindows, FindWindowW, GetAncestor, GetClassNameW, GetShellWindow, GetWindowLongW,
      GetWindowTextLengthW, GetWindowTextW, IsWindowVisible, GA_ROOT, GWL_EXSTYLE, GWL_STYLE,
      WS_DISABLED, WS_EX_TOOLWINDOW,
    },
  },
};

/// Longest class name Win32 allows, plus the terminator.
const MAX_CLASS_NAME: usize = 257;

/// A capturable top-level window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
  pub handle: HWND,
  pub title: String,
  pub class_name: String,
}

/// List capturable windows with a title, in the order the system enumerates them.
/// # Examples
/// ```no_run
/// # #[cfg(windows)] {
/// for window in rusty_window_capture::enumerate_windows().unwrap() {
///   println!("{} ({})", window.title, window.class_name);
/// }
/// # }
/// ```
pub fn enumerate_windows() -> Result<Vec<WindowInfo>> {
  Ok(
    top_level_windows()?
      .into_iter()
      .filter(|(_, window)| !window.title.is_empty() && is_capturable(window))
      .map(|(handle, window)| WindowInfo {
        handle,
        title: window.title,
        class_name: window.class_name,
      })
      .collect(),
  )
}

/// Find a capturable window by title and class name,
/// ignoring case and surrounding whitespace.
///
/// If nothing matches, fall back to the first window of any kind with that exact title.
/// That window may not pass the capturability filter.
pub fn find_capturable_window(title: &str, class_name: &str) -> Result<Option<HWND>> {
  let found = top_level_windows()?
    .into_iter()
    .find(|(_, window)| {
      !window.title.is_empty()
        && is_capturable(window)
        && matches_window(&window.title, &window.class_name, title, class_name)
    })
    .map(|(handle, _)| handle);

  if found.is_some() {
    return Ok(found);
  }

  let fallback = find_window_by_title(title.trim());
  if fallback.is_some() {
    debug!(title, "no capturable window matched, using title-only lookup");
  }
  Ok(fallback)
}

pub fn is_visible(handle: HWND) -> bool {
  unsafe { IsWindowVisible(handle) }.as_bool()
}

fn find_window_by_title(title: &str) -> Option<HWND> {
  unsafe { FindWindowW(PCWSTR::null(), &HSTRING::from(title)) }
    .ok()
    .filter(|handle| !handle.is_invalid())
}

/// Snapshot every top-level window.
fn top_level_windows() -> Result<Vec<(HWND, WindowTraits)>> {
  let mut handles: Vec<HWND> = Vec::new();
  unsafe {
    EnumWindows(
      Some(collect_handle),
      LPARAM(&mut handles as *mut Vec<HWND> as isize),
    )
  }
  .map_err(Error::from_win_err(stringify!(EnumWindows)))?;

  Ok(
    handles
      .into_iter()
      .map(|handle| (handle, window_traits(handle)))
      .collect(),
  )
}

unsafe extern "system" fn collect_handle(handle: HWND, lparam: LPARAM) -> BOOL {
  // SAFETY: `lparam` is the vec borrowed by `top_level_windows` for the whole enumeration
  let handles = unsafe { &mut *(lparam.0 as *mut Vec<HWND>) };
  handles.push(handle);
  TRUE
}

fn window_traits(handle: HWND) -> WindowTraits {
  let title = window_text(handle);
  let class_name = class_name(handle);

  let style = unsafe { GetWindowLongW(handle, GWL_STYLE) } as u32;
  let ex_style = unsafe { GetWindowLongW(handle, GWL_EXSTYLE) } as u32;

  let shell_cloaked =
    SHELL_CLOAKABLE_CLASSES.contains(&class_name.as_str()) && is_shell_cloaked(handle);

  WindowTraits {
    is_shell: handle == unsafe { GetShellWindow() },
    visible: is_visible(handle),
    is_root: unsafe { GetAncestor(handle, GA_ROOT) } == handle,
    disabled: style & WS_DISABLED.0 != 0,
    tool_window: ex_style & WS_EX_TOOLWINDOW.0 != 0,
    shell_cloaked,
    title,
    class_name,
  }
}

fn window_text(handle: HWND) -> String {
  let len = unsafe { GetWindowTextLengthW(handle) };
  if len <= 0 {
    return String::new();
  }

  let mut buffer = vec![0u16; len as usize + 1];
  let copied = unsafe { GetWindowTextW(handle, &mut buffer) };
  String::from_utf16_lossy(&buffer[..copied.max(0) as usize])
}

fn class_name(handle: HWND) -> String {
  let mut buffer = [0u16; MAX_CLASS_NAME];
  let copied = unsafe { GetClassNameW(handle, &mut buffer) };
  String::from_utf16_lossy(&buffer[..copied.max(0) as usize])
}

fn is_shell_cloaked(handle: HWND) -> bool {
  let mut cloaked = 0u32;
  let result = unsafe {
    DwmGetWindowAttribute(
      handle,
      DWMWA_CLOAKED,
      &mut cloaked as *mut u32 as *mut c_void,
      size_of::<u32>() as u32,
    )
  };
  result.is_ok() && cloaked == DWM_CLOAKED_SHELL
}
