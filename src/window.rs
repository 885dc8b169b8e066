#[cfg(windows)]
mod enumerate;

#[cfg(windows)]
pub use enumerate::*;

/// Window classes of shell hosted overlays, only rejected while the shell cloaks them.
pub const SHELL_CLOAKABLE_CLASSES: [&str; 2] =
  ["Windows.UI.Core.CoreWindow", "ApplicationFrameWindow"];

/// System windows without useful content, by exact title and class name.
const BLOCKED_WINDOWS: [(&str, &str); 3] = [
  ("Task View", "Windows.UI.Core.CoreWindow"),
  ("DesktopWindowXamlSource", "Windows.UI.Core.CoreWindow"),
  ("PopupHost", "Xaml_WindowedPopupClass"),
];

/// What the capturability filter knows about a top-level window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowTraits {
  pub title: String,
  pub class_name: String,
  /// The desktop shell window.
  pub is_shell: bool,
  pub visible: bool,
  /// The window is its own root ancestor.
  pub is_root: bool,
  pub disabled: bool,
  pub tool_window: bool,
  /// Cloaked by the shell.
  /// Only meaningful for [`SHELL_CLOAKABLE_CLASSES`].
  pub shell_cloaked: bool,
}

/// Whether the window is one of the known system windows without content.
pub fn is_known_blocked(title: &str, class_name: &str) -> bool {
  BLOCKED_WINDOWS
    .iter()
    .any(|(t, c)| *t == title && *c == class_name)
}

/// Whether a window can be captured.
///
/// The title isn't required here, callers that list windows skip untitled ones.
pub fn is_capturable(window: &WindowTraits) -> bool {
  if window.is_shell || !window.visible || !window.is_root {
    return false;
  }

  if window.disabled || window.tool_window {
    return false;
  }

  if window.shell_cloaked && SHELL_CLOAKABLE_CLASSES.contains(&window.class_name.as_str()) {
    return false;
  }

  !is_known_blocked(&window.title, &window.class_name)
}

/// Compare title and class name, ignoring case and surrounding whitespace.
/// # Examples
/// ```
/// use rusty_window_capture::matches_window;
///
/// assert!(matches_window("Untitled - Notepad", "Notepad", " untitled - notepad ", "NOTEPAD"));
/// assert!(!matches_window("Untitled - Notepad", "Notepad", "Untitled", "Notepad"));
/// ```
pub fn matches_window(title: &str, class_name: &str, want_title: &str, want_class: &str) -> bool {
  eq_trimmed_ignore_case(title, want_title) && eq_trimmed_ignore_case(class_name, want_class)
}

fn eq_trimmed_ignore_case(a: &str, b: &str) -> bool {
  a.trim().to_lowercase() == b.trim().to_lowercase()
}
