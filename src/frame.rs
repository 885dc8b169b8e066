use crate::{Error, Result};

/// Bytes per pixel of the BGRA8 format.
pub const BYTES_PER_PIXEL: usize = 4;

/// A captured frame.
/// The data is stored in BGRA32 format, row-major and tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  pub data: Vec<u8>,
  pub width: u32,
  pub height: u32,
}

impl Frame {
  /// Return needed buffer size, in bytes.
  #[inline]
  pub const fn buffer_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
  }

  /// Length of the pixel data in bytes.
  #[inline]
  pub fn len(&self) -> usize {
    self.data.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// Bytes per row. There is never any padding.
  #[inline]
  pub const fn stride(&self) -> usize {
    self.width as usize * BYTES_PER_PIXEL
  }

  /// Pixels of row `y`.
  /// # Panics
  /// If `y` is out of range.
  pub fn row(&self, y: u32) -> &[u8] {
    let start = y as usize * self.stride();
    &self.data[start..start + self.stride()]
  }

  /// The BGRA value at `(x, y)`.
  /// # Panics
  /// If the position is out of range.
  pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
    let i = x as usize * BYTES_PER_PIXEL;
    let row = self.row(y);
    [row[i], row[i + 1], row[i + 2], row[i + 3]]
  }

  /// Convert BGRA32 to RGBA32.
  pub fn to_rgba(&self) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(self.data.len());
    for px in self.data.chunks_exact(BYTES_PER_PIXEL) {
      buffer.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
    }
    buffer
  }
}

/// Copy `height` rows of `width` pixels out of `src`, whose rows start every `row_pitch` bytes,
/// into a freshly allocated packed frame.
///
/// The GPU may pad each row, so `row_pitch` can be larger than `width * 4`.
/// Only the pixel bytes of each row are copied.
pub fn copy_rows(src: &[u8], row_pitch: usize, width: u32, height: u32) -> Result<Frame> {
  let line_bytes = width as usize * BYTES_PER_PIXEL;
  let size = Frame::buffer_size(width, height);

  if row_pitch < line_bytes || src.len() < min_source_len(row_pitch, line_bytes, height) {
    return Err(Error::InvalidBufferLength);
  }

  let mut data = Vec::new();
  data
    .try_reserve_exact(size)
    .map_err(|_| Error::Allocation(size))?;

  if row_pitch == line_bytes {
    data.extend_from_slice(&src[..size]);
  } else {
    for line in src.chunks(row_pitch).take(height as usize) {
      data.extend_from_slice(&line[..line_bytes]);
    }
  }

  Ok(Frame {
    data,
    width,
    height,
  })
}

/// The last row only needs its pixel bytes, the padding after it may not be mapped.
#[inline]
pub(crate) const fn min_source_len(row_pitch: usize, line_bytes: usize, height: u32) -> usize {
  if height == 0 {
    0
  } else {
    (height as usize - 1) * row_pitch + line_bytes
  }
}
