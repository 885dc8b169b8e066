use crate::{frame::min_source_len, Frame, BYTES_PER_PIXEL};
use std::slice;
use windows::{
  Graphics::SizeInt32,
  Win32::Graphics::{
    Direct3D11::{
      D3D11_BIND_FLAG, D3D11_CPU_ACCESS_READ, D3D11_MAPPED_SUBRESOURCE, D3D11_RESOURCE_MISC_FLAG,
      D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
    },
    Dxgi::Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC},
  },
};

pub trait SizeInt32Ext {
  /// Zero or negative in either dimension, e.g. a minimized window.
  fn is_empty(&self) -> bool;
}

impl SizeInt32Ext for SizeInt32 {
  fn is_empty(&self) -> bool {
    self.Width <= 0 || self.Height <= 0
  }
}

pub trait TextureDescExt {
  /// Description of a BGRA texture the CPU can map for reading.
  fn staging(width: u32, height: u32) -> Self;

  /// Return needed buffer size of a packed frame, in bytes.
  fn calc_buffer_size(&self) -> usize;
}

impl TextureDescExt for D3D11_TEXTURE2D_DESC {
  fn staging(width: u32, height: u32) -> Self {
    Self {
      BindFlags: D3D11_BIND_FLAG::default().0 as u32,
      CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
      MiscFlags: D3D11_RESOURCE_MISC_FLAG::default().0 as u32,
      Usage: D3D11_USAGE_STAGING,
      Width: width,
      Height: height,
      MipLevels: 1,
      ArraySize: 1,
      Format: DXGI_FORMAT_B8G8R8A8_UNORM,
      SampleDesc: DXGI_SAMPLE_DESC {
        Count: 1,
        Quality: 0,
      },
    }
  }

  fn calc_buffer_size(&self) -> usize {
    Frame::buffer_size(self.Width, self.Height)
  }
}

pub trait MappedSubresourceExt {
  fn row_pitch(&self) -> usize;

  /// View the mapped rows of a `width` x `height` BGRA texture.
  /// The padding after the last row is not included.
  /// # Safety
  /// The subresource must be mapped and stay mapped while the slice lives,
  /// and it must hold at least `height` rows of `width` pixels.
  unsafe fn rows(&self, width: u32, height: u32) -> &[u8];
}

impl MappedSubresourceExt for D3D11_MAPPED_SUBRESOURCE {
  #[inline]
  fn row_pitch(&self) -> usize {
    self.RowPitch as usize
  }

  unsafe fn rows(&self, width: u32, height: u32) -> &[u8] {
    let len = min_source_len(self.row_pitch(), width as usize * BYTES_PER_PIXEL, height);
    if len == 0 || self.pData.is_null() {
      return &[];
    }
    unsafe { slice::from_raw_parts(self.pData as *const u8, len) }
  }
}
