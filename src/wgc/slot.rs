use crate::{copy_rows, Error, Frame, MappedSubresourceExt, Result, StagingSlot, TextureDescExt};
use windows::Win32::Graphics::{
  Direct3D11::{
    ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D, D3D11_MAPPED_SUBRESOURCE, D3D11_MAP_READ,
    D3D11_TEXTURE2D_DESC,
  },
  Dxgi::DXGI_RESOURCE_PRIORITY_MAXIMUM,
};

/// A staging texture the CPU can map, one half of a session's double buffer.
#[derive(Debug)]
pub struct TextureSlot {
  texture: ID3D11Texture2D,
  context: ID3D11DeviceContext,
  desc: D3D11_TEXTURE2D_DESC,
}

// SAFETY: the immediate context is not thread safe.
// Slots are only touched while the frame exchange is locked,
// so at most one thread uses the context through a slot at a time.
unsafe impl Send for TextureSlot {}

impl TextureSlot {
  pub(crate) fn new(
    device: &ID3D11Device,
    context: &ID3D11DeviceContext,
    width: u32,
    height: u32,
  ) -> Result<Self> {
    let desc = D3D11_TEXTURE2D_DESC::staging(width, height);

    let mut texture = None;
    unsafe { device.CreateTexture2D(&desc, None, Some(&mut texture)) }
      .map_err(Error::from_win_err(stringify!(ID3D11Device.CreateTexture2D)))?;
    let texture =
      texture.ok_or_else(|| Error::last_win_err(stringify!(ID3D11Device.CreateTexture2D)))?;

    // lower priorities make the driver needlessly copy the texture to RAM,
    // which causes huge memory usage on some systems
    unsafe { texture.SetEvictionPriority(DXGI_RESOURCE_PRIORITY_MAXIMUM.0) };

    Ok(Self {
      texture,
      context: context.clone(),
      desc,
    })
  }

  #[inline]
  pub const fn desc(&self) -> &D3D11_TEXTURE2D_DESC {
    &self.desc
  }
}

impl StagingSlot for TextureSlot {
  type Source = ID3D11Texture2D;

  /// Frames of another size are refused, the pool keeps its size after the window is resized.
  fn copy_from(&self, source: &ID3D11Texture2D) -> Result<()> {
    let mut source_desc = D3D11_TEXTURE2D_DESC::default();
    unsafe { source.GetDesc(&mut source_desc) };
    if source_desc.Width != self.desc.Width || source_desc.Height != self.desc.Height {
      return Err(Error::InvalidBufferLength);
    }

    unsafe { self.context.CopyResource(&self.texture, source) };
    Ok(())
  }

  fn read(&self) -> Result<Frame> {
    let (width, height) = (self.desc.Width, self.desc.Height);

    let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
    unsafe {
      self
        .context
        .Map(&self.texture, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
    }
    .map_err(|e| Error::readback(Error::from_win_err(stringify!(ID3D11DeviceContext.Map))(e)))?;

    // SAFETY: mapped until the unmap below, a staging texture holds `height` full rows
    let frame = copy_rows(
      unsafe { mapped.rows(width, height) },
      mapped.row_pitch(),
      width,
      height,
    );
    unsafe { self.context.Unmap(&self.texture, 0) };

    frame.map_err(|e| match e {
      Error::Allocation(_) => e,
      e => Error::readback(e),
    })
  }
}
