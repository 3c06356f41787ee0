//! Native capture results and their wire encoding.

use std::io::Cursor;

use base64::Engine as _;
use conduit_common::{CaptureError, Size};
use conduit_ipc::protocol::SourceDescriptor;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// RGBA8 thumbnail produced by the native capturer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thumbnail {
    pub size: Size,
    pub rgba: Vec<u8>,
}

impl Thumbnail {
    pub fn new(size: Size, rgba: Vec<u8>) -> Self {
        Self { size, rgba }
    }

    /// Uniformly colored thumbnail.
    pub fn solid(size: Size, pixel: [u8; 4]) -> Self {
        let rgba = pixel.repeat(size.area());
        Self { size, rgba }
    }

    /// Encode as a PNG data URL. An empty thumbnail yields the bare prefix.
    pub fn to_data_url(&self) -> Result<String, CaptureError> {
        if self.size.is_empty() {
            return Ok(PNG_DATA_URL_PREFIX.to_string());
        }
        let png_bytes = encode_rgba_as_png(self.size, &self.rgba)?;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&png_bytes);
        Ok(format!("{PNG_DATA_URL_PREFIX}{b64}"))
    }
}

/// One screen or window reported by the native capturer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedSource {
    pub id: String,
    pub name: String,
    pub display_id: String,
    pub thumbnail: Thumbnail,
}

impl CapturedSource {
    pub fn to_descriptor(&self) -> Result<SourceDescriptor, CaptureError> {
        Ok(SourceDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            thumbnail: self.thumbnail.to_data_url()?,
            display_id: self.display_id.clone(),
        })
    }
}

fn encode_rgba_as_png(size: Size, rgba: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let expected = size.area().saturating_mul(4);
    if rgba.len() != expected {
        return Err(CaptureError::Encode(format!(
            "expected {expected} bytes for {}x{} RGBA, got {}",
            size.width,
            size.height,
            rgba.len()
        )));
    }

    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = png::Encoder::new(&mut buf, size.width, size.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        writer
            .write_image_data(rgba)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
    }
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_thumbnail_is_bare_prefix() {
        let url = Thumbnail::default().to_data_url().unwrap();
        assert_eq!(url, "data:image/png;base64,");
    }

    #[test]
    fn solid_thumbnail_encodes_to_png_data_url() {
        let thumb = Thumbnail::solid(Size::new(2, 2), [255, 0, 0, 255]);
        assert_eq!(thumb.rgba.len(), 16);

        let url = thumb.to_data_url().unwrap();
        let b64 = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn mismatched_pixel_buffer_is_an_encode_error() {
        let thumb = Thumbnail::new(Size::new(4, 4), vec![0; 3]);
        let err = thumb.to_data_url().unwrap_err();
        assert!(matches!(err, CaptureError::Encode(_)));
    }

    #[test]
    fn descriptor_copies_identity_fields() {
        let source = CapturedSource {
            id: "screen:1:0".into(),
            name: "Screen 1".into(),
            display_id: "1".into(),
            thumbnail: Thumbnail::default(),
        };
        let descriptor = source.to_descriptor().unwrap();
        assert_eq!(descriptor.id, "screen:1:0");
        assert_eq!(descriptor.name, "Screen 1");
        assert_eq!(descriptor.display_id, "1");
        assert_eq!(descriptor.thumbnail, "data:image/png;base64,");
    }
}
