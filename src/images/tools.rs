use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Image decode error: {0}")]
    Decode(String),
}

/// A successfully decoded image together with the encoded bytes it came from.
///
/// Clones share both the bytes and the decoded pixels.
#[derive(Clone)]
pub struct FetchedImage {
    data: Arc<[u8]>,
    content_type: &'static str,
    image: Arc<DynamicImage>,
}

impl FetchedImage {
    /// Raw encoded bytes, exactly as received from the network or read from disk.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl fmt::Debug for FetchedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.dimensions();
        f.debug_struct("FetchedImage")
            .field("bytes", &self.data.len())
            .field("content_type", &self.content_type)
            .field("width", &width)
            .field("height", &height)
            .finish()
    }
}

impl PartialEq for FetchedImage {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

// Decode encoded image bytes, keeping the original bytes around
pub fn decode(data: impl Into<Arc<[u8]>>) -> Result<FetchedImage, ImageError> {
    let data: Arc<[u8]> = data.into();

    if data.is_empty() {
        return Err(ImageError::Decode("no image data".to_string()));
    }

    let image = image::load_from_memory(&data)
        .map_err(|e| ImageError::Decode(format!("Failed to load image: {}", e)))?;

    Ok(FetchedImage {
        content_type: detect_image_type(&data),
        data,
        image: Arc::new(image),
    })
}

// Function to detect image type from the image data
pub fn detect_image_type(data: &[u8]) -> &'static str {
    if data.len() < 4 {
        return "application/octet-stream";
    }

    // Check file signatures (magic numbers)
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else if data.starts_with(&[0x47, 0x49, 0x46, 0x38]) {
        "image/gif"
    } else if data.starts_with(&[0x52, 0x49, 0x46, 0x46]) && data.get(8..12) == Some(&[0x57, 0x45, 0x42, 0x50][..]) {
        "image/webp"
    } else if data.starts_with(&[0x42, 0x4D]) {
        "image/bmp"
    } else if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        "image/tiff"
    } else if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        "image/x-icon"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 40) as u8, (y * 40) as u8, 128])
    }));
    let mut output = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut output), image::ImageFormat::Png)
        .expect("encode png");
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_and_keeps_bytes() {
        let png = sample_png(3, 2);
        let image = decode(png.clone()).unwrap();

        assert_eq!(image.data(), &png[..]);
        assert_eq!(image.content_type(), "image/png");
        assert_eq!(image.dimensions(), (3, 2));
    }

    #[test]
    fn rejects_garbage() {
        let err = decode(b"<html>not an image</html>".to_vec()).unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[test]
    fn rejects_empty() {
        assert!(decode(Vec::new()).is_err());
    }

    #[test]
    fn sniffs_common_signatures() {
        assert_eq!(detect_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(detect_image_type(b"GIF89a"), "image/gif");
        assert_eq!(detect_image_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(detect_image_type(b"xx"), "application/octet-stream");
    }
}
