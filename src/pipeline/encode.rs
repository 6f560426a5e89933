//! Image encoding: rendered bytes → self-contained base64 `data:` URI.
//!
//! The output document must not depend on files next to it, so every
//! rendered diagram is inlined. The bytes are sniffed rather than trusted:
//! a renderer that exits 0 but writes an HTML error page or an empty file
//! must fail the diagram, not embed garbage.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use tracing::debug;

/// An image ready to be embedded in Markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub mime_type: &'static str,
    /// Base64 of the raw image bytes.
    pub data: String,
}

impl EmbeddedImage {
    /// `data:<mime>;base64,<data>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Markdown image element with the given accessible text.
    pub fn markdown(&self, alt: &str) -> String {
        format!("![{}]({})", alt, self.data_uri())
    }
}

/// Encode rendered diagram bytes for inline embedding.
///
/// Returns `None` when the bytes are not a PNG, JPEG, GIF or WebP image.
pub fn encode_image(bytes: &[u8]) -> Option<EmbeddedImage> {
    let mime_type = match image::guess_format(bytes).ok()? {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        _ => return None,
    };

    let data = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime_type, data.len());

    Some(EmbeddedImage { mime_type, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode should succeed");
        buf
    }

    #[test]
    fn encode_small_png() {
        let bytes = png_bytes();
        let img = encode_image(&bytes).expect("png should be recognised");
        assert_eq!(img.mime_type, "image/png");
        let decoded = STANDARD.decode(&img.data).expect("valid base64");
        assert_eq!(decoded, bytes);
        assert!(img.data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn markdown_element_carries_alt_text() {
        let img = encode_image(&png_bytes()).unwrap();
        let md = img.markdown("Diagram");
        assert!(md.starts_with("![Diagram](data:image/png;base64,"));
        assert!(md.ends_with(')'));
    }

    #[test]
    fn rejects_non_image_bytes() {
        assert!(encode_image(b"<html>Error: Chromium failed</html>").is_none());
        assert!(encode_image(&[]).is_none());
    }
}
