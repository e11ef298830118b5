//! Factory functions for test data: encoded images, configs and image files.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgba, RgbaImage};
use shared::{ImageSource, ViewerConfig};

// ── Images ──────────────────────────────────────────────────────

/// Solid-color image
pub fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

/// Image with a distinct color per quadrant, handy for orientation checks
pub fn quadrant_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        match (x < width / 2, y < height / 2) {
            (true, true) => Rgba([255, 0, 0, 255]),
            (false, true) => Rgba([0, 255, 0, 255]),
            (true, false) => Rgba([0, 0, 255, 255]),
            (false, false) => Rgba([255, 255, 0, 255]),
        }
    })
}

/// PNG encoding of `image`
pub fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .unwrap_or_else(|e| panic!("PNG encoding failed: {e}"));
    out.into_inner()
}

/// PNG bytes of a solid-color image
pub fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    encode_png(&solid_image(width, height, color))
}

/// Write `image` as PNG under `dir` and return the path
pub fn write_png(dir: &Path, name: &str, image: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, encode_png(image))
        .unwrap_or_else(|e| panic!("writing {}: {e}", path.display()));
    path
}

/// Fresh scratch directory under the system temp dir
pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("notebook-{label}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap_or_else(|e| panic!("creating {}: {e}", dir.display()));
    dir
}

// ── Configs ─────────────────────────────────────────────────────

/// Config with inline image bytes for page 0
pub fn config_with_bytes(page_count: u32, bytes: Vec<u8>) -> ViewerConfig {
    ViewerConfig::new(page_count).with_image(ImageSource::Bytes(bytes))
}

/// Config pointing page 0 at a `file://` URI
pub fn config_with_file(page_count: u32, path: &Path) -> ViewerConfig {
    ViewerConfig::new(page_count).with_image(ImageSource::uri(format!("file://{}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_bytes_decode() {
        let bytes = png_bytes(4, 3, [1, 2, 3, 255]);
        let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(img.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_write_png_roundtrip_through_disk() {
        let dir = temp_dir("fixtures");
        let path = write_png(&dir, "q.png", &quadrant_image(4, 4));
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(3, 3).0, [255, 255, 0, 255]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_config_with_file_uses_file_uri() {
        let config = config_with_file(5, Path::new("/tmp/page.png"));
        assert_eq!(
            config.replacement_image,
            Some(ImageSource::uri("file:///tmp/page.png"))
        );
    }
}
