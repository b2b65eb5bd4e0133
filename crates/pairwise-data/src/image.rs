// Image decoding into `ImageData`
//
// Two flavours:
//   - `load_grayscale`: always 2-D. Multi-channel sources collapse by a plain
//     average over every channel (alpha included), not a luma weighting.
//   - `load_native`: keeps the channel axis when there is more than one.
//
// Pixel values stay in the source range; nothing is rescaled to [0, 1].

use std::path::Path;

use image::DynamicImage;

use crate::dataset::ImageData;
use crate::error::{Error, Result};

/// Supported image extensions (case-insensitive).
const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif", "webp"];

pub(crate) fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn open(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| Error::ImageDecode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load an image as a 2-D `[height, width]` array.
pub fn load_grayscale(path: impl AsRef<Path>) -> Result<ImageData> {
    Ok(grayscale(&open(path.as_ref())?))
}

/// Load an image in its native layout: `[h, w]` or `[h, w, c]`.
pub fn load_native(path: impl AsRef<Path>) -> Result<ImageData> {
    Ok(native(&open(path.as_ref())?))
}

/// Collapse a decoded image to 2-D by averaging its channels.
pub fn grayscale(img: &DynamicImage) -> ImageData {
    let (pixels, channels, h, w) = raw_values(img);
    let shape = vec![h, w];
    if channels == 1 {
        return ImageData::new(pixels, shape);
    }
    let averaged = pixels
        .chunks_exact(channels)
        .map(|px| px.iter().sum::<f64>() / channels as f64)
        .collect();
    ImageData::new(averaged, shape)
}

/// Keep the decoded image in its native interleaved layout.
pub fn native(img: &DynamicImage) -> ImageData {
    let (pixels, channels, h, w) = raw_values(img);
    let shape = if channels == 1 {
        vec![h, w]
    } else {
        vec![h, w, channels]
    };
    ImageData::new(pixels, shape)
}

/// Interleaved raw values, channel count, height, width.
fn raw_values(img: &DynamicImage) -> (Vec<f64>, usize, usize, usize) {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let (pixels, channels) = match img {
        DynamicImage::ImageLuma8(b) => (widen(b.as_raw()), 1),
        DynamicImage::ImageLumaA8(b) => (widen(b.as_raw()), 2),
        DynamicImage::ImageRgb8(b) => (widen(b.as_raw()), 3),
        DynamicImage::ImageRgba8(b) => (widen(b.as_raw()), 4),
        DynamicImage::ImageLuma16(b) => (widen(b.as_raw()), 1),
        DynamicImage::ImageLumaA16(b) => (widen(b.as_raw()), 2),
        DynamicImage::ImageRgb16(b) => (widen(b.as_raw()), 3),
        DynamicImage::ImageRgba16(b) => (widen(b.as_raw()), 4),
        DynamicImage::ImageRgb32F(b) => (widen(b.as_raw()), 3),
        DynamicImage::ImageRgba32F(b) => (widen(b.as_raw()), 4),
        other => (widen(other.to_rgba8().as_raw()), 4),
    };
    (pixels, channels, h, w)
}

fn widen<T: Copy + Into<f64>>(raw: &[T]) -> Vec<f64> {
    raw.iter().map(|&v| v.into()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn constant_rgb_collapses_to_same_value() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([77, 77, 77])));
        let gray = grayscale(&img);
        assert_eq!(gray.shape, vec![3, 4]);
        assert!(gray.pixels.iter().all(|&v| v == 77.0));
    }

    #[test]
    fn grayscale_is_plain_average() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([0, 30, 90])));
        assert_eq!(grayscale(&img).pixels, vec![40.0]);
    }

    #[test]
    fn alpha_is_averaged_too() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 40])));
        assert_eq!(grayscale(&img).pixels, vec![25.0]);
    }

    #[test]
    fn single_channel_passes_through() {
        let mut g = GrayImage::new(2, 2);
        g.put_pixel(1, 0, Luma([200]));
        let img = DynamicImage::ImageLuma8(g);
        let data = grayscale(&img);
        assert_eq!(data.pixels, vec![0.0, 200.0, 0.0, 0.0]);
        assert_eq!(native(&img).shape, vec![2, 2]);
    }

    #[test]
    fn native_keeps_channels() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 2, Rgb([1, 2, 3])));
        let data = native(&img);
        assert_eq!(data.shape, vec![2, 5, 3]);
        assert_eq!(&data.pixels[..3], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn round_trip_through_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("px.png");
        RgbImage::from_pixel(3, 3, Rgb([9, 9, 9])).save(&path).unwrap();
        let data = load_grayscale(&path).unwrap();
        assert_eq!(data.shape, vec![3, 3]);
        assert!(data.pixels.iter().all(|&v| v == 9.0));
    }

    #[test]
    fn undecodable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(matches!(load_native(&path), Err(Error::ImageDecode { .. })));
    }

    #[test]
    fn extension_filter() {
        assert!(is_image(Path::new("a/b.PNG")));
        assert!(is_image(Path::new("x.jpeg")));
        assert!(!is_image(Path::new("README")));
        assert!(!is_image(Path::new("notes.txt")));
    }
}
