//! Raster input: decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP), a decoded
//! [`DynamicImage`], or a ready-made [`GrayImage`], and produces the
//! immutable [`Raster`] consumed by segmentation.
//!
//! This is the first step in the pipeline: raw bytes in, `Raster` out.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::types::{Dimensions, PipelineError, Point};

/// A 2D grid of intensity samples with an optional RGB plane.
///
/// The RGB plane is present only when the source carried color, so
/// grayscale inputs do not pay for three extra channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    gray: GrayImage,
    rgb: Option<RgbImage>,
}

impl Raster {
    /// Decode raw image bytes.
    ///
    /// Supports PNG, JPEG, BMP, and WebP formats (whatever the `image` crate
    /// can decode). The standard luminance formula is used for RGB-to-gray
    /// conversion: `0.299*R + 0.587*G + 0.114*B`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
    /// Returns [`PipelineError::ImageDecode`] if the image format is
    /// unrecognized or the data is corrupt.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(&img))
    }

    /// Build a raster from an already-decoded image.
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        let rgb = image.color().has_color().then(|| image.to_rgb8());
        Self {
            gray: image.to_luma8(),
            rgb,
        }
    }

    /// Wrap a grayscale image without a color plane.
    #[must_use]
    pub const fn from_gray(gray: GrayImage) -> Self {
        Self { gray, rgb: None }
    }

    /// Wrap an RGB image, deriving the intensity plane from it.
    #[must_use]
    pub fn from_rgb(rgb: RgbImage) -> Self {
        let gray = DynamicImage::ImageRgb8(rgb.clone()).to_luma8();
        Self {
            gray,
            rgb: Some(rgb),
        }
    }

    /// The intensity plane.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// The color plane, if the source had one.
    #[must_use]
    pub const fn rgb(&self) -> Option<&RgbImage> {
        self.rgb.as_ref()
    }

    /// Width and height in pixels.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.gray)
    }

    /// Color at an image-space point, clamped to the canvas.
    ///
    /// Grayscale rasters report the intensity replicated across the
    /// three channels. Returns `None` for an empty raster.
    #[must_use]
    pub fn sample_rgb(&self, point: Point) -> Option<[u8; 3]> {
        let (w, h) = self.gray.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let (x, y) = (
            point.x.round().clamp(0.0, (w - 1) as f64) as u32,
            point.y.round().clamp(0.0, (h - 1) as f64) as u32,
        );
        Some(self.rgb.as_ref().map_or_else(
            || {
                let v = self.gray.get_pixel(x, y).0[0];
                [v, v, v]
            },
            |rgb| rgb.get_pixel(x, y).0,
        ))
    }

    /// Resize both planes to exactly `width` x `height`.
    #[must_use]
    pub fn resized(&self, width: u32, height: u32, filter: image::imageops::FilterType) -> Self {
        Self {
            gray: image::imageops::resize(&self.gray, width, height, filter),
            rgb: self
                .rgb
                .as_ref()
                .map(|rgb| image::imageops::resize(rgb, width, height, filter)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGBA image as a PNG byte buffer.
    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn solid_pixel_png(r: u8, g: u8, b: u8) -> Vec<u8> {
        encode_png(&image::RgbaImage::from_fn(1, 1, |_, _| {
            image::Rgba([r, g, b, 255])
        }))
    }

    #[test]
    fn empty_input_returns_error() {
        let result = Raster::from_bytes(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = Raster::from_bytes(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = image::RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let raster = Raster::from_bytes(&encode_png(&img)).unwrap();
        assert_eq!(
            raster.dimensions(),
            Dimensions {
                width: 17,
                height: 31
            }
        );
        assert!(raster.rgb().is_some());
    }

    #[test]
    fn grayscale_conversion_is_weighted() {
        let r_val = Raster::from_bytes(&solid_pixel_png(255, 0, 0)).unwrap().gray().get_pixel(0, 0).0[0];
        let g_val = Raster::from_bytes(&solid_pixel_png(0, 255, 0)).unwrap().gray().get_pixel(0, 0).0[0];
        let b_val = Raster::from_bytes(&solid_pixel_png(0, 0, 255)).unwrap().gray().get_pixel(0, 0).0[0];

        assert!(
            g_val > r_val && r_val > b_val,
            "expected green > red > blue luminance, got R={r_val} G={g_val} B={b_val}",
        );
    }

    #[test]
    fn gray_source_has_no_color_plane() {
        let raster = Raster::from_dynamic(&DynamicImage::ImageLuma8(GrayImage::new(4, 4)));
        assert!(raster.rgb().is_none());
        assert_eq!(raster.sample_rgb(Point::new(1.0, 1.0)), Some([0, 0, 0]));
    }

    #[test]
    fn sample_rgb_clamps_to_canvas() {
        let rgb = RgbImage::from_fn(3, 3, |x, y| image::Rgb([u8::try_from(x * 10 + y).unwrap(), 0, 0]));
        let raster = Raster::from_rgb(rgb);
        assert_eq!(raster.sample_rgb(Point::new(-5.0, 99.0)), Some([2, 0, 0]));
        assert_eq!(raster.sample_rgb(Point::new(1.4, 0.6)), Some([11, 0, 0]));
    }

    #[test]
    fn resized_keeps_both_planes() {
        let raster = Raster::from_rgb(RgbImage::new(40, 20));
        let small = raster.resized(20, 10, image::imageops::FilterType::Triangle);
        assert_eq!(small.gray().dimensions(), (20, 10));
        assert_eq!(small.rgb().map(RgbImage::dimensions), Some((20, 10)));
    }
}
