//! Reference transformations.

use image::DynamicImage;
use image::imageops::FilterType;

use crate::domain::errors::LoadError;
use crate::domain::ports::Transformation;

/// Scales the image to fit inside a box, preserving aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    /// Box width.
    pub width: u32,
    /// Box height.
    pub height: u32,
}

impl Resize {
    /// Creates a resize into a `width` x `height` box.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Transformation for Resize {
    fn key(&self) -> String {
        format!("resize({}x{})", self.width, self.height)
    }

    fn transform(&self, image: DynamicImage) -> Result<DynamicImage, LoadError> {
        if self.width == 0 || self.height == 0 {
            return Err(LoadError::transform(format!(
                "cannot resize into {}x{}",
                self.width, self.height
            )));
        }
        Ok(image.resize(self.width, self.height, FilterType::Lanczos3))
    }
}

/// Cuts a centered region, clamped to the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenterCrop {
    /// Region width.
    pub width: u32,
    /// Region height.
    pub height: u32,
}

impl CenterCrop {
    /// Creates a centered crop of `width` x `height`.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Transformation for CenterCrop {
    fn key(&self) -> String {
        format!("crop({}x{})", self.width, self.height)
    }

    fn transform(&self, image: DynamicImage) -> Result<DynamicImage, LoadError> {
        if self.width == 0 || self.height == 0 {
            return Err(LoadError::transform(format!(
                "cannot crop to {}x{}",
                self.width, self.height
            )));
        }
        let width = self.width.min(image.width());
        let height = self.height.min(image.height());
        if width == image.width() && height == image.height() {
            return Ok(image);
        }
        let x = (image.width() - width) / 2;
        let y = (image.height() - height) / 2;
        Ok(image.crop_imm(x, y, width, height))
    }
}

/// Converts to 8-bit luma.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Grayscale;

impl Transformation for Grayscale {
    fn key(&self) -> String {
        "grayscale".to_string()
    }

    fn transform(&self, image: DynamicImage) -> Result<DynamicImage, LoadError> {
        Ok(image.grayscale())
    }
}

/// Gaussian blur.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blur {
    /// Standard deviation of the kernel.
    pub sigma: f32,
}

impl Blur {
    /// Creates a blur with the given sigma.
    #[must_use]
    pub const fn new(sigma: f32) -> Self {
        Self { sigma }
    }
}

impl Transformation for Blur {
    fn key(&self) -> String {
        format!("blur({})", self.sigma)
    }

    fn transform(&self, image: DynamicImage) -> Result<DynamicImage, LoadError> {
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(LoadError::transform(format!("invalid blur sigma {}", self.sigma)));
        }
        if self.sigma < f32::EPSILON {
            return Ok(image);
        }
        Ok(image.blur(self.sigma))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::TransformationGroup;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::sync::Arc;

    #[test]
    fn test_keys_are_distinct_and_stable() {
        assert_eq!(Resize::new(10, 20).key(), "resize(10x20)");
        assert_eq!(CenterCrop::new(5, 5).key(), "crop(5x5)");
        assert_eq!(Grayscale.key(), "grayscale");
        assert_eq!(Blur::new(1.5).key(), "blur(1.5)");
        assert_ne!(Resize::new(10, 20).key(), Resize::new(20, 10).key());
    }

    #[test]
    fn test_resize_fits_box() {
        let image = DynamicImage::new_rgb8(100, 50);
        let out = Resize::new(40, 40).transform(image).unwrap();
        assert_eq!(out.dimensions(), (40, 20));
    }

    #[test]
    fn test_resize_rejects_zero_box() {
        let err = Resize::new(0, 10)
            .transform(DynamicImage::new_rgb8(4, 4))
            .unwrap_err();
        assert!(matches!(err, LoadError::Transform { .. }));
    }

    #[test]
    fn test_center_crop_takes_middle() {
        let mut pixels = RgbImage::new(3, 3);
        pixels.put_pixel(1, 1, Rgb([255, 0, 0]));
        let out = CenterCrop::new(1, 1)
            .transform(DynamicImage::ImageRgb8(pixels))
            .unwrap();

        assert_eq!(out.dimensions(), (1, 1));
        assert_eq!(out.to_rgb8().get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_center_crop_clamps_to_image() {
        let out = CenterCrop::new(100, 5)
            .transform(DynamicImage::new_rgb8(20, 10))
            .unwrap();
        assert_eq!(out.dimensions(), (20, 5));
    }

    #[test]
    fn test_grayscale_changes_color_type() {
        let out = Grayscale.transform(DynamicImage::new_rgb8(2, 2)).unwrap();
        assert_eq!(out.color(), image::ColorType::L8);
    }

    #[test]
    fn test_blur_rejects_negative_sigma() {
        assert!(Blur::new(-1.0).transform(DynamicImage::new_rgb8(2, 2)).is_err());
        let out = Blur::new(1.0).transform(DynamicImage::new_rgb8(8, 8)).unwrap();
        assert_eq!(out.dimensions(), (8, 8));
    }

    #[test]
    fn test_group_applies_in_order() {
        let group = TransformationGroup::new(vec![
            Arc::new(CenterCrop::new(50, 50)),
            Arc::new(Resize::new(10, 10)),
            Arc::new(Grayscale),
        ]);

        let out = group.transform(DynamicImage::new_rgb8(100, 60)).unwrap();

        assert_eq!(group.key(), "crop(50x50)resize(10x10)grayscale");
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(out.color(), image::ColorType::L8);
    }
}
