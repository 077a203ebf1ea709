use std::io::Cursor;

use image::{DynamicImage, GrayImage};

use crate::error::ProcessError;

/// Converts a scan to a grayscale, contrast-stretched PNG for recognition.
pub fn prepare_for_ocr(image_data: &[u8]) -> Result<Vec<u8>, ProcessError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to load image: {}", e)))?;

    let gray = stretch_contrast(img.to_luma8());

    let mut png_data = Vec::new();
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to encode image: {}", e)))?;

    Ok(png_data)
}

/// Linearly maps the darkest pixel to 0 and the lightest to 255.
/// Flat images are returned unchanged.
fn stretch_contrast(mut gray: GrayImage) -> GrayImage {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if max <= min {
        return gray;
    }

    let range = u32::from(max - min);
    for pixel in gray.pixels_mut() {
        let value = u32::from(pixel[0] - min) * 255 / range;
        pixel[0] = value as u8;
    }
    gray
}
