//! Loading uploaded images.
//!
use image::RgbImage;

use crate::error::AnalysisError;

/// Decode an uploaded file. An empty upload means no file was selected.
pub fn load_image(data: &[u8]) -> Result<RgbImage, AnalysisError> {
    if data.is_empty() {
        return Err(AnalysisError::NoFile);
    }

    let image = image::load_from_memory(data)
        .map_err(|err| AnalysisError::Image(err.to_string()))?
        .to_rgb8();
    log::debug!("Loaded {}x{} upload", image.width(), image.height());

    Ok(image)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use image::{ImageOutputFormat, Rgb};

    use super::*;

    #[test]
    fn test_png_upload_is_decoded() {
        let mut png = Cursor::new(vec![]);
        image::DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([200, 10, 10])))
            .write_to(&mut png, ImageOutputFormat::Png)
            .unwrap();

        let image = load_image(png.get_ref()).unwrap();

        assert_eq!(image.dimensions(), (8, 6));
        assert_eq!(image.get_pixel(0, 0), &Rgb([200, 10, 10]));
    }

    #[test]
    fn test_empty_upload_means_no_file() {
        assert!(matches!(load_image(&[]), Err(AnalysisError::NoFile)));
    }

    #[test]
    fn test_unreadable_upload() {
        let err = load_image(b"GIF89a but not really").unwrap_err();
        assert_eq!(err.kind(), "inference-failure");
    }
}
