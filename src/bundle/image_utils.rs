//! 页面图片读取与 JPEG 转码。

use std::path::Path;

use image::GenericImageView;

use super::pdf::PageImage;

pub const JPEG_QUALITY: u8 = 92;

/// 读取一张页面图片（png/jpeg/webp/gif），统一转成 RGB JPEG 以便直接嵌入 PDF。
pub(crate) fn load_page(path: &Path) -> Result<PageImage, image::ImageError> {
    let bytes = std::fs::read(path).map_err(image::ImageError::IoError)?;
    let img = image::load_from_memory(&bytes)?;
    let (width, height) = img.dimensions();

    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder.encode(&rgb, width, height, image::ExtendedColorType::Rgb8)?;

    Ok(PageImage {
        width,
        height,
        jpeg,
    })
}
