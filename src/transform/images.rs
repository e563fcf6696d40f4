//! Image to PDF conversion
//!
//! Every accepted image becomes one page sized to the image at 72 dpi. The
//! decoder is chosen from the file extension, matching the acceptance check.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};

use super::commit_output;
use super::error::{Result, TransformError};
use super::operation::{LocalInput, TransformOutput};

/// Resolution at which one image pixel is one PDF point
const PAGE_DPI: f32 = 72.0;

fn format_for(extension: &str) -> Option<ImageFormat> {
    match extension {
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        "bmp" => Some(ImageFormat::Bmp),
        "gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}

/// Drop alpha by compositing over white. Palette and grey images are expanded.
pub fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let over_white = |c: u8| -> u8 {
            let alpha = u16::from(a);
            ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([over_white(r), over_white(g), over_white(b)])
    })
}

fn decode(input: &LocalInput, format: ImageFormat) -> Result<RgbImage> {
    let file = File::open(&input.path)?;
    let image = image::load(BufReader::new(file), format)
        .map_err(|e| TransformError::unreadable(&input.name, e))?;
    Ok(flatten_to_rgb(image))
}

fn px_to_mm(px: u32) -> Mm {
    Mm(px as f32 * 25.4 / PAGE_DPI)
}

/// Write each accepted image as one page, in input order
pub fn images_to_pdf(inputs: &[LocalInput], output: &Path) -> Result<TransformOutput> {
    let mut document = PdfDocument::new("Images");
    let mut pages: Vec<PdfPage> = Vec::with_capacity(inputs.len());
    let mut skipped = Vec::new();

    for input in inputs {
        let Some(format) = input.extension().as_deref().and_then(format_for) else {
            tracing::debug!(file = %input.name, "Skipping unsupported image input");
            skipped.push(input.name.clone());
            continue;
        };

        let rgb = decode(input, format)?;
        let (width, height) = rgb.dimensions();

        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: width as usize,
            height: height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = document.add_image(&raw);

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: None,
                scale_y: None,
                dpi: Some(PAGE_DPI),
                rotate: None,
            },
        }];

        tracing::debug!(file = %input.name, width, height, "Image placed on page");
        pages.push(PdfPage::new(px_to_mm(width), px_to_mm(height), ops));
    }

    if pages.is_empty() {
        return Err(TransformError::NoValidInputs { operation: "image" });
    }

    let page_count = pages.len() as u32;
    document.with_pages(pages);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let bytes = document.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        tracing::debug!(warnings = warnings.len(), "PDF writer reported warnings");
    }

    commit_output(output, &bytes)?;

    tracing::info!(pages = page_count, skipped = skipped.len(), "Image conversion complete");

    Ok(TransformOutput {
        path: output.to_path_buf(),
        page_count: Some(page_count),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_format_from_extension() {
        assert_eq!(format_for("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(format_for("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(format_for("gif"), Some(ImageFormat::Gif));
        assert_eq!(format_for("webp"), None);
    }

    #[test]
    fn test_flatten_composites_over_white() {
        let mut rgba = RgbaImage::new(3, 1);
        rgba.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(2, 0, Rgba([0, 0, 0, 128]));

        let rgb = flatten_to_rgb(DynamicImage::ImageRgba8(rgba));

        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(2, 0), &Rgb([127, 127, 127]));
    }

    #[test]
    fn test_flatten_keeps_opaque_images() {
        let gray = image::GrayImage::from_pixel(2, 2, image::Luma([40]));
        let rgb = flatten_to_rgb(DynamicImage::ImageLuma8(gray));
        assert_eq!(rgb.get_pixel(1, 1), &Rgb([40, 40, 40]));
    }
}
