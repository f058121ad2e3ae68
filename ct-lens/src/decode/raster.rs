//! 普通栅格图像 (PNG/JPEG) 解码.

use std::path::Path;

use image::io::Reader;
use image::{ColorType, DynamicImage, ImageBuffer, Pixel};
use ndarray::Array2;

use super::{luminance, FormatKind};
use crate::data::{ImageData, MetaValue, Metadata, PixelType};
use crate::{LoadedImage, PipelineError, PipelineResult};

pub(super) fn decode(path: &Path) -> PipelineResult<LoadedImage> {
    let reader = Reader::open(path)
        .and_then(Reader::with_guessed_format)
        .map_err(|e| PipelineError::decode(path, e))?;
    let format = reader
        .format()
        .map(|f| format!("{f:?}").to_uppercase())
        .unwrap_or_else(|| crate::consts::UNKNOWN.to_string());
    let img = reader.decode().map_err(|e| PipelineError::decode(path, e))?;
    let mode = mode_name(img.color());

    let plane = to_gray(img).map_err(|e| PipelineError::decode(path, e))?;

    let mut metadata = Metadata::new();
    metadata.insert("Shape", MetaValue::Shape(plane.shape().to_vec()));
    metadata.insert("Format", format);
    metadata.insert("Mode", mode);

    Ok(LoadedImage::new(
        ImageData::Planar(plane),
        path.to_owned(),
        FormatKind::Raster,
        PixelType::Float32,
        metadata,
    ))
}

/// 与 PIL 一致的模式名.
fn mode_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::L16 => "I;16",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => crate::consts::UNKNOWN,
    }
}

/// 逐像素转为 `(行, 列)` 的单通道平面.
fn plane_of<P: Pixel>(
    buf: &ImageBuffer<P, Vec<P::Subpixel>>,
    f: impl Fn(&P) -> f32,
) -> Result<Array2<f32>, ndarray::ShapeError> {
    let (w, h) = buf.dimensions();
    Array2::from_shape_vec((h as usize, w as usize), buf.pixels().map(f).collect())
}

/// 灰度保留原值, 彩色按 BT.601 转为亮度, alpha 通道被丢弃.
fn to_gray(img: DynamicImage) -> Result<Array2<f32>, ndarray::ShapeError> {
    let rgb = |p: [f32; 3]| luminance(p[0], p[1], p[2]);
    match img {
        DynamicImage::ImageLuma8(buf) => plane_of(&buf, |p| p[0] as f32),
        DynamicImage::ImageLuma16(buf) => plane_of(&buf, |p| p[0] as f32),
        DynamicImage::ImageLumaA8(buf) => plane_of(&buf, |p| p[0] as f32),
        DynamicImage::ImageLumaA16(buf) => plane_of(&buf, |p| p[0] as f32),
        DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => {
            plane_of(&img.to_rgb16(), |p| rgb(p.0.map(|v| v as f32)))
        }
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            plane_of(&img.to_rgb32f(), |p| rgb(p.0))
        }
        _ => plane_of(&img.to_rgb8(), |p| rgb(p.0.map(|v| v as f32))),
    }
}
