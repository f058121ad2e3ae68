//! DICOM 解码.
//!
//! 像素值经过模态 LUT (`RescaleSlope`/`RescaleIntercept`) 转换. 如果文件给出了
//! `WindowCenter`/`WindowWidth`, 数据随后被窗口化为 8-bit 灰度.

use std::path::Path;

use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::{open_file, InMemDicomObject};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use ndarray::{Array2, Array3};

use super::{luminance, FormatKind};
use crate::data::window::apply_window;
use crate::data::{ImageData, MetaValue, Metadata, PixelType};
use crate::{LoadedImage, PipelineError, PipelineResult};

/// 元信息键与对应的文本标签.
const TEXT_TAGS: [(&str, Tag); 4] = [
    ("PatientName", tags::PATIENT_NAME),
    ("PatientID", tags::PATIENT_ID),
    ("StudyDate", tags::STUDY_DATE),
    ("Modality", tags::MODALITY),
];

/// 返回的是模态 LUT 之后的值 (CT 即 HU), 而非文件中的原始存储值.
pub(super) fn decode(path: &Path) -> PipelineResult<LoadedImage> {
    let obj = open_file(path).map_err(|e| PipelineError::decode(path, e))?;
    let mut metadata = dicom_metadata(&obj);

    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| PipelineError::decode(path, e))?;
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::Default);
    let values: Vec<f32> = decoded
        .to_vec_with_options(&options)
        .map_err(|e| PipelineError::decode(path, e))?;

    let rows = decoded.rows() as usize;
    let cols = decoded.columns() as usize;
    let frames = decoded.number_of_frames() as usize;
    let samples = decoded.samples_per_pixel() as usize;
    if values.len() != rows * cols * frames * samples {
        return Err(PipelineError::decode(
            path,
            format!(
                "像素个数 {} 与 {rows}x{cols}x{frames}x{samples} 不符",
                values.len()
            ),
        ));
    }

    let gray: Vec<f32> = match samples {
        1 => values,
        3 => values
            .chunks_exact(3)
            .map(|p| luminance(p[0], p[1], p[2]))
            .collect(),
        n => return Err(PipelineError::decode(path, format!("不支持 {n} 通道像素"))),
    };

    let data: ImageData<f32> = if frames == 1 {
        Array2::from_shape_vec((rows, cols), gray)
            .map_err(|e| PipelineError::decode(path, e))?
            .into()
    } else {
        // 帧在最外层: [z, H, W] -> [H, W, z].
        Array3::from_shape_vec((frames, rows, cols), gray)
            .map_err(|e| PipelineError::decode(path, e))?
            .permuted_axes([1, 2, 0])
            .as_standard_layout()
            .into_owned()
            .into()
    };
    metadata.insert("ImageShape", MetaValue::Shape(data.shape().to_vec()));

    let (data, pixel_type) = match dicom_window(&obj) {
        Some((center, width)) => {
            log::debug!("应用文件自带的窗口: center = {center}, width = {width}");
            let windowed = apply_window(&data, center, width);
            (windowed.map(|v| *v as f32), PixelType::UInt8)
        }
        None => (data, PixelType::Float32),
    };

    Ok(LoadedImage::new(
        data,
        path.to_owned(),
        FormatKind::Dicom,
        pixel_type,
        metadata,
    ))
}

#[inline]
fn text_of(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    let elem = obj.get(tag)?;
    let s = elem.to_str().ok()?;
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[inline]
fn numbers_of(obj: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    let elem = obj.get(tag)?;
    elem.to_multi_float64().ok().filter(|v| !v.is_empty())
}

/// 从 DICOM 数据集中提取元信息. 缺失的字段以哨兵值填充:
///
/// + `PatientName`, `PatientID`, `StudyDate`, `Modality`: 缺失为 `"Unknown"`;
/// + `SliceThickness`: 缺失为 `0`;
/// + `PixelSpacing`: 缺失为 `[1, 1]`.
///
/// 窗口字段只在文件中存在时才写入.
pub fn dicom_metadata(obj: &InMemDicomObject) -> Metadata {
    let mut meta = Metadata::new();
    for (key, tag) in TEXT_TAGS {
        meta.insert_or(key, text_of(obj, tag).map(MetaValue::Text), MetaValue::unknown_text());
    }
    meta.insert_or(
        "SliceThickness",
        numbers_of(obj, tags::SLICE_THICKNESS).map(|v| MetaValue::Number(v[0])),
        MetaValue::Number(0.0),
    );
    meta.insert_or(
        "PixelSpacing",
        numbers_of(obj, tags::PIXEL_SPACING).map(MetaValue::Numbers),
        MetaValue::Numbers(vec![1.0, 1.0]),
    );
    if let Some((center, width)) = dicom_window(obj) {
        meta.insert("WindowCenter", center as f64);
        meta.insert("WindowWidth", width as f64);
    }
    meta
}

/// 文件自带的显示窗口 `(center, width)`. 多值时取第一个.
pub fn dicom_window(obj: &InMemDicomObject) -> Option<(f32, f32)> {
    let center = numbers_of(obj, tags::WINDOW_CENTER)?;
    let width = numbers_of(obj, tags::WINDOW_WIDTH)?;
    Some((center[0] as f32, width[0] as f32))
}
