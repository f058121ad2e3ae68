//! NIfTI 解码. `.nii.gz` 的解压由 `nifti` 的读取器按扩展名自动完成.

use std::path::Path;

use ndarray::{ArrayD, Axis, Ix2, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use super::FormatKind;
use crate::data::{ImageData, MetaValue, Metadata, PixelType};
use crate::{LoadedImage, PipelineError, PipelineResult};

pub(super) fn decode(path: &Path) -> PipelineResult<LoadedImage> {
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| PipelineError::decode(path, e))?;
    let header = obj.header().clone();

    // [W, H, z, ...], 第一维向下增长, 第二维向右增长.
    let raw = obj
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| PipelineError::decode(path, e))?;
    let data = into_image(squeeze_trailing(raw))
        .map_err(|reason| PipelineError::decode(path, reason))?;

    // 元数据与数组同序: (行, 列, 切片).
    let [_, dx, dy, dz, ..] = header.pixdim.map(|v| v as f64);
    let pixel_dims = match data.ndim() {
        2 => vec![dy, dx],
        _ => vec![dy, dx, dz],
    };
    let mut metadata = Metadata::new();
    metadata.insert("Shape", MetaValue::Shape(data.shape().to_vec()));
    metadata.insert(
        "Affine",
        MetaValue::Matrix(swap_row_col(nifti_affine(&header))),
    );
    metadata.insert("PixelDims", pixel_dims);
    metadata.insert_or("Description", description(&header), MetaValue::unknown_text());

    Ok(LoadedImage::new(
        data,
        path.to_owned(),
        FormatKind::Nifti,
        PixelType::Float32,
        metadata,
    ))
}

/// 去掉第三维之后长度为 1 的维度, 如 `[W, H, z, 1]`.
fn squeeze_trailing(mut data: ArrayD<f32>) -> ArrayD<f32> {
    while data.ndim() > 3 && data.shape()[data.ndim() - 1] == 1 {
        let last = data.ndim() - 1;
        data = data.index_axis_move(Axis(last), 0);
    }
    data
}

/// `[W, H]` -> `(H, W)`, `[W, H, z]` -> `(H, W, z)`.
fn into_image(data: ArrayD<f32>) -> Result<ImageData<f32>, String> {
    match data.ndim() {
        2 => {
            let a = data.into_dimensionality::<Ix2>().map_err(|e| e.to_string())?;
            Ok(a.reversed_axes().as_standard_layout().into_owned().into())
        }
        3 => {
            let a = data.into_dimensionality::<Ix3>().map_err(|e| e.to_string())?;
            Ok(a.permuted_axes([1, 0, 2]).as_standard_layout().into_owned().into())
        }
        _ => Err(format!("不支持 {} 维数据 {:?}", data.ndim(), data.shape())),
    }
}

fn description(header: &NiftiHeader) -> Option<MetaValue> {
    let end = header
        .descrip
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(header.descrip.len());
    let s = String::from_utf8_lossy(&header.descrip[..end]);
    let s = s.trim();
    (!s.is_empty()).then(|| MetaValue::Text(s.to_string()))
}

/// 体素索引到世界坐标的 4x4 仿射变换, 行优先.
///
/// 输入为文件中的索引顺序 `(i, j, k)`, 即 `[W, H, z]`. 解码后的数组是 `(H, W, z)`,
/// 元数据中的 `Affine` 已交换前两列.
///
/// 优先使用 sform (`sform_code > 0`), 其次 qform 四元数 (`qform_code > 0`),
/// 都没有时退化为以体素尺寸为对角线的缩放矩阵.
pub fn nifti_affine(header: &NiftiHeader) -> [[f64; 4]; 4] {
    let row = |r: [f32; 4]| r.map(|v| v as f64);
    let [_, dx, dy, dz, ..] = header.pixdim.map(|v| v as f64);

    if header.sform_code > 0 {
        return [
            row(header.srow_x),
            row(header.srow_y),
            row(header.srow_z),
            [0.0, 0.0, 0.0, 1.0],
        ];
    }

    if header.qform_code > 0 {
        let (b, c, d) = (
            header.quatern_b as f64,
            header.quatern_c as f64,
            header.quatern_d as f64,
        );
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let r = [
            [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
            [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
            [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - c * c - b * b],
        ];
        let scale = [dx, dy, dz * qfac];
        let offset = [
            header.quatern_x as f64,
            header.quatern_y as f64,
            header.quatern_z as f64,
        ];
        let mut m = [[0.0; 4]; 4];
        for i in 0..3 {
            for j in 0..3 {
                m[i][j] = r[i][j] * scale[j];
            }
            m[i][3] = offset[i];
        }
        m[3][3] = 1.0;
        return m;
    }

    [
        [dx, 0.0, 0.0, 0.0],
        [0.0, dy, 0.0, 0.0],
        [0.0, 0.0, dz, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// 交换仿射矩阵的前两列, 使其作用于 `(行, 列, 切片)` 索引.
fn swap_row_col(mut m: [[f64; 4]; 4]) -> [[f64; 4]; 4] {
    for row in m.iter_mut() {
        row.swap(0, 1);
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array2, Array3, IxDyn};
    use nifti::writer::WriterOptions;

    fn header() -> NiftiHeader {
        let mut h = NiftiHeader::default();
        h.pixdim = [1.0, 0.7, 0.8, 2.5, 1.0, 1.0, 1.0, 1.0];
        h.sform_code = 0;
        h.qform_code = 0;
        h
    }

    #[test]
    fn test_affine_fallback_is_voxel_size() {
        let m = nifti_affine(&header());
        assert_eq!(m[0][0], 0.7f32 as f64);
        assert_eq!(m[1][1], 0.8f32 as f64);
        assert_eq!(m[2][2], 2.5);
        assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_affine_prefers_sform() {
        let mut h = header();
        h.sform_code = 1;
        h.qform_code = 1;
        h.srow_x = [-0.5, 0.0, 0.0, 100.0];
        h.srow_y = [0.0, 0.5, 0.0, -20.0];
        h.srow_z = [0.0, 0.0, 3.0, 7.0];
        let m = nifti_affine(&h);
        assert_eq!(m[0], [-0.5, 0.0, 0.0, 100.0]);
        assert_eq!(m[1], [0.0, 0.5, 0.0, -20.0]);
        assert_eq!(m[2], [0.0, 0.0, 3.0, 7.0]);
    }

    #[test]
    fn test_affine_from_quaternion() {
        // 绕 z 轴旋转 180 度: (b, c, d) = (0, 0, 1).
        let mut h = header();
        h.qform_code = 1;
        h.pixdim = [1.0, 2.0, 2.0, 4.0, 1.0, 1.0, 1.0, 1.0];
        (h.quatern_b, h.quatern_c, h.quatern_d) = (0.0, 0.0, 1.0);
        (h.quatern_x, h.quatern_y, h.quatern_z) = (10.0, 20.0, 30.0);
        let m = nifti_affine(&h);
        assert_eq!(m[0], [-2.0, 0.0, 0.0, 10.0]);
        assert_eq!(m[1], [0.0, -2.0, 0.0, 20.0]);
        assert_eq!(m[2], [0.0, 0.0, 4.0, 30.0]);
    }

    #[test]
    fn test_squeeze_and_reorder() {
        let raw = Array::from_shape_fn(IxDyn(&[4, 3, 2, 1]), |ix| {
            (ix[0] + ix[1] * 10 + ix[2] * 100) as f32
        });
        let img = into_image(squeeze_trailing(raw)).unwrap();
        assert_eq!(img.shape(), &[3, 4, 2]);
        let ImageData::Volumetric(a) = img else {
            unreachable!()
        };
        // (h, w, z) 对应原 [w, h, z].
        assert_eq!(a[(2, 1, 1)], 121.0);

        let raw = Array::<f32, _>::zeros(IxDyn(&[4, 3, 2, 5]));
        assert!(into_image(squeeze_trailing(raw)).is_err());

        let raw = Array::<f32, _>::zeros(IxDyn(&[4, 3]));
        assert_eq!(into_image(raw).unwrap().shape(), &[3, 4]);
    }

    #[test]
    fn test_decode_written_volume() {
        let dir = tempfile::tempdir().unwrap();
        let vol = Array3::from_shape_fn((4, 3, 2), |(w, h, z)| (w + h * 10 + z * 100) as f32);
        for name in ["vol.nii", "vol.nii.gz"] {
            let p = dir.path().join(name);
            WriterOptions::new(&p).write_nifti(&vol).unwrap();
            let img = decode(&p).unwrap();
            assert_eq!(img.format(), FormatKind::Nifti);
            assert_eq!(img.pixel_type(), PixelType::Float32);
            assert_eq!(img.data().shape(), &[3, 4, 2]);
            let ImageData::Volumetric(a) = img.data() else {
                unreachable!()
            };
            assert_eq!(a[(1, 3, 1)], 113.0);
            assert!(matches!(img.metadata().get("Affine"), Some(MetaValue::Matrix(_))));
        }
    }

    #[test]
    fn test_anisotropic_spacing_follows_array_axes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("aniso.nii");
        let mut h = header();
        h.pixdim = [1.0, 0.5, 2.0, 3.0, 1.0, 1.0, 1.0, 1.0];
        let vol = Array3::<f32>::zeros((4, 3, 2));
        WriterOptions::new(&p)
            .reference_header(&h)
            .write_nifti(&vol)
            .unwrap();

        let img = decode(&p).unwrap();
        assert_eq!(img.data().shape(), &[3, 4, 2]);
        assert_eq!(
            img.metadata().get("PixelDims"),
            Some(&MetaValue::Numbers(vec![2.0, 0.5, 3.0]))
        );
        let Some(MetaValue::Matrix(m)) = img.metadata().get("Affine") else {
            unreachable!()
        };
        // 行索引沿 y, 列索引沿 x.
        assert_eq!(m[0], [0.0, 0.5, 0.0, 0.0]);
        assert_eq!(m[1], [2.0, 0.0, 0.0, 0.0]);
        assert_eq!(m[2], [0.0, 0.0, 3.0, 0.0]);

        let p2 = dir.path().join("plane.nii");
        WriterOptions::new(&p2)
            .reference_header(&h)
            .write_nifti(&Array2::<f32>::zeros((4, 3)))
            .unwrap();
        let img = decode(&p2).unwrap();
        assert_eq!(img.data().shape(), &[3, 4]);
        assert_eq!(
            img.metadata().get("PixelDims"),
            Some(&MetaValue::Numbers(vec![2.0, 0.5]))
        );
    }
}
