//! 图像的可视化存储. 仅用于查看, 报告格式不在本 crate 范围内.

use std::path::Path;

use image::{GrayImage, ImageError, ImageResult, Luma};
use ndarray::ArrayView2;

use super::normalize::intensity_range;
use super::ImageData;
use crate::saliency::Heatmap;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 对于浮点强度图像, 存储时线性拉伸到 8-bit 灰度; 对于热力图,
/// 存储时使用 JET 伪彩色; 对于分割掩码, 背景为黑色, 其它标签为白色.
/// 3D 数据只存储中间那张切片.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 中间切片. 空体数据返回 `None`.
#[inline]
fn middle_slice<T>(data: &ImageData<T>) -> Option<ArrayView2<'_, T>> {
    data.slice_at(data.depth() / 2)
}

fn empty_error() -> ImageError {
    ImageError::Parameter(image::error::ParameterError::from_kind(
        image::error::ParameterErrorKind::DimensionMismatch,
    ))
}

/// 按 `pixel` 把切片逐像素写进灰度图.
fn gray_from<T: Copy>(sli: ArrayView2<'_, T>, mut pixel: impl FnMut(T) -> u8) -> GrayImage {
    let (height, width) = sli.dim();
    let mut buf = GrayImage::new(width as u32, height as u32);
    for ((h, w), &v) in sli.indexed_iter() {
        buf.put_pixel(w as u32, h as u32, Luma([pixel(v)]));
    }
    buf
}

/// 以切片自身的强度范围拉伸到 0..=255. 平坦切片存为全黑.
impl ImgWriteVis for ImageData<f32> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let sli = middle_slice(self).ok_or_else(empty_error)?;
        let range = intensity_range(&ImageData::Planar(sli.to_owned())).ok();
        let buf = gray_from(sli, |v| match range {
            Some((lo, hi)) if v.is_finite() => ((v - lo) / (hi - lo) * 255.0) as u8,
            _ => u8::MIN,
        });
        buf.save(path)
    }
}

/// 背景为黑色, 其它标签为白色.
impl ImgWriteVis for ImageData<u8> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        use crate::consts::gray::*;
        let sli = middle_slice(self).ok_or_else(empty_error)?;
        gray_from(sli, |v| if is_background(v) { BLACK } else { WHITE }).save(path)
    }
}

/// 按原样存储.
impl ImgWriteRaw for ImageData<u8> {
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let sli = middle_slice(self).ok_or_else(empty_error)?;
        gray_from(sli, |v| v).save(path)
    }
}

/// JET 伪彩色.
impl ImgWriteVis for Heatmap {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let index = self.data().depth() / 2;
        self.colorize(index).ok_or_else(empty_error)?.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_save_scan_and_mask() {
        let dir = tempfile::tempdir().unwrap();

        let scan: ImageData<f32> =
            Array3::from_shape_fn((6, 4, 3), |(h, w, z)| (h * 4 + w + z) as f32).into();
        let p = dir.path().join("scan.png");
        scan.save(&p).unwrap();
        let back = image::open(&p).unwrap().to_luma8();
        assert_eq!(back.dimensions(), (4, 6));
        assert_eq!(back.get_pixel(0, 0).0, [0]);
        assert_eq!(back.get_pixel(3, 5).0, [255]);

        let mask: ImageData<u8> = Array2::from_shape_fn((2, 2), |(h, w)| (h + w) as u8).into();
        let p = dir.path().join("mask.png");
        mask.save(&p).unwrap();
        let back = image::open(&p).unwrap().to_luma8();
        assert_eq!(back.get_pixel(0, 0).0, [0]);
        assert_eq!(back.get_pixel(1, 1).0, [255]);

        let p = dir.path().join("mask_raw.png");
        mask.save_raw(&p).unwrap();
        let back = image::open(&p).unwrap().to_luma8();
        assert_eq!(back.get_pixel(1, 1).0, [2]);
    }

    #[test]
    fn test_save_empty_volume_fails() {
        let dir = tempfile::tempdir().unwrap();
        let scan: ImageData<f32> = Array3::<f32>::zeros((2, 2, 0)).into();
        assert!(scan.save(dir.path().join("x.png")).is_err());
    }
}
