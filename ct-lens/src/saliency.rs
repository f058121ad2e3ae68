//! 梯度幅值热力图.
//!
//! 这是一个静态的, 不依赖网络的显著性替代品: 对 (可能已归一化的) 图像在两个空间方向上
//! 施加 3x3 Sobel 一阶导数算子, 取欧氏范数作为幅值, 再缩放到字节范围.
//! 真正的反向传播显著性由推理协作者提供, 见 [`crate::inference::InferenceAdapter::saliency`].

use image::{Rgb, RgbImage};
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::data::normalize::intensity_range;
use crate::ImageData;

/// 水平方向 (沿列增长) 的 Sobel 核, 按 `[行][列]` 排列.
const SOBEL_X: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];

/// 垂直方向 (沿行增长) 的 Sobel 核.
const SOBEL_Y: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// 字节范围 (0..=255) 的热力图, 与输入图像空间形状相同.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap(ImageData<u8>);

impl Heatmap {
    /// 包装一幅已经位于字节范围内的热力图, 如推理协作者给出的显著性图.
    #[inline]
    pub fn from_bytes(data: ImageData<u8>) -> Self {
        Self(data)
    }

    /// 底层数据.
    #[inline]
    pub fn data(&self) -> &ImageData<u8> {
        &self.0
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_inner(self) -> ImageData<u8> {
        self.0
    }

    /// 用 JET 伪彩色渲染第 `index` 张切片. 越界时返回 `None`.
    pub fn colorize(&self, index: usize) -> Option<RgbImage> {
        let sli = self.0.slice_at(index)?;
        let (h, w) = sli.dim();
        let mut buf = RgbImage::new(w as u32, h as u32);
        for ((r, c), &v) in sli.indexed_iter() {
            buf.put_pixel(c as u32, r as u32, Rgb(jet(v)));
        }
        Some(buf)
    }
}

/// 计算梯度幅值热力图. 3D 图像逐切片计算, 但整体共享一个缩放范围.
pub fn estimate(image: &ImageData<f32>) -> Heatmap {
    let magnitude = match image {
        ImageData::Planar(a) => ImageData::Planar(gradient_magnitude(a.view())),
        ImageData::Volumetric(a) => {
            let mut out = ndarray::Array3::<f32>::zeros(a.dim());
            for (z, sli) in image.slice_iter().enumerate() {
                out.index_axis_mut(ndarray::Axis(2), z)
                    .assign(&gradient_magnitude(sli));
            }
            ImageData::Volumetric(out)
        }
    };
    Heatmap(to_bytes(&magnitude))
}

/// 单张切片的 Sobel 梯度幅值, 边界像素复制延拓.
pub fn gradient_magnitude(plane: ArrayView2<f32>) -> Array2<f32> {
    let (rows, cols) = plane.dim();
    let at = |r: isize, c: isize| -> f32 {
        let r = r.clamp(0, rows as isize - 1) as usize;
        let c = c.clamp(0, cols as isize - 1) as usize;
        plane[(r, c)]
    };
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (mut gx, mut gy) = (0.0f32, 0.0f32);
        for (i, dr) in (-1isize..=1).enumerate() {
            for (j, dc) in (-1isize..=1).enumerate() {
                let v = at(r as isize + dr, c as isize + dc);
                gx += SOBEL_X[i][j] * v;
                gy += SOBEL_Y[i][j] * v;
            }
        }
        gx.hypot(gy)
    })
}

/// min-max 缩放到 0..=255. 平坦的幅值图 (如常数图像) 全部为 0.
fn to_bytes(magnitude: &ImageData<f32>) -> ImageData<u8> {
    match intensity_range(magnitude) {
        Ok((lo, hi)) => {
            let span = hi - lo;
            magnitude.map(|&v| {
                if v.is_finite() {
                    ((v - lo) / span * 255.0) as u8
                } else {
                    0
                }
            })
        }
        Err(_) => magnitude.map(|_| 0),
    }
}

/// JET 色图. 0 为深蓝, 255 为深红.
pub fn jet(v: u8) -> [u8; 3] {
    let x = v as f32 / 255.0;
    let channel = |offset: f32| ((1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0) * 255.0) as u8;
    [channel(3.0), channel(2.0), channel(1.0)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_flat_image_has_no_saliency() {
        let img: ImageData<f32> = Array2::from_elem((6, 6), 0.4).into();
        let map = estimate(&img);
        assert!(map.data().iter().all(|v| *v == 0));
    }

    #[test]
    fn test_vertical_edge() {
        // 左半为 0, 右半为 1.
        let img: ImageData<f32> =
            Array2::from_shape_fn((5, 8), |(_, c)| (c >= 4) as u8 as f32).into();
        let map = estimate(&img);
        let ImageData::Planar(m) = map.data() else {
            unreachable!()
        };
        for r in 0..5 {
            assert_eq!(m[(r, 0)], 0);
            assert_eq!(m[(r, 3)], 255);
            assert_eq!(m[(r, 4)], 255);
            assert_eq!(m[(r, 7)], 0);
        }
    }

    #[test]
    fn test_gradient_magnitude_is_euclidean() {
        // 沿对角线线性增长: gx = gy = 8 * 斜率.
        let plane = Array2::from_shape_fn((5, 5), |(r, c)| (r + c) as f32);
        let g = gradient_magnitude(plane.view());
        assert!((g[(2, 2)] - (64.0f32 + 64.0).sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_volume_keeps_shape() {
        let img: ImageData<f32> =
            Array3::from_shape_fn((4, 4, 3), |(r, _, z)| (r * z) as f32).into();
        let map = estimate(&img);
        assert_eq!(map.data().shape(), &[4, 4, 3]);
        // 第 0 张切片全为 0, 没有梯度.
        assert!(map.data().slice_at(0).unwrap().iter().all(|v| *v == 0));
        assert!(map.data().slice_at(2).unwrap().iter().any(|v| *v == 255));
    }

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet(0), [0, 0, 127]);
        assert_eq!(jet(255), [127, 0, 0]);
        let mid = jet(128);
        assert!(mid[1] > 200);
    }

    #[test]
    fn test_colorize() {
        let map = Heatmap::from_bytes(Array2::from_elem((3, 2), 255u8).into());
        let rgb = map.colorize(0).unwrap();
        assert_eq!(rgb.dimensions(), (2, 3));
        assert_eq!(rgb.get_pixel(1, 2).0, jet(255));
        assert!(map.colorize(1).is_none());
    }
}
