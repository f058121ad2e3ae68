//! CT 窗口 (窗位 + 窗宽), 把 HU 值映射为 8-bit 灰度.

use super::ImageData;
use crate::consts::window as preset;
use crate::{PipelineError, PipelineResult};

/// CT 窗口, 包含窗位 (window center / level) 和窗宽 (window width).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CtWindow {
    level: f32,
    width: f32,
}

impl CtWindow {
    /// 构建 CT 窗.
    ///
    /// `level` 必须有限, `width` 必须有限且为正, 否则返回
    /// [`PipelineError::DegenerateIntensityRange`].
    pub fn new(level: f32, width: f32) -> PipelineResult<CtWindow> {
        if level.is_finite() && width.is_finite() && width > 0.0 {
            Ok(Self { level, width })
        } else {
            Err(PipelineError::DegenerateIntensityRange {
                lo: level - width / 2.0,
                hi: level + width / 2.0,
            })
        }
    }

    /// 构建一个便于展示肝脏结构的 CT 窗口. 窗位 60, 窗宽 200.
    #[inline]
    pub const fn from_liver_visual() -> CtWindow {
        Self::from_pair(preset::LIVER)
    }

    /// 腹部软组织窗. 窗位 40, 窗宽 400.
    #[inline]
    pub const fn from_abdomen() -> CtWindow {
        Self::from_pair(preset::ABDOMEN)
    }

    /// 肺窗. 窗位 -600, 窗宽 1500.
    #[inline]
    pub const fn from_lung() -> CtWindow {
        Self::from_pair(preset::LUNG)
    }

    /// 骨窗. 窗位 400, 窗宽 1800.
    #[inline]
    pub const fn from_bone() -> CtWindow {
        Self::from_pair(preset::BONE)
    }

    /// 脑窗. 窗位 40, 窗宽 80.
    #[inline]
    pub const fn from_brain() -> CtWindow {
        Self::from_pair(preset::BRAIN)
    }

    /// 仅用于编译期已知合法的常量.
    const fn from_pair((level, width): (f32, f32)) -> CtWindow {
        Self { level, width }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 求在当前 CT 窗设置下, `ct` HU 值对应的灰度图像素整数值 (0 <= value <= 255).
    ///
    /// 如果 `ct` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, ct: f32) -> Option<u8> {
        self.eval_f32(ct).map(|v| v as u8)
    }

    /// 求在当前 CT 窗设置下, `ct` HU 值对应的灰度图像素分布点 (0.0 <= value <= 255.0).
    ///
    /// 如果 `ct` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval_f32(&self, ct: f32) -> Option<f32> {
        if !ct.is_finite() {
            return None;
        }
        let lb = self.lower_bound();
        if ct <= lb {
            Some(0.0)
        } else if ct >= self.upper_bound() {
            Some(255.0)
        } else {
            // 255, not 256.
            Some((ct - lb) / self.width() * 255.0)
        }
    }

    /// 对整幅图像开窗. 无意义的像素值映射为 0.
    pub fn apply(&self, image: &ImageData<f32>) -> ImageData<u8> {
        image.map(|&ct| self.eval(ct).unwrap_or(u8::MIN))
    }
}

/// 按窗位 `center` 和窗宽 `width` 对图像开窗.
///
/// 当 `width <= 0` (即窗上限不大于窗下限) 时, 窗口退化,
/// 整幅图像饱和为 255.
pub fn apply_window(image: &ImageData<f32>, center: f32, width: f32) -> ImageData<u8> {
    match CtWindow::new(center, width) {
        Ok(window) => window.apply(image),
        Err(e) => {
            log::warn!("{e}, 整幅图像饱和为 255");
            image.map(|_| u8::MAX)
        }
    }
}
