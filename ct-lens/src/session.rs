//! 图像会话: 当前加载的图像, 以及在其上进行的预处理, 统计和 ROI 提取.
//!
//! 会话只有两个状态:
//!
//! ```text
//! Empty --load ok--> Loaded --load ok--> Loaded (整体替换)
//!   |                  |
//!   +--load err--> (不变)  +--load err--> (不变)
//! ```
//!
//! 预处理和 ROI 提取都返回新数组, 不修改已加载图像.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::data::{normalize_intensity, resize};
use crate::{
    decode, ImageData, ImageStatistics, LoadedImage, PipelineError, PipelineResult, TargetSize,
};

/// 会话状态.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// 尚未成功加载任何图像.
    Empty,

    /// 持有一幅图像.
    Loaded,
}

/// 单线程会话. 持有至多一幅 [`LoadedImage`].
#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Option<LoadedImage>,
}

impl Session {
    /// 空会话.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前状态.
    #[inline]
    pub fn state(&self) -> SessionState {
        match self.current {
            Some(_) => SessionState::Loaded,
            None => SessionState::Empty,
        }
    }

    /// 当前图像.
    #[inline]
    pub fn current(&self) -> Option<&LoadedImage> {
        self.current.as_ref()
    }

    /// 加载 `path`. 成功时整体替换当前图像; 失败时会话保持原状.
    pub fn load(&mut self, path: impl AsRef<Path>) -> PipelineResult<&LoadedImage> {
        let image = decode::decode(path)?;
        Ok(self.install(image))
    }

    /// 安装一幅已解码的图像.
    #[inline]
    pub fn install(&mut self, image: LoadedImage) -> &LoadedImage {
        self.current.insert(image)
    }

    /// 由调用方显式替换当前图像数据, 如用窗口化后的结果覆盖原始强度.
    pub fn replace_data(&mut self, data: ImageData<f32>) -> PipelineResult<()> {
        let image = self.current.as_mut().ok_or(PipelineError::NoImageLoaded)?;
        image.replace_data(data);
        Ok(())
    }

    /// 清空会话.
    #[inline]
    pub fn clear(&mut self) {
        self.current = None;
    }

    fn loaded(&self) -> PipelineResult<&LoadedImage> {
        self.current.as_ref().ok_or(PipelineError::NoImageLoaded)
    }

    /// 全局 min-max 归一化后缩放到 `target`. 3D 数据保持切片个数.
    ///
    /// 返回新数组, 已加载图像不变.
    pub fn preprocess(&self, target: TargetSize) -> PipelineResult<ImageData<f32>> {
        let image = self.loaded()?;
        let normalized = normalize_intensity(image.data());
        let resized = resize::resize(&normalized, target)?;
        log::info!(
            "预处理完成: {:?} -> {:?}",
            image.data().shape(),
            resized.shape()
        );
        Ok(resized)
    }

    /// 当前图像的统计信息. 空会话返回空结构.
    pub fn statistics(&self) -> ImageStatistics {
        match &self.current {
            Some(image) => ImageStatistics::compute(image.data(), image.pixel_type()),
            None => ImageStatistics::default(),
        }
    }

    /// 截取 `[y..y+height, x..x+width]`. 3D 数据的每张切片都被截取.
    pub fn extract_roi(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> PipelineResult<ImageData<f32>> {
        self.loaded()?.data().crop(x, y, width, height)
    }
}

/// 可在线程间共享的会话.
///
/// 解码在锁外进行, 只有 "替换当前图像" 这一步持有锁, 因此并发加载互不阻塞解码,
/// 且任何时刻观察到的都是某一次完整加载的结果.
#[derive(Debug, Default)]
pub struct SharedSession(Mutex<Session>);

impl SharedSession {
    /// 空会话.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Session> {
        // `Session` 的任何修改都是单步赋值, 中毒后的状态仍然完整.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 加载 `path`, 返回加载后的形状.
    pub fn load(&self, path: impl AsRef<Path>) -> PipelineResult<Vec<usize>> {
        let image = decode::decode(path)?;
        let shape = image.data().shape().to_vec();
        self.guard().install(image);
        Ok(shape)
    }

    /// 在锁内访问会话.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.guard())
    }

    /// 当前状态.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.guard().state()
    }

    /// 见 [`Session::preprocess`].
    #[inline]
    pub fn preprocess(&self, target: TargetSize) -> PipelineResult<ImageData<f32>> {
        self.guard().preprocess(target)
    }

    /// 见 [`Session::statistics`].
    #[inline]
    pub fn statistics(&self) -> ImageStatistics {
        self.guard().statistics()
    }

    /// 消费自我, 获得内部会话.
    pub fn into_inner(self) -> Session {
        self.0.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
