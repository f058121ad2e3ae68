//! 🩻欢迎光临🩺
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::save::{ImgWriteRaw, ImgWriteVis};
pub use crate::data::window::{apply_window, CtWindow};
pub use crate::data::{
    normalize_intensity, ImageData, ImageStatistics, LoadedImage, MetaValue, Metadata, PixelType,
    TargetSize,
};

pub use crate::consts::gray::{SEG_ABNORMAL, SEG_BACKGROUND};

pub use crate::analysis::{AnalysisResult, Analyzer, Progress};
pub use crate::inference::{
    ClassificationResult, InferenceAdapter, InferenceError, RawClassification, SegmentationResult,
};
pub use crate::risk::{RiskAssessment, RiskLevel, RiskPolicy};
pub use crate::saliency::Heatmap;

pub use crate::dataset::{home_dataset_dir_with, DirLoader};
pub use crate::decode::{FormatKind, ImageFamily};
pub use crate::session::{Session, SessionState, SharedSession};
pub use crate::{PipelineError, PipelineResult};
