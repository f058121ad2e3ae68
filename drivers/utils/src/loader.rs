//! 对 `ct-lens::dataset` 的更一层封装. 提供从环境变量读取的运行配置.

use std::env;
use std::path::PathBuf;

use ct_lens::dataset::{self, DirLoader};
use ct_lens::{PipelineResult, TargetSize};

/// 获取图像目录.
///
/// 1. 若环境变量 `$CT_LENS_DATA_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/ct-lens`.
pub fn data_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("CT_LENS_DATA_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir_with(["ct-lens"]),
    }
}

/// 从 `$CT_LENS_DATA_DIR` 或者 `$HOME/dataset/ct-lens` 创建目录加载器.
pub fn dir_loader_from_env_or_home() -> Option<PipelineResult<DirLoader>> {
    data_dir_from_env_or_home().map(DirLoader::open)
}

/// 预处理目标尺寸.
///
/// 1. 若环境变量 `$CT_LENS_TARGET` 形如 `宽x高`, 则返回其值;
/// 2. 未设置时返回默认的 512x512.
pub fn target_from_env() -> PipelineResult<TargetSize> {
    match env::var("CT_LENS_TARGET") {
        Ok(s) if !s.trim().is_empty() => s.parse(),
        _ => Ok(TargetSize::default()),
    }
}

/// 可视化输出目录 `$CT_LENS_OUT_DIR`. 未设置时不输出图片.
pub fn out_dir_from_env() -> Option<PathBuf> {
    env::var_os("CT_LENS_OUT_DIR")
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
}

/// JSON 摘要输出路径 `$CT_LENS_SURVEY_JSON`. 未设置时不输出.
pub fn survey_json_from_env() -> Option<PathBuf> {
    env::var_os("CT_LENS_SURVEY_JSON")
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
}
