//! 程序运行函数.

use std::path::{Path, PathBuf};
use std::thread;

use ct_lens::prelude::*;
use ct_lens::saliency;
use utils::loader;

use crate::result::{Outcome, Record, SurveyResult};

/// 实际运行.
pub fn run() -> PipelineResult<SurveyResult> {
    let data_dir = loader::data_dir_from_env_or_home()
        .ok_or_else(|| PipelineError::FileNotFound(PathBuf::from("$HOME/dataset/ct-lens")))?;
    let target = loader::target_from_env()?;
    let out_dir = loader::out_dir_from_env();
    if let Some(d) = out_dir.as_deref() {
        std::fs::create_dir_all(d).map_err(|e| {
            log::error!("无法创建输出目录 {}: {e}", d.display());
            PipelineError::FileNotFound(d.to_owned())
        })?;
    }

    let paths: Vec<PathBuf> = DirLoader::open(&data_dir)?
        .paths()
        .map(Path::to_owned)
        .collect();
    let chunk = paths.len().div_ceil(utils::cpus()).max(1);
    log::info!(
        "巡检 {} 中的 {} 个文件, 目标尺寸 {}x{}",
        data_dir.display(),
        paths.len(),
        target.width(),
        target.height()
    );

    let out_dir = out_dir.as_deref();
    let records: Vec<Record> = thread::scope(|s| {
        let handles: Vec<_> = paths
            .chunks(chunk)
            .map(|part| {
                s.spawn(move || {
                    part.iter()
                        .map(|p| survey_one(p, target, out_dir))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|th| th.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    Ok(SurveyResult::new(records))
}

/// 巡检单个文件. 失败不会中断整个巡检.
fn survey_one(path: &Path, target: TargetSize, out_dir: Option<&Path>) -> Record {
    let outcome = match inspect(path, target, out_dir) {
        Ok(o) => o,
        Err(e) => {
            log::warn!("跳过 {}: {e}", path.display());
            Outcome::Failed {
                reason: e.to_string(),
            }
        }
    };
    Record {
        path: path.to_owned(),
        outcome,
    }
}

fn inspect(path: &Path, target: TargetSize, out_dir: Option<&Path>) -> PipelineResult<Outcome> {
    let mut session = Session::new();
    let loaded = session.load(path)?;
    let (format, pixel_type) = (loaded.format(), loaded.pixel_type());

    let statistics = session.statistics();
    let input = session.preprocess(target)?;
    let heatmap = saliency::estimate(&input);
    let saliency_mean = match heatmap.data().len() {
        0 => 0.0,
        n => heatmap.data().iter().map(|v| *v as f64).sum::<f64>() / n as f64,
    };

    if let Some(dir) = out_dir {
        let stem = path
            .file_name()
            .map(|n| n.to_string_lossy().replace('.', "_"))
            .unwrap_or_default();
        let saved = input
            .save(dir.join(format!("{stem}_input.png")))
            .and_then(|_| heatmap.save(dir.join(format!("{stem}_heatmap.png"))));
        if let Err(e) = saved {
            log::warn!("无法保存 {} 的可视化结果: {e}", path.display());
        }
    }

    Ok(Outcome::Ok {
        format,
        pixel_type,
        statistics,
        preprocessed_shape: input.shape().to_vec(),
        saliency_mean,
    })
}
