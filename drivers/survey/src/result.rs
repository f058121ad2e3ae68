//! 巡检结果.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use ct_lens::{FormatKind, ImageStatistics, PixelType};
use serde::Serialize;

/// 单个文件的巡检结果.
#[derive(Debug, Serialize)]
pub struct Record {
    pub path: PathBuf,

    #[serde(flatten)]
    pub outcome: Outcome,
}

/// 巡检结论.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Ok {
        format: FormatKind,
        pixel_type: PixelType,
        statistics: ImageStatistics,
        preprocessed_shape: Vec<usize>,
        saliency_mean: f64,
    },
    Failed {
        reason: String,
    },
}

/// 将 `record` 的结果写进 `w` 中.
fn describe_into<W: Write>(r: &Record, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "File `{}`:", r.path.display())?;
    match &r.outcome {
        Outcome::Ok {
            format,
            pixel_type,
            statistics: st,
            preprocessed_shape,
            saliency_mean,
        } => {
            writeln!(w, "{S4}Format: {format:?} ({pixel_type})")?;
            writeln!(w, "{S4}Shape: {:?}", st.shape)?;
            writeln!(w, "{S4}Min / Max: {:.2} / {:.2}", st.min, st.max)?;
            writeln!(w, "{S4}Mean / Std: {:.2} / {:.2}", st.mean, st.std)?;
            writeln!(w, "{S4}Unique values: {}", st.unique_values)?;
            writeln!(w, "{S4}Preprocessed shape: {preprocessed_shape:?}")?;
            write!(w, "{S4}Mean saliency: {saliency_mean:.3}")?;
        }
        Outcome::Failed { reason } => {
            write!(w, "{S4}Failed: {reason}")?;
        }
    }
    Ok(())
}

/// 巡检最终结果.
pub struct SurveyResult {
    records: Vec<Record>,
}

impl SurveyResult {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// 打印运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for record in self.records.iter() {
            if describe_into(record, &mut buf).is_ok() {
                println!("{}", String::from_utf8_lossy(&buf));
            }
            buf.clear();

            utils::sep();
        }

        let failed = self
            .records
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed { .. }))
            .count();
        println!("{} files, {} failed", self.records.len(), failed);
    }

    /// 以 JSON 格式写入 `path`.
    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut w, &self.records)?;
        w.flush()
    }
}
