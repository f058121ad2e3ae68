//! 数据集目录操作.
//!
//! 提供迭代器风格的数据集获取模式.

use std::path::{Path, PathBuf};

use crate::decode::{self, is_supported};
use crate::{LoadedImage, PipelineError, PipelineResult};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 目录图像加载器. 按文件名升序逐个解码目录下所有受支持的文件, 不递归.
///
/// 单个文件解码失败不会终止迭代, 而是作为 `Err` 返回给调用方.
#[derive(Debug, Clone)]
pub struct DirLoader {
    files_rev: Vec<PathBuf>,
}

impl DirLoader {
    /// 扫描目录 `path`. `path` 不是目录时返回 [`PipelineError::FileNotFound`].
    pub fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(PipelineError::FileNotFound(path.to_owned()));
        }
        let entries = path
            .read_dir()
            .map_err(|e| PipelineError::decode(path, e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_supported(p))
            .collect();
        files.sort_unstable();
        files.reverse();
        log::debug!("在 {} 中找到 {} 个图像文件", path.display(), files.len());

        Ok(Self { files_rev: files })
    }

    /// 剩余文件, 按迭代顺序排列.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files_rev.iter().rev().map(PathBuf::as_path)
    }
}

impl Iterator for DirLoader {
    type Item = (PathBuf, PipelineResult<LoadedImage>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.files_rev.pop()?;
        let image = decode::decode(&path);
        Some((path, image))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.files_rev.len(), Some(self.files_rev.len()))
    }
}

impl ExactSizeIterator for DirLoader {
    #[inline]
    fn len(&self) -> usize {
        self.files_rev.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_home_dataset_dir() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                home_dataset_dir_with(["ct-lens", "a.png"]),
                Some(home.join("dataset").join("ct-lens").join("a.png"))
            );
        }
    }

    #[test]
    fn test_dir_loader() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png"] {
            GrayImage::from_pixel(3, 2, Luma([9])).save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("c.png"), b"broken").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"skip me").unwrap();
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let loader = DirLoader::open(dir.path()).unwrap();
        assert_eq!(loader.len(), 3);
        let names: Vec<_> = loader
            .paths()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);

        let results: Vec<_> = loader.collect();
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].1.as_ref().unwrap().data().shape(), &[2, 3]);
        assert!(matches!(results[2].1, Err(PipelineError::DecodeFailure { .. })));
    }

    #[test]
    fn test_not_a_dir() {
        assert!(matches!(
            DirLoader::open("/definitely/not/here"),
            Err(PipelineError::FileNotFound(_))
        ));
    }
}
