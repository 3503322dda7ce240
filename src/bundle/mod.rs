//! 章节图片合并为单个 PDF。
//!
//! 按文件名自然顺序读取目录中的全部图片（不依赖清单，这样清单取不到时
//! 也能合并已有的目录），写出文档后删除源图片和空目录。

pub mod image_utils;
pub mod pdf;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::base_system::chapter_paths::write_atomic;
use crate::base_system::file_cleaner::{asset_files, remove_sources_and_dir};

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("no images to bundle in {0}")]
    NoImages(PathBuf),
    #[error("cannot read image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// 成功时返回文档路径。源文件清理失败只记录日志，文档本身已经完整。
pub fn bundle_chapter(chapter_dir: &Path, document: &Path) -> Result<PathBuf, BundleError> {
    let mut files = asset_files(chapter_dir).map_err(|source| BundleError::Io {
        path: chapter_dir.to_path_buf(),
        source,
    })?;
    if files.is_empty() {
        return Err(BundleError::NoImages(chapter_dir.to_path_buf()));
    }
    files.sort_by(|a, b| natord::compare(&file_name(a), &file_name(b)));

    let pages = files
        .iter()
        .map(|path| {
            image_utils::load_page(path).map_err(|source| BundleError::Image {
                path: path.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let bytes = pdf::compose(&pages);
    write_atomic(document, &bytes).map_err(|source| BundleError::Io {
        path: document.to_path_buf(),
        source,
    })?;
    info!(target: "bundle", pages = pages.len(), "已生成 {}", document.display());

    if let Err(err) = remove_sources_and_dir(&files, chapter_dir) {
        warn!(target: "bundle", "清理源图片失败 {}: {}", chapter_dir.display(), err);
    }
    Ok(document.to_path_buf())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
