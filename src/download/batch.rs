//! 顺序执行所选章节的下载，单章失败不影响后续章节。

use std::path::{Path, PathBuf};

use tracing::{error, info};

use super::downloader::ChapterDownloader;
use super::models::SelectedChapter;
use super::progress::{ProgressEvent, ProgressReporter};
use crate::network_parser::catalog::CatalogClient;

pub struct BatchCoordinator<'a> {
    engine: ChapterDownloader<'a>,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(client: &'a CatalogClient) -> Self {
        Self {
            engine: ChapterDownloader::new(client),
        }
    }

    /// 返回成功章节的目标路径，顺序与输入一致。
    pub fn run(
        &self,
        selected: &[SelectedChapter],
        title: &str,
        output_root: &Path,
        as_document: bool,
        reporter: &mut ProgressReporter,
    ) -> Vec<PathBuf> {
        let total = selected.len();
        let mut paths = Vec::with_capacity(total);
        reporter.chapter(0, total, title);

        for (idx, chapter) in selected.iter().enumerate() {
            match self.engine.download(
                &chapter.id,
                title,
                output_root,
                chapter.descriptor.as_ref(),
                as_document,
                reporter,
            ) {
                Ok(path) => paths.push(path),
                Err(err) => {
                    error!(target: "download", chapter_id = %chapter.id, "章节下载失败，跳过: {}", err);
                }
            }
            reporter.chapter(idx + 1, total, title);
        }

        info!(target: "download", "批量下载结束: 成功 {} 章，失败 {} 章", paths.len(), total - paths.len());
        reporter.emit(ProgressEvent::BatchComplete {
            paths: paths.clone(),
        });
        paths
    }
}
