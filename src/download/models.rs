//! 下载相关的数据模型定义。
//!
//! 包含本地章节状态、选中章节、批量状态条目、下载错误等核心数据结构。

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::network_parser::catalog::CatalogError;
use crate::network_parser::models::ChapterDescriptor;

/// 由磁盘状态与清单推导，从不持久化。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalChapterState {
    Absent,
    Partial { existing: usize, expected: usize },
    Complete,
}

impl LocalChapterState {
    pub fn classify(existing: usize, expected: usize) -> Self {
        if existing == 0 {
            Self::Absent
        } else if existing >= expected {
            Self::Complete
        } else {
            Self::Partial { existing, expected }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedChapter {
    pub id: String,
    pub descriptor: Option<ChapterDescriptor>,
}

impl From<ChapterDescriptor> for SelectedChapter {
    fn from(descriptor: ChapterDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            descriptor: Some(descriptor),
        }
    }
}

/// 标题目录中一个形如章节的条目（`Chapter *` 目录或 `Chapter *.pdf`）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalChapterEntry {
    pub name: String,
    pub number: String,
    pub path: PathBuf,
    pub state: LocalChapterState,
}

/// 章节号 → 预期页数，由一次章节列表请求构建，避免逐条拉清单。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedCounts(BTreeMap<String, usize>);

impl ExpectedCounts {
    pub fn from_feed(chapters: &[ChapterDescriptor]) -> Self {
        let mut map = BTreeMap::new();
        for ch in chapters {
            if let Some(pages) = ch.pages.filter(|p| *p > 0) {
                map.entry(ch.number.clone()).or_insert(pages as usize);
            }
        }
        Self(map)
    }

    #[cfg(test)]
    pub fn insert(&mut self, number: &str, expected: usize) {
        self.0.insert(number.to_string(), expected);
    }

    pub fn get(&self, number: &str) -> Option<usize> {
        self.0.get(number).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("cannot look up chapter {chapter_id}: {source}")]
    Descriptor {
        chapter_id: String,
        source: CatalogError,
    },
    #[error("manifest unavailable for chapter {chapter_id}: {source}")]
    ManifestUnavailable {
        chapter_id: String,
        source: CatalogError,
    },
    #[error("chapter {chapter_id} has no hosted pages")]
    NoAssets { chapter_id: String },
    #[error("failed to fetch page {file} of chapter {chapter_id}: {source}")]
    Asset {
        chapter_id: String,
        file: String,
        source: CatalogError,
    },
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },
}
