//! 本地章节完整性判断：只读磁盘与网络，从不修改任何东西。

use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use super::models::{ExpectedCounts, LocalChapterEntry, LocalChapterState};
use crate::base_system::chapter_paths::{ChapterPaths, DOCUMENT_EXT, title_dir};
use crate::base_system::file_cleaner::count_assets;
use crate::network_parser::catalog::CatalogClient;

pub struct CompletenessOracle<'a> {
    client: &'a CatalogClient,
}

impl<'a> CompletenessOracle<'a> {
    pub fn new(client: &'a CatalogClient) -> Self {
        Self { client }
    }

    pub fn status(
        &self,
        chapter_id: &str,
        title: &str,
        chapter_number: &str,
        chapter_title: Option<&str>,
        output_root: &Path,
        as_document: bool,
    ) -> LocalChapterState {
        let paths = ChapterPaths::resolve(output_root, title, chapter_number, chapter_title);

        // 文档只在合并成功后才写出，存在即完整
        if as_document && paths.document.is_file() {
            return LocalChapterState::Complete;
        }

        let existing = match count_assets(&paths.chapter_dir) {
            Ok(n) => n,
            Err(err) => {
                warn!(target: "status", "读取章节目录失败 {}: {}", paths.chapter_dir.display(), err);
                0
            }
        };
        if existing == 0 {
            return LocalChapterState::Absent;
        }

        match self.client.manifest(chapter_id) {
            Ok(manifest) => LocalChapterState::classify(existing, manifest.expected_count()),
            Err(err) => {
                // 清单不可用时乐观地视为完整：离线时可能把截断的章节当成已完成
                warn!(target: "status", chapter_id, "获取清单失败，按已有 {} 个文件视为完整: {}", existing, err);
                LocalChapterState::Complete
            }
        }
    }
}

/// 一次扫描标题目录，返回 (完整, 不完整) 两组条目，各自按名称自然排序。
///
/// 目录条目按 `lookup` 中的预期页数判断；查不到章节号的非空目录视为完整。
/// 标题目录不存在时返回两个空列表。
pub fn batch_status(
    title: &str,
    output_root: &Path,
    lookup: Option<&ExpectedCounts>,
) -> io::Result<(Vec<LocalChapterEntry>, Vec<LocalChapterEntry>)> {
    let dir = title_dir(output_root, title);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), Vec::new())),
        Err(err) => return Err(err),
    };

    let mut complete = Vec::new();
    let mut partial = Vec::new();

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;

        let state = if file_type.is_dir() {
            let Some(number) = chapter_number_from(&name, false) else {
                continue;
            };
            let existing = count_assets(&path)?;
            if existing == 0 {
                continue;
            }
            let state = match lookup.and_then(|l| l.get(&number)) {
                Some(expected) => LocalChapterState::classify(existing, expected),
                None => LocalChapterState::Complete,
            };
            (number, state)
        } else if file_type.is_file() {
            let Some(number) = chapter_number_from(&name, true) else {
                continue;
            };
            (number, LocalChapterState::Complete)
        } else {
            continue;
        };

        let (number, state) = state;
        let item = LocalChapterEntry {
            name,
            number,
            path,
            state,
        };
        if item.state.is_complete() {
            complete.push(item);
        } else {
            partial.push(item);
        }
    }

    complete.sort_by(|a, b| natord::compare(&a.name, &b.name));
    partial.sort_by(|a, b| natord::compare(&a.name, &b.name));
    debug!(target: "status", title, complete = complete.len(), partial = partial.len(), "本地章节扫描完成");
    Ok((complete, partial))
}

static RE_CHAPTER: OnceLock<Regex> = OnceLock::new();

fn re_chapter() -> &'static Regex {
    RE_CHAPTER.get_or_init(|| Regex::new(r"^Chapter (.+?)(?: - .*)?$").expect("compile RE_CHAPTER"))
}

/// 从 `Chapter {num}` / `Chapter {num} - {title}`（可带 .pdf）中取出章节号。
fn chapter_number_from(name: &str, document: bool) -> Option<String> {
    let stem = if document {
        name.strip_suffix(&format!(".{DOCUMENT_EXT}"))?
    } else {
        name
    };
    let caps = re_chapter().captures(stem)?;
    Some(caps.get(1)?.as_str().to_string())
}
