//! 标题 / 章节到本地路径的映射。
//!
//! 写入新文件与查找已有文件都走这里，所以同样的输入必须得到同样的名字。

use std::path::{Path, PathBuf};

pub const MAX_NAME_LEN: usize = 240;
pub const DOCUMENT_EXT: &str = "pdf";
/// 单个路径名的字节上限，为 `.pdf.part` 后缀留出空间。
pub const MAX_NAME_BYTES: usize = 255 - ".pdf.part".len();

const FORBIDDEN: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// 替换路径敏感字符，去掉末尾的点和空格，截断到 240 个字符且不超过
/// [`MAX_NAME_BYTES`] 字节。
///
/// 任何输入都不会被拒绝；清理后为空时返回 `_`。
pub fn sanitize(text: &str) -> String {
    let mut cleaned: String = text
        .chars()
        .map(|ch| {
            if FORBIDDEN.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();
    trim_trailing(&mut cleaned);

    if cleaned.chars().count() > MAX_NAME_LEN {
        cleaned = cleaned.chars().take(MAX_NAME_LEN).collect();
        trim_trailing(&mut cleaned);
    }
    if cleaned.len() > MAX_NAME_BYTES {
        let mut cut = MAX_NAME_BYTES;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
        trim_trailing(&mut cleaned);
    }

    if cleaned.is_empty() {
        cleaned.push('_');
    }
    cleaned
}

fn trim_trailing(s: &mut String) {
    while s.ends_with(' ') || s.ends_with('.') {
        s.pop();
    }
}

/// `Chapter {number} - {title}`，无标题时为 `Chapter {number}`。
pub fn chapter_folder_name(number: &str, title: Option<&str>) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => sanitize(&format!("Chapter {number} - {title}")),
        None => sanitize(&format!("Chapter {number}")),
    }
}

pub fn title_dir(output_root: &Path, title: &str) -> PathBuf {
    output_root.join(sanitize(title))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPaths {
    pub title_dir: PathBuf,
    pub folder_name: String,
    pub chapter_dir: PathBuf,
    pub document: PathBuf,
}

impl ChapterPaths {
    pub fn resolve(output_root: &Path, title: &str, number: &str, chapter_title: Option<&str>) -> Self {
        let title_dir = title_dir(output_root, title);
        let folder_name = chapter_folder_name(number, chapter_title);
        let chapter_dir = title_dir.join(&folder_name);
        // 不用 with_extension：章节号里可能带点（如 10.5）
        let document = title_dir.join(format!("{folder_name}.{DOCUMENT_EXT}"));
        Self {
            title_dir,
            folder_name,
            chapter_dir,
            document,
        }
    }
}

/// 原子写入：先写 `*.part`，再重命名到目标位置。
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = part_path(path);
    std::fs::write(&tmp, bytes)?;
    let _ = std::fs::remove_file(path);
    std::fs::rename(tmp, path)?;
    Ok(())
}

pub(crate) fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

pub(crate) fn is_part_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("part")
}
