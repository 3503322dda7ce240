//! 章节目录的统计与清理。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::chapter_paths::is_part_file;

/// 目录下的资源文件（忽略未写完的 `*.part`）。目录不存在时返回空列表。
pub fn asset_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && !is_part_file(&path) {
            out.push(path);
        }
    }
    Ok(out)
}

pub fn count_assets(dir: &Path) -> io::Result<usize> {
    asset_files(dir).map(|files| files.len())
}

/// 删除给定文件，然后删除已经变空的目录。
pub fn remove_sources_and_dir(files: &[PathBuf], dir: &Path) -> io::Result<()> {
    for file in files {
        match fs::remove_file(file) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
    }
    // 残留的 *.part 不再有用
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if is_part_file(&path) {
                let _ = fs::remove_file(path);
            }
        }
    }
    fs::remove_dir(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_finished_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.png"), b"x").unwrap();
        fs::write(dir.path().join("2.png"), b"x").unwrap();
        fs::write(dir.path().join("3.png.part"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        assert_eq!(count_assets(dir.path()).unwrap(), 2);
    }

    #[test]
    fn missing_dir_has_no_assets() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(count_assets(&dir.path().join("nope")).unwrap(), 0);
    }

    #[test]
    fn removes_files_and_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("Chapter 1");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("1.png"), b"x").unwrap();
        fs::write(dir.join("2.png.part"), b"x").unwrap();
        let files = asset_files(&dir).unwrap();
        remove_sources_and_dir(&files, &dir).unwrap();
        assert!(!dir.exists());
    }
}
