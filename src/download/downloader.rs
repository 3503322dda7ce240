//! 单章节下载引擎：可重复调用，只补齐磁盘上缺失的页面。

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::models::DownloadError;
use super::progress::ProgressReporter;
use crate::base_system::chapter_paths::{ChapterPaths, sanitize, write_atomic};
use crate::base_system::file_cleaner::count_assets;
use crate::bundle::bundle_chapter;
use crate::network_parser::catalog::CatalogClient;
use crate::network_parser::models::{AssetManifest, ChapterDescriptor};

pub struct ChapterDownloader<'a> {
    client: &'a CatalogClient,
}

impl<'a> ChapterDownloader<'a> {
    pub fn new(client: &'a CatalogClient) -> Self {
        Self { client }
    }

    /// 下载一个章节，返回目标路径（章节目录或合并后的 PDF）。
    ///
    /// 没有 `descriptor` 时先查询章节信息。磁盘上已有的非空页面不会重新下载，
    /// 因此中断后再次调用即可续传。
    pub fn download(
        &self,
        chapter_id: &str,
        title: &str,
        output_root: &Path,
        descriptor: Option<&ChapterDescriptor>,
        as_document: bool,
        reporter: &mut ProgressReporter,
    ) -> Result<PathBuf, DownloadError> {
        let fetched;
        let descriptor = match descriptor {
            Some(d) => d,
            None => {
                fetched = self
                    .client
                    .chapter(chapter_id)
                    .map_err(|source| DownloadError::Descriptor {
                        chapter_id: chapter_id.to_string(),
                        source,
                    })?;
                &fetched
            }
        };

        let paths = ChapterPaths::resolve(
            output_root,
            title,
            &descriptor.number,
            descriptor.title.as_deref(),
        );
        let label = descriptor.label();

        if as_document && paths.document.is_file() {
            debug!(target: "download", chapter_id, "文档已存在，跳过: {}", paths.document.display());
            return Ok(paths.document);
        }

        let manifest =
            self.client
                .manifest(chapter_id)
                .map_err(|source| DownloadError::ManifestUnavailable {
                    chapter_id: chapter_id.to_string(),
                    source,
                })?;
        let expected = manifest.expected_count();
        if expected == 0 {
            return Err(DownloadError::NoAssets {
                chapter_id: chapter_id.to_string(),
            });
        }

        let existing = count_assets(&paths.chapter_dir).map_err(|source| DownloadError::Filesystem {
            path: paths.chapter_dir.clone(),
            source,
        })?;

        if existing >= expected {
            info!(target: "download", chapter_id, "{} 已完整（{} 页）", label, existing);
            reporter.asset(expected, expected, title, &label);
        } else {
            fs::create_dir_all(&paths.chapter_dir).map_err(|source| DownloadError::Filesystem {
                path: paths.chapter_dir.clone(),
                source,
            })?;
            debug!(target: "download", chapter_id, existing, expected, "开始下载 {}", label);
            self.fetch_missing(chapter_id, &manifest, &paths.chapter_dir, title, &label, reporter)?;
            info!(target: "download", chapter_id, "{} 下载完成", label);
        }

        if !as_document {
            return Ok(paths.chapter_dir);
        }

        match bundle_chapter(&paths.chapter_dir, &paths.document) {
            Ok(doc) => Ok(doc),
            Err(err) => {
                warn!(target: "download", chapter_id, "合并 PDF 失败，保留图片目录: {}", err);
                Ok(paths.chapter_dir)
            }
        }
    }

    fn fetch_missing(
        &self,
        chapter_id: &str,
        manifest: &AssetManifest,
        chapter_dir: &Path,
        title: &str,
        label: &str,
        reporter: &mut ProgressReporter,
    ) -> Result<(), DownloadError> {
        let total = manifest.expected_count();
        for (idx, file) in manifest.files.iter().enumerate() {
            let target = chapter_dir.join(sanitize(file));
            let present = fs::metadata(&target)
                .map(|m| m.is_file() && m.len() > 0)
                .unwrap_or(false);

            if !present {
                let bytes = self
                    .client
                    .asset(manifest, file)
                    .map_err(|source| DownloadError::Asset {
                        chapter_id: chapter_id.to_string(),
                        file: file.clone(),
                        source,
                    })?;
                write_atomic(&target, &bytes).map_err(|source| DownloadError::Filesystem {
                    path: target.clone(),
                    source,
                })?;
            }

            reporter.asset(idx + 1, total, title, label);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::progress::{ProgressEvent, recording};
    use crate::network_parser::retry::RetryPolicy;
    use crate::network_parser::testing::{FakeTransport, chapter_json, manifest_json, png_bytes};
    use serde_json::json;
    use std::sync::Arc;

    const BASE: &str = "https://api.test";
    const NODE: &str = "https://node.test";
    const FILES: [&str; 5] = ["a1.png", "a2.png", "a3.png", "a4.png", "a5.png"];

    fn asset_url(file: &str) -> String {
        format!("{NODE}/data/h/{file}")
    }

    fn setup() -> (Arc<FakeTransport>, CatalogClient) {
        let fake = Arc::new(FakeTransport::new());
        fake.json(
            &format!("{BASE}/at-home/server/c1"),
            manifest_json(NODE, "h", &FILES),
        );
        for (i, file) in FILES.iter().enumerate() {
            fake.bytes(&asset_url(file), png_bytes(4 + i as u32, 4, 10 * i as u8));
        }
        let client = CatalogClient::new(BASE, fake.clone(), RetryPolicy::immediate());
        (fake, client)
    }

    fn descriptor() -> ChapterDescriptor {
        ChapterDescriptor {
            id: "c1".to_string(),
            number: "1".to_string(),
            title: Some("Start".to_string()),
            language: "en".to_string(),
            pages: Some(5),
        }
    }

    fn asset_hits(fake: &FakeTransport) -> usize {
        fake.hits_with_prefix(NODE)
    }

    #[test]
    fn second_download_fetches_nothing() {
        let root = tempfile::tempdir().unwrap();
        let (fake, client) = setup();
        let engine = ChapterDownloader::new(&client);
        let d = descriptor();

        let first = engine
            .download("c1", "Solo Leveling", root.path(), Some(&d), false, &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(first, root.path().join("Solo Leveling").join("Chapter 1 - Start"));
        assert_eq!(asset_hits(&fake), 5);

        let (mut reporter, events) = recording();
        let second = engine
            .download("c1", "Solo Leveling", root.path(), Some(&d), false, &mut reporter)
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(asset_hits(&fake), 5);
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[ProgressEvent::AssetProgress {
                current: 5,
                total: 5,
                title: "Solo Leveling".to_string(),
                chapter_label: "Chapter 1: Start".to_string(),
            }]
        );
    }

    #[test]
    fn resumes_only_missing_assets() {
        let root = tempfile::tempdir().unwrap();
        let (fake, client) = setup();
        let dir = root.path().join("Solo Leveling").join("Chapter 1 - Start");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a1.png"), b"kept-1").unwrap();
        fs::write(dir.join("a3.png"), b"kept-3").unwrap();

        let (mut reporter, events) = recording();
        ChapterDownloader::new(&client)
            .download("c1", "Solo Leveling", root.path(), Some(&descriptor()), false, &mut reporter)
            .unwrap();

        let mut fetched: Vec<String> = fake
            .requested_urls()
            .into_iter()
            .filter(|u| u.starts_with(NODE))
            .collect();
        fetched.sort();
        assert_eq!(
            fetched,
            vec![asset_url("a2.png"), asset_url("a4.png"), asset_url("a5.png")]
        );
        assert_eq!(fs::read(dir.join("a1.png")).unwrap(), b"kept-1");
        assert_eq!(fs::read(dir.join("a3.png")).unwrap(), b"kept-3");

        let currents: Vec<usize> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::AssetProgress { current, .. } => Some(*current),
                _ => None,
            })
            .collect();
        assert_eq!(currents, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn zero_length_asset_is_refetched() {
        let root = tempfile::tempdir().unwrap();
        let (fake, client) = setup();
        let dir = root.path().join("Solo Leveling").join("Chapter 1 - Start");
        fs::create_dir_all(&dir).unwrap();
        for f in FILES {
            fs::write(dir.join(f), b"x").unwrap();
        }
        fs::write(dir.join("a2.png"), b"").unwrap();

        // 5 个文件都在但一个为空：计数满足，不再请求
        ChapterDownloader::new(&client)
            .download("c1", "Solo Leveling", root.path(), Some(&descriptor()), false, &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(asset_hits(&fake), 0);

        fs::remove_file(dir.join("a5.png")).unwrap();
        ChapterDownloader::new(&client)
            .download("c1", "Solo Leveling", root.path(), Some(&descriptor()), false, &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(fake.hits(&asset_url("a2.png")), 1);
        assert_eq!(fake.hits(&asset_url("a5.png")), 1);
        assert_eq!(asset_hits(&fake), 2);
    }

    #[test]
    fn bundles_and_removes_sources() {
        let root = tempfile::tempdir().unwrap();
        let (fake, client) = setup();
        let engine = ChapterDownloader::new(&client);

        let out = engine
            .download("c1", "Solo Leveling", root.path(), Some(&descriptor()), true, &mut ProgressReporter::silent())
            .unwrap();
        let title_dir = root.path().join("Solo Leveling");
        assert_eq!(out, title_dir.join("Chapter 1 - Start.pdf"));
        assert!(out.is_file());
        assert!(!title_dir.join("Chapter 1 - Start").exists());
        assert!(fs::read(&out).unwrap().starts_with(b"%PDF-"));

        // 文档存在时连清单都不请求
        let manifest_hits = fake.hits(&format!("{BASE}/at-home/server/c1"));
        let again = engine
            .download("c1", "Solo Leveling", root.path(), Some(&descriptor()), true, &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(again, out);
        assert_eq!(fake.hits(&format!("{BASE}/at-home/server/c1")), manifest_hits);
    }

    #[test]
    fn bundle_failure_returns_directory() {
        let root = tempfile::tempdir().unwrap();
        let (fake, client) = setup();
        fake.bytes(&asset_url("a3.png"), b"not an image".to_vec());

        let out = ChapterDownloader::new(&client)
            .download("c1", "Solo Leveling", root.path(), Some(&descriptor()), true, &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(out, root.path().join("Solo Leveling").join("Chapter 1 - Start"));
        assert_eq!(count_assets(&out).unwrap(), 5);
        assert!(!root.path().join("Solo Leveling").join("Chapter 1 - Start.pdf").exists());
    }

    #[test]
    fn asset_failure_leaves_resumable_directory() {
        let root = tempfile::tempdir().unwrap();
        let (fake, client) = setup();
        fake.script(&asset_url("a4.png"), vec![Ok(FakeTransport::status_response(403))]);

        let err = ChapterDownloader::new(&client)
            .download("c1", "Solo Leveling", root.path(), Some(&descriptor()), false, &mut ProgressReporter::silent())
            .unwrap_err();
        match err {
            DownloadError::Asset { file, source, .. } => {
                assert_eq!(file, "a4.png");
                assert_eq!(source.status(), Some(403));
            }
            other => panic!("unexpected {other:?}"),
        }
        let dir = root.path().join("Solo Leveling").join("Chapter 1 - Start");
        assert_eq!(count_assets(&dir).unwrap(), 3);
        assert!(!dir.join("a5.png").exists());
    }

    #[test]
    fn manifest_failure_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let (fake, client) = setup();
        fake.remove(&format!("{BASE}/at-home/server/c1"));

        let err = ChapterDownloader::new(&client)
            .download("c1", "Solo Leveling", root.path(), Some(&descriptor()), false, &mut ProgressReporter::silent())
            .unwrap_err();
        assert!(matches!(err, DownloadError::ManifestUnavailable { .. }));
        assert!(!root.path().join("Solo Leveling").exists());
    }

    #[test]
    fn empty_manifest_creates_nothing() {
        let root = tempfile::tempdir().unwrap();
        let (fake, client) = setup();
        fake.json(&format!("{BASE}/at-home/server/c1"), manifest_json(NODE, "h", &[]));

        let err = ChapterDownloader::new(&client)
            .download("c1", "Solo Leveling", root.path(), Some(&descriptor()), false, &mut ProgressReporter::silent())
            .unwrap_err();
        assert!(matches!(err, DownloadError::NoAssets { .. }));
        assert!(!root.path().join("Solo Leveling").exists());
    }

    #[test]
    fn looks_up_descriptor_when_missing() {
        let root = tempfile::tempdir().unwrap();
        let (fake, client) = setup();
        fake.json(
            &format!("{BASE}/chapter/c1"),
            json!({"data": chapter_json("c1", "7", Some("Lookup"), 5)}),
        );

        let out = ChapterDownloader::new(&client)
            .download("c1", "Solo Leveling", root.path(), None, false, &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(out, root.path().join("Solo Leveling").join("Chapter 7 - Lookup"));
        assert_eq!(fake.hits(&format!("{BASE}/chapter/c1")), 1);
    }
}
