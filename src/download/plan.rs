//! 面向界面层的三个入口：搜索、带本地状态的章节列表、批量下载。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::batch::BatchCoordinator;
use super::models::{ExpectedCounts, LocalChapterState, SelectedChapter};
use super::progress::ProgressReporter;
use super::status::{CompletenessOracle, batch_status};
use crate::base_system::chapter_paths::{DOCUMENT_EXT, chapter_folder_name};
use crate::base_system::context::Config;
use crate::network_parser::catalog::{CatalogClient, Pagination};
use crate::network_parser::models::{ChapterDescriptor, Title};
use crate::network_parser::transport::ReqwestTransport;

/// 章节列表中的一行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterListing {
    pub descriptor: ChapterDescriptor,
    pub state: LocalChapterState,
}

pub fn catalog_client(config: &Config) -> Result<CatalogClient> {
    let transport = ReqwestTransport::new(&config.user_agent).context("init http client")?;
    Ok(
        CatalogClient::new(&config.api_base_url, Arc::new(transport), config.retry_policy())
            .with_feed_page_size(config.feed_page_size),
    )
}

/// 按 ID 直接取标题（跳过搜索）。
pub fn resolve_title(client: &CatalogClient, title_id: &str) -> Result<Title> {
    client
        .title(title_id)
        .with_context(|| format!("fetch title {title_id}"))
}

pub fn search_titles(client: &CatalogClient, config: &Config, query: &str) -> Result<Vec<Title>> {
    let page = Pagination {
        limit: config.search_limit.max(1),
        offset: 0,
    };
    client
        .search(query.trim(), page, &config.content_ratings)
        .with_context(|| format!("search '{query}'"))
}

/// 拉取一次章节列表，并用同一份数据判断每章在本地的状态。
pub fn list_chapters_with_status(
    client: &CatalogClient,
    title: &Title,
    language: &str,
    output_root: &Path,
    as_document: bool,
) -> Result<Vec<ChapterListing>> {
    let chapters = client
        .chapters(&title.id, language)
        .with_context(|| format!("fetch chapter feed for {}", title.id))?;

    let lookup = ExpectedCounts::from_feed(&chapters);
    debug!(target: "download", chapters = chapters.len(), with_pages = lookup.len(), "章节页数表已构建");
    let (complete, partial) = batch_status(&title.name, output_root, Some(&lookup))
        .with_context(|| format!("scan {}", output_root.display()))?;

    let states: HashMap<String, LocalChapterState> = complete
        .into_iter()
        .chain(partial)
        .map(|entry| (entry.name, entry.state))
        .collect();

    let oracle = CompletenessOracle::new(client);
    let listing: Vec<ChapterListing> = chapters
        .into_iter()
        .map(|descriptor| {
            let folder = chapter_folder_name(&descriptor.number, descriptor.title.as_deref());
            let document = format!("{folder}.{DOCUMENT_EXT}");
            let state = match (as_document, states.get(&document), states.get(&folder)) {
                (true, Some(_), _) => LocalChapterState::Complete,
                // 列表里没有页数的章节，按清单确认一次
                (_, _, Some(_)) if lookup.get(&descriptor.number).is_none() => oracle.status(
                    &descriptor.id,
                    &title.name,
                    &descriptor.number,
                    descriptor.title.as_deref(),
                    output_root,
                    as_document,
                ),
                (_, _, Some(state)) => *state,
                (_, _, None) => LocalChapterState::Absent,
            };
            ChapterListing { descriptor, state }
        })
        .collect();

    let done = listing.iter().filter(|l| l.state.is_complete()).count();
    info!(target: "download", title = %title.name, total = listing.len(), done, "章节列表已就绪");
    Ok(listing)
}

pub fn download_selection(
    client: &CatalogClient,
    title: &str,
    selected: &[SelectedChapter],
    output_root: &Path,
    as_document: bool,
    reporter: &mut ProgressReporter,
) -> Vec<PathBuf> {
    BatchCoordinator::new(client).run(selected, title, output_root, as_document, reporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_parser::retry::RetryPolicy;
    use crate::download::progress::recording;
    use crate::network_parser::testing::{FakeTransport, chapter_json, manga_json, manifest_json};
    use serde_json::json;
    use std::fs;

    const BASE: &str = "https://api.test";

    fn title() -> Title {
        Title {
            id: "m1".to_string(),
            name: "Solo Leveling".to_string(),
            tags: Vec::new(),
            cover_file: None,
            description: None,
        }
    }

    #[test]
    fn search_uses_configured_limit_and_ratings() {
        let fake = Arc::new(FakeTransport::new());
        fake.json(&format!("{BASE}/manga"), json!({"data": [manga_json("m1", "Solo Leveling")]}));
        let client = CatalogClient::new(BASE, fake.clone(), RetryPolicy::immediate());
        let config = Config {
            search_limit: 5,
            content_ratings: vec!["safe".to_string()],
            ..Config::default()
        };

        let found = search_titles(&client, &config, "  solo  ").unwrap();
        assert_eq!(found[0].id, "m1");
        let query = fake.last_query(&format!("{BASE}/manga")).unwrap();
        assert!(query.contains(&("title".into(), "solo".into())));
        assert!(query.contains(&("limit".into(), "5".into())));
        assert!(query.contains(&("contentRating[]".into(), "safe".into())));
    }

    #[test]
    fn listing_joins_feed_with_local_state() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTransport::new());
        fake.json(
            &format!("{BASE}/manga/m1/feed"),
            json!({
                "data": [
                    chapter_json("c1", "1", Some("Start"), 3),
                    chapter_json("c2", "2", None, 4),
                    chapter_json("c3", "3", None, 2),
                    chapter_json("c4", "4", None, 2),
                ],
                "total": 4
            }),
        );
        let client = CatalogClient::new(BASE, fake.clone(), RetryPolicy::immediate());

        let title_dir = root.path().join("Solo Leveling");
        let full = title_dir.join("Chapter 1 - Start");
        fs::create_dir_all(&full).unwrap();
        for i in 1..=3 {
            fs::write(full.join(format!("{i}.png")), b"x").unwrap();
        }
        let short = title_dir.join("Chapter 2");
        fs::create_dir_all(&short).unwrap();
        fs::write(short.join("1.png"), b"x").unwrap();
        fs::write(title_dir.join("Chapter 3.pdf"), b"%PDF").unwrap();

        let listing = list_chapters_with_status(&client, &title(), "en", root.path(), true).unwrap();
        let states: Vec<LocalChapterState> = listing.iter().map(|l| l.state).collect();
        assert_eq!(
            states,
            vec![
                LocalChapterState::Complete,
                LocalChapterState::Partial {
                    existing: 1,
                    expected: 4
                },
                LocalChapterState::Complete,
                LocalChapterState::Absent,
            ]
        );
        // 只请求一次章节列表，不逐章拉清单
        assert_eq!(fake.requested_urls(), vec![format!("{BASE}/manga/m1/feed")]);

        let images = list_chapters_with_status(&client, &title(), "en", root.path(), false).unwrap();
        assert_eq!(images[2].state, LocalChapterState::Absent);
    }

    #[test]
    fn chapters_without_page_count_are_checked_against_manifest() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTransport::new());
        fake.json(
            &format!("{BASE}/manga/m1/feed"),
            json!({
                "data": [{"id": "c9", "attributes": {"chapter": "9", "translatedLanguage": "en"}}],
                "total": 1
            }),
        );
        fake.json(
            &format!("{BASE}/at-home/server/c9"),
            json!({"baseUrl": "https://node", "chapter": {"hash": "h", "data": ["1.png", "2.png", "3.png"]}}),
        );
        let client = CatalogClient::new(BASE, fake.clone(), RetryPolicy::immediate());

        let dir = root.path().join("Solo Leveling").join("Chapter 9");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("1.png"), b"x").unwrap();

        let listing = list_chapters_with_status(&client, &title(), "en", root.path(), false).unwrap();
        assert_eq!(
            listing[0].state,
            LocalChapterState::Partial {
                existing: 1,
                expected: 3
            }
        );
    }

    #[test]
    fn resolves_title_by_id() {
        let fake = Arc::new(FakeTransport::new());
        fake.json(&format!("{BASE}/manga/m1"), json!({"data": manga_json("m1", "Solo Leveling")}));
        let client = CatalogClient::new(BASE, fake.clone(), RetryPolicy::immediate());
        assert_eq!(resolve_title(&client, "m1").unwrap().name, "Solo Leveling");
        let query = fake.last_query(&format!("{BASE}/manga/m1")).unwrap();
        assert!(query.contains(&("includes[]".into(), "tag".into())));
    }

    #[test]
    fn search_list_and_download_end_to_end() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTransport::new());
        fake.json(&format!("{BASE}/manga"), json!({"data": [manga_json("m1", "Solo Leveling")]}));
        fake.json(
            &format!("{BASE}/manga/m1/feed"),
            json!({
                "data": [
                    chapter_json("c1", "1", Some("I'm Used to It"), 2),
                    chapter_json("c2", "2", Some("If I Had Been a Little Later"), 3),
                ],
                "total": 2
            }),
        );
        fake.json(
            &format!("{BASE}/at-home/server/c1"),
            manifest_json("https://node.test", "h1", &["x1.png", "x2.png"]),
        );
        fake.bytes("https://node.test/data/h1/x1.png", b"one".to_vec());
        fake.bytes("https://node.test/data/h1/x2.png", b"two".to_vec());
        let client = CatalogClient::new(BASE, fake.clone(), RetryPolicy::immediate());
        let config = Config::default();

        let titles = search_titles(&client, &config, "Solo Leveling").unwrap();
        let title = titles.into_iter().find(|t| t.name == "Solo Leveling").unwrap();

        let listing = list_chapters_with_status(&client, &title, "en", root.path(), false).unwrap();
        assert!(listing.iter().all(|l| l.state == LocalChapterState::Absent));
        let first = listing.iter().find(|l| l.descriptor.number == "1").unwrap();
        let selected: Vec<SelectedChapter> = vec![first.descriptor.clone().into()];

        let (mut reporter, _events) = recording();
        let out = download_selection(&client, &title.name, &selected, root.path(), false, &mut reporter);

        let expected_dir = root.path().join("Solo Leveling").join("Chapter 1 - I'm Used to It");
        assert_eq!(out, vec![expected_dir.clone()]);
        assert_eq!(fs::read_dir(&expected_dir).unwrap().count(), 2);

        let listing = list_chapters_with_status(&client, &title, "en", root.path(), false).unwrap();
        assert_eq!(listing[0].state, LocalChapterState::Complete);
        assert_eq!(listing[1].state, LocalChapterState::Absent);
    }

    #[test]
    #[ignore = "needs network access to api.mangadex.org"]
    fn live_first_chapter_download() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::default();
        let client = catalog_client(&config).unwrap();

        let titles = search_titles(&client, &config, "Solo Leveling").unwrap();
        let title = titles
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case("Solo Leveling"))
            .unwrap();
        let listing = list_chapters_with_status(&client, &title, "en", root.path(), false).unwrap();
        let first = listing.iter().find(|l| l.descriptor.number == "1").unwrap();
        let expected = client.manifest(&first.descriptor.id).unwrap().files.len();

        let (mut reporter, _events) = recording();
        let selected: Vec<SelectedChapter> = vec![first.descriptor.clone().into()];
        let out = download_selection(&client, &title.name, &selected, root.path(), false, &mut reporter);

        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with(root.path().join("Solo Leveling")));
        assert_eq!(fs::read_dir(&out[0]).unwrap().count(), expected);
    }

    #[test]
    fn feed_failure_has_context() {
        let root = tempfile::tempdir().unwrap();
        let client = CatalogClient::new(BASE, Arc::new(FakeTransport::new()), RetryPolicy::immediate());
        let err = list_chapters_with_status(&client, &title(), "en", root.path(), true).unwrap_err();
        assert!(err.to_string().contains("m1"));
    }
}
