//! 目录服务返回结构与对外使用的类型化记录。
//!
//! 原始 JSON 只在这里被解析一次，所有可选字段在这里给出默认值。

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const UNKNOWN_TITLE: &str = "Unknown Manga";
pub const UNKNOWN_CHAPTER: &str = "Unknown";
pub const COVER_HOST: &str = "https://uploads.mangadex.org/covers";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub cover_file: Option<String>,
    pub description: Option<String>,
}

impl Title {
    pub fn cover_url(&self) -> Option<String> {
        self.cover_file
            .as_ref()
            .map(|file| format!("{COVER_HOST}/{}/{file}", self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDescriptor {
    pub id: String,
    /// 可能不是数字，例如 "Unknown"。
    pub number: String,
    pub title: Option<String>,
    pub language: String,
    /// 目录接口报告的页数；只用于批量状态判断，下载时以清单为准。
    pub pages: Option<u32>,
}

impl ChapterDescriptor {
    /// 用于进度显示的章节标签。
    pub fn label(&self) -> String {
        match &self.title {
            Some(t) => format!("Chapter {}: {}", self.number, t),
            None => format!("Chapter {}", self.number),
        }
    }
}

/// 一次下载尝试所用的页面清单。投递地址可能过期，不做跨调用缓存。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    pub base_url: String,
    pub hash: String,
    pub files: Vec<String>,
}

impl AssetManifest {
    pub fn expected_count(&self) -> usize {
        self.files.len()
    }

    pub fn asset_url(&self, file: &str) -> String {
        format!(
            "{}/data/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.hash,
            file
        )
    }
}

// ── 原始响应 ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Entity<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MangaRecord {
    pub id: String,
    #[serde(default)]
    pub attributes: MangaAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MangaAttributes {
    #[serde(default, deserialize_with = "localized")]
    pub title: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "localized_list")]
    pub alt_titles: Vec<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "localized")]
    pub description: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagRecord {
    #[serde(default)]
    pub attributes: TagAttributes,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TagAttributes {
    #[serde(default, deserialize_with = "localized")]
    pub name: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Relationship {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChapterRecord {
    pub id: String,
    #[serde(default)]
    pub attributes: ChapterAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChapterAttributes {
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub translated_language: Option<String>,
    #[serde(default)]
    pub pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AtHomeResponse {
    pub base_url: String,
    pub chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AtHomeChapter {
    pub hash: String,
    #[serde(default)]
    pub data: Vec<String>,
}

// 空的本地化字段会以 [] 而不是 {} 返回
fn localized<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(string_map(Value::deserialize(deserializer)?))
}

fn localized_list<'de, D>(deserializer: D) -> Result<Vec<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(string_map).collect(),
        _ => Vec::new(),
    })
}

fn string_map(value: Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) if !s.trim().is_empty() => Some((k, s)),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl From<MangaRecord> for Title {
    fn from(record: MangaRecord) -> Self {
        let attrs = record.attributes;
        let name = attrs
            .title
            .get("en")
            .cloned()
            .or_else(|| attrs.alt_titles.iter().find_map(|alt| alt.get("en").cloned()))
            .or_else(|| attrs.title.values().next().cloned())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let tags = attrs
            .tags
            .into_iter()
            .filter_map(|t| t.attributes.name.get("en").cloned())
            .collect();

        let cover_file = record
            .relationships
            .iter()
            .filter(|r| r.kind == "cover_art")
            .find_map(|r| {
                r.attributes
                    .as_ref()
                    .and_then(|a| a.get("fileName"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });

        let description = attrs
            .description
            .get("en")
            .cloned()
            .or_else(|| attrs.description.values().next().cloned());

        Title {
            id: record.id,
            name,
            tags,
            cover_file,
            description,
        }
    }
}

impl From<ChapterRecord> for ChapterDescriptor {
    fn from(record: ChapterRecord) -> Self {
        let attrs = record.attributes;
        ChapterDescriptor {
            id: record.id,
            number: non_blank(attrs.chapter).unwrap_or_else(|| UNKNOWN_CHAPTER.to_string()),
            title: non_blank(attrs.title),
            language: non_blank(attrs.translated_language).unwrap_or_default(),
            pages: attrs.pages,
        }
    }
}

impl From<AtHomeResponse> for AssetManifest {
    fn from(resp: AtHomeResponse) -> Self {
        AssetManifest {
            base_url: resp.base_url,
            hash: resp.chapter.hash,
            files: resp.chapter.data,
        }
    }
}
