//! 目录服务客户端：搜索、章节列表、页面清单与图片下载。

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{
    AssetManifest, AtHomeResponse, ChapterDescriptor, ChapterRecord, Collection, Entity,
    MangaRecord, Title,
};
use super::retry::RetryPolicy;
use super::transport::{HttpRequest, HttpTransport, TransportError};

const INCLUDES: [&str; 4] = ["cover_art", "author", "artist", "tag"];
const MAX_FEED_PAGE: usize = 500;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// 连接失败、超时，或可重试状态码耗尽了所有尝试。
    #[error("network error for {url}: {cause}")]
    Network { url: String, cause: String },
    #[error("upstream returned HTTP {status} for {url}")]
    Upstream { status: u16, url: String },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl CatalogError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

// 一轮状态码重试的结果：传输层错误单独返回，由外层决定是否冷却后再试。
enum Attempt {
    Transport(TransportError),
    Failed(CatalogError),
}

#[derive(Clone)]
pub struct CatalogClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    feed_page_size: usize,
}

impl CatalogClient {
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            transport,
            policy,
            feed_page_size: 100,
        }
    }

    pub fn with_feed_page_size(mut self, size: usize) -> Self {
        self.feed_page_size = size.clamp(1, MAX_FEED_PAGE);
        self
    }

    pub fn search(
        &self,
        query: &str,
        page: Pagination,
        content_ratings: &[String],
    ) -> Result<Vec<Title>, CatalogError> {
        let url = format!("{}/manga", self.base_url);
        let mut params = vec![
            ("title".to_string(), query.to_string()),
            ("limit".to_string(), page.limit.to_string()),
            ("offset".to_string(), page.offset.to_string()),
        ];
        params.extend(includes());
        for rating in content_ratings.iter().filter(|r| !r.trim().is_empty()) {
            params.push(("contentRating[]".to_string(), rating.trim().to_string()));
        }

        let resp: Collection<MangaRecord> = self.get_json(&url, &params)?;
        debug!(target: "catalog", query, count = resp.data.len(), "搜索完成");
        Ok(resp.data.into_iter().map(Title::from).collect())
    }

    pub fn title(&self, title_id: &str) -> Result<Title, CatalogError> {
        let url = format!("{}/manga/{}", self.base_url, title_id);
        let resp: Entity<MangaRecord> = self.get_json(&url, &includes())?;
        Ok(resp.data.into())
    }

    /// 单一语言、按章节号升序；按 `total` 翻页直到取完。
    pub fn chapters(
        &self,
        title_id: &str,
        language: &str,
    ) -> Result<Vec<ChapterDescriptor>, CatalogError> {
        let url = format!("{}/manga/{}/feed", self.base_url, title_id);
        let mut out: Vec<ChapterDescriptor> = Vec::new();

        loop {
            let params = vec![
                ("translatedLanguage[]".to_string(), language.to_string()),
                ("limit".to_string(), self.feed_page_size.to_string()),
                ("offset".to_string(), out.len().to_string()),
                ("order[chapter]".to_string(), "asc".to_string()),
            ];
            let resp: Collection<ChapterRecord> = self.get_json(&url, &params)?;
            let received = resp.data.len();
            out.extend(resp.data.into_iter().map(ChapterDescriptor::from));

            let total = resp.total.unwrap_or(out.len());
            if received == 0 || out.len() >= total {
                break;
            }
        }

        debug!(target: "catalog", title_id, language, count = out.len(), "章节列表获取完成");
        Ok(out)
    }

    pub fn chapter(&self, chapter_id: &str) -> Result<ChapterDescriptor, CatalogError> {
        let url = format!("{}/chapter/{}", self.base_url, chapter_id);
        let resp: Entity<ChapterRecord> = self.get_json(&url, &[])?;
        Ok(resp.data.into())
    }

    pub fn manifest(&self, chapter_id: &str) -> Result<AssetManifest, CatalogError> {
        let url = format!("{}/at-home/server/{}", self.base_url, chapter_id);
        let resp: AtHomeResponse = self.get_json(&url, &[])?;
        Ok(resp.into())
    }

    pub fn asset(&self, manifest: &AssetManifest, file: &str) -> Result<Vec<u8>, CatalogError> {
        self.get_bytes(&manifest.asset_url(file), &[])
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, CatalogError> {
        let body = self.get_bytes(url, query)?;
        serde_json::from_slice(&body).map_err(|err| CatalogError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    fn get_bytes(&self, url: &str, query: &[(String, String)]) -> Result<Vec<u8>, CatalogError> {
        let first = match self.send_with_status_retry(url, query, self.policy.timeout) {
            Ok(body) => return Ok(body),
            Err(Attempt::Failed(err)) => return Err(err),
            Err(Attempt::Transport(err)) => err,
        };

        if !first.is_connection_level() {
            return Err(network(url, &first));
        }

        warn!(
            target: "catalog",
            url,
            "连接失败，{}ms 后延长超时再试一次: {}",
            self.policy.connect_cooldown.as_millis(),
            first
        );
        thread::sleep(self.policy.connect_cooldown);

        match self.send_with_status_retry(url, query, self.policy.extended_timeout) {
            Ok(body) => Ok(body),
            Err(Attempt::Failed(err)) => Err(err),
            Err(Attempt::Transport(err)) => Err(network(url, &err)),
        }
    }

    fn send_with_status_retry(
        &self,
        url: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> Result<Vec<u8>, Attempt> {
        let request = HttpRequest {
            url,
            query,
            timeout,
        };
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let resp = self.transport.get(&request).map_err(Attempt::Transport)?;
            if resp.is_success() {
                return Ok(resp.body);
            }

            let status = resp.status;
            if !self.policy.is_retryable(status) {
                return Err(Attempt::Failed(CatalogError::Upstream {
                    status,
                    url: url.to_string(),
                }));
            }
            if attempt >= max_attempts {
                return Err(Attempt::Failed(CatalogError::Network {
                    url: url.to_string(),
                    cause: format!("HTTP {status} persisted after {attempt} attempts"),
                }));
            }

            let wait = self.policy.backoff(attempt);
            debug!(target: "catalog", url, status, attempt, wait_ms = wait.as_millis() as u64, "可重试状态码，退避后重试");
            thread::sleep(wait);
        }
    }
}

fn includes() -> Vec<(String, String)> {
    INCLUDES
        .iter()
        .map(|inc| ("includes[]".to_string(), inc.to_string()))
        .collect()
}

fn network(url: &str, err: &TransportError) -> CatalogError {
    CatalogError::Network {
        url: url.to_string(),
        cause: err.to_string(),
    }
}
