//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。下载引擎本身不读这个结构，
//! 只接收由它换算出来的普通参数（保存目录、语言、重试策略等）。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use crate::network_parser::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 保存配置
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_preferred_language")]
    pub preferred_language: String,
    #[serde(default = "default_true")]
    pub download_as_pdf: bool,
    #[serde(default = "default_content_ratings")]
    pub content_ratings: Vec<String>,

    // API 配置
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_feed_page_size")]
    pub feed_page_size: usize,

    // 网络配置
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_extended_timeout")]
    pub extended_timeout: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_connect_cooldown_ms")]
    pub connect_cooldown_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_path: String::new(),
            preferred_language: default_preferred_language(),
            download_as_pdf: default_true(),
            content_ratings: default_content_ratings(),
            api_base_url: default_api_base_url(),
            user_agent: default_user_agent(),
            search_limit: default_search_limit(),
            feed_page_size: default_feed_page_size(),
            request_timeout: default_request_timeout(),
            extended_timeout: default_extended_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            connect_cooldown_ms: default_connect_cooldown_ms(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 13] = [
            FieldMeta {
                name: "save_path",
                description: "保存路径（留空为当前目录）",
            },
            FieldMeta {
                name: "preferred_language",
                description: "默认章节语言代码，例如 en、ja、es、fr、de",
            },
            FieldMeta {
                name: "download_as_pdf",
                description: "是否将每章图片合并为 PDF（false 则保留图片文件夹）",
            },
            FieldMeta {
                name: "content_ratings",
                description: "搜索时允许的内容分级, 可选: [safe, suggestive, erotica, pornographic]",
            },
            FieldMeta {
                name: "api_base_url",
                description: "目录服务 API 地址",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "search_limit",
                description: "每次搜索返回的最大条目数",
            },
            FieldMeta {
                name: "feed_page_size",
                description: "拉取章节列表时每页条目数（最大 500）",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "extended_timeout",
                description: "连接失败后重试一次时使用的超时时间（秒）",
            },
            FieldMeta {
                name: "max_attempts",
                description: "遇到 429/5xx 时的最大尝试次数",
            },
            FieldMeta {
                name: "backoff_base_ms",
                description: "指数退避的基础等待时间, 单位ms",
            },
            FieldMeta {
                name: "connect_cooldown_ms",
                description: "连接失败后的冷却时间, 单位ms",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            connect_cooldown: Duration::from_millis(self.connect_cooldown_ms),
            timeout: Duration::from_secs(self.request_timeout.max(1)),
            extended_timeout: Duration::from_secs(
                self.extended_timeout.max(self.request_timeout).max(1),
            ),
            ..RetryPolicy::default()
        }
    }

    /// 语言代码统一小写，空值回退为 en。
    pub fn language(&self) -> String {
        let lang = self.preferred_language.trim().to_ascii_lowercase();
        if lang.is_empty() {
            default_preferred_language()
        } else {
            lang
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_preferred_language() -> String {
    "en".to_string()
}

fn default_content_ratings() -> Vec<String> {
    vec!["safe".to_string(), "suggestive".to_string()]
}

fn default_api_base_url() -> String {
    "https://api.mangadex.org".to_string()
}

fn default_user_agent() -> String {
    concat!("mangadex-chapter-downloader/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_search_limit() -> usize {
    20
}

fn default_feed_page_size() -> usize {
    100
}

fn default_request_timeout() -> u64 {
    15
}

fn default_extended_timeout() -> u64 {
    45
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_connect_cooldown_ms() -> u64 {
    3000
}
