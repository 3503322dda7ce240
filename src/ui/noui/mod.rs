//! 命令行交互入口。
//!
//! 使用标准输入输出进行交互：搜索 → 选择标题 → 选择章节 → 下载。

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::base_system::context::Config;
use crate::download::plan::catalog_client;
use crate::network_parser::catalog::CatalogError;

mod config;
mod download;

pub fn run(config: &mut Config, base_dir: Option<&Path>) -> Result<()> {
    println!(
        "欢迎使用 MangaDex 漫画章节下载器! v{}\n\
数据来源: https://mangadex.org （仅使用公开接口，无需登录）\n\
本项目仅供学习交流使用，请尊重译者与作者的劳动成果。",
        env!("CARGO_PKG_VERSION")
    );

    loop {
        let client = catalog_client(config).context("初始化网络客户端失败")?;
        let prompt = format!(
            "请输入漫画名称/标题ID/链接（输入s配置 / q退出，默认保存到 {}）：",
            config.default_save_dir().display()
        );
        let input = read_line(&prompt)?;
        // EOF
        if input.is_empty() {
            break;
        }
        let text = input.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("q") {
            println!("已退出。");
            break;
        }
        if text.eq_ignore_ascii_case("s") {
            config::show_config_menu(config, base_dir)?;
            continue;
        }

        let title = match download::pick_title(&client, config, text) {
            Ok(Some(title)) => title,
            Ok(None) => continue,
            Err(err) => {
                println!("获取标题失败: {}\n", describe_failure(&err));
                continue;
            }
        };
        info!(target: "ui", title_id = %title.id, "已选择 {}", title.name);

        if let Err(err) = download::download_title(&client, config, base_dir, &title) {
            println!("下载失败: {}\n", describe_failure(&err));
        }
    }

    Ok(())
}

/// 上游返回错误状态码时附上提示。
fn describe_failure(err: &anyhow::Error) -> String {
    match err.downcast_ref::<CatalogError>().and_then(CatalogError::status) {
        Some(404) => format!("{:#}（HTTP 404：标题或章节不存在）", err),
        Some(status) => format!("{:#}（HTTP {}）", err, status),
        None => format!("{:#}", err),
    }
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line)
}

/// 是/否提问，留空取默认值。
fn confirm(prompt: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let ans = read_line(&format!("{prompt} {hint}: "))?;
    Ok(match ans.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" | "1" | "true" => true,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_carries_http_status() {
        let err: anyhow::Error = Err::<(), _>(CatalogError::Upstream {
            status: 404,
            url: "https://api.test/manga/x".to_string(),
        })
        .context("fetch title x")
        .unwrap_err();
        let msg = describe_failure(&err);
        assert!(msg.starts_with("fetch title x: upstream returned HTTP 404"), "{msg}");
        assert!(msg.contains("标题或章节不存在"));

        let err = anyhow::Error::new(CatalogError::Upstream {
            status: 403,
            url: "u".to_string(),
        });
        assert!(describe_failure(&err).ends_with("（HTTP 403）"));

        let plain = anyhow::anyhow!("boom");
        assert_eq!(describe_failure(&plain), "boom");
    }
}
