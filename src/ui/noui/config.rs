//! 命令行配置编辑器。
//!
//! 提供交互式菜单修改 `config.yml`。

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::base_system::config::save_with_base;
use crate::base_system::context::Config;

#[derive(Debug, Clone, Copy)]
enum ConfigValueType {
    Bool,
    Int,
    String,
    List,
}

#[derive(Debug, Clone, Copy)]
enum ConfigField {
    SavePath,
    PreferredLanguage,
    DownloadAsPdf,
    ContentRatings,
    SearchLimit,
    RequestTimeout,
    ExtendedTimeout,
    MaxAttempts,
    BackoffBaseMs,
    ApiBaseUrl,
}

#[derive(Debug, Clone, Copy)]
struct ConfigOption {
    name: &'static str,
    field: ConfigField,
    ty: ConfigValueType,
}

const OPTS: &[ConfigOption] = &[
    ConfigOption {
        name: "保存路径",
        field: ConfigField::SavePath,
        ty: ConfigValueType::String,
    },
    ConfigOption {
        name: "章节语言(如 en / ja / zh)",
        field: ConfigField::PreferredLanguage,
        ty: ConfigValueType::String,
    },
    ConfigOption {
        name: "是否合并为 PDF",
        field: ConfigField::DownloadAsPdf,
        ty: ConfigValueType::Bool,
    },
    ConfigOption {
        name: "内容分级过滤(逗号分隔)",
        field: ConfigField::ContentRatings,
        ty: ConfigValueType::List,
    },
    ConfigOption {
        name: "搜索结果数量",
        field: ConfigField::SearchLimit,
        ty: ConfigValueType::Int,
    },
    ConfigOption {
        name: "请求超时(秒)",
        field: ConfigField::RequestTimeout,
        ty: ConfigValueType::Int,
    },
    ConfigOption {
        name: "重连超时(秒)",
        field: ConfigField::ExtendedTimeout,
        ty: ConfigValueType::Int,
    },
    ConfigOption {
        name: "最大尝试次数",
        field: ConfigField::MaxAttempts,
        ty: ConfigValueType::Int,
    },
    ConfigOption {
        name: "退避基准(ms)",
        field: ConfigField::BackoffBaseMs,
        ty: ConfigValueType::Int,
    },
    ConfigOption {
        name: "API 地址",
        field: ConfigField::ApiBaseUrl,
        ty: ConfigValueType::String,
    },
];

pub(super) fn show_config_menu(config: &mut Config, base_dir: Option<&Path>) -> Result<()> {
    loop {
        println!("\n=== 配置选项 ===");
        for (idx, opt) in OPTS.iter().enumerate() {
            println!("{}. {}: {}", idx + 1, opt.name, config_value_display(config, opt.field));
        }
        println!("0. 返回主菜单");
        let choice = super::read_line("\n请选择要修改的配置项编号: ")?;
        let choice = choice.trim();
        if choice == "0" || choice.is_empty() {
            break;
        }
        let Ok(idx) = choice.parse::<usize>() else {
            println!("请输入数字编号");
            continue;
        };
        if idx == 0 || idx > OPTS.len() {
            println!("编号超出范围");
            continue;
        }
        let opt = OPTS[idx - 1];
        let cur = config_value_display(config, opt.field);
        let input = super::read_line(&format!("当前 {} = {}\n输入新值(留空取消): ", opt.name, cur))?;
        let new_text = input.trim();
        if new_text.is_empty() {
            println!("已取消修改");
            continue;
        }

        if let Err(err) = apply_config_edit(config, opt, new_text) {
            println!("修改失败: {}", err);
            continue;
        }
        // 持久化到 config.yml
        save_with_base(config, base_dir).map_err(|e| anyhow!(e.to_string()))?;
        println!("已更新 {} = {}", opt.name, config_value_display(config, opt.field));
    }
    Ok(())
}

fn config_value_display(config: &Config, field: ConfigField) -> String {
    match field {
        ConfigField::SavePath => config.save_path.clone(),
        ConfigField::PreferredLanguage => config.preferred_language.clone(),
        ConfigField::DownloadAsPdf => config.download_as_pdf.to_string(),
        ConfigField::ContentRatings => config.content_ratings.join(","),
        ConfigField::SearchLimit => config.search_limit.to_string(),
        ConfigField::RequestTimeout => config.request_timeout.to_string(),
        ConfigField::ExtendedTimeout => config.extended_timeout.to_string(),
        ConfigField::MaxAttempts => config.max_attempts.to_string(),
        ConfigField::BackoffBaseMs => config.backoff_base_ms.to_string(),
        ConfigField::ApiBaseUrl => config.api_base_url.clone(),
    }
}

fn apply_config_edit(config: &mut Config, opt: ConfigOption, text: &str) -> Result<()> {
    match opt.ty {
        ConfigValueType::Bool => {
            let v = matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "y");
            set_bool(config, opt.field, v)
        }
        ConfigValueType::Int => {
            let v: i64 = text.parse().map_err(|_| anyhow!("类型转换失败：需要整数"))?;
            set_int(config, opt.field, v)
        }
        ConfigValueType::String => set_string(config, opt.field, text),
        ConfigValueType::List => {
            let parts: Vec<String> = text
                .split([',', '\n'])
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
            set_list(config, opt.field, parts)
        }
    }
}

fn set_bool(config: &mut Config, field: ConfigField, v: bool) -> Result<()> {
    match field {
        ConfigField::DownloadAsPdf => config.download_as_pdf = v,
        _ => return Err(anyhow!("该字段不是 bool")),
    }
    Ok(())
}

fn set_int(config: &mut Config, field: ConfigField, v: i64) -> Result<()> {
    match field {
        ConfigField::SearchLimit => {
            if !(1..=100).contains(&v) {
                return Err(anyhow!("搜索结果数量需在 1~100 之间"));
            }
            config.search_limit = v as usize;
        }
        ConfigField::RequestTimeout => {
            if v <= 0 {
                return Err(anyhow!("请求超时必须大于 0"));
            }
            config.request_timeout = v as u64;
        }
        ConfigField::ExtendedTimeout => {
            if v <= 0 || (v as u64) < config.request_timeout {
                return Err(anyhow!("重连超时不能小于请求超时"));
            }
            config.extended_timeout = v as u64;
        }
        ConfigField::MaxAttempts => {
            if v <= 0 {
                return Err(anyhow!("最大尝试次数必须大于 0"));
            }
            config.max_attempts = v as u32;
        }
        ConfigField::BackoffBaseMs => {
            if v < 0 {
                return Err(anyhow!("退避基准不能为负"));
            }
            config.backoff_base_ms = v as u64;
        }
        _ => return Err(anyhow!("该字段不是整数")),
    }
    Ok(())
}

fn set_string(config: &mut Config, field: ConfigField, v: &str) -> Result<()> {
    match field {
        ConfigField::SavePath => {
            let p = v.trim_end_matches(['/', '\\']);
            fs::create_dir_all(p).with_context(|| format!("创建目录失败: {}", p))?;
            config.save_path = p.to_string();
        }
        ConfigField::PreferredLanguage => config.preferred_language = v.to_ascii_lowercase(),
        ConfigField::ApiBaseUrl => {
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(anyhow!("API 地址需以 http:// 或 https:// 开头"));
            }
            config.api_base_url = v.trim_end_matches('/').to_string();
        }
        _ => return Err(anyhow!("该字段不是字符串")),
    }
    Ok(())
}

fn set_list(config: &mut Config, field: ConfigField, v: Vec<String>) -> Result<()> {
    match field {
        ConfigField::ContentRatings => {
            const KNOWN: [&str; 4] = ["safe", "suggestive", "erotica", "pornographic"];
            if let Some(bad) = v.iter().find(|r| !KNOWN.contains(&r.as_str())) {
                return Err(anyhow!("未知分级: {}（可选 {}）", bad, KNOWN.join("/")));
            }
            config.content_ratings = v;
        }
        _ => return Err(anyhow!("该字段不是列表")),
    }
    Ok(())
}
