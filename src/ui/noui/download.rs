use std::path::Path;
use std::sync::OnceLock;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{info, warn};

use crate::base_system::config::save_with_base;
use crate::base_system::context::Config;
use crate::download::models::{LocalChapterState, SelectedChapter};
use crate::download::plan::{
    download_selection, list_chapters_with_status, resolve_title, search_titles,
};
use crate::download::progress::{CliBars, ProgressEvent, ProgressReporter};
use crate::network_parser::catalog::CatalogClient;
use crate::network_parser::models::Title;

/// 输入是标题 ID 或标题页链接时直接取标题，否则按名称搜索。
pub(super) fn pick_title(client: &CatalogClient, config: &Config, text: &str) -> Result<Option<Title>> {
    match parse_title_id(text) {
        Some(id) => resolve_title(client, &id).map(Some),
        None => search_and_pick(client, config, text),
    }
}

static RE_TITLE_ID: OnceLock<Regex> = OnceLock::new();

fn re_title_id() -> &'static Regex {
    RE_TITLE_ID.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:https?://(?:www\.)?mangadex\.org/title/)?([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})(?:[/?#].*)?$",
        )
        .expect("compile RE_TITLE_ID")
    })
}

/// 识别 `{uuid}` 与 `https://mangadex.org/title/{uuid}/...`。
fn parse_title_id(input: &str) -> Option<String> {
    let caps = re_title_id().captures(input.trim())?;
    Some(caps.get(1)?.as_str().to_ascii_lowercase())
}

fn search_and_pick(client: &CatalogClient, config: &Config, keyword: &str) -> Result<Option<Title>> {
    let titles = search_titles(client, config, keyword).with_context(|| format!("搜索失败: {}", keyword))?;

    if titles.is_empty() {
        println!("未搜索到结果\n");
        return Ok(None);
    }

    println!("\n===== 搜索结果 =====");
    for (idx, t) in titles.iter().enumerate() {
        if t.tags.is_empty() {
            println!("{}. {} | ID: {}", idx + 1, t.name, t.id);
        } else {
            println!("{}. {} | ID: {} | 标签: {}", idx + 1, t.name, t.id, t.tags.join("|"));
        }
    }
    println!("0. 取消\n");

    let choice = super::read_line("请输入编号：")?;
    let choice = choice.trim();
    if choice == "0" || choice.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    if let Ok(idx) = choice.parse::<usize>()
        && idx >= 1
        && idx <= titles.len()
    {
        return Ok(Some(titles[idx - 1].clone()));
    }

    println!("输入无效，已取消\n");
    Ok(None)
}

pub(super) fn download_title(
    client: &CatalogClient,
    config: &mut Config,
    base_dir: Option<&Path>,
    title: &Title,
) -> Result<()> {
    println!("\n标题: {}", title.name);
    if let Some(desc) = title.description.as_deref() {
        let mut short = desc.trim().to_string();
        if short.chars().count() > 80 {
            short = short.chars().take(80).collect::<String>() + "...";
        }
        println!("简介: {}", short);
    }
    if let Some(cover) = title.cover_url() {
        println!("封面: {}", cover);
    }

    let language = prompt_language(config, base_dir)?;
    let as_document = prompt_document_mode(config, base_dir)?;
    let root = config.default_save_dir();

    let listing = list_chapters_with_status(client, title, &language, &root, as_document)?;
    if listing.is_empty() {
        println!("该语言（{}）下没有可用章节\n", language);
        return Ok(());
    }

    println!("\n===== 章节列表 =====");
    for (idx, item) in listing.iter().enumerate() {
        println!("{}. {}{}", idx + 1, item.descriptor.label(), state_badge(item.state));
    }
    let done = listing.iter().filter(|l| l.state.is_complete()).count();
    println!("共 {} 章，已完成 {} 章\n", listing.len(), done);

    let text = super::read_line("选择章节（如 1,3,5-8 / all，留空取消）：")?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }
    let Some(indices) = parse_selection(text, listing.len()) else {
        println!("选择格式无效，已取消\n");
        return Ok(());
    };

    let selected: Vec<SelectedChapter> = indices
        .into_iter()
        .map(|i| listing[i].descriptor.clone().into())
        .collect();
    run_batch(client, &title.name, selected, &root, as_document)
}

fn prompt_language(config: &mut Config, base_dir: Option<&Path>) -> Result<String> {
    let current = config.language();
    let input = super::read_line(&format!("章节语言（默认 {}）：", current))?;
    let lang = input.trim().to_ascii_lowercase();
    if lang.is_empty() || lang == current {
        return Ok(current);
    }
    config.preferred_language = lang.clone();
    persist(config, base_dir);
    Ok(lang)
}

fn prompt_document_mode(config: &mut Config, base_dir: Option<&Path>) -> Result<bool> {
    let as_document = super::confirm("是否合并为 PDF？", config.download_as_pdf)?;
    if as_document != config.download_as_pdf {
        config.download_as_pdf = as_document;
        persist(config, base_dir);
    }
    Ok(as_document)
}

fn persist(config: &Config, base_dir: Option<&Path>) {
    if let Err(err) = save_with_base(config, base_dir) {
        warn!(target: "ui", "保存配置失败: {}", err);
    }
}

fn run_batch(
    client: &CatalogClient,
    title: &str,
    selected: Vec<SelectedChapter>,
    root: &Path,
    as_document: bool,
) -> Result<()> {
    let start_time = Instant::now();
    let total = selected.len();
    println!("\n开始下载 {} 章...", total);

    let (tx, rx) = crossbeam_channel::unbounded::<ProgressEvent>();
    let worker = {
        let client = client.clone();
        let title = title.to_string();
        let root = root.to_path_buf();
        thread::spawn(move || {
            let mut reporter = ProgressReporter::channel(tx);
            download_selection(&client, &title, &selected, &root, as_document, &mut reporter)
        })
    };

    let bars = CliBars::new(total);
    for event in rx.iter() {
        bars.handle(&event);
    }

    let paths = worker.join().map_err(|_| anyhow!("下载线程异常退出"))?;
    let failed = total - paths.len();
    info!(target: "ui", success = paths.len(), failed, "批量下载结束");

    println!(
        "\n下载完成！成功 {} 章，失败 {} 章，用时 {:.1} 秒",
        paths.len(),
        failed,
        start_time.elapsed().as_secs_f32()
    );
    for p in &paths {
        println!("  {}", p.display());
    }
    if failed > 0 {
        println!("失败章节已保留已下载的页面，再次选择即可继续下载。");
    }
    println!();
    Ok(())
}

fn state_badge(state: LocalChapterState) -> String {
    match state {
        LocalChapterState::Absent => String::new(),
        LocalChapterState::Partial { existing, expected } => format!(" [{}/{}]", existing, expected),
        LocalChapterState::Complete => " [done]".to_string(),
    }
}

/// 解析 `1,3,5-8` / `all`，返回去重后的 0 基索引（保持升序）。
/// 任何一段越界或无法解析都视为整体无效。
fn parse_selection(text: &str, total: usize) -> Option<Vec<usize>> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("all") {
        return Some((0..total).collect());
    }

    let mut picked = vec![false; total];
    for part in text.split([',', '，']).map(str::trim).filter(|s| !s.is_empty()) {
        let (start, end) = match part.split_once(['-', '~']) {
            Some((a, b)) => (a.trim().parse::<usize>().ok()?, b.trim().parse::<usize>().ok()?),
            None => {
                let n = part.parse::<usize>().ok()?;
                (n, n)
            }
        };
        let (start, end) = if start > end { (end, start) } else { (start, end) };
        if start == 0 || end > total {
            return None;
        }
        for slot in &mut picked[start - 1..end] {
            *slot = true;
        }
    }

    let out: Vec<usize> = picked
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.then_some(i))
        .collect();
    if out.is_empty() { None } else { Some(out) }
}
