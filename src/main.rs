//! MangaDex 漫画章节下载器。
//!
//! 本 crate 负责：配置加载、命令行交互、目录服务访问、可续传的章节下载与 PDF 合并。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/路径命名等基础设施
//! - `network_parser`：目录服务客户端（传输层、重试策略、类型化响应）
//! - `download`：完整性判断、单章节下载引擎、批量下载与界面层入口
//! - `bundle`：章节图片合并为 PDF
//! - `ui`：命令行交互

use anyhow::{Result, anyhow};
use clap::Parser;

mod base_system;
mod bundle;
mod download;
mod network_parser;
mod ui;

use base_system::config::load_or_create_with_base;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "mangadex-chapter-downloader")]
#[command(about = "MangaDex chapter downloader (resumable, optional PDF bundling)")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs 等文件）
    #[arg(long)]
    data_dir: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("MangaDex Chapter Downloader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_ref().map(std::path::Path::new);
    let log = init_logging(cli.debug, data_dir)?;

    let mut config =
        load_or_create_with_base::<Config>(None, data_dir).map_err(|e| anyhow!(e.to_string()))?;

    info!(target: "startup", "当前版本: v{}", VERSION);
    let result = ui::noui::run(&mut config, data_dir);
    log.safe_exit();
    result
}

fn init_logging(debug: bool, base_dir: Option<&std::path::Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: debug,
    };
    LogSystem::init_with_base(opts, base_dir).map_err(|e| anyhow!(e))
}
