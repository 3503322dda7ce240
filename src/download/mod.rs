//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`     ：数据模型（LocalChapterState / SelectedChapter / DownloadError 等）
//! - `progress`   ：进度事件上报与 CLI 进度条
//! - `status`     ：本地章节完整性判断
//! - `downloader` ：单章节下载引擎（续传、合并 PDF）
//! - `batch`      ：顺序批量下载
//! - `plan`       ：界面层入口：搜索、章节列表、下载所选章节

pub mod batch;
pub mod downloader;
pub mod models;
pub mod plan;
pub mod progress;
pub mod status;
