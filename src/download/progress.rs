//! 进度事件上报与 CLI 进度条管理。

use std::path::PathBuf;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    AssetProgress {
        current: usize,
        total: usize,
        title: String,
        chapter_label: String,
    },
    ChapterProgress {
        current: usize,
        total: usize,
        title: String,
    },
    BatchComplete {
        paths: Vec<PathBuf>,
    },
}

pub type ProgressCallback = Box<dyn FnMut(ProgressEvent) + Send>;

/// 引擎只往这里推事件，不关心谁在听。
pub struct ProgressReporter {
    cb: Option<ProgressCallback>, // optional UI callback
}

impl ProgressReporter {
    pub fn new(cb: ProgressCallback) -> Self {
        Self { cb: Some(cb) }
    }

    #[cfg(test)]
    pub fn silent() -> Self {
        Self { cb: None }
    }

    /// 发送到通道；接收端关闭后事件被丢弃。
    pub fn channel(tx: crossbeam_channel::Sender<ProgressEvent>) -> Self {
        Self::new(Box::new(move |event| {
            let _ = tx.send(event);
        }))
    }

    pub fn emit(&mut self, event: ProgressEvent) {
        if let Some(cb) = self.cb.as_mut() {
            cb(event);
        }
    }

    pub(crate) fn asset(&mut self, current: usize, total: usize, title: &str, chapter_label: &str) {
        self.emit(ProgressEvent::AssetProgress {
            current,
            total,
            title: title.to_string(),
            chapter_label: chapter_label.to_string(),
        });
    }

    pub(crate) fn chapter(&mut self, current: usize, total: usize, title: &str) {
        self.emit(ProgressEvent::ChapterProgress {
            current,
            total,
            title: title.to_string(),
        });
    }
}

// ── CLI 进度条 ──────────────────────────────────────────────────

/// 把事件画成两条进度条：章节总进度与当前章节页数。
pub struct CliBars {
    _mp: MultiProgress,
    chapter_bar: ProgressBar,
    page_bar: ProgressBar,
}

impl CliBars {
    pub fn new(total_chapters: usize) -> Self {
        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        let chapter_bar = mp.add(ProgressBar::new(total_chapters as u64));
        chapter_bar.set_style(style.clone());
        chapter_bar.set_prefix("章节");

        let page_bar = mp.add(ProgressBar::new(0));
        page_bar.set_style(style);
        page_bar.set_prefix("页面");

        Self {
            _mp: mp,
            chapter_bar,
            page_bar,
        }
    }

    pub fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::AssetProgress {
                current,
                total,
                chapter_label,
                ..
            } => {
                self.page_bar.set_length(*total as u64);
                self.page_bar.set_position(*current as u64);
                self.page_bar.set_message(chapter_label.clone());
            }
            ProgressEvent::ChapterProgress { current, total, .. } => {
                self.chapter_bar.set_length(*total as u64);
                self.chapter_bar.set_position(*current as u64);
            }
            ProgressEvent::BatchComplete { .. } => {
                self.page_bar.finish_and_clear();
                self.chapter_bar.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn recording() -> (ProgressReporter, std::sync::Arc<std::sync::Mutex<Vec<ProgressEvent>>>) {
    let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = events.clone();
    let reporter = ProgressReporter::new(Box::new(move |e| sink.lock().unwrap().push(e)));
    (reporter, events)
}
