//! 进度报告模块
//!
//! 进度状态是一个显式传递的值，不使用全局计数器。
//! 每个阶段开始时步数加一；阶段内部的批次通知只更新消息，不推进步数。

use std::fmt;

use tracing::debug;

/// 提取流程的阶段，按执行顺序排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    LoadArchive,
    ResolveManifest,
    ExtractChapters,
    ExtractImages,
    Validate,
    Complete,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::LoadArchive,
        Stage::ResolveManifest,
        Stage::ExtractChapters,
        Stage::ExtractImages,
        Stage::Validate,
        Stage::Complete,
    ];

    /// 阶段名称
    pub fn label(&self) -> &'static str {
        match self {
            Stage::LoadArchive => "ZIP归档加载",
            Stage::ResolveManifest => "元数据提取",
            Stage::ExtractChapters => "章节内容提取",
            Stage::ExtractImages => "图片资源处理",
            Stage::Validate => "数据完整性验证",
            Stage::Complete => "分析完成",
        }
    }

    /// 阶段开始时发送的消息
    pub fn start_message(&self) -> &'static str {
        match self {
            Stage::LoadArchive => "ZIP归档分析中...",
            Stage::ResolveManifest => "元数据提取中...",
            Stage::ExtractChapters => "章节内容提取中...",
            Stage::ExtractImages => "图片资源处理中...",
            Stage::Validate => "数据完整性验证中...",
            Stage::Complete => "分析完成!",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 进度上下文：当前步数与总步数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressContext {
    pub step: u32,
    pub total: u32,
}

impl ProgressContext {
    pub fn new(total: u32) -> Self {
        Self { step: 0, total }
    }

    /// 返回推进一步后的上下文（不会超过总步数）
    pub fn advance(self) -> Self {
        Self {
            step: (self.step + 1).min(self.total),
            total: self.total,
        }
    }

    /// 当前百分比，四舍五入到整数
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let percent = (self.step as f64 / self.total as f64 * 100.0).round();
        percent.min(100.0) as u8
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new(Stage::ALL.len() as u32)
    }
}

/// 一条进度通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub message: String,
    pub progress: u8,
}

/// 接收进度通知的外部观察者
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// 丢弃所有通知的观察者
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// 在各阶段之间传递的进度报告器
pub struct ProgressReporter<'a> {
    context: ProgressContext,
    stage: Stage,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(observer: &'a dyn ProgressObserver) -> Self {
        Self {
            context: ProgressContext::default(),
            stage: Stage::LoadArchive,
            observer,
        }
    }

    /// 发送加载开始的通知，此时还没有任何阶段完成（0%）
    pub fn start(&self) {
        self.emit("EPUB文件加载开始...");
    }

    /// 当前阶段
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// 开始一个新阶段：推进步数并发送阶段开始消息
    pub fn begin(&mut self, stage: Stage) {
        self.stage = stage;
        self.context = self.context.advance();
        self.emit(stage.start_message());
    }

    /// 发送阶段内部的详细消息，百分比保持不变
    pub fn detail(&self, message: &str) {
        self.emit(message);
    }

    fn emit(&self, message: &str) {
        let progress = self.context.percent();
        debug!(stage = %self.stage, progress, "{}", message);
        self.observer.on_progress(&ProgressUpdate {
            stage: self.stage,
            message: format!("{} ({}%)", message, progress),
            progress,
        });
    }
}
