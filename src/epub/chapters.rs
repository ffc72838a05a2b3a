//! 章节内容提取模块
//!
//! 扫描归档中的HTML/XHTML条目，分批读取其原始文本。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::epub::archive::ArchiveIndex;
use crate::epub::batch::read_in_batches;
use crate::epub::config::{ExtractionConfig, FailedChapterPolicy};
use crate::epub::error::{EpubError, Result};
use crate::epub::progress::ProgressReporter;

/// 章节集合：归档路径 -> 章节原始文本
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChapterSet(BTreeMap<String, String>);

impl ChapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 按归档路径获取章节文本
    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn insert(&mut self, path: String, content: String) {
        self.0.insert(path, content);
    }
}

/// 章节内容提取器
#[derive(Debug, Clone)]
pub struct ChapterExtractor {
    extensions: Vec<String>,
    batch_width: usize,
    policy: FailedChapterPolicy,
}

impl ChapterExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            extensions: config.chapter_extensions.clone(),
            batch_width: config.batch_width,
            policy: config.failed_chapter_policy,
        }
    }

    /// 选出所有章节条目的路径
    pub fn select<A: ArchiveIndex + ?Sized>(&self, archive: &A) -> Vec<String> {
        archive
            .entries()
            .iter()
            .filter(|entry| !entry.is_directory && entry.has_extension_in(&self.extensions))
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// 提取所有章节的原始文本
    ///
    /// 单个条目读取失败只记录警告，按配置的策略忽略或记为空字符串。
    ///
    /// # 参数
    /// * `archive` - 归档索引
    /// * `reporter` - 进度报告器，每批结束时发送一次详细消息
    ///
    /// # 返回值
    /// * `Result<ChapterSet>` - 结果为空时返回 `NoChapterContent`
    pub async fn extract<A>(&self, archive: &Arc<A>, reporter: &ProgressReporter<'_>) -> Result<ChapterSet>
    where
        A: ArchiveIndex + ?Sized + 'static,
    {
        let paths = self.select(archive.as_ref());
        let mut chapters = ChapterSet::new();
        let mut failed = 0usize;

        read_in_batches(
            archive,
            &paths,
            self.batch_width,
            |archive, path| async move { archive.read_text(&path).await },
            |results, progress| {
                for (path, result) in results {
                    match result {
                        Ok(content) => chapters.insert(path, content),
                        Err(e) => {
                            warn!(path = %path, error = %e, "章节文件处理失败");
                            failed += 1;
                            if self.policy == FailedChapterPolicy::Empty {
                                chapters.insert(path, String::new());
                            }
                        }
                    }
                }
                reporter.detail(&format!("章节文件处理中... {}/{}", progress.done, progress.total));
            },
        )
        .await;

        if chapters.is_empty() {
            return Err(EpubError::NoChapterContent);
        }

        info!(chapters = chapters.len(), failed, "章节内容提取完成");
        Ok(chapters)
    }
}
