//! 提取流程编排模块
//!
//! 按固定顺序执行：加载归档 -> 定位OPF -> 提取章节 -> 提取图片 -> 验证。
//! 任何致命错误都会立即终止流程，不会返回部分结果，也不会自动重试。

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::epub::archive::{ArchiveIndex, ZipArchiveIndex};
use crate::epub::chapters::{ChapterExtractor, ChapterSet};
use crate::epub::config::ExtractionConfig;
use crate::epub::container::ManifestResolver;
use crate::epub::error::EpubError;
use crate::epub::images::{ImageAliasTable, ImageResourceExtractor};
use crate::epub::progress::{ProgressObserver, ProgressReporter, Stage};
use crate::epub::validate::ExtractionValidator;

/// 提取流程的最终结果
///
/// 所有数据都已从归档中复制出来，归档数据可以在提取完成后释放。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub manifest_path: String,
    pub manifest_text: String,
    pub chapter_set: ChapterSet,
    pub image_alias_table: ImageAliasTable,
}

/// 某个阶段的致命错误
#[derive(Error, Debug)]
#[error("{stage}: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: EpubError,
}

impl StageError {
    pub fn new(stage: Stage, source: EpubError) -> Self {
        Self { stage, source }
    }
}

/// 提取流程编排器
#[derive(Debug, Clone)]
pub struct Pipeline {
    resolver: ManifestResolver,
    chapters: ChapterExtractor,
    images: ImageResourceExtractor,
    validator: ExtractionValidator,
    max_entry_size: u64,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            resolver: ManifestResolver,
            chapters: ChapterExtractor::new(config),
            images: ImageResourceExtractor::new(config),
            validator: ExtractionValidator::new(config),
            max_entry_size: config.max_entry_size,
        }
    }

    /// 从原始ZIP数据执行完整的提取流程
    ///
    /// # 参数
    /// * `bytes` - EPUB文件的原始数据
    /// * `observer` - 接收进度通知的观察者
    ///
    /// # 返回值
    /// * `Result<ExtractionResult, StageError>` - 失败时带有出错的阶段
    pub async fn run_bytes(
        &self,
        bytes: Vec<u8>,
        observer: &dyn ProgressObserver,
    ) -> Result<ExtractionResult, StageError> {
        let mut reporter = ProgressReporter::new(observer);
        reporter.start();
        reporter.begin(Stage::LoadArchive);

        let archive = ZipArchiveIndex::from_bytes(bytes)
            .map(|archive| archive.with_max_entry_size(self.max_entry_size))
            .map_err(|e| fail(&reporter, e))?;

        self.run_stages(Arc::new(archive), &mut reporter).await
    }

    /// 对已经打开的归档执行提取流程
    pub async fn run<A>(
        &self,
        archive: Arc<A>,
        observer: &dyn ProgressObserver,
    ) -> Result<ExtractionResult, StageError>
    where
        A: ArchiveIndex + ?Sized + 'static,
    {
        let mut reporter = ProgressReporter::new(observer);
        reporter.start();
        reporter.begin(Stage::LoadArchive);
        self.run_stages(archive, &mut reporter).await
    }

    async fn run_stages<A>(
        &self,
        archive: Arc<A>,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<ExtractionResult, StageError>
    where
        A: ArchiveIndex + ?Sized + 'static,
    {
        reporter.begin(Stage::ResolveManifest);
        let location = self
            .resolver
            .resolve(archive.as_ref())
            .await
            .map_err(|e| fail(reporter, e))?;

        reporter.begin(Stage::ExtractChapters);
        let chapter_set = self
            .chapters
            .extract(&archive, reporter)
            .await
            .map_err(|e| fail(reporter, e))?;

        reporter.begin(Stage::ExtractImages);
        let image_alias_table = self.images.extract(&archive, reporter).await;

        reporter.begin(Stage::Validate);
        let summary = self
            .validator
            .validate(&location.manifest_text, &chapter_set, &image_alias_table)
            .map_err(|e| fail(reporter, e.into()))?;
        reporter.detail(&summary.to_string());

        reporter.begin(Stage::Complete);
        info!(path = %location.manifest_path, "EPUB提取完成");

        Ok(ExtractionResult {
            manifest_path: location.manifest_path,
            manifest_text: location.manifest_text,
            chapter_set,
            image_alias_table,
        })
    }
}

fn fail(reporter: &ProgressReporter<'_>, source: EpubError) -> StageError {
    let err = StageError::new(reporter.stage(), source);
    error!(stage = %err.stage, error = %err.source, "提取流程终止");
    err
}
