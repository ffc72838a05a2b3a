//! 提取结果验证模块
//!
//! 只做最基本的结构检查，不验证EPUB规范的完整性。

use std::fmt;

use thiserror::Error;
use tracing::info;

use crate::epub::chapters::ChapterSet;
use crate::epub::config::ExtractionConfig;
use crate::epub::images::ImageAliasTable;

/// 验证失败的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("OPF文件为空或过小: {len} 字符 (至少需要 {min} 字符)")]
    ManifestTooShort { len: usize, min: usize },

    #[error("OPF文件中找不到必需的元素 {0}")]
    MissingMarker(String),

    #[error("没有提取到任何内容文件")]
    EmptyChapterSet,
}

/// 验证通过后的统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSummary {
    /// 章节数量
    pub chapter_count: usize,
    /// 不同源图片的数量
    pub image_count: usize,
    /// 图片别名数量
    pub alias_count: usize,
}

impl fmt::Display for ValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "验证完成: 内容 {}个, 图片 {}个 (别名 {}个)",
            self.chapter_count, self.image_count, self.alias_count
        )
    }
}

/// 提取结果验证器
#[derive(Debug, Clone)]
pub struct ExtractionValidator {
    min_manifest_len: usize,
    required_markers: Vec<String>,
}

impl ExtractionValidator {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            min_manifest_len: config.min_manifest_len,
            required_markers: config.required_markers.clone(),
        }
    }

    /// 验证OPF文本和提取到的章节、图片
    ///
    /// # 参数
    /// * `manifest_text` - OPF原始文本
    /// * `chapters` - 章节集合
    /// * `images` - 图片别名表（只用于统计）
    ///
    /// # 返回值
    /// * `Result<ValidationSummary, ValidationError>` - 通过时返回统计信息
    pub fn validate(
        &self,
        manifest_text: &str,
        chapters: &ChapterSet,
        images: &ImageAliasTable,
    ) -> Result<ValidationSummary, ValidationError> {
        let len = manifest_text.chars().count();
        if len < self.min_manifest_len {
            return Err(ValidationError::ManifestTooShort {
                len,
                min: self.min_manifest_len,
            });
        }

        if let Some(marker) = self
            .required_markers
            .iter()
            .find(|marker| !manifest_text.contains(marker.as_str()))
        {
            return Err(ValidationError::MissingMarker(marker.clone()));
        }

        if chapters.is_empty() {
            return Err(ValidationError::EmptyChapterSet);
        }

        let summary = ValidationSummary {
            chapter_count: chapters.len(),
            image_count: images.distinct_records(),
            alias_count: images.len(),
        };
        info!(
            chapters = summary.chapter_count,
            images = summary.image_count,
            aliases = summary.alias_count,
            "提取结果验证通过"
        );
        Ok(summary)
    }
}
