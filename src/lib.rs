pub mod epub;

// === 核心API重新导出 ===

/// 提取流程编排器（主要接口）
pub use epub::{Pipeline, ExtractionResult, StageError};

/// 错误处理
pub use epub::{EpubError, Result};

/// 提取配置
pub use epub::{ExtractionConfig, FailedChapterPolicy};

// === 数据结构 ===

/// 章节集合
pub use epub::ChapterSet;

/// 图片资源与别名表
pub use epub::{ImageRecord, ImageAliasTable};

/// OPF位置信息
pub use epub::ManifestLocation;

// === 底层组件（高级用法） ===

/// 归档索引
pub use epub::{ArchiveEntry, ArchiveIndex, ZipArchiveIndex};

/// 各阶段组件
pub use epub::{
    ManifestResolver,
    ChapterExtractor,
    ImageResourceExtractor,
    ExtractionValidator,
    ValidationError,
    ValidationSummary,
};

/// 进度报告
pub use epub::{
    Stage,
    ProgressContext,
    ProgressObserver,
    ProgressReporter,
    ProgressUpdate,
    NoopObserver,
};

/// 消息协议
pub use epub::{WorkerMessage, ExtractRequest, ChannelObserver, handle_request};

// === 库信息 ===

/// 库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库的描述
pub const DESCRIPTION: &str = "一个容错的EPUB归档原始内容提取库";

// === 便捷函数 ===

/// 使用默认配置提取EPUB内容
///
/// 这是 `Pipeline::run_bytes` 的便捷包装函数，不报告进度。
///
/// # 参数
/// * `bytes` - EPUB文件的原始数据
///
/// # 返回值
/// * `Result<ExtractionResult, StageError>` - 提取结果
///
/// # 示例
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("book.epub")?;
/// let result = epubsift::extract(bytes).await?;
/// println!("OPF: {}, 章节数: {}", result.manifest_path, result.chapter_set.len());
/// # Ok(())
/// # }
/// ```
pub async fn extract(bytes: Vec<u8>) -> std::result::Result<ExtractionResult, StageError> {
    Pipeline::default().run_bytes(bytes, &NoopObserver).await
}
