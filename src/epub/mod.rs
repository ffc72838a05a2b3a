pub mod error;
pub mod config;
pub mod archive;
pub mod progress;
pub mod container;
pub mod chapters;
pub mod images;
pub mod validate;
pub mod pipeline;
pub mod protocol;
mod batch;

#[cfg(test)]
mod test_support;

// 重新导出错误处理
pub use error::{EpubError, Result};

// 重新导出配置
pub use config::{ExtractionConfig, FailedChapterPolicy, DEFAULT_CONFIG_PATH};

// 重新导出归档索引
pub use archive::{ArchiveEntry, ArchiveIndex, ZipArchiveIndex};

// 重新导出各阶段组件
pub use container::{ManifestLocation, ManifestResolver, CONTAINER_PATH};
pub use chapters::{ChapterExtractor, ChapterSet};
pub use images::{alias_keys, ImageAliasTable, ImageRecord, ImageResourceExtractor, MimeTable};
pub use validate::{ExtractionValidator, ValidationError, ValidationSummary};

// 重新导出进度与编排
pub use progress::{NoopObserver, ProgressContext, ProgressObserver, ProgressReporter, ProgressUpdate, Stage};
pub use pipeline::{ExtractionResult, Pipeline, StageError};
pub use protocol::{handle_request, ChannelObserver, ExtractRequest, WorkerMessage};
