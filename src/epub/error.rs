use std::io;
use thiserror::Error;

use crate::epub::validate::ValidationError;

pub type Result<T> = std::result::Result<T, EpubError>;

/// 提取流程中的错误类型
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("找不到META-INF/container.xml文件")]
    MissingContainer,

    #[error("container.xml中找不到OPF文件路径")]
    MissingManifestPath,

    #[error("找不到OPF文件: {path}")]
    MissingManifestFile { path: String },

    #[error("找不到有效的HTML/XHTML内容文件")]
    NoChapterContent,

    #[error("归档中不存在条目: {0}")]
    EntryNotFound(String),

    #[error("条目过大: {path} ({size} 字节, 上限 {limit} 字节)")]
    EntryTooLarge { path: String, size: u64, limit: u64 },

    #[error("读取任务异常终止: {0}")]
    Task(String),

    #[error("数据验证失败: {0}")]
    Validation(#[from] ValidationError),

    #[error("配置文件错误: {0}")]
    ConfigError(String),
}
