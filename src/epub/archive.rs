//! 归档索引模块
//!
//! 定义提取流程所需的归档读取能力，并提供基于 `zip` crate 的实现。

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use zip::ZipArchive;

use crate::epub::error::{EpubError, Result};

const UTF8_BOM: char = '\u{feff}';

/// 归档中的一个条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// 归档内的相对路径（分隔符可能是 `/` 或 `\`）
    pub path: String,
    /// 是否为目录
    pub is_directory: bool,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, is_directory: bool) -> Self {
        Self {
            path: path.into(),
            is_directory,
        }
    }

    /// 获取小写的文件扩展名
    ///
    /// 只检查最后一个路径组件，没有 `.` 时返回 `None`。
    pub fn extension(&self) -> Option<String> {
        let file_name = self.path.rsplit(['/', '\\']).next()?;
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() && ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// 检查扩展名是否在给定列表中（不区分大小写）
    pub fn has_extension_in(&self, extensions: &[String]) -> bool {
        match self.extension() {
            Some(ext) => extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)),
            None => false,
        }
    }
}

/// 可随机读取条目的归档
///
/// 读取可能需要解压缩，因此是异步的。单个条目的读取失败只影响该条目。
#[async_trait]
pub trait ArchiveIndex: Send + Sync {
    /// 列出所有条目
    fn entries(&self) -> &[ArchiveEntry];

    /// 检查指定路径的条目是否存在
    fn contains(&self, path: &str) -> bool {
        self.entries().iter().any(|entry| entry.path == path)
    }

    /// 读取条目的二进制内容
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>>;

    /// 读取条目的文本内容
    ///
    /// 无效的UTF-8序列会被替换，开头的BOM会被去除。
    async fn read_text(&self, path: &str) -> Result<String> {
        let bytes = self.read_bytes(path).await?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.strip_prefix(UTF8_BOM).unwrap_or(&text).to_string())
    }
}

/// 单个条目解压后的默认大小上限（256 MiB）
pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 256 * 1024 * 1024;

/// 基于内存中ZIP数据的归档索引
///
/// 中央目录只解析一次。原始数据保存在 `Arc<[u8]>` 中，
/// 每次读取都克隆一个廉价的归档句柄，在阻塞线程池中解压。
/// 头部声明的大小不可信，超过上限的条目按单条目错误处理。
#[derive(Clone)]
pub struct ZipArchiveIndex {
    archive: ZipArchive<Cursor<Arc<[u8]>>>,
    entries: Vec<ArchiveEntry>,
    paths: HashSet<String>,
    max_entry_size: u64,
}

impl ZipArchiveIndex {
    /// 从原始ZIP数据创建归档索引
    ///
    /// # 参数
    /// * `bytes` - 完整的归档数据
    ///
    /// # 返回值
    /// * `Result<ZipArchiveIndex>` - 数据不是有效的ZIP时返回错误
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let data: Arc<[u8]> = Arc::from(bytes);
        let mut archive = ZipArchive::new(Cursor::new(data))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            entries.push(ArchiveEntry::new(file.name(), file.is_dir()));
        }
        let paths = entries.iter().map(|entry| entry.path.clone()).collect();

        debug!(entries = entries.len(), "ZIP中央目录解析完成");
        Ok(Self {
            archive,
            entries,
            paths,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        })
    }

    /// 设置单个条目解压后的大小上限
    pub fn with_max_entry_size(mut self, limit: u64) -> Self {
        self.max_entry_size = limit;
        self
    }
}

#[async_trait]
impl ArchiveIndex for ZipArchiveIndex {
    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        if !self.contains(path) {
            return Err(EpubError::EntryNotFound(path.to_string()));
        }

        let mut archive = self.archive.clone();
        let name = path.to_string();
        let limit = self.max_entry_size;
        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let file = archive.by_name(&name)?;
            if file.size() > limit {
                return Err(EpubError::EntryTooLarge {
                    path: name,
                    size: file.size(),
                    limit,
                });
            }

            // 声明的大小可能是假的，实际读取量同样受上限约束
            let mut buffer = Vec::new();
            file.take(limit.saturating_add(1)).read_to_end(&mut buffer)?;
            if buffer.len() as u64 > limit {
                return Err(EpubError::EntryTooLarge {
                    path: name,
                    size: buffer.len() as u64,
                    limit,
                });
            }
            Ok(buffer)
        })
        .await
        .map_err(|e| EpubError::Task(e.to_string()))?
    }
}
