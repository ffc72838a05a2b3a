use tracing::{debug, info};

use crate::epub::archive::ArchiveIndex;
use crate::epub::error::{EpubError, Result};

/// container.xml在归档中的固定路径
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

const FULL_PATH_ATTR: &str = "full-path";

/// OPF文件的位置和内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLocation {
    /// container.xml的路径
    pub container_path: String,
    /// OPF文件的完整路径
    pub manifest_path: String,
    /// OPF文件的原始文本
    pub manifest_text: String,
}

/// 从container.xml中定位并读取OPF文件
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestResolver;

impl ManifestResolver {
    /// 定位并读取OPF文件
    ///
    /// 只需要一个属性值，所以这里不做完整的XML解析，
    /// 格式不规范的container.xml也能处理。
    ///
    /// # 参数
    /// * `archive` - 归档索引
    ///
    /// # 返回值
    /// * `Result<ManifestLocation>` - 任何一步失败都是致命错误
    pub async fn resolve<A: ArchiveIndex + ?Sized>(&self, archive: &A) -> Result<ManifestLocation> {
        if !archive.contains(CONTAINER_PATH) {
            return Err(EpubError::MissingContainer);
        }

        let container_text = archive.read_text(CONTAINER_PATH).await?;
        let manifest_path = find_full_path(&container_text)
            .ok_or(EpubError::MissingManifestPath)?
            .to_string();
        debug!(path = %manifest_path, "在container.xml中找到OPF路径");

        if !archive.contains(&manifest_path) {
            return Err(EpubError::MissingManifestFile { path: manifest_path });
        }

        let manifest_text = archive.read_text(&manifest_path).await?;
        info!(path = %manifest_path, len = manifest_text.len(), "OPF文件读取完成");

        Ok(ManifestLocation {
            container_path: CONTAINER_PATH.to_string(),
            manifest_path,
            manifest_text,
        })
    }
}

/// 查找第一个 `full-path="..."` 或 `full-path='...'` 属性值
///
/// 属性名不区分大小写，`=` 两侧允许空白。值遇到任意一种引号即结束，且不能为空。
/// 不符合格式的出现位置会被跳过，继续向后查找。
pub fn find_full_path(xml: &str) -> Option<&str> {
    let lowered = xml.to_ascii_lowercase();
    let bytes = xml.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = lowered[search_from..].find(FULL_PATH_ATTR) {
        let attr_end = search_from + offset + FULL_PATH_ATTR.len();
        search_from = attr_end;

        let mut pos = skip_whitespace(bytes, attr_end);
        if bytes.get(pos) != Some(&b'=') {
            continue;
        }
        pos = skip_whitespace(bytes, pos + 1);
        if !matches!(bytes.get(pos), Some(b'"') | Some(b'\'')) {
            continue;
        }

        let value_start = pos + 1;
        let Some(len) = bytes[value_start..].iter().position(|b| matches!(b, b'"' | b'\'')) else {
            continue;
        };
        if len > 0 {
            return Some(&xml[value_start..value_start + len]);
        }
    }

    None
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}
