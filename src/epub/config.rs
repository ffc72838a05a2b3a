//! 提取配置模块
//!
//! 提供提取流程的可调参数，支持从YAML文件加载配置。
//! 批处理宽度、图片别名前缀、MIME映射等都是数据而不是代码，
//! 新增一种出版工具的路径约定只需要修改配置文件。

use crate::epub::archive::DEFAULT_MAX_ENTRY_SIZE;
use crate::epub::error::{EpubError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "epubsift.yaml";

/// 默认的扩展名到MIME类型映射
static DEFAULT_MIME_TYPES: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    [
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("png", "image/png"),
        ("gif", "image/gif"),
        ("webp", "image/webp"),
        ("svg", "image/svg+xml"),
        ("bmp", "image/bmp"),
    ]
    .into_iter()
    .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
    .collect()
});

/// 章节读取失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedChapterPolicy {
    /// 读取失败的章节不出现在结果中
    #[default]
    Omit,
    /// 读取失败的章节以空字符串记录
    Empty,
}

/// 提取流程配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// 每批并发读取的条目数量
    pub batch_width: usize,
    /// 章节文件扩展名（不区分大小写）
    pub chapter_extensions: Vec<String>,
    /// 图片文件扩展名（不区分大小写）
    pub image_extensions: Vec<String>,
    /// 扩展名到MIME类型的映射
    pub mime_types: BTreeMap<String, String>,
    /// 未知扩展名使用的MIME类型
    pub fallback_mime_type: String,
    /// 图片别名的目录前缀
    pub alias_prefixes: Vec<String>,
    /// OPF文本的最小长度（字符数）
    pub min_manifest_len: usize,
    /// OPF文本中必须出现的结构标记
    pub required_markers: Vec<String>,
    /// 章节读取失败时的策略
    pub failed_chapter_policy: FailedChapterPolicy,
    /// 单个条目解压后的大小上限（字节），超过上限的条目按读取失败处理
    pub max_entry_size: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_width: 5,
            chapter_extensions: to_strings(&["html", "xhtml"]),
            image_extensions: to_strings(&["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"]),
            mime_types: DEFAULT_MIME_TYPES.clone(),
            fallback_mime_type: "application/octet-stream".to_string(),
            alias_prefixes: to_strings(&[
                "Images/",
                "OEBPS/Images/",
                "Text/../Images/",
                "images/",
                "OEBPS/images/",
            ]),
            min_manifest_len: 100,
            required_markers: to_strings(&["<manifest", "<spine"]),
            failed_chapter_policy: FailedChapterPolicy::Omit,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        }
    }
}

impl ExtractionConfig {
    /// 从指定的YAML配置文件加载配置
    ///
    /// 文件中缺失的字段使用默认值。
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    /// * `Result<Self>` - 加载成功返回配置实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// 从YAML文本解析配置
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yml::from_str(content)
            .map_err(|e| EpubError::ConfigError(format!("配置文件格式错误: {}", e)))?;

        config.validated()
    }

    /// 生成默认配置文件
    ///
    /// # 参数
    /// * `path` - 输出路径
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let yaml_content = serde_yml::to_string(&Self::default())
            .map_err(|e| EpubError::ConfigError(format!("序列化配置失败: {}", e)))?;

        let content_with_header = format!(
            "# epubsift 提取配置文件\n# batch_width 控制每批并发读取的条目数，调大可提高吞吐量但会增加内存占用\n# alias_prefixes 中的每一项都会与图片文件名拼接成一个查找别名\n\n{}",
            yaml_content
        );

        fs::write(path.as_ref(), content_with_header)
            .map_err(|e| EpubError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 检查配置取值是否合法
    pub fn validated(self) -> Result<Self> {
        if self.batch_width == 0 {
            return Err(EpubError::ConfigError("batch_width 必须大于0".to_string()));
        }
        if self.chapter_extensions.is_empty() {
            return Err(EpubError::ConfigError("chapter_extensions 不能为空".to_string()));
        }
        if self.max_entry_size == 0 {
            return Err(EpubError::ConfigError("max_entry_size 必须大于0".to_string()));
        }
        Ok(self)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
