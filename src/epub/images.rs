//! 图片资源提取模块
//!
//! 读取归档中的图片条目，并为每张图片生成一组查找别名。
//! 下游HTML引用图片的方式五花八门（相对路径、大小写不同、缺少目录前缀），
//! 在提取时一次性生成所有可能的别名，后续查找就不需要再做路径推断。

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::epub::archive::ArchiveIndex;
use crate::epub::batch::read_in_batches;
use crate::epub::config::ExtractionConfig;
use crate::epub::progress::ProgressReporter;

/// 一张图片的原始数据
///
/// 每个源图片条目只有一个实例，所有别名共享同一个 `Arc`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// 图片别名表：别名 -> 共享的图片数据
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ImageAliasTable(BTreeMap<String, Arc<ImageRecord>>);

impl ImageAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 别名数量
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, alias: &str) -> Option<&Arc<ImageRecord>> {
        self.0.get(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ImageRecord>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 不同源图片的数量（按共享实例计数）
    pub fn distinct_records(&self) -> usize {
        self.0.values().map(Arc::as_ptr).collect::<HashSet<_>>().len()
    }

    /// 在所有别名下注册同一张图片，同名别名后写入者覆盖
    pub(crate) fn register(&mut self, aliases: Vec<String>, record: Arc<ImageRecord>) {
        for alias in aliases {
            self.0.insert(alias, Arc::clone(&record));
        }
    }
}

/// 扩展名到MIME类型的查找表
#[derive(Debug, Clone)]
pub struct MimeTable {
    types: BTreeMap<String, String>,
    fallback: String,
}

impl MimeTable {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            types: config
                .mime_types
                .iter()
                .map(|(ext, mime)| (ext.to_ascii_lowercase(), mime.clone()))
                .collect(),
            fallback: config.fallback_mime_type.clone(),
        }
    }

    /// 根据路径的扩展名判断MIME类型，不检查文件内容
    pub fn mime_for(&self, path: &str) -> &str {
        path.rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .and_then(|ext| self.types.get(&ext))
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }
}

/// 生成一个图片路径的所有别名
///
/// 依次为：原始路径、反斜杠替换为斜杠后的路径、文件名、每个前缀加文件名。
pub fn alias_keys(path: &str, prefixes: &[String]) -> Vec<String> {
    let mut keys = vec![path.to_string(), path.replace('\\', "/")];

    let file_name = path.rsplit(['/', '\\']).next().unwrap_or_default();
    if !file_name.is_empty() {
        keys.push(file_name.to_string());
        keys.extend(prefixes.iter().map(|prefix| format!("{}{}", prefix, file_name)));
    }

    keys
}

/// 图片资源提取器
#[derive(Debug, Clone)]
pub struct ImageResourceExtractor {
    extensions: Vec<String>,
    prefixes: Vec<String>,
    batch_width: usize,
    mime_table: MimeTable,
}

impl ImageResourceExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            extensions: config.image_extensions.clone(),
            prefixes: config.alias_prefixes.clone(),
            batch_width: config.batch_width,
            mime_table: MimeTable::new(config),
        }
    }

    /// 选出所有图片条目的路径
    pub fn select<A: ArchiveIndex + ?Sized>(&self, archive: &A) -> Vec<String> {
        archive
            .entries()
            .iter()
            .filter(|entry| !entry.is_directory && entry.has_extension_in(&self.extensions))
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// 提取所有图片并建立别名表
    ///
    /// 读取失败的图片只记录警告，不产生任何别名。没有图片时返回空表。
    pub async fn extract<A>(&self, archive: &Arc<A>, reporter: &ProgressReporter<'_>) -> ImageAliasTable
    where
        A: ArchiveIndex + ?Sized + 'static,
    {
        let paths = self.select(archive.as_ref());
        let mut table = ImageAliasTable::new();
        if paths.is_empty() {
            debug!("归档中没有图片资源");
            return table;
        }
        debug!(images = ?paths, "发现图片文件");

        let mut failed = 0usize;
        read_in_batches(
            archive,
            &paths,
            self.batch_width,
            |archive, path| async move { archive.read_bytes(&path).await },
            |results, progress| {
                for (path, result) in results {
                    match result {
                        Ok(bytes) => {
                            let record = Arc::new(ImageRecord {
                                bytes,
                                mime_type: self.mime_table.mime_for(&path).to_string(),
                            });
                            table.register(alias_keys(&path, &self.prefixes), record);
                        }
                        Err(e) => {
                            warn!(path = %path, error = %e, "图片处理失败");
                            failed += 1;
                        }
                    }
                }
                reporter.detail(&format!("图片处理中... {}/{}", progress.done, progress.total));
            },
        )
        .await;

        info!(
            aliases = table.len(),
            images = table.distinct_records(),
            failed,
            "图片数据准备完成"
        );
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::progress::NoopObserver;
    use crate::epub::test_support::MemoryArchive;

    fn prefixes() -> Vec<String> {
        ExtractionConfig::default().alias_prefixes
    }

    #[test]
    fn test_alias_keys() {
        let keys = alias_keys("OEBPS/Images/cover.png", &prefixes());
        for expected in [
            "OEBPS/Images/cover.png",
            "cover.png",
            "Images/cover.png",
            "images/cover.png",
            "OEBPS/images/cover.png",
            "Text/../Images/cover.png",
        ] {
            assert!(keys.iter().any(|k| k == expected), "缺少别名 {}", expected);
        }
    }

    #[test]
    fn test_alias_keys_backslashes() {
        let keys = alias_keys("OEBPS\\Images\\a.jpg", &[]);
        assert_eq!(
            keys,
            vec![
                "OEBPS\\Images\\a.jpg".to_string(),
                "OEBPS/Images/a.jpg".to_string(),
                "a.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_alias_keys_trailing_separator() {
        let keys = alias_keys("Images/", &prefixes());
        assert_eq!(keys, vec!["Images/".to_string(), "Images/".to_string()]);
    }

    #[test]
    fn test_mime_for() {
        let table = MimeTable::new(&ExtractionConfig::default());
        assert_eq!(table.mime_for("a/B.JPG"), "image/jpeg");
        assert_eq!(table.mime_for("icon.svg"), "image/svg+xml");
        assert_eq!(table.mime_for("x.tiff"), "application/octet-stream");
        assert_eq!(table.mime_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_extract_shares_one_record_per_image() {
        let archive = Arc::new(
            MemoryArchive::new()
                .with_file("OEBPS/Images/cover.png", [1u8, 2, 3])
                .with_file("OEBPS/Images/pic.JPG", [4u8, 5])
                .with_directory("OEBPS/Images/dir.png")
                .with_file("OEBPS/Text/ch1.xhtml", "<p/>"),
        );
        let extractor = ImageResourceExtractor::new(&ExtractionConfig::default());
        let reporter = ProgressReporter::new(&NoopObserver);

        let table = extractor.extract(&archive, &reporter).await;
        assert_eq!(table.distinct_records(), 2);

        let cover = table.get("OEBPS/Images/cover.png").unwrap();
        for alias in ["cover.png", "Images/cover.png", "images/cover.png", "OEBPS/images/cover.png"] {
            assert!(Arc::ptr_eq(cover, table.get(alias).unwrap()));
        }
        assert_eq!(cover.bytes, vec![1, 2, 3]);
        assert_eq!(cover.mime_type, "image/png");
        assert_eq!(table.get("pic.JPG").unwrap().mime_type, "image/jpeg");
        assert!(table.get("dir.png").is_none());
    }

    #[tokio::test]
    async fn test_extract_no_images() {
        let archive = Arc::new(MemoryArchive::new().with_file("a.xhtml", "<p/>"));
        let extractor = ImageResourceExtractor::new(&ExtractionConfig::default());
        let reporter = ProgressReporter::new(&NoopObserver);

        let table = extractor.extract(&archive, &reporter).await;
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_failed_image_contributes_no_aliases() {
        let archive = Arc::new(
            MemoryArchive::new()
                .with_failing("OEBPS/Images/broken.png")
                .with_file("OEBPS/Images/ok.png", [9u8]),
        );
        let extractor = ImageResourceExtractor::new(&ExtractionConfig::default());
        let reporter = ProgressReporter::new(&NoopObserver);

        let table = extractor.extract(&archive, &reporter).await;
        assert_eq!(table.distinct_records(), 1);
        assert!(table.aliases().all(|alias| !alias.contains("broken")));
        assert!(table.get("ok.png").is_some());
    }

    #[tokio::test]
    async fn test_same_file_name_last_write_wins() {
        let archive = Arc::new(
            MemoryArchive::new()
                .with_file("a/logo.png", [1u8])
                .with_file("b/logo.png", [2u8]),
        );
        let config = ExtractionConfig {
            batch_width: 1,
            ..ExtractionConfig::default()
        };
        let extractor = ImageResourceExtractor::new(&config);
        let reporter = ProgressReporter::new(&NoopObserver);

        let table = extractor.extract(&archive, &reporter).await;
        assert_eq!(table.get("a/logo.png").unwrap().bytes, vec![1]);
        assert_eq!(table.get("b/logo.png").unwrap().bytes, vec![2]);
        assert_eq!(table.get("logo.png").unwrap().bytes, vec![2]);
        assert_eq!(table.distinct_records(), 2);
    }

    #[tokio::test]
    async fn test_alias_collision_follows_entry_order_within_batch() {
        let archive = Arc::new(
            MemoryArchive::new()
                .with_slow_file("b/logo.png", [2u8], 20)
                .with_file("a/logo.png", [1u8]),
        );
        let config = ExtractionConfig {
            batch_width: 5,
            ..ExtractionConfig::default()
        };
        let extractor = ImageResourceExtractor::new(&config);
        let reporter = ProgressReporter::new(&NoopObserver);

        let table = extractor.extract(&archive, &reporter).await;
        assert_eq!(table.get("logo.png").unwrap().bytes, vec![1]);
        assert_eq!(table.get("b/logo.png").unwrap().bytes, vec![2]);
    }
}
