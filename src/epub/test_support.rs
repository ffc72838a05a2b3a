//! 测试辅助工具：内存中构建EPUB归档，以及可注入读取失败的归档索引。

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use zip::{CompressionMethod, ZipWriter};
use zip::write::FileOptions;

use crate::epub::archive::{ArchiveEntry, ArchiveIndex};
use crate::epub::error::{EpubError, Result};

pub const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#;

pub const OPF_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="3.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
        <dc:title>测试书籍</dc:title>
        <dc:identifier id="BookId">urn:uuid:1234</dc:identifier>
    </metadata>
    <manifest>
        <item id="chapter1" href="Text/chapter1.xhtml" media-type="application/xhtml+xml"/>
        <item id="chapter2" href="Text/chapter2.xhtml" media-type="application/xhtml+xml"/>
        <item id="cover" href="Images/cover.png" media-type="image/png"/>
    </manifest>
    <spine>
        <itemref idref="chapter1"/>
        <itemref idref="chapter2"/>
    </spine>
</package>"#;

pub const CHAPTER1: &str = "<html><body><h1>第一章</h1><img src=\"../Images/cover.png\"/></body></html>";
pub const CHAPTER2: &str = "<html><body><h1>第二章</h1></body></html>";
pub const COVER_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// 在内存中构建ZIP归档
pub struct ZipBuilder {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    pub fn file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.zip.start_file(path, FileOptions::<()>::default()).unwrap();
        self.zip.write_all(content.as_ref()).unwrap();
        self
    }

    /// 以不压缩、强制ZIP64的方式写入文件
    pub fn large_file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        let options = FileOptions::<()>::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(true);
        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(content.as_ref()).unwrap();
        self
    }

    pub fn directory(mut self, path: &str) -> Self {
        self.zip.add_directory(path, FileOptions::<()>::default()).unwrap();
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.zip.finish().unwrap().into_inner()
    }
}

/// 一个完整的测试EPUB：两个章节、一张封面图片
pub fn sample_epub() -> Vec<u8> {
    ZipBuilder::new()
        .file("mimetype", "application/epub+zip")
        .file("META-INF/container.xml", CONTAINER_XML)
        .file("OEBPS/content.opf", OPF_XML)
        .directory("OEBPS/Text/")
        .file("OEBPS/Text/chapter1.xhtml", CHAPTER1)
        .file("OEBPS/Text/chapter2.xhtml", CHAPTER2)
        .file("OEBPS/Images/cover.png", COVER_PNG)
        .finish()
}

/// 内存中的归档索引，可以指定某些路径读取失败
#[derive(Default)]
pub struct MemoryArchive {
    entries: Vec<ArchiveEntry>,
    data: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    extra_yields: HashMap<String, usize>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.entries.push(ArchiveEntry::new(path, false));
        self.data.insert(path.to_string(), content.as_ref().to_vec());
        self
    }

    pub fn with_directory(mut self, path: &str) -> Self {
        self.entries.push(ArchiveEntry::new(path, true));
        self
    }

    /// 条目存在，但读取时失败
    pub fn with_failing(mut self, path: &str) -> Self {
        self.entries.push(ArchiveEntry::new(path, false));
        self.failing.insert(path.to_string());
        self
    }

    /// 读取前额外让出调度器 `yields` 次，模拟解压较慢的条目
    pub fn with_slow_file(mut self, path: &str, content: impl AsRef<[u8]>, yields: usize) -> Self {
        self.extra_yields.insert(path.to_string(), yields);
        self.with_file(path, content)
    }

    /// 同时进行中的最大读取数量
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveIndex for MemoryArchive {
    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::task::yield_now().await;
        for _ in 0..self.extra_yields.get(path).copied().unwrap_or(0) {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(path) {
            return Err(EpubError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "corrupt deflate stream",
            )));
        }
        self.data
            .get(path)
            .cloned()
            .ok_or_else(|| EpubError::EntryNotFound(path.to_string()))
    }
}
