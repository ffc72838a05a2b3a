use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use epubsift::epub::DEFAULT_CONFIG_PATH;
use epubsift::{handle_request, ExtractRequest, ExtractionConfig, ExtractionResult, Pipeline, WorkerMessage};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// 📚 epubsift - EPUB原始内容提取工具
#[derive(Parser)]
#[command(name = "epubsift")]
#[command(about = "提取EPUB归档中的OPF、章节和图片资源，按行输出JSON消息")]
#[command(version)]
struct Args {
    /// EPUB文件路径
    #[arg(help = "要处理的EPUB文件路径", required_unless_present = "generate_config")]
    epub_file: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long, help = "YAML配置文件路径（默认读取当前目录下的 epubsift.yaml）")]
    config: Option<PathBuf>,

    /// 覆盖配置中的批处理宽度
    #[arg(short, long, help = "每批并发读取的条目数")]
    batch_width: Option<usize>,

    /// 输出摘要而不是JSON消息
    #[arg(short, long, help = "显示可读的摘要信息，而不是JSON消息")]
    summary: bool,

    /// 详细日志
    #[arg(short, long, help = "在stderr输出详细日志")]
    verbose: bool,

    /// 生成默认配置文件
    #[arg(long, value_name = "PATH", help = "生成默认配置文件后退出")]
    generate_config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Some(path) = &args.generate_config {
        return match ExtractionConfig::generate_default_config(path) {
            Ok(()) => {
                println!("✅ 已生成默认配置文件: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ 错误: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ 错误: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(epub_file) = args.epub_file.as_deref() else {
        eprintln!("❌ 错误: 缺少EPUB文件路径");
        return ExitCode::FAILURE;
    };

    let bytes = match tokio::fs::read(epub_file).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let message = WorkerMessage::error(format!("无法读取文件 {}: {}", epub_file.display(), e));
            emit(&message, args.summary);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = Pipeline::new(&config);
    let (sender, mut receiver) = mpsc::unbounded_channel();

    let worker = handle_request(ExtractRequest::new(bytes), &pipeline, sender);
    let printer = async {
        let mut succeeded = false;
        while let Some(message) = receiver.recv().await {
            succeeded |= matches!(message, WorkerMessage::Success { .. });
            emit(&message, args.summary);
        }
        succeeded
    };

    let ((), succeeded) = tokio::join!(worker, printer);
    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// 按优先级加载配置：命令行指定的文件 > 当前目录的默认文件 > 内置默认值
fn load_config(args: &Args) -> epubsift::Result<ExtractionConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractionConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => ExtractionConfig::from_file(DEFAULT_CONFIG_PATH)?,
        None => ExtractionConfig::default(),
    };

    if let Some(width) = args.batch_width {
        config.batch_width = width;
    }

    config.validated()
}

fn emit(message: &WorkerMessage, summary: bool) {
    if summary {
        print_summary(message);
        return;
    }

    match serde_json::to_string(message) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("❌ 消息序列化失败: {}", e),
    }
}

fn print_summary(message: &WorkerMessage) {
    match message {
        WorkerMessage::Progress { message, .. } => println!("⏳ {}", message),
        WorkerMessage::Success { payload } => display_result(payload),
        WorkerMessage::Error { message } => eprintln!("❌ 错误: {}", message),
    }
}

/// 显示提取结果摘要
fn display_result(result: &ExtractionResult) {
    println!("\n📦 OPF文件: {} ({} 字符)", result.manifest_path, result.manifest_text.chars().count());

    println!("\n📚 章节文件: {} 个", result.chapter_set.len());
    for (i, (path, content)) in result.chapter_set.iter().enumerate() {
        println!("  {}. {} ({} 字节)", i + 1, path, content.len());
    }

    let table = &result.image_alias_table;
    println!("\n🖼️  图片资源: {} 个 (别名 {} 个)", table.distinct_records(), table.len());
    for (alias, record) in table.iter() {
        println!("  {} -> {} ({} 字节)", alias, record.mime_type, record.bytes.len());
    }

    println!("\n🎉 EPUB提取完成！");
}
