//! 边界消息协议
//!
//! 每次请求携带一份原始归档数据。处理过程中发送零条或多条进度消息，
//! 最后发送且只发送一条成功或错误消息。传输方式由调用方决定。

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::epub::pipeline::{ExtractionResult, Pipeline};
use crate::epub::progress::{ProgressObserver, ProgressUpdate};

const UNKNOWN_ERROR_MESSAGE: &str = "发生了未知错误";

/// 一次提取请求
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// EPUB文件的原始数据
    pub bytes: Vec<u8>,
}

impl ExtractRequest {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// 发送给调用方的消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerMessage {
    Progress { message: String, progress: u8 },
    Success { payload: ExtractionResult },
    Error { message: String },
}

impl WorkerMessage {
    /// 是否为终止消息（成功或错误）
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerMessage::Progress { .. })
    }

    /// 创建错误消息，空消息替换为通用提示
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            UNKNOWN_ERROR_MESSAGE.to_string()
        } else {
            message
        };
        WorkerMessage::Error { message }
    }
}

impl From<&ProgressUpdate> for WorkerMessage {
    fn from(update: &ProgressUpdate) -> Self {
        WorkerMessage::Progress {
            message: update.message.clone(),
            progress: update.progress,
        }
    }
}

/// 把进度通知转发到消息通道的观察者
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: UnboundedSender<WorkerMessage>,
}

impl ChannelObserver {
    pub fn new(sender: UnboundedSender<WorkerMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        if self.sender.send(update.into()).is_err() {
            debug!("消息接收端已关闭，丢弃进度消息");
        }
    }
}

/// 处理一次提取请求
///
/// 进度消息通过通道实时发送，最后发送一条终止消息。
/// 接收端关闭时只记录日志。
pub async fn handle_request(request: ExtractRequest, pipeline: &Pipeline, sender: UnboundedSender<WorkerMessage>) {
    let observer = ChannelObserver::new(sender.clone());

    let message = match pipeline.run_bytes(request.bytes, &observer).await {
        Ok(payload) => WorkerMessage::Success { payload },
        Err(e) => WorkerMessage::error(e.to_string()),
    };

    if sender.send(message).is_err() {
        warn!("消息接收端已关闭，终止消息未送达");
    }
}
