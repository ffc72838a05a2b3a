//! 分批并发读取
//!
//! 同一批次内的读取同时发出，批次之间严格顺序执行。
//! 交给 `reduce` 的结果总是按输入路径的顺序排列，与完成顺序无关。
//! 每批结束后让出调度器，使进度通知能够及时送达。

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::warn;

use crate::epub::archive::ArchiveIndex;
use crate::epub::error::Result;

/// 一个批次完成时的位置信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 到目前为止已处理的条目数
    pub done: usize,
    /// 条目总数
    pub total: usize,
}

/// 按批次读取给定路径，并把每批结果交给 `reduce`
///
/// # 参数
/// * `archive` - 归档索引
/// * `paths` - 要读取的条目路径
/// * `width` - 每批并发读取的数量（0按1处理）
/// * `read` - 针对单个条目的读取操作
/// * `reduce` - 处理一个批次的结果，顺序与 `paths` 一致
pub async fn read_in_batches<A, T, R, Fut, F>(
    archive: &Arc<A>,
    paths: &[String],
    width: usize,
    read: R,
    mut reduce: F,
) where
    A: ArchiveIndex + ?Sized + 'static,
    T: Send + 'static,
    R: Fn(Arc<A>, String) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    F: FnMut(Vec<(String, Result<T>)>, BatchProgress),
{
    let width = width.max(1);
    let total = paths.len();
    let mut done = 0;

    for batch in paths.chunks(width) {
        let mut tasks = JoinSet::new();
        for (index, path) in batch.iter().enumerate() {
            let fut = read(Arc::clone(archive), path.clone());
            let path = path.clone();
            tasks.spawn(async move { (index, path, fut.await) });
        }

        let mut joined_results = Vec::with_capacity(batch.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => joined_results.push(result),
                Err(e) => warn!(error = %e, "条目读取任务异常终止"),
            }
        }
        joined_results.sort_by_key(|(index, _, _)| *index);
        let results = joined_results
            .into_iter()
            .map(|(_, path, result)| (path, result))
            .collect();

        done += batch.len();
        reduce(results, BatchProgress { done, total });

        tokio::task::yield_now().await;
    }
}
