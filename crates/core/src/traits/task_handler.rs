//! 任务处理器接口定义
//!
//! 分发器只负责并发控制和状态流转，真正的计算交给 [`TaskHandler`]。
//! 返回 `Err` 的任务被标记为失败；分发器在处理器外层统一处理超时和 panic。

use async_trait::async_trait;

use crate::models::ProcessingTask;
use crate::PulseResult;

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &ProcessingTask) -> PulseResult<()>;
}
