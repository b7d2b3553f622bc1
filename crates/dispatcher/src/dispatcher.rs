//! 有界并发任务分发器
//!
//! 队列、运行中集合、在途去重计数和已结束任务环都放在同一把锁里，
//! 每次修改都是一次原子操作，锁不会跨越 `.await`。
//! 任务体在独立的 tokio 任务中运行，超时或 panic 都只影响自身，槽位恰好释放一次。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use pulse_core::config::EngineConfig;
use pulse_core::models::{ProcessingTask, TaskKind, TaskPriority};
use pulse_core::traits::TaskHandler;
use pulse_core::{Clock, PulseError, PulseResult};
use pulse_infrastructure::{MetricsCollector, PriorityTaskQueue, StructuredLogger};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, warn};
use uuid::Uuid;

/// 分发器配置
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub max_concurrent_tasks: usize,
    pub task_timeout: Duration,
    /// 保留的已结束任务条数
    pub finished_task_retention: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for DispatcherConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_concurrent_tasks: config.max_concurrent_tasks.max(1),
            task_timeout: Duration::from_secs(config.task_timeout_seconds),
            finished_task_retention: config.finished_task_retention,
        }
    }
}

/// 分发器累计统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub enqueued: u64,
    /// 因同门店同类型任务在途而跳过的次数
    pub deduplicated: u64,
    pub completed: u64,
    pub failed: u64,
    /// 失败中因超时的次数
    pub timed_out: u64,
    /// 失败中因 panic 的次数
    pub panicked: u64,
    /// 观察到的最大同时运行任务数
    pub peak_active: usize,
}

/// 队列长度和运行中任务数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherLoad {
    pub queue_length: usize,
    pub active_count: usize,
}

impl DispatcherLoad {
    pub fn is_idle(&self) -> bool {
        self.queue_length == 0 && self.active_count == 0
    }
}

#[derive(Debug, Default)]
struct DispatchState {
    queue: PriorityTaskQueue,
    /// 排队中和运行中的任务快照
    tracked: HashMap<Uuid, ProcessingTask>,
    /// (门店, 类型) -> 排队中和运行中的任务数
    in_flight: HashMap<(String, TaskKind), usize>,
    finished: VecDeque<ProcessingTask>,
    active_count: usize,
    stats: DispatcherStats,
}

impl DispatchState {
    fn load(&self) -> DispatcherLoad {
        DispatcherLoad {
            queue_length: self.queue.len(),
            active_count: self.active_count,
        }
    }

    fn release_in_flight(&mut self, key: (String, TaskKind)) {
        if let Some(count) = self.in_flight.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&key);
            }
        }
    }

    fn retain_finished(&mut self, task: ProcessingTask, retention: usize) {
        if retention == 0 {
            return;
        }
        while self.finished.len() >= retention {
            self.finished.pop_front();
        }
        self.finished.push_back(task);
    }
}

struct Inner {
    state: Mutex<DispatchState>,
    handler: Arc<dyn TaskHandler>,
    clock: Arc<dyn Clock>,
    metrics: MetricsCollector,
    config: DispatcherConfig,
    load_tx: watch::Sender<DispatcherLoad>,
}

/// 任务分发器，克隆实例共享同一份状态
#[derive(Clone)]
pub struct TaskDispatcher {
    inner: Arc<Inner>,
}

impl TaskDispatcher {
    pub fn new(
        handler: Arc<dyn TaskHandler>,
        clock: Arc<dyn Clock>,
        metrics: MetricsCollector,
        config: DispatcherConfig,
    ) -> Self {
        let (load_tx, _) = watch::channel(DispatcherLoad::default());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(DispatchState::default()),
                handler,
                clock,
                metrics,
                config,
                load_tx,
            }),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 创建并入队任务，总是入队
    pub fn enqueue(&self, kind: TaskKind, target_id: &str, priority: TaskPriority) -> Uuid {
        let task = ProcessingTask::new(kind, target_id, priority, self.inner.clock.now());
        let id = task.id;
        self.submit(task, false);
        id
    }

    /// 创建带 payload 的任务并入队，总是入队
    pub fn enqueue_with_payload(
        &self,
        kind: TaskKind,
        target_id: &str,
        priority: TaskPriority,
        payload: serde_json::Value,
    ) -> Uuid {
        let task = ProcessingTask::new(kind, target_id, priority, self.inner.clock.now())
            .with_payload(payload);
        let id = task.id;
        self.submit(task, false);
        id
    }

    /// 同门店同类型已有任务排队或运行时跳过，返回 `None`
    pub fn enqueue_if_absent(
        &self,
        kind: TaskKind,
        target_id: &str,
        priority: TaskPriority,
    ) -> Option<Uuid> {
        let task = ProcessingTask::new(kind, target_id, priority, self.inner.clock.now());
        let id = task.id;
        self.submit(task, true).then_some(id)
    }

    /// 入队一个已构造的任务（例如带 payload 的任务）
    pub fn submit(&self, task: ProcessingTask, skip_if_in_flight: bool) -> bool {
        let queue_length = {
            let mut state = self.lock();
            let key = task.dedup_key();

            if skip_if_in_flight && state.in_flight.contains_key(&key) {
                state.stats.deduplicated += 1;
                drop(state);
                StructuredLogger::log_task_deduplicated(&task);
                self.inner.metrics.record_task_deduplicated();
                return false;
            }

            *state.in_flight.entry(key).or_insert(0) += 1;
            state.tracked.insert(task.id, task.clone());
            state.queue.push(task.clone());
            state.stats.enqueued += 1;
            self.inner.load_tx.send_replace(state.load());
            state.queue.len()
        };

        StructuredLogger::log_task_enqueued(&task, queue_length);
        self.inner.metrics.record_task_enqueued(task.kind);
        self.inner.metrics.update_queue_depth(queue_length);
        self.schedule_dispatch();
        true
    }

    /// 在运行时上异步触发一次分发，调用方不等待
    fn schedule_dispatch(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let dispatcher = self.clone();
                handle.spawn(async move { dispatcher.dispatch_pending() });
            }
            Err(_) => debug!("当前不在tokio运行时中，任务留在队列等待下次分发"),
        }
    }

    /// 按空闲槽位从队列取任务启动
    ///
    /// 不在tokio运行时中时不取任务，队列保持不变。
    pub fn dispatch_pending(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("当前不在tokio运行时中，跳过本次分发");
            return;
        };

        loop {
            let task = {
                let mut state = self.lock();
                if state.active_count >= self.inner.config.max_concurrent_tasks {
                    break;
                }
                let Some(mut task) = state.queue.pop() else {
                    break;
                };

                if let Err(e) = task.start(self.inner.clock.now()) {
                    warn!(task.id = %task.id, error = %e, "跳过无法启动的任务");
                    state.tracked.remove(&task.id);
                    state.release_in_flight(task.dedup_key());
                    self.inner.load_tx.send_replace(state.load());
                    continue;
                }

                state.active_count += 1;
                state.stats.peak_active = state.stats.peak_active.max(state.active_count);
                state.tracked.insert(task.id, task.clone());
                self.inner.load_tx.send_replace(state.load());

                StructuredLogger::log_task_started(&task, state.active_count);
                self.inner.metrics.update_active_tasks(state.active_count);
                self.inner.metrics.update_queue_depth(state.queue.len());
                task
            };

            let dispatcher = self.clone();
            handle.spawn(async move { dispatcher.run(task).await });
        }
    }

    async fn run(self, task: ProcessingTask) {
        let started = Instant::now();
        let timeout = self.inner.config.task_timeout;

        let handler = Arc::clone(&self.inner.handler);
        let body = task.clone();
        let mut join = tokio::spawn(async move { handler.handle(&body).await });

        let outcome = match tokio::time::timeout(timeout, &mut join).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(PulseError::TaskPanicked(describe_join_error(join_error))),
            Err(_) => {
                join.abort();
                Err(PulseError::timeout_error(
                    format!("task:{}", task.kind),
                    timeout.as_millis() as u64,
                ))
            }
        };

        self.finish(task, outcome, started.elapsed());
        self.dispatch_pending();
    }

    fn finish(&self, mut task: ProcessingTask, outcome: PulseResult<()>, elapsed: Duration) {
        let now = self.inner.clock.now();
        let duration_ms = elapsed.as_millis() as u64;
        let transition = match &outcome {
            Ok(()) => task.complete(now),
            Err(e) => task.fail(now, e.to_string()),
        };
        if let Err(e) = transition {
            warn!(task.id = %task.id, error = %e, "任务状态转换失败");
        }

        let active_count = {
            let mut state = self.lock();
            state.active_count = state.active_count.saturating_sub(1);
            state.tracked.remove(&task.id);
            state.release_in_flight(task.dedup_key());

            match &outcome {
                Ok(()) => state.stats.completed += 1,
                Err(e) => {
                    state.stats.failed += 1;
                    if e.is_timeout() {
                        state.stats.timed_out += 1;
                    }
                    if matches!(e, PulseError::TaskPanicked(_)) {
                        state.stats.panicked += 1;
                    }
                }
            }

            state.retain_finished(task.clone(), self.inner.config.finished_task_retention);
            self.inner.load_tx.send_replace(state.load());
            state.active_count
        };

        self.inner.metrics.update_active_tasks(active_count);
        match outcome {
            Ok(()) => {
                StructuredLogger::log_task_completed(&task, duration_ms);
                self.inner
                    .metrics
                    .record_task_completed(task.kind, elapsed.as_secs_f64());
            }
            Err(e) => {
                StructuredLogger::log_task_failed(&task, &e, duration_ms);
                self.inner
                    .metrics
                    .record_task_failed(task.kind, e.kind(), elapsed.as_secs_f64());
            }
        }
    }

    /// 查询任务快照：排队中、运行中，或仍保留在已结束环中的任务
    pub fn task(&self, id: Uuid) -> Option<ProcessingTask> {
        let state = self.lock();
        state
            .tracked
            .get(&id)
            .or_else(|| state.finished.iter().rev().find(|task| task.id == id))
            .cloned()
    }

    pub fn is_in_flight(&self, target_id: &str, kind: TaskKind) -> bool {
        self.lock()
            .in_flight
            .contains_key(&(target_id.to_string(), kind))
    }

    pub fn load(&self) -> DispatcherLoad {
        self.lock().load()
    }

    pub fn stats(&self) -> DispatcherStats {
        self.lock().stats
    }

    /// 等待队列清空且没有运行中的任务
    pub async fn wait_until_idle(&self) {
        let mut load_rx = self.inner.load_tx.subscribe();
        // 发送端随 self 存活，不会关闭
        let _ = load_rx.wait_for(DispatcherLoad::is_idle).await;
    }
}

impl std::fmt::Debug for TaskDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDispatcher")
            .field("config", &self.inner.config)
            .field("load", &self.load())
            .finish()
    }
}

fn describe_join_error(error: JoinError) -> String {
    if error.is_cancelled() {
        return "任务被取消".to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知panic".to_string()
    }
}
