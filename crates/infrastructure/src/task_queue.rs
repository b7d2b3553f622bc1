use std::cmp::Ordering;
use std::collections::BinaryHeap;

use pulse_core::models::{ProcessingTask, TaskPriority};

/// 内存优先级任务队列
///
/// 按优先级从高到低出队，同优先级先进先出。入队和出队都是 O(log n)。
/// 队列不持久化，进程重启后排队中的任务丢失。
#[derive(Debug, Default)]
pub struct PriorityTaskQueue {
    heap: BinaryHeap<QueuedTask>,
    next_sequence: u64,
}

#[derive(Debug)]
struct QueuedTask {
    priority: TaskPriority,
    sequence: u64,
    task: ProcessingTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    // 大顶堆：优先级高的在前，序号小的在前
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PriorityTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: ProcessingTask) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedTask {
            priority: task.priority,
            sequence,
            task,
        });
    }

    /// 取出优先级最高、入队最早的任务
    pub fn pop(&mut self) -> Option<ProcessingTask> {
        self.heap.pop().map(|queued| queued.task)
    }

    pub fn peek(&self) -> Option<&ProcessingTask> {
        self.heap.peek().map(|queued| &queued.task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
