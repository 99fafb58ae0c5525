// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use super::task::Task;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct QueueState {
    tasks: VecDeque<Task>,
    consumer: Option<ThreadId>,
    unbounded: bool,
}

/// Bounded FIFO of tasks.
///
/// A full queue blocks the producer until the consumer drains it. Two
/// exceptions never block: enqueues made from the bound consumer thread
/// (it would wait on itself), and any enqueue after
/// [`release_backpressure`](Self::release_backpressure).
pub struct TaskQueue {
    state: Mutex<QueueState>,
    not_full: Condvar,
    capacity: usize,
}

impl TaskQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::with_capacity(capacity),
                consumer: None,
                unbounded: false,
            }),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Marks the calling thread as the queue's sole consumer.
    pub fn bind_consumer(&self) {
        lock(&self.state).consumer = Some(thread::current().id());
    }

    pub fn enqueue(&self, task: Task) {
        let me = thread::current().id();
        let mut state = lock(&self.state);
        while state.tasks.len() >= self.capacity
            && !state.unbounded
            && state.consumer != Some(me)
        {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.tasks.push_back(task);
    }

    /// Removes and returns everything queued, oldest first. Never blocks on
    /// an empty queue.
    pub fn drain_all(&self) -> Vec<Task> {
        let drained: Vec<Task> = lock(&self.state).tasks.drain(..).collect();
        if !drained.is_empty() {
            self.not_full.notify_all();
        }
        drained
    }

    /// Stops applying the capacity bound and wakes blocked producers.
    pub fn release_backpressure(&self) {
        lock(&self.state).unbounded = true;
        self.not_full.notify_all();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.state).tasks.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Level-triggered wake flag: set by producers after enqueuing, cleared by
/// the dispatcher before it drains.
#[derive(Default)]
pub struct WakeSignal {
    set: Mutex<bool>,
    changed: Condvar,
}

impl WakeSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        *lock(&self.set) = true;
        self.changed.notify_all();
    }

    pub fn clear(&self) {
        *lock(&self.set) = false;
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_set(&self) -> bool {
        *lock(&self.set)
    }

    /// Blocks until the flag is set or `timeout` passes. Returns the flag.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = lock(&self.set);
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// One-shot shutdown request. Once set it stays set.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The raw flag, for registration with OS signal handlers.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Producer handle: the queue, wake signal and shutdown signal bundled so
/// that every enqueue is followed by a wake.
#[derive(Clone)]
pub struct TaskSender {
    queue: Arc<TaskQueue>,
    wake: Arc<WakeSignal>,
    shutdown: ShutdownSignal,
}

impl TaskSender {
    pub(super) fn new(queue: Arc<TaskQueue>, wake: Arc<WakeSignal>, shutdown: ShutdownSignal) -> Self {
        Self {
            queue,
            wake,
            shutdown,
        }
    }

    /// Enqueues `task` (blocking while the queue is full), then wakes the
    /// dispatcher.
    pub fn send(&self, task: impl Into<Task>) {
        self.queue.enqueue(task.into());
        self.wake.set();
    }

    pub fn log(&self, text: impl Into<String>) {
        self.send(Task::log(text));
    }

    /// Wakes the dispatcher without enqueuing anything.
    pub fn notify(&self) {
        self.wake.set();
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request();
        self.wake.set();
    }

    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }
}

/// Consumer handle held by the dispatcher.
pub struct TaskReceiver {
    queue: Arc<TaskQueue>,
    wake: Arc<WakeSignal>,
    shutdown: ShutdownSignal,
}

impl TaskReceiver {
    pub(super) fn new(queue: Arc<TaskQueue>, wake: Arc<WakeSignal>, shutdown: ShutdownSignal) -> Self {
        Self {
            queue,
            wake,
            shutdown,
        }
    }

    #[must_use]
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    #[must_use]
    pub fn wake(&self) -> &WakeSignal {
        &self.wake
    }

    #[must_use]
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    #[must_use]
    pub fn sender(&self) -> TaskSender {
        TaskSender::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.wake),
            self.shutdown.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Instant;

    use super::*;
    use crate::dispatch::channel;

    fn named(i: usize) -> Task {
        Task::control(format!("task{i}"))
    }

    #[test]
    fn drain_returns_fifo_order() {
        let queue = TaskQueue::new(8);
        for i in 0..5 {
            queue.enqueue(named(i));
        }
        let names: Vec<String> = queue.drain_all().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["task0", "task1", "task2", "task3", "task4"]);
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn full_queue_blocks_producer_until_drained() {
        let (sender, receiver) = channel(2, ShutdownSignal::new());
        sender.send(named(0));
        sender.send(named(1));

        let (done_tx, done_rx) = mpsc::channel();
        let producer = thread::spawn(move || {
            sender.send(named(2));
            done_tx.send(()).unwrap();
        });

        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(receiver.queue().len(), 2);

        let first = receiver.queue().drain_all();
        assert_eq!(first.len(), 2);
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();

        let rest = receiver.queue().drain_all();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name(), "task2");
    }

    #[test]
    fn consumer_thread_never_blocks_on_itself() {
        let queue = TaskQueue::new(1);
        queue.bind_consumer();
        queue.enqueue(named(0));
        queue.enqueue(named(1));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn released_backpressure_unblocks_waiting_producers() {
        let (sender, receiver) = channel(1, ShutdownSignal::new());
        sender.send(named(0));
        let producer = thread::spawn(move || sender.send(named(1)));
        thread::sleep(Duration::from_millis(20));
        receiver.queue().release_backpressure();
        producer.join().unwrap();
        assert_eq!(receiver.queue().len(), 2);
    }

    #[test]
    fn send_sets_wake_signal() {
        let (sender, receiver) = channel(4, ShutdownSignal::new());
        assert!(!receiver.wake().is_set());
        sender.send(named(0));
        assert!(receiver.wake().is_set());
        assert!(receiver.wake().wait_timeout(Duration::ZERO));
        receiver.wake().clear();
        assert!(!receiver.wake().is_set());
    }

    #[test]
    fn wait_times_out_when_unset() {
        let wake = WakeSignal::new();
        let start = Instant::now();
        assert!(!wake.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_returns_when_set_from_another_thread() {
        let wake = Arc::new(WakeSignal::new());
        let setter = Arc::clone(&wake);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            setter.set();
        });
        assert!(wake.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn shutdown_is_one_shot_and_shared() {
        let shutdown = ShutdownSignal::new();
        let (sender, receiver) = channel(4, shutdown.clone());
        assert!(!receiver.shutdown().is_requested());
        sender.request_shutdown();
        assert!(shutdown.is_requested());
        assert!(receiver.wake().is_set());
        assert!(shutdown.flag().load(Ordering::SeqCst));
    }
}
