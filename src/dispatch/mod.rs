// SPDX-License-Identifier: MIT
pub mod dispatcher;
pub mod queue;
pub mod surface;
pub mod task;

use std::sync::Arc;

use self::queue::{ShutdownSignal, TaskQueue, TaskReceiver, TaskSender, WakeSignal};

/// Creates the queue/wake pair shared by every producer and the dispatcher.
#[must_use]
pub fn channel(capacity: usize, shutdown: ShutdownSignal) -> (TaskSender, TaskReceiver) {
    let queue = Arc::new(TaskQueue::new(capacity));
    let wake = Arc::new(WakeSignal::new());
    let sender = TaskSender::new(Arc::clone(&queue), Arc::clone(&wake), shutdown.clone());
    let receiver = TaskReceiver::new(queue, wake, shutdown);
    (sender, receiver)
}
