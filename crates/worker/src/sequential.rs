use std::future::Future;

use crate::scheduler::{DrainHandle, ReadWriteScheduler, SchedulerSpec};
use crate::task::TaskHandle;

/// Strict FIFO pipeline: one task at a time, in submission order.
///
/// A failing task settles its own handle and the pipeline moves on. This is
/// the write half of [`ReadWriteScheduler`] with reads never admitted.
#[derive(Debug, Clone, Default)]
pub struct SequentialQueue {
	inner: ReadWriteScheduler,
}

impl SequentialQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_spec(spec: SchedulerSpec) -> Self {
		Self {
			inner: ReadWriteScheduler::with_spec(spec),
		}
	}

	/// Appends a task; it starts once every task enqueued before it has settled.
	pub fn enqueue<F, Fut, T, E>(&self, start: F) -> TaskHandle<T, E>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		self.inner.queue_write(start)
	}

	pub fn enqueue_named<F, Fut, T, E>(&self, name: impl Into<String>, start: F) -> TaskHandle<T, E>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		self.inner.queue_write_named(name, start)
	}

	/// Returns the in-flight drain, or `None` when idle.
	pub fn on_complete(&self) -> Option<DrainHandle> {
		self.inner.on_complete()
	}

	pub fn is_idle(&self) -> bool {
		self.inner.is_idle()
	}

	pub fn pending(&self) -> usize {
		self.inner.pending()
	}

	pub fn describe(&self, indent: usize) -> String {
		self.inner.describe(indent)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::time::Duration;

	use parking_lot::Mutex;

	use super::*;

	#[tokio::test(start_paused = true)]
	async fn executes_in_order() {
		let stuff = Arc::new(Mutex::new(Vec::new()));
		let queue = SequentialQueue::new();

		let log = Arc::clone(&stuff);
		let _ = queue.enqueue(move || async move {
			tokio::time::sleep(Duration::from_millis(100)).await;
			log.lock().push("Hello");
			Ok::<_, ()>(())
		});
		let end = queue.on_complete().expect("enqueue starts the pipeline");

		let log = Arc::clone(&stuff);
		let _ = queue.enqueue(move || async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			log.lock().push("World");
			Ok::<_, ()>(())
		});

		end.await;
		assert_eq!(*stuff.lock(), vec!["Hello", "World"]);
	}

	#[tokio::test(start_paused = true)]
	async fn rejection_does_not_halt_pipeline() {
		let queue = SequentialQueue::new();
		let first = queue.enqueue(|| async { Err::<u8, _>("bad input") });
		let second = queue.enqueue(|| async { Ok::<_, &str>(2u8) });

		assert_eq!(first.await.unwrap_err().into_failure(), Some("bad input"));
		assert_eq!(second.await.ok(), Some(2));
	}

	#[tokio::test(start_paused = true)]
	async fn restarts_after_going_idle() {
		let queue = SequentialQueue::new();
		assert_eq!(queue.enqueue(|| async { Ok::<_, ()>(1) }).await.ok(), Some(1));
		if let Some(drain) = queue.on_complete() {
			drain.await;
		}
		assert!(queue.is_idle());
		assert!(queue.on_complete().is_none());

		assert_eq!(queue.enqueue_named("again", || async { Ok::<_, ()>(2) }).await.ok(), Some(2));
	}

	#[tokio::test(start_paused = true)]
	async fn pending_counts_running_and_waiting() {
		let queue = SequentialQueue::with_spec(SchedulerSpec::new("pipeline"));
		for _ in 0..3 {
			let _ = queue.enqueue(|| async {
				tokio::time::sleep(Duration::from_millis(10)).await;
				Ok::<_, ()>(())
			});
		}
		assert_eq!(queue.pending(), 3);
		tokio::time::sleep(Duration::from_millis(1)).await;
		assert_eq!(queue.pending(), 3, "the running task still counts");
		assert!(queue.describe(0).starts_with("pipeline (draining, 2 entries)"));

		if let Some(drain) = queue.on_complete() {
			drain.await;
		}
		assert_eq!(queue.pending(), 0);
	}
}
