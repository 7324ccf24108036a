use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::panic::join_error_panic_message;
use crate::{TaskClass, spawn};

type RunFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;
type Runner = Box<dyn FnOnce(TaskClass) -> RunFuture + Send + 'static>;

/// Failure delivered through a [`TaskHandle`].
#[derive(Debug, Error)]
pub enum TaskError<E> {
	/// The task's own error, exactly as its starter returned it.
	#[error("task failed: {0}")]
	Failed(E),
	/// The task's future panicked.
	#[error("task panicked: {0}")]
	Panicked(String),
	/// The runtime went away before the task settled.
	#[error("task dropped before it settled")]
	Abandoned,
}

impl<E> TaskError<E> {
	/// Borrows the task's own error, if that is what this is.
	pub fn failure(&self) -> Option<&E> {
		match self {
			Self::Failed(err) => Some(err),
			_ => None,
		}
	}

	/// Unwraps the task's own error, if that is what this is.
	pub fn into_failure(self) -> Option<E> {
		match self {
			Self::Failed(err) => Some(err),
			_ => None,
		}
	}

	pub fn is_panic(&self) -> bool {
		matches!(self, Self::Panicked(_))
	}
}

/// How one task settled, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
	Succeeded,
	Failed,
	Panicked,
	Abandoned,
}

impl Outcome {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Succeeded => "succeeded",
			Self::Failed => "failed",
			Self::Panicked => "panicked",
			Self::Abandoned => "abandoned",
		}
	}
}

/// One admitted unit of work with its result type erased.
///
/// The starter is not called until [`Task::run`]; the typed result travels
/// to the submitter's [`TaskHandle`] over a oneshot channel.
pub(crate) struct Task {
	name: Option<String>,
	run: Runner,
}

impl Task {
	pub(crate) fn new<F, Fut, T, E>(name: Option<String>, start: F) -> (Self, TaskHandle<T, E>)
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		let run: Runner = Box::new(move |class| -> RunFuture {
			Box::pin(async move {
				let (outcome, result) = match spawn(class, async move { start().await }).await {
					Ok(Ok(value)) => (Outcome::Succeeded, Ok(value)),
					Ok(Err(err)) => (Outcome::Failed, Err(TaskError::Failed(err))),
					Err(join) => match join_error_panic_message(join) {
						Some(message) => (Outcome::Panicked, Err(TaskError::Panicked(message))),
						None => (Outcome::Abandoned, Err(TaskError::Abandoned)),
					},
				};
				// The submitter may have dropped its handle; the work still counts as done.
				let _ = tx.send(result);
				outcome
			})
		});
		(Self { name, run }, TaskHandle { rx })
	}

	pub(crate) fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	pub(crate) fn label(&self) -> &str {
		self.name().unwrap_or("<unnamed>")
	}

	/// Runs the starter to completion and settles the handle.
	pub(crate) async fn run(self, class: TaskClass) -> Outcome {
		let Self { name, run } = self;
		let label = name.as_deref().unwrap_or("<unnamed>");
		tracing::trace!(task = label, worker_class = class.as_str(), "task.start");
		let outcome = run(class).await;
		match outcome {
			Outcome::Succeeded | Outcome::Failed => tracing::trace!(task = label, outcome = outcome.as_str(), "task.settle"),
			Outcome::Panicked | Outcome::Abandoned => tracing::warn!(task = label, outcome = outcome.as_str(), "task.settle"),
		}
		outcome
	}
}

impl fmt::Debug for Task {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
	}
}

/// Completion handle for one scheduled task.
///
/// Resolves exactly once, when the scheduler has actually run the task, with
/// the value or error its starter produced. Dropping the handle does not
/// cancel the task.
pub struct TaskHandle<T, E> {
	rx: oneshot::Receiver<Result<T, TaskError<E>>>,
}

impl<T, E> Future for TaskHandle<T, E> {
	type Output = Result<T, TaskError<E>>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx).poll(cx).map(|received| received.unwrap_or(Err(TaskError::Abandoned)))
	}
}

impl<T, E> fmt::Debug for TaskHandle<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskHandle").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn starter_runs_only_when_task_runs() {
		let started = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
		let flag = std::sync::Arc::clone(&started);
		let (task, handle) = Task::new(Some("probe".into()), move || async move {
			flag.store(true, std::sync::atomic::Ordering::SeqCst);
			Ok::<_, ()>(7)
		});

		tokio::task::yield_now().await;
		assert!(!started.load(std::sync::atomic::Ordering::SeqCst));
		assert_eq!(task.label(), "probe");

		assert_eq!(task.run(TaskClass::Interactive).await, Outcome::Succeeded);
		assert_eq!(handle.await.ok(), Some(7));
	}

	#[tokio::test]
	async fn failure_is_forwarded_verbatim() {
		let (task, handle) = Task::new(None, || async { Err::<(), _>("disk on fire") });
		assert_eq!(task.label(), "<unnamed>");
		assert_eq!(task.run(TaskClass::Background).await, Outcome::Failed);

		let err = handle.await.unwrap_err();
		assert_eq!(err.failure(), Some(&"disk on fire"));
		assert_eq!(err.to_string(), "task failed: disk on fire");
	}

	#[tokio::test]
	async fn panic_becomes_panicked_error() {
		let (task, handle) = Task::new(None, || async {
			if true {
				panic!("starter blew up");
			}
			Ok::<(), &str>(())
		});
		assert_eq!(task.run(TaskClass::Interactive).await, Outcome::Panicked);

		let err = handle.await.unwrap_err();
		assert!(err.is_panic());
		assert!(err.to_string().contains("starter blew up"));
		assert!(err.into_failure().is_none());
	}

	#[tokio::test]
	async fn dropped_task_abandons_handle() {
		let (task, handle) = Task::new(None, || async { Ok::<_, ()>(()) });
		drop(task);
		assert!(matches!(handle.await, Err(TaskError::Abandoned)));
	}

	#[tokio::test]
	async fn dropped_handle_does_not_stop_task() {
		let (task, handle) = Task::new(None, || async { Ok::<_, ()>(1) });
		drop(handle);
		assert_eq!(task.run(TaskClass::Interactive).await, Outcome::Succeeded);
	}
}
