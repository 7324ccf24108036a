//! Readers-writer admission for async tasks.
//!
//! Work is lined up as a sequence of entries, each either a solitary write or
//! a [`ReadBatch`]. One drain loop walks the line: a write runs alone, a batch
//! runs all of its reads at once. Reads submitted while the tail of the line is
//! an open batch join that batch; a write seals it. Exclusion comes purely from
//! that sequencing; no lock is held while any task runs.

mod drain;
mod spec;

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

pub use self::drain::DrainHandle;
pub use self::spec::SchedulerSpec;
use crate::batch::ReadBatch;
use crate::task::{Task, TaskHandle};

/// One position in the line.
#[derive(Debug)]
enum Entry {
	Write(Task),
	Reads(ReadBatch),
}

#[derive(Debug, Default)]
struct SchedulerState {
	entries: VecDeque<Entry>,
	/// `Some` exactly while a drain loop is in flight.
	drain: Option<DrainHandle>,
	/// Label of the write the loop has taken off the line and is running.
	active_write: Option<String>,
}

#[derive(Debug)]
struct Shared {
	spec: SchedulerSpec,
	state: Mutex<SchedulerState>,
}

/// Serializes writes while letting contiguous reads run concurrently.
///
/// Cloning yields another handle to the same line of work.
#[derive(Debug, Clone)]
pub struct ReadWriteScheduler {
	shared: Arc<Shared>,
}

impl Default for ReadWriteScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl ReadWriteScheduler {
	/// Creates an idle scheduler with the default spec.
	pub fn new() -> Self {
		Self::with_spec(SchedulerSpec::default())
	}

	pub fn with_spec(spec: SchedulerSpec) -> Self {
		Self {
			shared: Arc::new(Shared {
				spec,
				state: Mutex::new(SchedulerState::default()),
			}),
		}
	}

	pub fn spec(&self) -> &SchedulerSpec {
		&self.shared.spec
	}

	/// Queues a read.
	///
	/// Joins the batch at the tail of the line if that batch is still open,
	/// otherwise opens a new batch behind everything already queued.
	pub fn queue_read<F, Fut, T, E>(&self, start: F) -> TaskHandle<T, E>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		self.admit_read(None, start)
	}

	pub fn queue_read_named<F, Fut, T, E>(&self, name: impl Into<String>, start: F) -> TaskHandle<T, E>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		self.admit_read(Some(name.into()), start)
	}

	/// Queues a write.
	///
	/// Seals an open batch at the tail of the line first, so the write runs
	/// only after every read admitted before it has settled, and before any
	/// read admitted after it starts.
	pub fn queue_write<F, Fut, T, E>(&self, start: F) -> TaskHandle<T, E>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		self.admit_write(None, start)
	}

	pub fn queue_write_named<F, Fut, T, E>(&self, name: impl Into<String>, start: F) -> TaskHandle<T, E>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		self.admit_write(Some(name.into()), start)
	}

	fn admit_read<F, Fut, T, E>(&self, name: Option<String>, start: F) -> TaskHandle<T, E>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		let (task, handle) = Task::new(name, start);
		let mut state = self.shared.state.lock();
		tracing::trace!(scheduler = %self.shared.spec.name, task = task.label(), "scheduler.queue_read");

		let leftover = match state.entries.back() {
			Some(Entry::Reads(batch)) => batch.push(task).err(),
			_ => Some(task),
		};
		if let Some(task) = leftover {
			let batch = ReadBatch::seeded(self.shared.spec.class, task);
			tracing::debug!(scheduler = %self.shared.spec.name, batch = batch.id(), "scheduler.batch.open");
			state.entries.push_back(Entry::Reads(batch));
		}

		self.ensure_draining(&mut state);
		handle
	}

	fn admit_write<F, Fut, T, E>(&self, name: Option<String>, start: F) -> TaskHandle<T, E>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		let (task, handle) = Task::new(name, start);
		let mut state = self.shared.state.lock();
		tracing::trace!(scheduler = %self.shared.spec.name, task = task.label(), "scheduler.queue_write");

		if let Some(Entry::Reads(batch)) = state.entries.back()
			&& !batch.is_closed()
		{
			batch.closeout();
		}
		state.entries.push_back(Entry::Write(task));

		self.ensure_draining(&mut state);
		handle
	}

	/// Returns the in-flight drain, or `None` when nothing is queued or running.
	///
	/// Work queued after this call may extend the returned drain.
	pub fn on_complete(&self) -> Option<DrainHandle> {
		self.shared.state.lock().drain.clone()
	}

	pub fn is_idle(&self) -> bool {
		self.shared.state.lock().drain.is_none()
	}

	/// Number of admitted tasks that have not settled yet.
	pub fn pending(&self) -> usize {
		let state = self.shared.state.lock();
		let queued: usize = state
			.entries
			.iter()
			.map(|entry| match entry {
				Entry::Write(_) => 1,
				Entry::Reads(batch) => batch.len(),
			})
			.sum();
		queued + usize::from(state.active_write.is_some())
	}

	/// Human-readable dump of the line, for debugging only.
	pub fn describe(&self, indent: usize) -> String {
		let pad = "  ".repeat(indent);
		let state = self.shared.state.lock();
		let mut out = String::new();
		let status = if state.drain.is_some() { "draining" } else { "idle" };
		let _ = writeln!(out, "{pad}{} ({status}, {} entries)", self.shared.spec.name, state.entries.len());
		if let Some(label) = &state.active_write {
			let _ = writeln!(out, "{pad}  write {label} (running)");
		}
		for entry in &state.entries {
			match entry {
				Entry::Write(task) => {
					let _ = writeln!(out, "{pad}  write {} (waiting)", task.label());
				}
				Entry::Reads(batch) => batch.describe_into(&mut out, indent + 1),
			}
		}
		out
	}
}
