//! Concurrent read groups.
//!
//! A [`ReadBatch`] collects read tasks that may all run at the same time. The
//! batch is opened by its first read, started once the scheduler reaches it,
//! and closed when a write arrives behind it. It is drained once it is closed
//! and every member has settled.

use std::fmt::{self, Write as _};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use slab::Slab;
use tokio::sync::watch;

use crate::task::{Task, TaskHandle};
use crate::{TaskClass, spawn};

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle phase of a [`ReadBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
	/// Collecting members; nothing launched yet.
	Unstarted,
	/// Members launch as soon as they are appended.
	Active,
	/// No further members are accepted.
	Closed,
}

impl BatchPhase {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Unstarted => "unstarted",
			Self::Active => "active",
			Self::Closed => "closed",
		}
	}
}

struct Member {
	name: Option<String>,
	/// Present until the member is launched.
	task: Option<Task>,
}

struct BatchState {
	started: bool,
	closed: bool,
	members: Slab<Member>,
}

impl BatchState {
	fn phase(&self) -> BatchPhase {
		if self.closed {
			BatchPhase::Closed
		} else if self.started {
			BatchPhase::Active
		} else {
			BatchPhase::Unstarted
		}
	}

	fn status(&self) -> BatchStatus {
		BatchStatus {
			members: self.members.len(),
			drained: self.closed && self.members.is_empty(),
		}
	}
}

/// Published view of the state the loop and terminal waiters wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct BatchStatus {
	members: usize,
	drained: bool,
}

struct BatchInner {
	id: u64,
	class: TaskClass,
	state: Mutex<BatchState>,
	status: watch::Sender<BatchStatus>,
}

/// A group of read tasks admitted to run concurrently.
///
/// Cloning yields another handle to the same batch.
#[derive(Clone)]
pub struct ReadBatch {
	inner: Arc<BatchInner>,
}

impl ReadBatch {
	/// Creates an empty, unstarted batch whose members spawn under `class`.
	pub fn new(class: TaskClass) -> Self {
		let (status, _) = watch::channel(BatchStatus::default());
		Self {
			inner: Arc::new(BatchInner {
				id: NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed),
				class,
				state: Mutex::new(BatchState {
					started: false,
					closed: false,
					members: Slab::new(),
				}),
				status,
			}),
		}
	}

	/// Creates an unstarted batch holding `task` as its first member.
	pub(crate) fn seeded(class: TaskClass, task: Task) -> Self {
		let batch = Self::new(class);
		{
			let mut state = batch.inner.state.lock();
			state.members.insert(Member {
				name: task.name().map(str::to_owned),
				task: Some(task),
			});
			batch.publish(&state);
		}
		batch
	}

	/// Process-unique id, used in logs and [`Self::describe`].
	pub fn id(&self) -> u64 {
		self.inner.id
	}

	pub fn phase(&self) -> BatchPhase {
		self.inner.state.lock().phase()
	}

	pub fn is_closed(&self) -> bool {
		self.inner.state.lock().closed
	}

	/// Number of members that have not settled yet.
	pub fn len(&self) -> usize {
		self.inner.state.lock().members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.state.lock().members.is_empty()
	}

	/// Returns `true` once the batch is closed and every member has settled.
	pub fn is_drained(&self) -> bool {
		self.inner.status.borrow().drained
	}

	/// Appends a read task.
	///
	/// If the batch has started, the task launches immediately; otherwise it
	/// waits for [`Self::start`]. A closed batch refuses the task and hands the
	/// starter back.
	pub fn append_task<F, Fut, T, E>(&self, start: F) -> Result<TaskHandle<T, E>, F>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		self.append_inner(None, start)
	}

	/// Same as [`Self::append_task`], labelling the member for diagnostics.
	pub fn append_named<F, Fut, T, E>(&self, name: impl Into<String>, start: F) -> Result<TaskHandle<T, E>, F>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		self.append_inner(Some(name.into()), start)
	}

	fn append_inner<F, Fut, T, E>(&self, name: Option<String>, start: F) -> Result<TaskHandle<T, E>, F>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		let mut state = self.inner.state.lock();
		if state.closed {
			tracing::debug!(batch = self.inner.id, "batch.append: refused, batch closed");
			return Err(start);
		}
		let (task, handle) = Task::new(name, start);
		let launch = self.insert(&mut state, task);
		drop(state);
		if let Some((key, task)) = launch {
			self.launch(key, task);
		}
		Ok(handle)
	}

	/// Appends an already-built task, handing it back if the batch is closed.
	pub(crate) fn push(&self, task: Task) -> Result<(), Task> {
		let mut state = self.inner.state.lock();
		if state.closed {
			return Err(task);
		}
		let launch = self.insert(&mut state, task);
		drop(state);
		if let Some((key, task)) = launch {
			self.launch(key, task);
		}
		Ok(())
	}

	/// Records `task` as a member; returns it back with its key when it must launch now.
	fn insert(&self, state: &mut BatchState, task: Task) -> Option<(usize, Task)> {
		let name = task.name().map(str::to_owned);
		tracing::trace!(batch = self.inner.id, task = task.label(), phase = state.phase().as_str(), "batch.append");
		let launch = if state.started {
			let key = state.members.insert(Member { name, task: None });
			Some((key, task))
		} else {
			state.members.insert(Member { name, task: Some(task) });
			None
		};
		self.publish(state);
		launch
	}

	/// Launches every member and returns a future that resolves once the
	/// batch is drained.
	///
	/// The returned future only resolves after [`Self::closeout`]; members
	/// settling alone never finish an open batch.
	pub fn start(&self) -> impl Future<Output = ()> + Send + use<> {
		self.launch_members();
		self.drained()
	}

	/// Marks the batch started and launches whatever members are pending.
	pub(crate) fn launch_members(&self) {
		let pending: Vec<(usize, Task)> = {
			let mut state = self.inner.state.lock();
			if state.started {
				tracing::warn!(batch = self.inner.id, phase = state.phase().as_str(), "batch.start: batch already started");
				return;
			}
			state.started = true;
			state.members.iter_mut().filter_map(|(key, member)| member.task.take().map(|task| (key, task))).collect()
		};
		tracing::debug!(batch = self.inner.id, members = pending.len(), "batch.start");
		for (key, task) in pending {
			self.launch(key, task);
		}
	}

	fn launch(&self, key: usize, task: Task) {
		let class = self.inner.class;
		let release = Release { batch: self.clone(), key };
		spawn(class, async move {
			let _release = release;
			task.run(class).await;
		});
	}

	fn release(&self, key: usize) {
		let mut state = self.inner.state.lock();
		state.members.try_remove(key);
		self.publish(&state);
	}

	/// Seals the batch against further members.
	///
	/// Already-admitted members keep running. Closing a batch that is not
	/// active is tolerated and only logged.
	pub fn closeout(&self) {
		let mut state = self.inner.state.lock();
		match state.phase() {
			BatchPhase::Closed => {
				tracing::warn!(batch = self.inner.id, "batch.closeout: batch already closed");
				return;
			}
			BatchPhase::Unstarted => {
				tracing::warn!(batch = self.inner.id, members = state.members.len(), "batch.closeout: batch not started");
			}
			BatchPhase::Active => {
				tracing::debug!(batch = self.inner.id, members = state.members.len(), "batch.closeout");
			}
		}
		state.closed = true;
		self.publish(&state);
	}

	/// Resolves once the batch is closed and every member has settled.
	pub fn drained(&self) -> impl Future<Output = ()> + Send + use<> {
		let mut rx = self.inner.status.subscribe();
		async move {
			let _ = rx.wait_for(|status| status.drained).await;
		}
	}

	/// Resolves once no member is outstanding, whether or not the batch is closed.
	pub(crate) fn settled(&self) -> impl Future<Output = ()> + Send + use<> {
		let mut rx = self.inner.status.subscribe();
		async move {
			let _ = rx.wait_for(|status| status.members == 0 || status.drained).await;
		}
	}

	fn publish(&self, state: &BatchState) {
		let next = state.status();
		let id = self.inner.id;
		self.inner.status.send_if_modified(|current| {
			if *current == next {
				return false;
			}
			if next.drained && !current.drained {
				tracing::debug!(batch = id, "batch.drained");
			}
			*current = next;
			true
		});
	}

	/// Appends a human-readable dump of this batch to `out`.
	pub fn describe_into(&self, out: &mut String, indent: usize) {
		let pad = "  ".repeat(indent);
		let state = self.inner.state.lock();
		let _ = writeln!(out, "{pad}reads #{} [{}] {} member(s)", self.inner.id, state.phase().as_str(), state.members.len());
		for (_, member) in state.members.iter() {
			let name = member.name.as_deref().unwrap_or("<unnamed>");
			let status = if member.task.is_some() { "waiting" } else { "running" };
			let _ = writeln!(out, "{pad}  read {name} ({status})");
		}
	}

	pub fn describe(&self, indent: usize) -> String {
		let mut out = String::new();
		self.describe_into(&mut out, indent);
		out
	}
}

/// Removes a launched member from its batch when the member's run ends or is
/// dropped along with its runtime.
struct Release {
	batch: ReadBatch,
	key: usize,
}

impl Drop for Release {
	fn drop(&mut self) {
		self.batch.release(self.key);
	}
}

impl fmt::Debug for ReadBatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("ReadBatch")
			.field("id", &self.inner.id)
			.field("phase", &state.phase())
			.field("members", &state.members.len())
			.finish()
	}
}
