use std::future::{Future, IntoFuture};
use std::pin::Pin;

use tokio::sync::watch;

use super::{Entry, ReadWriteScheduler, SchedulerState};
use crate::batch::ReadBatch;
use crate::spawn;
use crate::task::Task;

/// Join point for one run of a scheduler's drain loop.
///
/// Resolves once the loop has emptied the line and gone idle. Clones share
/// the same run; awaiting a finished run returns immediately.
#[derive(Debug, Clone)]
pub struct DrainHandle {
	done: watch::Receiver<bool>,
}

impl DrainHandle {
	/// Returns `true` once the loop this handle belongs to has gone idle.
	pub fn is_finished(&self) -> bool {
		*self.done.borrow()
	}
}

impl IntoFuture for DrainHandle {
	type Output = ();
	type IntoFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

	fn into_future(mut self) -> Self::IntoFuture {
		Box::pin(async move {
			let _ = self.done.wait_for(|done| *done).await;
		})
	}
}

/// What the loop took off the front of the line.
enum Step {
	Write(Task),
	Reads(ReadBatch),
}

/// Owned by one run of the drain loop.
///
/// If the loop is dropped before it goes idle, for instance because the
/// runtime hosting it shut down, the guard frees the drain slot so the next
/// submission starts a fresh loop over whatever is still queued.
struct DrainGuard {
	scheduler: ReadWriteScheduler,
	done: watch::Sender<bool>,
	idle: bool,
}

impl Drop for DrainGuard {
	fn drop(&mut self) {
		if self.idle {
			return;
		}
		let mut state = self.scheduler.shared.state.lock();
		go_idle(&mut state, &self.done);
		tracing::warn!(scheduler = %self.scheduler.shared.spec.name, entries = state.entries.len(), "scheduler.drain.abandoned");
	}
}

/// Clears the drain slot and wakes every [`DrainHandle`]. Caller holds the state lock.
fn go_idle(state: &mut SchedulerState, done: &watch::Sender<bool>) {
	state.drain = None;
	state.active_write = None;
	done.send_replace(true);
}

impl ReadWriteScheduler {
	/// Launches the drain loop unless one is already in flight.
	///
	/// Must be called with the state lock held so the decision cannot race the
	/// loop going idle.
	pub(super) fn ensure_draining(&self, state: &mut SchedulerState) {
		if state.drain.is_some() {
			return;
		}
		let (done_tx, done_rx) = watch::channel(false);
		state.drain = Some(DrainHandle { done: done_rx });
		tracing::debug!(scheduler = %self.shared.spec.name, entries = state.entries.len(), "scheduler.drain.start");

		let guard = DrainGuard {
			scheduler: self.clone(),
			done: done_tx,
			idle: false,
		};
		let scheduler = self.clone();
		spawn(self.shared.spec.class, async move { scheduler.drain(guard).await });
	}

	async fn drain(self, mut guard: DrainGuard) {
		let class = self.shared.spec.class;
		loop {
			let step = {
				let mut state = self.shared.state.lock();
				let Some(entry) = state.entries.pop_front() else {
					go_idle(&mut state, &guard.done);
					guard.idle = true;
					tracing::debug!(scheduler = %self.shared.spec.name, "scheduler.drain.idle");
					return;
				};
				match entry {
					Entry::Write(task) => {
						state.active_write = Some(task.label().to_owned());
						Step::Write(task)
					}
					Entry::Reads(batch) => {
						// The batch stays at the front so later reads can still join it.
						state.entries.push_front(Entry::Reads(batch.clone()));
						Step::Reads(batch)
					}
				}
			};

			match step {
				Step::Write(task) => {
					task.run(class).await;
					self.shared.state.lock().active_write = None;
				}
				Step::Reads(batch) => self.run_batch(batch).await,
			}
		}
	}

	/// Runs the batch at the front of the line until it is finished with.
	///
	/// A batch is finished once it is drained, or once its members have all
	/// settled while nothing queued behind it could close it. In the second
	/// case the loop seals the batch itself; reads that arrive later open a
	/// fresh batch that starts right away.
	async fn run_batch(&self, batch: ReadBatch) {
		tracing::trace!(scheduler = %self.shared.spec.name, batch = batch.id(), members = batch.len(), "scheduler.batch.run");
		batch.launch_members();
		loop {
			batch.settled().await;

			let mut state = self.shared.state.lock();
			// Reads only join under this lock, so emptiness cannot change until it is released.
			if !batch.is_empty() {
				continue;
			}
			if !batch.is_closed() {
				tracing::debug!(scheduler = %self.shared.spec.name, batch = batch.id(), "scheduler.batch.seal_idle");
				batch.closeout();
			}
			state.entries.pop_front();
			return;
		}
	}
}
