//! Readers-writer task scheduling on top of the shared worker runtime.
//!
//! This crate provides ordering primitives for async work against a shared
//! resource:
//! * [`SequentialQueue`]: strict FIFO, one task at a time
//! * [`ReadWriteScheduler`]: writes run alone, contiguous reads run together
//! * [`ReadBatch`]: the concurrent read group the scheduler lines up
//!
//! Every submission returns a [`TaskHandle`] that settles with the task's own
//! result once the scheduler has actually run it. Failures stay with the task
//! that produced them; nothing later in the line is affected.

pub mod batch;
mod class;
mod panic;
pub mod scheduler;
mod sequential;
mod spawn;
mod task;

pub use batch::{BatchPhase, ReadBatch};
pub use class::TaskClass;
pub use scheduler::{DrainHandle, ReadWriteScheduler, SchedulerSpec};
pub use sequential::SequentialQueue;
pub use spawn::spawn;
pub use task::{TaskError, TaskHandle};
