use crate::TaskClass;

/// Configuration for one scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerSpec {
	pub(crate) name: String,
	pub(crate) class: TaskClass,
}

impl SchedulerSpec {
	/// Creates a spec with the given diagnostic name.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	/// Sets the worker class drain loops and tasks are spawned under.
	#[must_use]
	pub fn class(mut self, class: TaskClass) -> Self {
		self.class = class;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl Default for SchedulerSpec {
	fn default() -> Self {
		Self {
			name: "scheduler".to_string(),
			class: TaskClass::Interactive,
		}
	}
}
