/// Execution classes a scheduler tags its spawned work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskClass {
	/// Latency-sensitive work whose result a caller is actively waiting on.
	#[default]
	Interactive,
	/// Deferred async work nobody is blocked on.
	Background,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
		}
	}
}
