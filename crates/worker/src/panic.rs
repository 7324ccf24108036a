use tokio::task::JoinError;

/// Extracts the panic payload message from a failed join.
///
/// Returns `None` when the task was cancelled rather than panicking.
pub(crate) fn join_error_panic_message(err: JoinError) -> Option<String> {
	let payload = err.try_into_panic().ok()?;
	let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"non-string panic payload".to_string()
	};
	Some(message)
}

#[cfg(test)]
mod tests {
	use super::join_error_panic_message;

	#[tokio::test]
	async fn literal_payload() {
		let err = tokio::spawn(async { panic!("write exploded") }).await.unwrap_err();
		assert_eq!(join_error_panic_message(err).as_deref(), Some("write exploded"));
	}

	#[tokio::test]
	async fn formatted_payload() {
		let handle = tokio::spawn(async { panic!("{}-{}", "boom", 7) });
		let err = handle.await.unwrap_err();
		let msg = join_error_panic_message(err).expect("should be a panic");
		assert_eq!(msg, "boom-7");
	}

	#[tokio::test]
	async fn non_string_payload_gets_placeholder() {
		let handle = tokio::spawn(async { std::panic::panic_any(42u32) });
		let err = handle.await.unwrap_err();
		assert_eq!(join_error_panic_message(err).as_deref(), Some("non-string panic payload"));
	}

	#[tokio::test]
	async fn aborted_task_is_not_a_panic() {
		let handle = tokio::spawn(std::future::pending::<()>());
		handle.abort();
		let err = handle.await.unwrap_err();
		assert!(err.is_cancelled());
		assert!(join_error_panic_message(err).is_none());
	}
}
