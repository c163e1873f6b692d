//! Typed error taxonomy (spec §7).
//!
//! Every error that can reach a client is a `group` + `code` + human
//! `message` + optional structured `metadata`, matching the teacher's
//! `#[derive(RivetError)]` shape (`engine/packages/pegboard/src/errors.rs`,
//! `engine/packages/guard/src/errors.rs`) without the proc-macro: each
//! domain gets a plain enum implementing [`RivetError`] by hand, which is
//! enough surface area for six groups and a couple dozen codes.

use rivetkit_shared_types::ErrorGroup;
use serde_json::Value;

/// Implemented by every domain error enum so the runtime can turn it into
/// a wire [`rivetkit_client_protocol::HttpResponseError`] /
/// `ToClient::Error` without knowing the concrete type.
pub trait RivetError: std::error::Error + Send + Sync + 'static {
	fn group(&self) -> ErrorGroup;
	fn code(&self) -> &'static str;
	fn message(&self) -> String {
		self.to_string()
	}
	fn metadata(&self) -> Option<Value> {
		None
	}
	fn retryable(&self) -> bool {
		false
	}

	/// Canonical HTTP status for this error, per the §7 taxonomy table.
	fn http_status(&self) -> u16 {
		match self.group() {
			ErrorGroup::User => 400,
			ErrorGroup::Actor => match self.code() {
				"not_found" => 404,
				"already_exists" => 409,
				"busy" | "sleep_in_progress" => 503,
				_ => 500,
			},
			ErrorGroup::Timeout => 504,
			ErrorGroup::Conflict => 409,
			ErrorGroup::Internal => 500,
			ErrorGroup::Workflow => 500,
		}
	}
}

macro_rules! rivet_error_enum {
	(
		$(#[$meta:meta])*
		$vis:vis enum $name:ident($group:expr) {
			$(
				$(#[doc = $doc:expr])*
				$variant:ident $( { $( $field:ident : $ty:ty ),* $(,)? } )? = $code:expr
			),* $(,)?
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone)]
		$vis enum $name {
			$(
				$variant $( { $( $field: $ty ),* } )?,
			)*
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				match self {
					$(
						#[allow(unused_variables)]
						$name::$variant $( { $( $field ),* } )? => write!(f, "{}", $code),
					)*
				}
			}
		}

		impl std::error::Error for $name {}

		impl RivetError for $name {
			fn group(&self) -> ErrorGroup {
				$group
			}

			fn code(&self) -> &'static str {
				match self {
					$( $name::$variant { .. } => $code, )*
				}
			}
		}
	};
}

rivet_error_enum! {
	/// `group: user`
	pub enum UserError(ErrorGroup::User) {
		ValidationFailed { message: String } = "validation_failed",
		Unauthorized = "unauthorized",
	}
}

rivet_error_enum! {
	/// `group: actor`
	pub enum ActorError(ErrorGroup::Actor) {
		NotFound = "not_found",
		AlreadyExists = "already_exists",
		Destroyed = "destroyed",
		Busy = "busy",
		SleepInProgress = "sleep_in_progress",
	}
}

rivet_error_enum! {
	/// `group: timeout`
	pub enum TimeoutError(ErrorGroup::Timeout) {
		ActionTimeout = "action_timeout",
		WakeTimeout = "wake_timeout",
		QueueTimeout = "queue_timeout",
	}
}

impl TimeoutError {
	pub fn is_retryable(&self) -> bool {
		true
	}
}

rivet_error_enum! {
	/// `group: conflict`
	pub enum ConflictError(ErrorGroup::Conflict) {
		StateDiverged { detail: String } = "state_diverged",
		LockHeld = "lock_held",
	}
}

rivet_error_enum! {
	/// `group: internal`
	pub enum InternalError(ErrorGroup::Internal) {
		DriverError { detail: String } = "driver_error",
		SerializationError { detail: String } = "serialization_error",
	}
}

/// `group: workflow`. Hand-written rather than going through
/// `rivet_error_enum!` because `JoinFailed`/`RaceFailed` need structured
/// `metadata()` (a branch -> error map) that the macro has no way to
/// express.
#[derive(Debug, Clone)]
pub enum WorkflowError {
	StepExhausted { step: String, last_error: String },
	RollbackRequired,
	HistoryDiverged { detail: String },
	Critical { detail: String },
	/// A `ctx.join(..)` where one or more branches failed. `errors` maps
	/// each failed branch's name to its error message; branches that
	/// succeeded are absent.
	JoinFailed { errors: std::collections::BTreeMap<String, String> },
	/// A `ctx.race(..)` where the winning branch itself failed.
	RaceFailed { branch: String, error: String },
	/// A losing branch of a `ctx.race(..)`, abandoned once another branch
	/// won.
	Cancelled,
}

impl std::fmt::Display for WorkflowError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			WorkflowError::StepExhausted { step, last_error } => {
				write!(f, "step_exhausted: step '{step}' failed after all attempts: {last_error}")
			}
			WorkflowError::RollbackRequired => write!(f, "rollback_required"),
			WorkflowError::HistoryDiverged { detail } => write!(f, "history_diverged: {detail}"),
			WorkflowError::Critical { detail } => write!(f, "critical: {detail}"),
			WorkflowError::JoinFailed { errors } => {
				write!(f, "join_failed: {} branch(es) failed", errors.len())
			}
			WorkflowError::RaceFailed { branch, error } => {
				write!(f, "race_failed: branch '{branch}' failed: {error}")
			}
			WorkflowError::Cancelled => write!(f, "cancelled"),
		}
	}
}

impl std::error::Error for WorkflowError {}

impl RivetError for WorkflowError {
	fn group(&self) -> ErrorGroup {
		ErrorGroup::Workflow
	}

	fn code(&self) -> &'static str {
		match self {
			WorkflowError::StepExhausted { .. } => "step_exhausted",
			WorkflowError::RollbackRequired => "rollback_required",
			WorkflowError::HistoryDiverged { .. } => "history_diverged",
			WorkflowError::Critical { .. } => "critical",
			WorkflowError::JoinFailed { .. } => "join_failed",
			WorkflowError::RaceFailed { .. } => "race_failed",
			WorkflowError::Cancelled => "cancelled",
		}
	}

	fn metadata(&self) -> Option<Value> {
		match self {
			WorkflowError::JoinFailed { errors } => serde_json::to_value(errors).ok(),
			WorkflowError::RaceFailed { branch, error } => {
				serde_json::to_value(serde_json::json!({ "branch": branch, "error": error })).ok()
			}
			_ => None,
		}
	}
}

/// A type-erased [`RivetError`], for call sites that don't care which
/// concrete enum produced it (e.g. turning any error into a wire envelope).
pub struct BoxedError(pub Box<dyn RivetError>);

impl std::fmt::Debug for BoxedError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.0.group().as_str(), self.0.code())
	}
}

impl std::fmt::Display for BoxedError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0.message())
	}
}

impl std::error::Error for BoxedError {}

impl<E: RivetError> From<E> for BoxedError {
	fn from(err: E) -> Self {
		BoxedError(Box::new(err))
	}
}

impl BoxedError {
	pub fn to_http_response_error(&self) -> rivetkit_client_protocol::HttpResponseError {
		rivetkit_client_protocol::HttpResponseError {
			group: self.0.group().as_str().to_string(),
			code: self.0.code().to_string(),
			message: self.0.message(),
			metadata: self.0.metadata(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn actor_not_found_maps_to_404() {
		let err = ActorError::NotFound;
		assert_eq!(err.http_status(), 404);
		assert_eq!(err.code(), "not_found");
	}

	#[test]
	fn boxed_error_preserves_group_and_code() {
		let boxed: BoxedError = ConflictError::LockHeld.into();
		let wire = boxed.to_http_response_error();
		assert_eq!(wire.group, "conflict");
		assert_eq!(wire.code, "lock_held");
	}

	#[test]
	fn timeout_errors_are_retryable() {
		assert!(TimeoutError::ActionTimeout.is_retryable());
	}
}
