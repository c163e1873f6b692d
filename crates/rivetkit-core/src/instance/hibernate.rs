//! Sleep/wake sequencing (spec §4.D, §9 Open Question (a)).
//!
//! An instance is eligible to sleep once it has no live connections, no
//! queued messages, isn't held awake, and has been idle past its
//! `sleepTimeout`. Waking always runs `onWake` to completion before any
//! due timers are allowed to fire ([`super::ActorInstance::wake`] enforces
//! the ordering directly; this module only holds the sleep predicate).

pub fn is_eligible_to_sleep(
	has_conns: bool,
	has_queued: bool,
	run_in_flight: bool,
	idle_for_ms: i64,
	sleep_timeout_ms: i64,
	keep_awake_until_ms: Option<i64>,
	now_ms: i64,
) -> bool {
	if has_conns || has_queued || run_in_flight {
		return false;
	}
	if let Some(until) = keep_awake_until_ms {
		if until > now_ms {
			return false;
		}
	}
	idle_for_ms >= sleep_timeout_ms
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn connections_block_sleep() {
		assert!(!is_eligible_to_sleep(true, false, false, 100_000, 1_000, None, 0));
	}

	#[test]
	fn a_running_run_handler_blocks_sleep() {
		assert!(!is_eligible_to_sleep(false, false, true, 100_000, 1_000, None, 0));
	}

	#[test]
	fn keep_awake_blocks_sleep_until_deadline() {
		assert!(!is_eligible_to_sleep(false, false, false, 100_000, 1_000, Some(500), 0));
		assert!(is_eligible_to_sleep(false, false, false, 100_000, 1_000, Some(-500), 0));
	}

	#[test]
	fn idle_past_timeout_is_eligible() {
		assert!(is_eligible_to_sleep(false, false, false, 2_000, 1_000, None, 0));
		assert!(!is_eligible_to_sleep(false, false, false, 500, 1_000, None, 0));
	}
}
