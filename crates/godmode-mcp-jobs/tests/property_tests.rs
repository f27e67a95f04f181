//! Property-based tests for the job lifecycle and output capture.
//!
//! Uses proptest to drive the registry with random operation sequences and
//! verify the lifecycle invariants hold.

use proptest::prelude::*;
use std::sync::Arc;

use godmode_mcp_core::{JobState, LAUNCH_FAILURE_EXIT_CODE};
use godmode_mcp_jobs::{HistoryLog, JobRegistry, OutputBuffer, RegistryConfig};

/// One operation applied to a job.
#[derive(Debug, Clone)]
enum Op {
    Transition(JobState, i32),
    Finish(i32),
    Append(Vec<u8>),
    StopRequest,
}

fn any_state() -> impl Strategy<Value = JobState> {
    prop_oneof![
        Just(JobState::Pending),
        Just(JobState::Running),
        Just(JobState::Completed),
        Just(JobState::Failed),
        Just(JobState::Stopped),
    ]
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any_state(), -1i32..256).prop_map(|(s, c)| Op::Transition(s, c)),
        (-1i32..256).prop_map(Op::Finish),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Op::Append),
        Just(Op::StopRequest),
    ]
}

fn rank(state: JobState) -> u8 {
    match state {
        JobState::Pending => 0,
        JobState::Running => 1,
        _ => 2,
    }
}

proptest! {
    /// States never move backwards and terminal states never change.
    #[test]
    fn lifecycle_is_monotonic(ops in prop::collection::vec(any_op(), 0..40)) {
        let registry = JobRegistry::new();
        let id = registry.create("prop", None).unwrap();
        let mut previous = registry.get(&id).unwrap();

        for op in ops {
            let _ = match op {
                Op::Transition(state, code) => registry.update_state(&id, state, Some(code)).map(|_| ()),
                Op::Finish(code) => registry.finish(&id, code).map(|_| ()),
                Op::Append(bytes) => registry.append_output(&id, &bytes),
                Op::StopRequest => registry.mark_stop_requested(&id).map(|_| ()),
            };

            let current = registry.get(&id).unwrap();
            prop_assert!(rank(current.state) >= rank(previous.state));
            if previous.state.is_terminal() {
                prop_assert_eq!(current.state, previous.state);
                prop_assert_eq!(current.exit_code, previous.exit_code);
                prop_assert_eq!(current.ended_at, previous.ended_at);
                prop_assert_eq!(&current.output, &previous.output);
            }
            if current.state.is_terminal() {
                prop_assert!(current.ended_at.is_some());
                prop_assert!(current.exit_code.is_some());
            } else {
                prop_assert!(current.ended_at.is_none());
                prop_assert!(current.exit_code.is_none());
            }
            previous = current;
        }

        // Exactly one history record once terminal, none otherwise.
        let expected = usize::from(previous.state.is_terminal());
        prop_assert_eq!(registry.history().len(), expected);
    }

    /// History order matches the order in which jobs terminated.
    #[test]
    fn history_follows_termination_order(order in Just((0..8usize).collect::<Vec<_>>()).prop_shuffle()) {
        let registry = JobRegistry::with_config(
            RegistryConfig::default(),
            Arc::new(HistoryLog::in_memory()),
        );
        let ids: Vec<_> = (0..8)
            .map(|i| registry.create(&format!("job {i}"), None).unwrap())
            .collect();

        for &i in &order {
            registry
                .update_state(&ids[i], JobState::Failed, Some(LAUNCH_FAILURE_EXIT_CODE))
                .unwrap();
        }

        let recorded: Vec<_> = registry.history().read_all().into_iter().map(|r| r.id).collect();
        let expected: Vec<_> = order.iter().map(|&i| ids[i].clone()).collect();
        prop_assert_eq!(recorded, expected);
    }

    /// The buffer stays within twice its bound and always ends with the latest bytes.
    #[test]
    fn output_buffer_keeps_recent_bytes(
        max in 1usize..64,
        chunks in prop::collection::vec(prop::collection::vec(0u8..0x80, 1..48), 1..30),
    ) {
        let mut buffer = OutputBuffer::new(max);
        let mut all = Vec::new();

        for chunk in &chunks {
            buffer.append(chunk);
            all.extend_from_slice(chunk);

            prop_assert!(buffer.len() <= max * 2);
            prop_assert!(all.ends_with(buffer.as_bytes()));
            prop_assert_eq!(buffer.len() as u64 + buffer.dropped_bytes(), all.len() as u64);
        }
    }
}
