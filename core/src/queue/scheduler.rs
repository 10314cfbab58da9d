//! Ready-task selection.
//!
//! One linear scan per cycle: stable-sort the pending list by priority, then
//! take the first task whose dependencies are all completed in history.
//! Priority therefore dominates dependency-readiness among ready tasks.
//! Re-sorting the whole queue every cycle is O(n log n) per completed task;
//! fine for the tens-of-tasks queues this core is built for.

use super::state::QueueState;

/// Decision of one scheduling cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum Selection {
    /// Index into `state.queue` of the task to run next.
    Ready(usize),
    /// Queue is non-empty but nothing is eligible: every pending task waits
    /// on a dependency that is unsatisfied or can never complete.
    Deadlock { blocked_on: Vec<String> },
    /// Nothing pending.
    Empty,
}

pub fn select_next(state: &QueueState) -> Selection {
    if state.queue.is_empty() {
        return Selection::Empty;
    }

    // Indices sorted by priority; sort_by_key is stable, so enqueue order
    // breaks ties.
    let mut order: Vec<usize> = (0..state.queue.len()).collect();
    order.sort_by_key(|&i| state.queue[i].priority);

    for &i in &order {
        let task = &state.queue[i];
        if task
            .dependencies
            .iter()
            .all(|dep| state.dependency_met(dep))
        {
            return Selection::Ready(i);
        }
    }

    let mut blocked_on: Vec<String> = state
        .queue
        .iter()
        .flat_map(|t| t.dependencies.iter())
        .filter(|dep| !state.dependency_met(dep))
        .cloned()
        .collect();
    blocked_on.sort();
    blocked_on.dedup();

    Selection::Deadlock { blocked_on }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::task::{Priority, Task};
    use serde_json::json;

    fn noop(id: &str) -> Task {
        Task::new("readFile", json!({"path": id})).with_id(id)
    }

    #[test]
    fn empty_queue_selects_nothing() {
        assert_eq!(select_next(&QueueState::default()), Selection::Empty);
    }

    #[test]
    fn priority_dominates_insertion_order() {
        let mut state = QueueState::default();
        state.queue.push(noop("low").with_priority(Priority::Low));
        state
            .queue
            .push(noop("critical").with_priority(Priority::Critical));
        state
            .queue
            .push(noop("normal").with_priority(Priority::Normal));

        match select_next(&state) {
            Selection::Ready(i) => assert_eq!(state.queue[i].id, "critical"),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn equal_priority_ties_break_by_enqueue_order() {
        let mut state = QueueState::default();
        state.queue.push(noop("first"));
        state.queue.push(noop("second"));

        match select_next(&state) {
            Selection::Ready(i) => assert_eq!(state.queue[i].id, "first"),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn unmet_dependency_skips_to_ready_task() {
        let mut state = QueueState::default();
        state.queue.push(
            noop("blocked")
                .with_priority(Priority::Critical)
                .with_dependencies(vec!["later".into()]),
        );
        state.queue.push(noop("free").with_priority(Priority::Low));

        match select_next(&state) {
            Selection::Ready(i) => assert_eq!(state.queue[i].id, "free"),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn all_blocked_is_a_deadlock() {
        let mut state = QueueState::default();
        state
            .queue
            .push(noop("b").with_dependencies(vec!["a".into()]));
        state
            .queue
            .push(noop("c").with_dependencies(vec!["a".into(), "b".into()]));

        match select_next(&state) {
            Selection::Deadlock { blocked_on } => {
                assert_eq!(blocked_on, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected Deadlock, got {other:?}"),
        }
    }

    #[test]
    fn completed_dependency_unblocks_on_next_cycle() {
        let mut state = QueueState::default();
        state
            .queue
            .push(noop("b").with_dependencies(vec!["a".into()]));

        assert!(matches!(select_next(&state), Selection::Deadlock { .. }));

        let mut a = noop("a");
        a.mark_running();
        a.mark_completed(json!("done"));
        state.history.push(a);

        match select_next(&state) {
            Selection::Ready(i) => assert_eq!(state.queue[i].id, "b"),
            other => panic!("expected Ready, got {other:?}"),
        }
    }
}
