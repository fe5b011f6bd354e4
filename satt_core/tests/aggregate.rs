use rstest::rstest;
use satt_core::aggregator::fold_states;
use satt_core::{AggregateResult, BladeArrayAggregator, BladeState, ManualScheduler};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use BladeState::*;

fn aggregator() -> (BladeArrayAggregator, Arc<ManualScheduler>) {
    let sched = Arc::new(ManualScheduler::new());
    let agg = BladeArrayAggregator::new(sched.clone(), Duration::from_secs(2));
    (agg, sched)
}

#[test]
fn empty_array() {
    let (mut agg, sched) = aggregator();
    let r = agg.aggregate(&[], &BTreeMap::new());
    assert_eq!(r.transmission, 1.0);
    assert!(r.removed);
    assert!(!r.inserted);
    assert_eq!(sched.pending(), 0);
}

#[test]
fn all_out_is_removed() {
    let r = fold_states(&[Out, Out, StuckOut], &BTreeMap::new());
    assert_eq!(
        r,
        AggregateResult {
            inserted: false,
            removed: true,
            transmission: 1.0,
            num_in: 0,
            num_out: 3,
        }
    );
}

#[rstest]
#[case(&[In, Out, Out])]
#[case(&[Out, Out, StuckIn])]
#[case(&[Unknown, In])]
fn any_in_is_inserted(#[case] states: &[BladeState]) {
    let r = fold_states(states, &BTreeMap::new());
    assert!(r.inserted);
    assert!(!r.removed);
    assert_eq!(r.num_in, 1);
}

#[test]
fn uninitialized_blade_schedules_exactly_one_retry() {
    let (mut agg, sched) = aggregator();
    let snapshot = [Some(Out), None, Some(In)];

    let first = agg.aggregate(&snapshot, &BTreeMap::new());
    assert_eq!(first, AggregateResult::DEGRADED);
    assert_eq!(sched.pending(), 1);
    assert_eq!(sched.delays(), vec![Duration::from_secs(2)]);

    // Second call before the retry fires schedules nothing new.
    let second = agg.aggregate(&snapshot, &BTreeMap::new());
    assert_eq!(second, AggregateResult::DEGRADED);
    assert_eq!(sched.pending(), 1);

    // Once fired, the guard is armed again.
    sched.run_all();
    agg.aggregate(&snapshot, &BTreeMap::new());
    assert_eq!(sched.pending(), 1);
}

// Any fully initialized snapshot re-arms the guard, so a later
// uninitialized read may queue a second retry before the first fires.
#[test]
fn any_initialized_snapshot_rearms_retry_guard() {
    let (mut agg, sched) = aggregator();
    agg.aggregate(&[None], &BTreeMap::new());
    assert!(agg.retry_pending());
    let r = agg.aggregate(&[Some(In)], &BTreeMap::new());
    assert!(r.inserted);
    assert!(!agg.retry_pending());
    agg.aggregate(&[None], &BTreeMap::new());
    assert_eq!(sched.pending(), 2);
}

#[test]
fn degraded_result_is_cached() {
    let (mut agg, _) = aggregator();
    agg.aggregate(&[None, Some(Out)], &BTreeMap::new());
    assert_eq!(agg.cached(), Some(AggregateResult::DEGRADED));
}

#[test]
fn retry_hook_runs_when_task_fires() {
    let (mut agg, sched) = aggregator();
    let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let h = hits.clone();
    agg.set_on_retry(move || {
        h.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    agg.aggregate(&[None], &BTreeMap::new());
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 0);
    sched.run_all();
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn transmission_is_product_of_factors() {
    let per = BTreeMap::from([(1, 0.5), (2, 0.5)]);
    let r = fold_states(&[In, StuckIn, Out], &per);
    assert!((r.transmission - 0.25).abs() < 1e-12);
    assert_eq!((r.num_in, r.num_out), (2, 1));
}
