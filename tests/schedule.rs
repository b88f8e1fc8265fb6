//! Scheduled daily-disable enforcement: once per day, at or after the
//! configured local time, independent of chore status.

mod support;

use chorewarden::engine::schedule::ScheduledRuleEnforcer;
use chorewarden::state::StateStore;
use chrono::TimeZone;
use support::{RecordingActuator, TZ, local};
use tempfile::TempDir;

const RULE: &str = "Manual Sophie - Allow";

fn store_in(dir: &TempDir) -> StateStore {
    let mut store = StateStore::new(dir.path().join("state.json"));
    store.load();
    store
}

#[tokio::test]
async fn before_scheduled_time_does_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    let actuator = RecordingActuator::succeeding();

    let acted = ScheduledRuleEnforcer::new(&actuator, Some(&mut store))
        .enforce_daily_disable(RULE, "19:30", local(19, 29))
        .await;

    assert!(!acted);
    assert!(actuator.set_calls().is_empty());
}

#[tokio::test]
async fn at_scheduled_time_disables_once_per_day() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    let actuator = RecordingActuator::succeeding();

    let acted = ScheduledRuleEnforcer::new(&actuator, Some(&mut store))
        .enforce_daily_disable(RULE, "19:30", local(19, 30))
        .await;
    assert!(acted);
    assert_eq!(actuator.set_calls(), vec![(RULE.to_string(), false)]);

    // Later the same day: already recorded, no second actuator call.
    let acted = ScheduledRuleEnforcer::new(&actuator, Some(&mut store))
        .enforce_daily_disable(RULE, "19:30", local(22, 0))
        .await;
    assert!(!acted);
    assert_eq!(actuator.set_calls().len(), 1);
}

#[tokio::test]
async fn actuator_failure_leaves_action_armed_for_retry() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    let actuator = RecordingActuator::erroring();

    let acted = ScheduledRuleEnforcer::new(&actuator, Some(&mut store))
        .enforce_daily_disable(RULE, "19:30", local(19, 31))
        .await;
    assert!(!acted);

    // Next run succeeds and records.
    actuator.start_succeeding();
    let acted = ScheduledRuleEnforcer::new(&actuator, Some(&mut store))
        .enforce_daily_disable(RULE, "19:30", local(19, 45))
        .await;
    assert!(acted);
    assert_eq!(actuator.set_calls().len(), 2);
}

#[tokio::test]
async fn completion_rearms_on_the_next_day() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    let actuator = RecordingActuator::succeeding();

    let day_one = TZ.with_ymd_and_hms(2025, 8, 8, 19, 35, 0).unwrap();
    let acted = ScheduledRuleEnforcer::new(&actuator, Some(&mut store))
        .enforce_daily_disable(RULE, "19:30", day_one)
        .await;
    assert!(acted);

    let day_two = TZ.with_ymd_and_hms(2025, 8, 9, 19, 35, 0).unwrap();
    let acted = ScheduledRuleEnforcer::new(&actuator, Some(&mut store))
        .enforce_daily_disable(RULE, "19:30", day_two)
        .await;
    assert!(acted);
    assert_eq!(actuator.set_calls().len(), 2);
}

#[tokio::test]
async fn invalid_inputs_are_skipped_without_actuator_calls() {
    let actuator = RecordingActuator::succeeding();

    let acted = ScheduledRuleEnforcer::new(&actuator, None)
        .enforce_daily_disable("  ", "19:30", local(20, 0))
        .await;
    assert!(!acted);

    let acted = ScheduledRuleEnforcer::new(&actuator, None)
        .enforce_daily_disable(RULE, "25:99", local(20, 0))
        .await;
    assert!(!acted);

    assert!(actuator.set_calls().is_empty());
}

#[tokio::test]
async fn without_store_every_run_past_time_acts() {
    let actuator = RecordingActuator::succeeding();

    for minute in [30, 40] {
        let acted = ScheduledRuleEnforcer::new(&actuator, None)
            .enforce_daily_disable(RULE, "19:30", local(19, minute))
            .await;
        assert!(acted);
    }
    assert_eq!(actuator.set_calls().len(), 2);
}
