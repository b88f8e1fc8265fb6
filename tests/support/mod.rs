#![allow(dead_code)]

use async_trait::async_trait;
use chorewarden::config::MonitoredIndividual;
use chorewarden::engine::{
    BedtimeWindow, RuleActuator, TaskOracle, TimeStatus, TimeWindowPolicy,
};
use chorewarden::error::{FirewallError, OracleError};
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

pub const TZ: Tz = chrono_tz::Europe::London;

pub fn policy() -> TimeWindowPolicy {
    TimeWindowPolicy {
        cutoff_hour: 14,
        bedtime: Some(BedtimeWindow {
            start_hour: 20,
            end_hour: 7,
        }),
    }
}

pub fn local(hour: u32, minute: u32) -> DateTime<Tz> {
    TZ.with_ymd_and_hms(2025, 8, 8, hour, minute, 0).unwrap()
}

/// Time status for a fixed test date at the given local clock time, under the
/// default policy (cutoff 14, bedtime 20:00-06:59).
pub fn time_at(hour: u32, minute: u32) -> TimeStatus {
    TimeStatus::at(local(hour, minute), &policy())
}

pub fn individual(name: &str) -> MonitoredIndividual {
    MonitoredIndividual {
        name: name.to_string(),
        section_id: Some(format!("sec-{name}")),
        rule_name: Some(format!("{name} Block")),
        auto_disable: true,
    }
}

/// Scripted chore oracle; counts calls so tests can assert short-circuits.
pub struct MockOracle {
    result: Option<bool>,
    calls: AtomicU32,
}

impl MockOracle {
    fn with_result(result: Option<bool>) -> Self {
        Self {
            result,
            calls: AtomicU32::new(0),
        }
    }

    pub fn incomplete() -> Self {
        Self::with_result(Some(true))
    }

    pub fn complete() -> Self {
        Self::with_result(Some(false))
    }

    pub fn failing() -> Self {
        Self::with_result(None)
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskOracle for MockOracle {
    async fn has_incomplete_tasks(&self, _section_id: &str) -> Result<bool, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.result {
            Some(incomplete) => Ok(incomplete),
            None => Err(OracleError::Api {
                attempts: 3,
                message: "simulated outage".into(),
            }),
        }
    }
}

#[derive(Clone, Copy)]
enum SetBehavior {
    Succeed,
    ReportFailure,
    Error,
}

/// Records every `set_rule_status` call; behavior is scripted per instance
/// and can be switched mid-test.
pub struct RecordingActuator {
    behavior: Mutex<SetBehavior>,
    calls: Mutex<Vec<(String, bool)>>,
}

impl RecordingActuator {
    fn with_behavior(behavior: SetBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::with_behavior(SetBehavior::Succeed)
    }

    pub fn reporting_failure() -> Self {
        Self::with_behavior(SetBehavior::ReportFailure)
    }

    pub fn erroring() -> Self {
        Self::with_behavior(SetBehavior::Error)
    }

    pub fn start_succeeding(&self) {
        *self.behavior.lock().unwrap() = SetBehavior::Succeed;
    }

    pub fn set_calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RuleActuator for RecordingActuator {
    async fn get_rule_status(&self, _rule_name: &str) -> Result<Option<bool>, FirewallError> {
        Ok(Some(true))
    }

    async fn set_rule_status(
        &self,
        rule_name: &str,
        target_enabled: bool,
    ) -> Result<bool, FirewallError> {
        self.calls
            .lock()
            .unwrap()
            .push((rule_name.to_string(), target_enabled));
        match *self.behavior.lock().unwrap() {
            SetBehavior::Succeed => Ok(true),
            SetBehavior::ReportFailure => Ok(false),
            SetBehavior::Error => Err(FirewallError::Api {
                message: "simulated api rejection".into(),
            }),
        }
    }
}
