//! Scheduled daily-disable enforcement, independent of chore logic.
//!
//! Once per calendar day, at or after a fixed local clock time, a named rule
//! is forced to disabled. The shared state store provides the once-per-day
//! memory; the key re-arms automatically when the date string changes.

use super::RuleActuator;
use crate::error::ScheduleTimeError;
use crate::state::StateStore;
use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use tracing::{debug, error, info};

/// Parses a `HH:MM` 24-hour time string.
pub fn parse_hhmm(time_str: &str) -> Result<(u32, u32), ScheduleTimeError> {
    let Some((hour_str, minute_str)) = time_str.split_once(':') else {
        return Err(ScheduleTimeError::Format(time_str.to_string()));
    };
    let hour: u32 = hour_str
        .trim()
        .parse()
        .map_err(|_| ScheduleTimeError::Format(time_str.to_string()))?;
    let minute: u32 = minute_str
        .trim()
        .parse()
        .map_err(|_| ScheduleTimeError::Format(time_str.to_string()))?;
    if hour > 23 {
        return Err(ScheduleTimeError::HourRange(hour));
    }
    if minute > 59 {
        return Err(ScheduleTimeError::MinuteRange(minute));
    }
    Ok((hour, minute))
}

/// Deterministic state-store key for a rule's daily-disable action:
/// lowercase, trimmed, non-alphanumeric mapped to `_`.
pub fn action_key_for_rule(rule_name: &str) -> String {
    let safe: String = rule_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("disable_{safe}_at_time")
}

pub struct ScheduledRuleEnforcer<'a> {
    actuator: &'a dyn RuleActuator,
    store: Option<&'a mut StateStore>,
}

impl<'a> ScheduledRuleEnforcer<'a> {
    pub fn new(actuator: &'a dyn RuleActuator, store: Option<&'a mut StateStore>) -> Self {
        Self { actuator, store }
    }

    /// Disables `rule_name` once per day at or after `at_time` (`HH:MM`).
    ///
    /// Returns `true` only when the rule was driven to disabled and the
    /// completion was recorded in this call. Too-early, already-done,
    /// bad time string, and actuator failure all return `false`; never
    /// propagates an error to the caller. `now` is injected so the caller
    /// owns the clock.
    pub async fn enforce_daily_disable(
        &mut self,
        rule_name: &str,
        at_time: &str,
        now: DateTime<Tz>,
    ) -> bool {
        if rule_name.trim().is_empty() {
            debug!("scheduled disable skipped: rule name not set");
            return false;
        }

        let (target_hour, target_minute) = match parse_hhmm(at_time) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(at_time, error = %e, "invalid scheduled time; skipping enforcement");
                return false;
            }
        };

        let scheduled = format!("{target_hour:02}:{target_minute:02}");
        if (now.hour(), now.minute()) < (target_hour, target_minute) {
            debug!(
                now = %now.format("%H:%M"),
                scheduled = %scheduled,
                "before scheduled time; no action"
            );
            return false;
        }

        let today = now.format("%Y-%m-%d").to_string();
        let action_key = action_key_for_rule(rule_name);
        if self
            .store
            .as_deref()
            .is_some_and(|s| s.has_action_run_today(&action_key, &today))
        {
            debug!(key = %action_key, "scheduled disable already completed today");
            return false;
        }

        info!(
            rule = rule_name,
            from = %scheduled,
            "scheduled enforcement: disabling rule"
        );

        match self.actuator.set_rule_status(rule_name, false).await {
            Ok(true) => {
                info!(
                    rule = rule_name,
                    date = %today,
                    "rule is disabled (or already was); recording completion"
                );
                if let Some(store) = self.store.as_deref_mut() {
                    store.mark_action_run_today(&action_key, &today);
                }
                true
            }
            Ok(false) => {
                error!(
                    rule = rule_name,
                    "scheduled enforcement: actuator reported failure; will retry on next run"
                );
                false
            }
            Err(e) => {
                error!(
                    rule = rule_name,
                    error = %e,
                    "scheduled enforcement failed; will retry on next run"
                );
                false
            }
        }
    }
}
