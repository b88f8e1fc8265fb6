//! Decision engine: combines wall-clock time, time-window policy, persisted
//! daily state, and live chore status into an idempotent firewall-rule target
//! state per monitored individual.
//!
//! The state machine is recomputed fresh on every run from time plus stored
//! flags; nothing here is long-lived. Fail-safe policy throughout: whenever
//! chore status cannot be confirmed, access is denied (rule enabled).

pub mod schedule;

use crate::config::MonitoredIndividual;
use crate::error::{FirewallError, OracleError};
use crate::state::StateStore;
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt;
use tracing::{error, info, warn};

// ─── Collaborator seams ─────────────────────────────────────────────────────

/// Answers "does this individual have an incomplete task due on or before
/// today?" for a task-group (section) identifier. Implementations retry
/// transient failures internally before surfacing a terminal error.
#[async_trait]
pub trait TaskOracle: Send + Sync {
    async fn has_incomplete_tasks(&self, section_id: &str) -> Result<bool, OracleError>;
}

/// Drives a named firewall rule to a target enabled/disabled state.
/// `set_rule_status` must be idempotent: already-in-state reports success
/// without side effects. The engine never retries it.
#[async_trait]
pub trait RuleActuator: Send + Sync {
    async fn get_rule_status(&self, rule_name: &str) -> Result<Option<bool>, FirewallError>;

    /// `Ok(true)` means the rule is now (or already was) in the target state;
    /// `Ok(false)` means the actuator could not apply it (e.g. rule missing).
    async fn set_rule_status(
        &self,
        rule_name: &str,
        target_enabled: bool,
    ) -> Result<bool, FirewallError>;
}

// ─── Time-window policy ─────────────────────────────────────────────────────

/// A daily deny interval keyed on whole hours. `start_hour > end_hour` wraps
/// midnight (e.g. 20 → 7 denies 20:00-06:59).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BedtimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl BedtimeWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour > self.end_hour {
            hour >= self.start_hour || hour < self.end_hour
        } else {
            hour >= self.start_hour && hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimeWindowPolicy {
    /// Hour at or after which chore checking begins.
    pub cutoff_hour: u32,
    /// Optional unconditional deny window; takes priority over everything.
    pub bedtime: Option<BedtimeWindow>,
}

/// Snapshot of "now" in the configured timezone, computed once per run and
/// shared by every individual's evaluation.
#[derive(Debug, Clone)]
pub struct TimeStatus {
    pub now: DateTime<Tz>,
    pub today: String,
    pub current_hour: u32,
    pub cutoff_hour: u32,
    pub is_after_cutoff: bool,
    pub bedtime: Option<BedtimeWindow>,
}

impl TimeStatus {
    pub fn for_now(policy: &TimeWindowPolicy, tz: Tz) -> Self {
        Self::at(Utc::now().with_timezone(&tz), policy)
    }

    pub fn at(now: DateTime<Tz>, policy: &TimeWindowPolicy) -> Self {
        let current_hour = now.hour();
        Self {
            now,
            today: now.format("%Y-%m-%d").to_string(),
            current_hour,
            cutoff_hour: policy.cutoff_hour,
            // The cutoff hour itself is already "after cutoff".
            is_after_cutoff: current_hour >= policy.cutoff_hour,
            bedtime: policy.bedtime,
        }
    }

    pub fn in_bedtime(&self) -> bool {
        self.bedtime.is_some_and(|w| w.contains(self.current_hour))
    }
}

// ─── Decision model ─────────────────────────────────────────────────────────

/// Target internet-access state. `AllowAccess` disables the blocking rule;
/// `DenyAccess` enables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    AllowAccess,
    DenyAccess,
}

impl RuleAction {
    /// The firewall-rule enabled state this action maps to.
    pub fn rule_enabled(self) -> bool {
        matches!(self, RuleAction::DenyAccess)
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::AllowAccess => write!(f, "allow-access (rule disabled)"),
            RuleAction::DenyAccess => write!(f, "deny-access (rule enabled)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionReason {
    Bedtime,
    BeforeCutoff { current_hour: u32, cutoff_hour: u32 },
    AlreadyDoneToday,
    ChoresComplete,
    IncompleteTasks,
    OracleUnavailable,
    OracleFailure(String),
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::Bedtime => write!(f, "bedtime window in effect"),
            DecisionReason::BeforeCutoff {
                current_hour,
                cutoff_hour,
            } => write!(
                f,
                "time ({current_hour}:00) is before cutoff ({cutoff_hour}:00)"
            ),
            DecisionReason::AlreadyDoneToday => {
                write!(f, "already marked complete today in state")
            }
            DecisionReason::ChoresComplete => {
                write!(f, "all tasks due today or overdue are complete")
            }
            DecisionReason::IncompleteTasks => write!(f, "incomplete or overdue tasks found"),
            DecisionReason::OracleUnavailable => {
                write!(f, "task client unavailable; applying fail-safe")
            }
            DecisionReason::OracleFailure(message) => {
                write!(f, "could not confirm chore status: {message}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: RuleAction,
    pub reason: DecisionReason,
    /// Set only on the "chores confirmed complete by the oracle" path; this
    /// outcome marks the state store once the actuator reports success.
    pub mark_done_on_success: bool,
}

/// What happened for one individual in one run.
#[derive(Debug)]
pub enum Outcome {
    /// Required per-individual config was missing; nothing was applied.
    Skipped { reason: String },
    /// `auto_disable = false` blocked a disable action; nothing was applied.
    Suppressed { decision: Decision },
    Applied { decision: Decision, marked_done: bool },
    Failed { decision: Decision, error: String },
}

// ─── Per-individual evaluation ──────────────────────────────────────────────

/// Evaluates and applies the rule state for one individual.
///
/// The actuator handle is required; without it there is nothing to apply to,
/// and the orchestrator skips the individual before calling in here. Oracle
/// and store are optional capabilities with fail-safe fallbacks.
pub async fn process_individual(
    individual: &MonitoredIndividual,
    time: &TimeStatus,
    oracle: Option<&dyn TaskOracle>,
    actuator: &dyn RuleActuator,
    store: Option<&mut StateStore>,
) -> Outcome {
    info!(individual = %individual.name, "processing individual");

    let section_id = individual.section_id.as_deref().unwrap_or("").trim();
    let rule_name = individual.rule_name.as_deref().unwrap_or("").trim();
    if section_id.is_empty() || rule_name.is_empty() {
        let reason = "missing required configuration (section id or rule name)".to_string();
        error!(individual = %individual.name, "{reason}; skipping");
        return Outcome::Skipped { reason };
    }

    let already_done = store
        .as_deref()
        .is_some_and(|s| s.is_done_today(&individual.name, &time.today));

    let decision = decide(individual, time, already_done, oracle, section_id).await;

    // auto_disable=false uniformly suppresses every disable path; it never
    // suppresses deny-access (bedtime and incomplete tasks always apply).
    if decision.action == RuleAction::AllowAccess && !individual.auto_disable {
        info!(
            individual = %individual.name,
            rule = rule_name,
            reason = %decision.reason,
            "auto-disable suppressed for this individual; leaving rule untouched"
        );
        return Outcome::Suppressed { decision };
    }

    log_intent(individual, rule_name, &decision);

    match actuator
        .set_rule_status(rule_name, decision.action.rule_enabled())
        .await
    {
        Ok(true) => {
            let mut marked_done = false;
            if decision.mark_done_on_success && let Some(store) = store {
                info!(
                    individual = %individual.name,
                    date = %time.today,
                    "marking completion in state"
                );
                store.mark_done_today(&individual.name, &time.today);
                marked_done = true;
            }
            Outcome::Applied {
                decision,
                marked_done,
            }
        }
        Ok(false) => {
            error!(
                individual = %individual.name,
                rule = rule_name,
                "actuator reported failure applying rule state; state unchanged"
            );
            Outcome::Failed {
                decision,
                error: "actuator reported failure".into(),
            }
        }
        Err(e) => {
            error!(
                individual = %individual.name,
                rule = rule_name,
                error = %e,
                "failed to apply rule state; state unchanged"
            );
            Outcome::Failed {
                decision,
                error: e.to_string(),
            }
        }
    }
}

async fn decide(
    individual: &MonitoredIndividual,
    time: &TimeStatus,
    already_done: bool,
    oracle: Option<&dyn TaskOracle>,
    section_id: &str,
) -> Decision {
    // Bedtime has absolute priority over chore status and suppression.
    if time.in_bedtime() {
        return Decision {
            action: RuleAction::DenyAccess,
            reason: DecisionReason::Bedtime,
            mark_done_on_success: false,
        };
    }

    if !time.is_after_cutoff {
        return Decision {
            action: RuleAction::AllowAccess,
            reason: DecisionReason::BeforeCutoff {
                current_hour: time.current_hour,
                cutoff_hour: time.cutoff_hour,
            },
            mark_done_on_success: false,
        };
    }

    // A completion mark short-circuits the oracle for the rest of the day.
    if already_done {
        return Decision {
            action: RuleAction::AllowAccess,
            reason: DecisionReason::AlreadyDoneToday,
            mark_done_on_success: false,
        };
    }

    let Some(oracle) = oracle else {
        return Decision {
            action: RuleAction::DenyAccess,
            reason: DecisionReason::OracleUnavailable,
            mark_done_on_success: false,
        };
    };

    match oracle.has_incomplete_tasks(section_id).await {
        Ok(true) => Decision {
            action: RuleAction::DenyAccess,
            reason: DecisionReason::IncompleteTasks,
            mark_done_on_success: false,
        },
        Ok(false) => Decision {
            action: RuleAction::AllowAccess,
            reason: DecisionReason::ChoresComplete,
            mark_done_on_success: true,
        },
        Err(e) => {
            error!(
                individual = %individual.name,
                error = %e,
                "chore status check failed; applying fail-safe"
            );
            Decision {
                action: RuleAction::DenyAccess,
                reason: DecisionReason::OracleFailure(e.to_string()),
                mark_done_on_success: false,
            }
        }
    }
}

fn log_intent(individual: &MonitoredIndividual, rule_name: &str, decision: &Decision) {
    match decision.action {
        RuleAction::DenyAccess => warn!(
            individual = %individual.name,
            rule = rule_name,
            action = %decision.action,
            reason = %decision.reason,
            "intended firewall action"
        ),
        RuleAction::AllowAccess => info!(
            individual = %individual.name,
            rule = rule_name,
            action = %decision.action,
            reason = %decision.reason,
            "intended firewall action"
        ),
    }
}
