//! Top-level command handlers.
//!
//! Each run is one shot: build the collaborators, evaluate the roster, apply
//! rule changes, persist state, exit. Collaborator construction failures are
//! logged and degrade the run (fail-safe deny, or skip) rather than abort it;
//! only configuration loading aborts, and that happens before we get here.

use crate::config::Config;
use crate::engine::schedule::ScheduledRuleEnforcer;
use crate::engine::{self, Outcome, TaskOracle, TimeStatus};
use crate::sophos::SophosClient;
use crate::state::StateStore;
use crate::todoist::TodoistClient;
use anyhow::Result;
use tracing::{error, info, warn};

fn build_oracle(config: &Config) -> Option<TodoistClient> {
    let result = match &config.todoist_base_url {
        Some(base) => TodoistClient::with_base_url(&config.todoist_api_key, config.timezone, base),
        None => TodoistClient::new(&config.todoist_api_key, config.timezone),
    };
    match result {
        Ok(client) => Some(client),
        Err(e) => {
            // Without the oracle every individual past cutoff fails safe to
            // deny, which is the intended degraded behavior.
            error!(error = %e, "failed to construct Todoist client; chore checks unavailable");
            None
        }
    }
}

fn build_actuator(config: &Config) -> Option<SophosClient> {
    match SophosClient::new(
        &config.sophos.host,
        &config.sophos.api_user,
        &config.sophos.api_password,
        config.sophos.port,
        config.sophos.verify_tls,
    ) {
        Ok(client) => Some(client),
        Err(e) => {
            error!(error = %e, "failed to construct Sophos client; no rules can be applied");
            None
        }
    }
}

/// The main daily cycle: evaluate every roster member, then the scheduled
/// disable action, then persist state.
pub async fn run_check_cycle(config: &Config) -> Result<()> {
    config.log_summary();

    let oracle = build_oracle(config);
    let actuator = build_actuator(config);

    let mut store = StateStore::new(&config.state_file_path);
    store.load();

    let time = TimeStatus::for_now(&config.policy, config.timezone);
    info!(
        now = %time.now.format("%Y-%m-%d %H:%M:%S %Z"),
        after_cutoff = time.is_after_cutoff,
        bedtime = time.in_bedtime(),
        "time status"
    );

    let mut failures = 0u32;
    for individual in &config.roster {
        let Some(actuator) = actuator.as_ref() else {
            error!(
                individual = %individual.name,
                "no firewall client; skipping individual"
            );
            failures += 1;
            continue;
        };
        let outcome = engine::process_individual(
            individual,
            &time,
            oracle.as_ref().map(|o| o as &dyn TaskOracle),
            actuator,
            Some(&mut store),
        )
        .await;
        match outcome {
            Outcome::Applied {
                decision,
                marked_done,
            } => info!(
                individual = %individual.name,
                action = %decision.action,
                reason = %decision.reason,
                marked_done,
                "outcome: applied"
            ),
            Outcome::Suppressed { decision } => info!(
                individual = %individual.name,
                reason = %decision.reason,
                "outcome: suppressed"
            ),
            Outcome::Skipped { reason } => {
                warn!(individual = %individual.name, reason, "outcome: skipped");
            }
            Outcome::Failed { decision, error } => {
                error!(
                    individual = %individual.name,
                    action = %decision.action,
                    error,
                    "outcome: failed"
                );
                failures += 1;
            }
        }
    }

    if let Some(sched) = &config.scheduled_disable {
        if let Some(actuator) = actuator.as_ref() {
            let mut enforcer = ScheduledRuleEnforcer::new(actuator, Some(&mut store));
            let acted = enforcer
                .enforce_daily_disable(&sched.rule_name, &sched.at_time, time.now)
                .await;
            info!(rule = %sched.rule_name, acted, "scheduled disable evaluated");
        } else {
            error!(rule = %sched.rule_name, "no firewall client; scheduled disable skipped");
        }
    }

    // A failed save loses at most today's completion marks; the next run
    // re-derives them from the oracle, so this is logged rather than fatal.
    if let Err(e) = store.save() {
        error!(error = %e, path = %store.path().display(), "failed to persist state");
    }

    if failures > 0 {
        warn!(failures, "cycle finished with failures");
    } else {
        info!("cycle finished");
    }
    Ok(())
}

/// Prints every Todoist project and its sections, for finding section ids.
pub async fn list_sections(config: &Config) -> Result<()> {
    let client = match &config.todoist_base_url {
        Some(base) => TodoistClient::with_base_url(&config.todoist_api_key, config.timezone, base)?,
        None => TodoistClient::new(&config.todoist_api_key, config.timezone)?,
    };
    let projects = client.list_projects().await?;
    let sections = client.list_sections().await?;
    for project in &projects {
        println!("{} (project {})", project.name, project.id);
        for section in sections.iter().filter(|s| s.project_id == project.id) {
            println!("    {} (section {})", section.name, section.id);
        }
    }
    Ok(())
}

/// Verifies credentials against both upstream services without touching any
/// rule or state.
pub async fn check_connectivity(config: &Config) -> Result<()> {
    let mut ok = true;

    match build_oracle(config) {
        Some(client) => match client.list_projects().await {
            Ok(projects) => info!(projects = projects.len(), "Todoist connection OK"),
            Err(e) => {
                error!(error = %e, "Todoist connection failed");
                ok = false;
            }
        },
        None => ok = false,
    }

    match build_actuator(config) {
        Some(client) => match client.verify_connection().await {
            Ok(()) => info!(host = %config.sophos.host, "Sophos connection OK"),
            Err(e) => {
                error!(error = %e, "Sophos connection failed");
                ok = false;
            }
        },
        None => ok = false,
    }

    if ok {
        Ok(())
    } else {
        anyhow::bail!("one or more connectivity checks failed")
    }
}

/// Prints the effective non-secret configuration.
pub fn show_config(config: &Config) {
    println!("timezone:            {}", config.timezone);
    println!("cutoff hour:         {}", config.policy.cutoff_hour);
    match &config.policy.bedtime {
        Some(b) => println!("bedtime window:      {:02}:00-{:02}:00", b.start_hour, b.end_hour),
        None => println!("bedtime window:      disabled"),
    }
    println!("sophos endpoint:     {}:{}", config.sophos.host, config.sophos.port);
    println!("state file:          {}", config.state_file_path.display());
    for individual in &config.roster {
        println!(
            "member {:<12} section={} rule={} auto_disable={}",
            individual.name,
            individual.section_id.as_deref().unwrap_or("-"),
            individual.rule_name.as_deref().unwrap_or("-"),
            individual.auto_disable
        );
    }
    match &config.scheduled_disable {
        Some(s) => println!("scheduled disable:   {} at {}", s.rule_name, s.at_time),
        None => println!("scheduled disable:   none"),
    }
}
