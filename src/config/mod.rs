//! Environment-variable configuration.
//!
//! All settings come from the process environment (the invoking scheduler
//! owns the `.env` equivalent). Required settings missing or invalid make
//! startup fail before any rule is touched; per-individual settings are
//! optional at load time so a partially configured roster member is skipped
//! by the engine instead of failing the run.

use crate::engine::{BedtimeWindow, TimeWindowPolicy};
use crate::error::ConfigError;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

const DEFAULT_ROSTER: &str = "daniel,sophie";
const DEFAULT_TIMEZONE: &str = "Europe/London";
const DEFAULT_CUTOFF_HOUR: u32 = 14;
const DEFAULT_BEDTIME_START_HOUR: u32 = 20;
const DEFAULT_BEDTIME_END_HOUR: u32 = 7;
const DEFAULT_STATE_FILE: &str = "daily_completion_state.json";
const DEFAULT_SCHEDULED_DISABLE_TIME: &str = "19:30";

/// One monitored roster member. `section_id`/`rule_name` stay optional here;
/// the engine logs and skips a member missing either.
#[derive(Debug, Clone)]
pub struct MonitoredIndividual {
    pub name: String,
    /// Todoist section id holding this member's chores.
    pub section_id: Option<String>,
    /// Sophos rule gating this member's internet access.
    pub rule_name: Option<String>,
    /// When false, every auto-disable (internet-on) path is suppressed for
    /// this member; deny paths still apply.
    pub auto_disable: bool,
}

#[derive(Debug, Clone)]
pub struct SophosSettings {
    pub host: String,
    pub api_user: String,
    pub api_password: String,
    pub port: u16,
    pub verify_tls: bool,
}

#[derive(Debug, Clone)]
pub struct ScheduledDisable {
    pub rule_name: String,
    /// `HH:MM`; validated inside the enforcer, not here, so a bad value
    /// skips that one action instead of failing startup.
    pub at_time: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub todoist_api_key: String,
    pub todoist_base_url: Option<String>,
    pub sophos: SophosSettings,
    pub timezone: Tz,
    pub policy: TimeWindowPolicy,
    pub state_file_path: PathBuf,
    pub roster: Vec<MonitoredIndividual>,
    pub scheduled_disable: Option<ScheduledDisable>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parses configuration from a name→value lookup. Separated from the
    /// process environment so tests can feed maps without mutating env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| -> Option<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| -> Result<String, ConfigError> {
            get(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()))
        };

        let todoist_api_key = required("TODOIST_API_KEY")?;
        let sophos = SophosSettings {
            host: required("SOPHOS_HOST")?,
            api_user: required("SOPHOS_API_USER")?,
            api_password: required("SOPHOS_API_PASSWORD")?,
            port: parse_or("SOPHOS_PORT", get("SOPHOS_PORT"), crate::sophos::DEFAULT_PORT)?,
            verify_tls: parse_bool_or("SOPHOS_VERIFY_TLS", get("SOPHOS_VERIFY_TLS"), false)?,
        };

        let timezone_raw = get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone =
            Tz::from_str(&timezone_raw).map_err(|_| ConfigError::UnknownTimezone(timezone_raw))?;

        let cutoff_hour = parse_hour("CUTOFF_HOUR", get("CUTOFF_HOUR"), DEFAULT_CUTOFF_HOUR)?;
        let bedtime_start = parse_hour(
            "BEDTIME_START_HOUR",
            get("BEDTIME_START_HOUR"),
            DEFAULT_BEDTIME_START_HOUR,
        )?;
        let bedtime_end = parse_hour(
            "BEDTIME_END_HOUR",
            get("BEDTIME_END_HOUR"),
            DEFAULT_BEDTIME_END_HOUR,
        )?;
        // Equal start and end means no bedtime window at all.
        let bedtime = (bedtime_start != bedtime_end).then_some(BedtimeWindow {
            start_hour: bedtime_start,
            end_hour: bedtime_end,
        });

        let roster_raw = get("ROSTER").unwrap_or_else(|| DEFAULT_ROSTER.to_string());
        let mut roster = Vec::new();
        for name in roster_raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let suffix = env_suffix(name);
            roster.push(MonitoredIndividual {
                name: name.to_string(),
                section_id: get(&format!("TODOIST_SECTION_ID_{suffix}")),
                rule_name: get(&format!("SOPHOS_RULE_NAME_{suffix}")),
                auto_disable: parse_bool_or(
                    &format!("AUTO_DISABLE_{suffix}"),
                    get(&format!("AUTO_DISABLE_{suffix}")),
                    true,
                )?,
            });
        }

        let scheduled_disable = get("SCHEDULED_DISABLE_RULE_NAME").map(|rule_name| ScheduledDisable {
            rule_name,
            at_time: get("SCHEDULED_DISABLE_TIME")
                .unwrap_or_else(|| DEFAULT_SCHEDULED_DISABLE_TIME.to_string()),
        });

        Ok(Self {
            todoist_api_key,
            todoist_base_url: get("TODOIST_BASE_URL"),
            sophos,
            timezone,
            policy: TimeWindowPolicy {
                cutoff_hour,
                bedtime,
            },
            state_file_path: get("STATE_FILE_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_STATE_FILE), PathBuf::from),
            roster,
            scheduled_disable,
        })
    }

    /// Logs the non-secret settings.
    pub fn log_summary(&self) {
        info!(
            timezone = %self.timezone,
            cutoff_hour = self.policy.cutoff_hour,
            bedtime = ?self.policy.bedtime,
            sophos_host = %self.sophos.host,
            sophos_port = self.sophos.port,
            state_file = %self.state_file_path.display(),
            "configuration loaded"
        );
        for individual in &self.roster {
            info!(
                name = %individual.name,
                section_id = individual.section_id.as_deref().unwrap_or("not set"),
                rule = individual.rule_name.as_deref().unwrap_or("not set"),
                auto_disable = individual.auto_disable,
                "roster member"
            );
        }
        match &self.scheduled_disable {
            Some(sched) => info!(
                rule = %sched.rule_name,
                at = %sched.at_time,
                "scheduled daily disable configured"
            ),
            None => info!("no scheduled daily disable configured"),
        }
    }
}

/// `ROSTER` names become env-var suffixes: uppercased, non-alphanumeric
/// mapped to `_` (`"Mary-Jane"` → `MARY_JANE`).
fn env_suffix(name: &str) -> String {
    name.to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn parse_or<T: FromStr>(var: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            var: var.to_string(),
            message: format!("'{raw}' is not a valid number"),
        }),
    }
}

fn parse_hour(var: &str, value: Option<String>, default: u32) -> Result<u32, ConfigError> {
    let hour: u32 = parse_or(var, value, default)?;
    if hour > 23 {
        return Err(ConfigError::Invalid {
            var: var.to_string(),
            message: format!("hour {hour} out of range 0-23"),
        });
    }
    Ok(hour)
}

fn parse_bool_or(var: &str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref() {
        None => Ok(default),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var: var.to_string(),
                message: format!("'{raw}' is not a boolean"),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<String, String> {
        [
            ("TODOIST_API_KEY", "tok"),
            ("SOPHOS_HOST", "fw.local"),
            ("SOPHOS_API_USER", "api"),
            ("SOPHOS_API_PASSWORD", "secret"),
            ("TODOIST_SECTION_ID_DANIEL", "111"),
            ("SOPHOS_RULE_NAME_DANIEL", "Daniel Block"),
            ("TODOIST_SECTION_ID_SOPHIE", "222"),
            ("SOPHOS_RULE_NAME_SOPHIE", "Sophie Block"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_applied() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.timezone, chrono_tz::Europe::London);
        assert_eq!(config.policy.cutoff_hour, 14);
        assert_eq!(
            config.policy.bedtime,
            Some(BedtimeWindow {
                start_hour: 20,
                end_hour: 7
            })
        );
        assert_eq!(config.sophos.port, 4444);
        assert!(!config.sophos.verify_tls);
        assert_eq!(config.roster.len(), 2);
        assert!(config.roster.iter().all(|i| i.auto_disable));
        assert!(config.scheduled_disable.is_none());
    }

    #[test]
    fn missing_required_var_fails() {
        let mut vars = base_vars();
        vars.remove("TODOIST_API_KEY");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::MissingVar(v)) if v == "TODOIST_API_KEY"
        ));
    }

    #[test]
    fn blank_required_var_counts_as_missing() {
        let mut vars = base_vars();
        vars.insert("SOPHOS_HOST".into(), "   ".into());
        assert!(matches!(load(&vars), Err(ConfigError::MissingVar(_))));
    }

    #[test]
    fn invalid_cutoff_hour_fails() {
        let mut vars = base_vars();
        vars.insert("CUTOFF_HOUR".into(), "24".into());
        assert!(load(&vars).is_err());
        vars.insert("CUTOFF_HOUR".into(), "teatime".into());
        assert!(load(&vars).is_err());
    }

    #[test]
    fn unknown_timezone_fails() {
        let mut vars = base_vars();
        vars.insert("TIMEZONE".into(), "Mars/Olympus".into());
        assert!(matches!(load(&vars), Err(ConfigError::UnknownTimezone(_))));
    }

    #[test]
    fn auto_disable_flag_parsed_per_member() {
        let mut vars = base_vars();
        vars.insert("AUTO_DISABLE_SOPHIE".into(), "false".into());
        let config = load(&vars).unwrap();
        let sophie = config.roster.iter().find(|i| i.name == "sophie").unwrap();
        assert!(!sophie.auto_disable);
        let daniel = config.roster.iter().find(|i| i.name == "daniel").unwrap();
        assert!(daniel.auto_disable);
    }

    #[test]
    fn member_missing_section_stays_in_roster() {
        let mut vars = base_vars();
        vars.remove("TODOIST_SECTION_ID_SOPHIE");
        let config = load(&vars).unwrap();
        let sophie = config.roster.iter().find(|i| i.name == "sophie").unwrap();
        assert!(sophie.section_id.is_none());
    }

    #[test]
    fn equal_bedtime_hours_disable_window() {
        let mut vars = base_vars();
        vars.insert("BEDTIME_START_HOUR".into(), "8".into());
        vars.insert("BEDTIME_END_HOUR".into(), "8".into());
        let config = load(&vars).unwrap();
        assert!(config.policy.bedtime.is_none());
    }

    #[test]
    fn scheduled_disable_defaults_time() {
        let mut vars = base_vars();
        vars.insert(
            "SCHEDULED_DISABLE_RULE_NAME".into(),
            "Manual Sophie - Allow".into(),
        );
        let config = load(&vars).unwrap();
        let sched = config.scheduled_disable.unwrap();
        assert_eq!(sched.at_time, "19:30");
    }

    #[test]
    fn roster_env_suffix_normalization() {
        assert_eq!(env_suffix("daniel"), "DANIEL");
        assert_eq!(env_suffix("Mary-Jane"), "MARY_JANE");
    }
}
