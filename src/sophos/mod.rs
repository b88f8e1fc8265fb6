//! Sophos firewall (SFOS) XML API client for rule status management.
//!
//! The appliance speaks XML over HTTPS on its web-admin port, with the
//! credentials embedded in every request. Only the two calls the engine
//! needs are implemented: read a rule's enabled state and drive it to a
//! target state. `set_rule_status` checks the current state first so a rule
//! already in the target state is a reported success with no write.

use crate::engine::RuleActuator;
use crate::error::FirewallError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 4444;

pub struct SophosClient {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
}

impl SophosClient {
    pub fn new(
        host: &str,
        api_user: &str,
        api_password: &str,
        port: u16,
        verify_tls: bool,
    ) -> Result<Self, FirewallError> {
        if host.trim().is_empty() || api_user.trim().is_empty() || api_password.is_empty() {
            return Err(FirewallError::Configuration(
                "host, api user, and api password are required".into(),
            ));
        }
        let endpoint = format!("https://{host}:{port}/webconsole/APIController");
        Self::with_endpoint(&endpoint, api_user, api_password, verify_tls)
    }

    /// Constructor taking a full endpoint URL; tests point this at a local
    /// mock server.
    pub fn with_endpoint(
        endpoint: &str,
        api_user: &str,
        api_password: &str,
        verify_tls: bool,
    ) -> Result<Self, FirewallError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            // Appliances ship self-signed certs; verification is opt-in.
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            username: api_user.to_string(),
            password: api_password.to_string(),
        })
    }

    fn request_xml(&self, inner: &str) -> String {
        format!(
            "<Request><Login><Username>{}</Username><Password>{}</Password></Login>{inner}</Request>",
            xml_escape(&self.username),
            xml_escape(&self.password),
        )
    }

    async fn call(&self, inner: &str) -> Result<String, FirewallError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("reqxml", self.request_xml(inner))])
            .send()
            .await
            .map_err(|e| FirewallError::Connection {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FirewallError::Api {
                message: format!("http status {}", response.status()),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FirewallError::Connection {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })
    }

    /// Login probe; used by the `check` subcommand, not the check cycle.
    pub async fn verify_connection(&self) -> Result<(), FirewallError> {
        let body = self.call("").await?;
        if body.contains("Authentication Successful") {
            debug!("sophos connection test successful");
            Ok(())
        } else {
            Err(FirewallError::Connection {
                endpoint: self.endpoint.clone(),
                message: format!(
                    "unexpected login response: {}",
                    tag_text(&body, "status").unwrap_or("no status in response")
                ),
            })
        }
    }

    async fn fetch_rule_element(&self, rule_name: &str) -> Result<Option<String>, FirewallError> {
        let inner = format!(
            "<Get><FirewallRule><Filter><key name=\"Name\" criteria=\"=\">{}</key></Filter></FirewallRule></Get>",
            xml_escape(rule_name),
        );
        let body = self.call(&inner).await?;

        if body.contains("Authentication Failure") {
            return Err(FirewallError::Connection {
                endpoint: self.endpoint.clone(),
                message: "authentication failure".into(),
            });
        }

        // A miss still carries a FirewallRule element, holding only a
        // "Number of records Zero." status.
        Ok(element_slice(&body, "FirewallRule")
            .filter(|element| !element.contains("Number of records Zero"))
            .map(ToString::to_string))
    }

    async fn submit_update(
        &self,
        rule_name: &str,
        rule_element: &str,
    ) -> Result<(), FirewallError> {
        let inner = format!("<Set operation=\"update\">{rule_element}</Set>");
        let body = self.call(&inner).await?;

        match status_code_and_text(&body) {
            Some((code, text)) if code.starts_with('2') => {
                info!(rule = rule_name, status = %text, "rule update accepted");
                Ok(())
            }
            Some((code, text)) => Err(FirewallError::Api {
                message: format!("update of rule '{rule_name}' rejected: code {code}: {text}"),
            }),
            None => Err(FirewallError::Api {
                message: format!("update of rule '{rule_name}': no status in response"),
            }),
        }
    }
}

#[async_trait]
impl RuleActuator for SophosClient {
    async fn get_rule_status(&self, rule_name: &str) -> Result<Option<bool>, FirewallError> {
        if rule_name.trim().is_empty() {
            return Err(FirewallError::Configuration("rule name cannot be empty".into()));
        }

        let Some(rule) = self.fetch_rule_element(rule_name).await? else {
            return Err(FirewallError::RuleNotFound(rule_name.to_string()));
        };

        match tag_text(&rule, "Status") {
            Some(s) if s.eq_ignore_ascii_case("enable") => Ok(Some(true)),
            Some(s) if s.eq_ignore_ascii_case("disable") => Ok(Some(false)),
            Some(s) => {
                warn!(rule = rule_name, status = s, "rule has ambiguous status");
                Ok(None)
            }
            None => {
                warn!(rule = rule_name, "rule response carries no status field");
                Ok(None)
            }
        }
    }

    async fn set_rule_status(
        &self,
        rule_name: &str,
        target_enabled: bool,
    ) -> Result<bool, FirewallError> {
        if rule_name.trim().is_empty() {
            return Err(FirewallError::Configuration("rule name cannot be empty".into()));
        }

        let target = if target_enabled { "Enable" } else { "Disable" };
        debug!(rule = rule_name, target, "setting rule status");

        let Some(rule) = self.fetch_rule_element(rule_name).await? else {
            warn!(rule = rule_name, "rule not found; cannot set status");
            return Ok(false);
        };

        let current = tag_text(&rule, "Status");
        if current.is_some_and(|s| s.eq_ignore_ascii_case(target)) {
            info!(rule = rule_name, target, "rule already in desired state; no action needed");
            return Ok(true);
        }

        let updated = match replace_tag_text(&rule, "Status", target) {
            Some(updated) => updated,
            None => {
                return Err(FirewallError::Api {
                    message: format!("rule '{rule_name}' has no status field to update"),
                });
            }
        };

        info!(
            rule = rule_name,
            current = current.unwrap_or("unknown"),
            target,
            "rule needs state change; submitting update"
        );
        self.submit_update(rule_name, &updated).await?;
        Ok(true)
    }
}

// ─── Minimal XML helpers ────────────────────────────────────────────────────
// The SFOS responses are flat enough that targeted tag extraction beats a
// full XML tree; only the fields the client reads are touched.

fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Text content of the first `<tag>...</tag>` occurrence.
fn tag_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].trim())
}

/// The first `<tag ...>...</tag>` element, inclusive of its own tags.
fn element_slice<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open_plain = format!("<{tag}>");
    let open_attr = format!("<{tag} ");
    let close = format!("</{tag}>");

    let start = xml.find(&open_plain).or_else(|| xml.find(&open_attr))?;
    let end = xml[start..].find(&close)? + start + close.len();
    Some(&xml[start..end])
}

/// Replaces the text of the first `<tag>...</tag>` occurrence.
fn replace_tag_text(xml: &str, tag: &str, new_text: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(format!("{}{new_text}{}", &xml[..start], &xml[end..]))
}

/// `code` attribute and text of the transaction `<Status code="...">...</Status>`.
fn status_code_and_text(xml: &str) -> Option<(String, String)> {
    let marker = "<Status code=\"";
    let start = xml.find(marker)? + marker.len();
    let code_end = xml[start..].find('"')? + start;
    let code = xml[start..code_end].to_string();

    let text_start = xml[code_end..].find('>')? + code_end + 1;
    let text_end = xml[text_start..].find("</Status>")? + text_start;
    Some((code, xml[text_start..text_end].trim().to_string()))
}
