use chatrelay_clients::watson_collaborators;
use chatrelay_core::config::{AppConfig, ConversationConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

const MIN_SESSION_SECRET_CHARS: usize = 32;

const CHECK_NAMES: [&str; 4] =
    ["config_validation", "session_secret_strength", "discovery_trigger_rules", "upstream_clients"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            DoctorCheck::pass(CHECK_NAMES[0], "configuration loaded and validated"),
            check_session_secret(&config),
            check_discovery_trigger_rules(&config.conversation),
            check_upstream_clients(&config),
        ],
        Err(error) => {
            let mut checks = vec![DoctorCheck::fail(CHECK_NAMES[0], error.to_string())];
            checks.extend(CHECK_NAMES[1..].iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
            checks
        }
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_session_secret(config: &AppConfig) -> DoctorCheck {
    let length = config.session.secret_key.expose_secret().chars().count();
    if length >= MIN_SESSION_SECRET_CHARS {
        DoctorCheck::pass(CHECK_NAMES[1], format!("{length} characters"))
    } else {
        DoctorCheck::fail(
            CHECK_NAMES[1],
            format!(
                "session.secret_key has {length} characters; use at least {MIN_SESSION_SECRET_CHARS}"
            ),
        )
    }
}

fn check_discovery_trigger_rules(conversation: &ConversationConfig) -> DoctorCheck {
    let mut triggers = Vec::new();
    if conversation.call_discovery_if_irrelevant {
        triggers.push("irrelevant".to_string());
    }
    if conversation.call_discovery_if_low_confidence {
        triggers.push(format!(
            "low confidence (< {})",
            conversation.low_confidence_threshold
        ));
    }
    if !conversation.call_discovery_context_variable.trim().is_empty() {
        triggers.push(format!(
            "context variable `{}`",
            conversation.call_discovery_context_variable
        ));
    }

    if triggers.is_empty() {
        return DoctorCheck::fail(
            CHECK_NAMES[2],
            "only dialog action markers can trigger discovery; enable a conversation trigger",
        );
    }

    DoctorCheck::pass(CHECK_NAMES[2], format!("discovery triggers: {}", triggers.join(", ")))
}

fn check_upstream_clients(config: &AppConfig) -> DoctorCheck {
    match watson_collaborators(config) {
        Ok(_) => DoctorCheck::pass(CHECK_NAMES[3], "http clients built for all enabled services"),
        Err(error) => DoctorCheck::fail(CHECK_NAMES[3], error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
