use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chatrelay_core::config::{AppConfig, LoadOptions, ServiceCredentials, DEFAULT_CONFIG_FILES};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Field {
    key: String,
    value: String,
    env_keys: Vec<String>,
}

impl Field {
    fn new(key: &str, value: impl Into<String>, env_keys: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            env_keys: env_keys.iter().map(|env_key| env_key.to_string()).collect(),
        }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            &field.key,
            &field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(&field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let conversation = &config.conversation;
    let discovery_query = &config.discovery.query;

    let mut fields = credential_fields("conversation", &conversation.credentials);
    fields.extend([
        Field::new(
            "conversation.workspace_id",
            &conversation.workspace_id,
            &["CHATRELAY_CONVERSATION_WORKSPACE_ID"],
        ),
        Field::new(
            "conversation.alternate_intents",
            conversation.alternate_intents.to_string(),
            &["CHATRELAY_CONVERSATION_ALTERNATE_INTENTS"],
        ),
        Field::new(
            "conversation.call_discovery_if_irrelevant",
            conversation.call_discovery_if_irrelevant.to_string(),
            &["CHATRELAY_CONVERSATION_CALL_DISCOVERY_IF_IRRELEVANT"],
        ),
        Field::new(
            "conversation.call_discovery_if_low_confidence",
            conversation.call_discovery_if_low_confidence.to_string(),
            &["CHATRELAY_CONVERSATION_CALL_DISCOVERY_IF_LOW_CONFIDENCE"],
        ),
        Field::new(
            "conversation.low_confidence_threshold",
            conversation.low_confidence_threshold.to_string(),
            &["CHATRELAY_CONVERSATION_LOW_CONFIDENCE_THRESHOLD"],
        ),
        Field::new(
            "conversation.call_discovery_context_variable",
            &conversation.call_discovery_context_variable,
            &["CHATRELAY_CONVERSATION_CALL_DISCOVERY_CONTEXT_VARIABLE"],
        ),
    ]);

    fields.extend(credential_fields("nlu", &config.nlu.credentials));
    fields.push(Field::new("nlu.enabled", config.nlu.enabled.to_string(), &["CHATRELAY_NLU_ENABLED"]));
    let features = config.nlu.features.enabled_names();
    fields.push(Field::new(
        "nlu.features",
        if features.is_empty() { "<none>".to_string() } else { features.join(",") },
        &[],
    ));

    fields.extend(credential_fields("tone_analyzer", &config.tone_analyzer.credentials));
    fields.push(Field::new(
        "tone_analyzer.enabled",
        config.tone_analyzer.enabled.to_string(),
        &["CHATRELAY_TONE_ANALYZER_ENABLED"],
    ));

    fields.extend(credential_fields("discovery", &config.discovery.credentials));
    fields.extend([
        Field::new(
            "discovery.environment_id",
            &config.discovery.environment_id,
            &["CHATRELAY_DISCOVERY_ENVIRONMENT_ID"],
        ),
        Field::new(
            "discovery.collection_id",
            &config.discovery.collection_id,
            &["CHATRELAY_DISCOVERY_COLLECTION_ID"],
        ),
    ]);
    for (name, value) in [
        ("count", &discovery_query.count),
        ("offset", &discovery_query.offset),
        ("aggregation", &discovery_query.aggregation),
        ("filter", &discovery_query.filter),
        ("return", &discovery_query.return_fields),
    ] {
        fields.push(Field::new(
            &format!("discovery.query.{name}"),
            value.as_deref().unwrap_or("<unset>"),
            &[],
        ));
    }

    fields.extend([
        Field::new(
            "summarizer.enabled",
            config.summarizer.enabled.to_string(),
            &["CHATRELAY_SUMMARIZER_ENABLED"],
        ),
        Field::new(
            "summarizer.word_count",
            config.summarizer.word_count.to_string(),
            &["CHATRELAY_SUMMARIZER_WORD_COUNT"],
        ),
        Field::new(
            "session.secret_key",
            redact_secret(&config.session.secret_key),
            &["CHATRELAY_SESSION_SECRET_KEY"],
        ),
        Field::new(
            "session.cookie_name",
            &config.session.cookie_name,
            &["CHATRELAY_SESSION_COOKIE_NAME"],
        ),
        Field::new(
            "session.idle_ttl_secs",
            config.session.idle_ttl_secs.to_string(),
            &["CHATRELAY_SESSION_IDLE_TTL_SECS"],
        ),
        Field::new(
            "session.max_sessions",
            config.session.max_sessions.to_string(),
            &["CHATRELAY_SESSION_MAX_SESSIONS"],
        ),
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["CHATRELAY_SERVER_BIND_ADDRESS"],
        ),
        Field::new(
            "server.port",
            config.server.port.to_string(),
            &["CHATRELAY_SERVER_PORT", "PORT"],
        ),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["CHATRELAY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "http.timeout_secs",
            config.http.timeout_secs.to_string(),
            &["CHATRELAY_HTTP_TIMEOUT_SECS"],
        ),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["CHATRELAY_LOGGING_LEVEL", "CHATRELAY_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["CHATRELAY_LOGGING_FORMAT", "CHATRELAY_LOG_FORMAT"],
        ),
    ]);

    fields
}

fn credential_fields(group: &str, credentials: &ServiceCredentials) -> Vec<Field> {
    let prefix = format!("CHATRELAY_{}", group.to_ascii_uppercase());
    let env_key = |suffix: &str| format!("{prefix}_{suffix}");

    vec![
        Field::new(&format!("{group}.url"), &credentials.url, &[env_key("URL").as_str()]),
        Field::new(&format!("{group}.version"), &credentials.version, &[env_key("VERSION").as_str()]),
        Field::new(
            &format!("{group}.username"),
            redact_secret(&credentials.username),
            &[env_key("USERNAME").as_str()],
        ),
        Field::new(
            &format!("{group}.password"),
            redact_secret(&credentials.password),
            &[env_key("PASSWORD").as_str()],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[String],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|env_key| env::var_os(env_key.as_str()).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
