use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::AnalysisFeatures;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub conversation: ConversationConfig,
    pub nlu: NluConfig,
    pub tone_analyzer: ToneAnalyzerConfig,
    pub discovery: DiscoveryConfig,
    pub summarizer: SummarizerConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Endpoint and basic-auth credentials shared by every upstream service.
#[derive(Clone, Debug)]
pub struct ServiceCredentials {
    pub url: String,
    pub version: String,
    pub username: SecretString,
    pub password: SecretString,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub credentials: ServiceCredentials,
    pub workspace_id: String,
    pub alternate_intents: bool,
    pub call_discovery_if_irrelevant: bool,
    pub call_discovery_if_low_confidence: bool,
    pub low_confidence_threshold: f64,
    pub call_discovery_context_variable: String,
}

#[derive(Clone, Debug)]
pub struct NluConfig {
    pub credentials: ServiceCredentials,
    pub enabled: bool,
    pub features: AnalysisFeatures,
}

#[derive(Clone, Debug)]
pub struct ToneAnalyzerConfig {
    pub credentials: ServiceCredentials,
    pub enabled: bool,
}

#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    pub credentials: ServiceCredentials,
    pub environment_id: String,
    pub collection_id: String,
    pub query: DiscoveryQueryConfig,
}

/// Optional query-shaping options; each one is forwarded verbatim when set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryQueryConfig {
    pub count: Option<String>,
    pub offset: Option<String>,
    pub aggregation: Option<String>,
    pub filter: Option<String>,
    #[serde(rename = "return")]
    pub return_fields: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SummarizerConfig {
    pub enabled: bool,
    pub word_count: usize,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub secret_key: SecretString,
    pub cookie_name: String,
    /// Sessions untouched for longer than this are dropped.
    pub idle_ttl_secs: u64,
    /// Upper bound on live sessions; the least recently touched one is evicted first.
    pub max_sessions: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub conversation_workspace_id: Option<String>,
    pub conversation_username: Option<String>,
    pub conversation_password: Option<String>,
    pub discovery_environment_id: Option<String>,
    pub discovery_collection_id: Option<String>,
    pub discovery_username: Option<String>,
    pub discovery_password: Option<String>,
    pub nlu_enabled: Option<bool>,
    pub tone_analyzer_enabled: Option<bool>,
    pub session_secret_key: Option<String>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["chatrelay.toml", "config/chatrelay.toml"];

const MIN_SESSION_SECRET_LEN: usize = 16;

fn service_defaults(url: &str, version: &str) -> ServiceCredentials {
    ServiceCredentials {
        url: url.to_string(),
        version: version.to_string(),
        username: String::new().into(),
        password: String::new().into(),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            conversation: ConversationConfig {
                credentials: service_defaults(
                    "https://gateway.watsonplatform.net/conversation/api",
                    "2017-05-26",
                ),
                workspace_id: String::new(),
                alternate_intents: false,
                call_discovery_if_irrelevant: false,
                call_discovery_if_low_confidence: false,
                low_confidence_threshold: 0.2,
                call_discovery_context_variable: "call_discovery".to_string(),
            },
            nlu: NluConfig {
                credentials: service_defaults(
                    "https://gateway.watsonplatform.net/natural-language-understanding/api",
                    "2017-02-27",
                ),
                enabled: false,
                features: AnalysisFeatures::default(),
            },
            tone_analyzer: ToneAnalyzerConfig {
                credentials: service_defaults(
                    "https://gateway.watsonplatform.net/tone-analyzer/api",
                    "2016-05-19",
                ),
                enabled: false,
            },
            discovery: DiscoveryConfig {
                credentials: service_defaults(
                    "https://gateway.watsonplatform.net/discovery/api",
                    "2017-09-01",
                ),
                environment_id: String::new(),
                collection_id: String::new(),
                query: DiscoveryQueryConfig::default(),
            },
            summarizer: SummarizerConfig { enabled: false, word_count: 50 },
            session: SessionConfig {
                secret_key: String::new().into(),
                cookie_name: "chatrelay_session".to_string(),
                idle_ttl_secs: 1800,
                max_sessions: 10_000,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 5000,
                graceful_shutdown_secs: 15,
            },
            http: HttpConfig { timeout_secs: 30 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(conversation) = patch.conversation {
            conversation.credentials.apply(&mut self.conversation.credentials);
            if let Some(workspace_id) = conversation.workspace_id {
                self.conversation.workspace_id = workspace_id;
            }
            if let Some(alternate_intents) = conversation.alternate_intents {
                self.conversation.alternate_intents = alternate_intents;
            }
            if let Some(flag) = conversation.call_discovery_if_irrelevant {
                self.conversation.call_discovery_if_irrelevant = flag;
            }
            if let Some(flag) = conversation.call_discovery_if_low_confidence {
                self.conversation.call_discovery_if_low_confidence = flag;
            }
            if let Some(threshold) = conversation.low_confidence_threshold {
                self.conversation.low_confidence_threshold = threshold;
            }
            if let Some(variable) = conversation.call_discovery_context_variable {
                self.conversation.call_discovery_context_variable = variable;
            }
        }

        if let Some(nlu) = patch.nlu {
            nlu.credentials.apply(&mut self.nlu.credentials);
            if let Some(enabled) = nlu.enabled {
                self.nlu.enabled = enabled;
            }
            if let Some(features) = nlu.features {
                self.nlu.features = features;
            }
        }

        if let Some(tone_analyzer) = patch.tone_analyzer {
            tone_analyzer.credentials.apply(&mut self.tone_analyzer.credentials);
            if let Some(enabled) = tone_analyzer.enabled {
                self.tone_analyzer.enabled = enabled;
            }
        }

        if let Some(discovery) = patch.discovery {
            discovery.credentials.apply(&mut self.discovery.credentials);
            if let Some(environment_id) = discovery.environment_id {
                self.discovery.environment_id = environment_id;
            }
            if let Some(collection_id) = discovery.collection_id {
                self.discovery.collection_id = collection_id;
            }
            if let Some(query) = discovery.query {
                self.discovery.query = query;
            }
        }

        if let Some(summarizer) = patch.summarizer {
            if let Some(enabled) = summarizer.enabled {
                self.summarizer.enabled = enabled;
            }
            if let Some(word_count) = summarizer.word_count {
                self.summarizer.word_count = word_count;
            }
        }

        if let Some(session) = patch.session {
            if let Some(session_secret_value) = session.secret_key {
                self.session.secret_key = secret_value(session_secret_value);
            }
            if let Some(cookie_name) = session.cookie_name {
                self.session.cookie_name = cookie_name;
            }
            if let Some(idle_ttl_secs) = session.idle_ttl_secs {
                self.session.idle_ttl_secs = idle_ttl_secs;
            }
            if let Some(max_sessions) = session.max_sessions {
                self.session.max_sessions = max_sessions;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(http) = patch.http {
            if let Some(timeout_secs) = http.timeout_secs {
                self.http.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        apply_credentials_env("CHATRELAY_CONVERSATION", &mut self.conversation.credentials);
        if let Some(value) = read_env("CHATRELAY_CONVERSATION_WORKSPACE_ID") {
            self.conversation.workspace_id = value;
        }
        if let Some(value) = read_env("CHATRELAY_CONVERSATION_ALTERNATE_INTENTS") {
            self.conversation.alternate_intents =
                parse_bool("CHATRELAY_CONVERSATION_ALTERNATE_INTENTS", &value)?;
        }
        if let Some(value) = read_env("CHATRELAY_CONVERSATION_CALL_DISCOVERY_IF_IRRELEVANT") {
            self.conversation.call_discovery_if_irrelevant =
                parse_bool("CHATRELAY_CONVERSATION_CALL_DISCOVERY_IF_IRRELEVANT", &value)?;
        }
        if let Some(value) = read_env("CHATRELAY_CONVERSATION_CALL_DISCOVERY_IF_LOW_CONFIDENCE") {
            self.conversation.call_discovery_if_low_confidence =
                parse_bool("CHATRELAY_CONVERSATION_CALL_DISCOVERY_IF_LOW_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("CHATRELAY_CONVERSATION_LOW_CONFIDENCE_THRESHOLD") {
            self.conversation.low_confidence_threshold =
                parse_f64("CHATRELAY_CONVERSATION_LOW_CONFIDENCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("CHATRELAY_CONVERSATION_CALL_DISCOVERY_CONTEXT_VARIABLE") {
            self.conversation.call_discovery_context_variable = value;
        }

        apply_credentials_env("CHATRELAY_NLU", &mut self.nlu.credentials);
        if let Some(value) = read_env("CHATRELAY_NLU_ENABLED") {
            self.nlu.enabled = parse_bool("CHATRELAY_NLU_ENABLED", &value)?;
        }

        apply_credentials_env("CHATRELAY_TONE_ANALYZER", &mut self.tone_analyzer.credentials);
        if let Some(value) = read_env("CHATRELAY_TONE_ANALYZER_ENABLED") {
            self.tone_analyzer.enabled = parse_bool("CHATRELAY_TONE_ANALYZER_ENABLED", &value)?;
        }

        apply_credentials_env("CHATRELAY_DISCOVERY", &mut self.discovery.credentials);
        if let Some(value) = read_env("CHATRELAY_DISCOVERY_ENVIRONMENT_ID") {
            self.discovery.environment_id = value;
        }
        if let Some(value) = read_env("CHATRELAY_DISCOVERY_COLLECTION_ID") {
            self.discovery.collection_id = value;
        }

        if let Some(value) = read_env("CHATRELAY_SUMMARIZER_ENABLED") {
            self.summarizer.enabled = parse_bool("CHATRELAY_SUMMARIZER_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CHATRELAY_SUMMARIZER_WORD_COUNT") {
            self.summarizer.word_count = parse_usize("CHATRELAY_SUMMARIZER_WORD_COUNT", &value)?;
        }

        if let Some(value) = read_env("CHATRELAY_SESSION_SECRET_KEY") {
            self.session.secret_key = secret_value(value);
        }
        if let Some(value) = read_env("CHATRELAY_SESSION_COOKIE_NAME") {
            self.session.cookie_name = value;
        }
        if let Some(value) = read_env("CHATRELAY_SESSION_IDLE_TTL_SECS") {
            self.session.idle_ttl_secs = parse_u64("CHATRELAY_SESSION_IDLE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("CHATRELAY_SESSION_MAX_SESSIONS") {
            self.session.max_sessions = parse_usize("CHATRELAY_SESSION_MAX_SESSIONS", &value)?;
        }

        if let Some(value) = read_env("CHATRELAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port_var = ["CHATRELAY_SERVER_PORT", "PORT"]
            .into_iter()
            .find_map(|key| read_env(key).map(|value| (key, value)));
        if let Some((key, value)) = port_var {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("CHATRELAY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CHATRELAY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CHATRELAY_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = parse_u64("CHATRELAY_HTTP_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("CHATRELAY_LOGGING_LEVEL").or_else(|| read_env("CHATRELAY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CHATRELAY_LOGGING_FORMAT").or_else(|| read_env("CHATRELAY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(workspace_id) = overrides.conversation_workspace_id {
            self.conversation.workspace_id = workspace_id;
        }
        if let Some(username) = overrides.conversation_username {
            self.conversation.credentials.username = secret_value(username);
        }
        if let Some(password) = overrides.conversation_password {
            self.conversation.credentials.password = secret_value(password);
        }
        if let Some(environment_id) = overrides.discovery_environment_id {
            self.discovery.environment_id = environment_id;
        }
        if let Some(collection_id) = overrides.discovery_collection_id {
            self.discovery.collection_id = collection_id;
        }
        if let Some(username) = overrides.discovery_username {
            self.discovery.credentials.username = secret_value(username);
        }
        if let Some(password) = overrides.discovery_password {
            self.discovery.credentials.password = secret_value(password);
        }
        if let Some(enabled) = overrides.nlu_enabled {
            self.nlu.enabled = enabled;
        }
        if let Some(enabled) = overrides.tone_analyzer_enabled {
            self.tone_analyzer.enabled = enabled;
        }
        if let Some(secret_key) = overrides.session_secret_key {
            self.session.secret_key = secret_value(secret_key);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_conversation(&self.conversation)?;
        validate_discovery(&self.discovery)?;
        validate_optional_service("nlu", self.nlu.enabled, &self.nlu.credentials)?;
        validate_optional_service(
            "tone_analyzer",
            self.tone_analyzer.enabled,
            &self.tone_analyzer.credentials,
        )?;
        validate_summarizer(&self.summarizer)?;
        validate_session(&self.session)?;
        validate_server(&self.server)?;
        validate_http(&self.http)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn apply_credentials_env(prefix: &str, credentials: &mut ServiceCredentials) {
    if let Some(value) = read_env(&format!("{prefix}_URL")) {
        credentials.url = value;
    }
    if let Some(value) = read_env(&format!("{prefix}_VERSION")) {
        credentials.version = value;
    }
    if let Some(value) = read_env(&format!("{prefix}_USERNAME")) {
        credentials.username = secret_value(value);
    }
    if let Some(value) = read_env(&format!("{prefix}_PASSWORD")) {
        credentials.password = secret_value(value);
    }
}

fn validate_credentials(group: &str, credentials: &ServiceCredentials) -> Result<(), ConfigError> {
    let url = credentials.url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{group}.url must start with http:// or https://"
        )));
    }
    if credentials.version.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{group}.version is required")));
    }
    if credentials.username.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{group}.username is required. Use the service credentials from your IBM Cloud instance"
        )));
    }
    if credentials.password.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{group}.password is required. Use the service credentials from your IBM Cloud instance"
        )));
    }
    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    validate_credentials("conversation", &conversation.credentials)?;

    if conversation.workspace_id.trim().is_empty() {
        return Err(ConfigError::Validation("conversation.workspace_id is required".to_string()));
    }

    let threshold = conversation.low_confidence_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::Validation(
            "conversation.low_confidence_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }

    Ok(())
}

fn validate_discovery(discovery: &DiscoveryConfig) -> Result<(), ConfigError> {
    validate_credentials("discovery", &discovery.credentials)?;

    if discovery.environment_id.trim().is_empty() {
        return Err(ConfigError::Validation("discovery.environment_id is required".to_string()));
    }
    if discovery.collection_id.trim().is_empty() {
        return Err(ConfigError::Validation("discovery.collection_id is required".to_string()));
    }

    Ok(())
}

fn validate_optional_service(
    group: &str,
    enabled: bool,
    credentials: &ServiceCredentials,
) -> Result<(), ConfigError> {
    if enabled {
        validate_credentials(group, credentials)?;
    }
    Ok(())
}

fn validate_summarizer(summarizer: &SummarizerConfig) -> Result<(), ConfigError> {
    if summarizer.enabled && summarizer.word_count == 0 {
        return Err(ConfigError::Validation(
            "summarizer.word_count must be greater than zero when summarization is enabled"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    let secret = session.secret_key.expose_secret();
    if secret.trim().len() < MIN_SESSION_SECRET_LEN {
        return Err(ConfigError::Validation(format!(
            "session.secret_key must be at least {MIN_SESSION_SECRET_LEN} characters"
        )));
    }

    let cookie_name = session.cookie_name.trim();
    let valid_name = !cookie_name.is_empty()
        && cookie_name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if !valid_name {
        return Err(ConfigError::Validation(
            "session.cookie_name must be non-empty and use only [A-Za-z0-9_-]".to_string(),
        ));
    }

    if session.idle_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.idle_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if session.max_sessions == 0 {
        return Err(ConfigError::Validation(
            "session.max_sessions must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_http(http: &HttpConfig) -> Result<(), ConfigError> {
    if http.timeout_secs == 0 || http.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "http.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    conversation: Option<ConversationPatch>,
    nlu: Option<NluPatch>,
    tone_analyzer: Option<ToneAnalyzerPatch>,
    discovery: Option<DiscoveryPatch>,
    summarizer: Option<SummarizerPatch>,
    session: Option<SessionPatch>,
    server: Option<ServerPatch>,
    http: Option<HttpPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsPatch {
    url: Option<String>,
    version: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl CredentialsPatch {
    fn apply(self, credentials: &mut ServiceCredentials) {
        if let Some(url) = self.url {
            credentials.url = url;
        }
        if let Some(version) = self.version {
            credentials.version = version;
        }
        if let Some(username) = self.username {
            credentials.username = secret_value(username);
        }
        if let Some(password) = self.password {
            credentials.password = secret_value(password);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    #[serde(flatten)]
    credentials: CredentialsPatch,
    workspace_id: Option<String>,
    alternate_intents: Option<bool>,
    call_discovery_if_irrelevant: Option<bool>,
    call_discovery_if_low_confidence: Option<bool>,
    low_confidence_threshold: Option<f64>,
    call_discovery_context_variable: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NluPatch {
    #[serde(flatten)]
    credentials: CredentialsPatch,
    enabled: Option<bool>,
    features: Option<AnalysisFeatures>,
}

#[derive(Debug, Default, Deserialize)]
struct ToneAnalyzerPatch {
    #[serde(flatten)]
    credentials: CredentialsPatch,
    enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscoveryPatch {
    #[serde(flatten)]
    credentials: CredentialsPatch,
    environment_id: Option<String>,
    collection_id: Option<String>,
    query: Option<DiscoveryQueryConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct SummarizerPatch {
    enabled: Option<bool>,
    word_count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    secret_key: Option<String>,
    cookie_name: Option<String>,
    idle_ttl_secs: Option<u64>,
    max_sessions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpPatch {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED_VARS: [(&str, &str); 8] = [
        ("CHATRELAY_CONVERSATION_USERNAME", "conv-user"),
        ("CHATRELAY_CONVERSATION_PASSWORD", "conv-pass"),
        ("CHATRELAY_CONVERSATION_WORKSPACE_ID", "ws-1"),
        ("CHATRELAY_DISCOVERY_USERNAME", "disc-user"),
        ("CHATRELAY_DISCOVERY_PASSWORD", "disc-pass"),
        ("CHATRELAY_DISCOVERY_ENVIRONMENT_ID", "env-1"),
        ("CHATRELAY_DISCOVERY_COLLECTION_ID", "coll-1"),
        ("CHATRELAY_SESSION_SECRET_KEY", "0123456789abcdef0123"),
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        for (key, value) in REQUIRED_VARS {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn clear_required_vars() {
        let keys: Vec<&str> = REQUIRED_VARS.iter().map(|(key, _)| *key).collect();
        clear_vars(&keys);
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation_and_nested_groups() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CONVERSATION_PASSWORD", "from-env-password");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("chatrelay.toml");
            fs::write(
                &path,
                r#"
[conversation]
username = "conv-user"
password = "${TEST_CONVERSATION_PASSWORD}"
workspace_id = "ws-file"
call_discovery_if_irrelevant = true
call_discovery_context_variable = "needs_search"

[nlu]
enabled = false

[nlu.features]
keywords = true
semanticroles = true

[discovery]
username = "disc-user"
password = "disc-pass"
environment_id = "env-file"
collection_id = "coll-file"

[discovery.query]
count = "5"
return = "title,contentHtml"

[summarizer]
enabled = true
word_count = 25

[session]
secret_key = "a-long-enough-session-secret"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.conversation.credentials.password.expose_secret() == "from-env-password",
                "password should be interpolated from environment",
            )?;
            ensure(config.conversation.workspace_id == "ws-file", "workspace id from file")?;
            ensure(config.conversation.call_discovery_if_irrelevant, "irrelevant flag from file")?;
            ensure(
                config.conversation.call_discovery_context_variable == "needs_search",
                "context variable name from file",
            )?;
            ensure(config.nlu.features.keywords, "keywords feature from file")?;
            ensure(config.nlu.features.semantic_roles, "semanticroles alias should be accepted")?;
            ensure(!config.nlu.features.sentiment, "unset features stay disabled")?;
            ensure(config.discovery.query.count.as_deref() == Some("5"), "count from file")?;
            ensure(
                config.discovery.query.return_fields.as_deref() == Some("title,contentHtml"),
                "return fields from file",
            )?;
            ensure(config.discovery.query.filter.is_none(), "unset query options stay unset")?;
            ensure(config.summarizer.enabled && config.summarizer.word_count == 25, "summarizer")?;
            Ok(())
        })();

        clear_vars(&["TEST_CONVERSATION_PASSWORD"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("CHATRELAY_LOG_LEVEL", "warn");
        env::set_var("CHATRELAY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_required_vars();
        clear_vars(&["CHATRELAY_LOG_LEVEL", "CHATRELAY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn port_defaults_to_5000_and_honours_port_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.server.port == 5000, "default port should be 5000")?;
            ensure(config.server.bind_address == "0.0.0.0", "default bind should be all interfaces")?;

            env::set_var("PORT", "8081");
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.server.port == 8081, "PORT should override the default port")?;

            env::set_var("CHATRELAY_SERVER_PORT", "9090");
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.server.port == 9090, "prefixed port should win over PORT")?;
            Ok(())
        })();

        clear_required_vars();
        clear_vars(&["PORT", "CHATRELAY_SERVER_PORT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("CHATRELAY_CONVERSATION_WORKSPACE_ID", "ws-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("chatrelay.toml");
            fs::write(
                &path,
                r#"
[conversation]
workspace_id = "ws-from-file"

[discovery]
environment_id = "env-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    discovery_environment_id: Some("env-from-override".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.discovery.environment_id == "env-from-override",
                "override environment id should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.conversation.workspace_id == "ws-from-env",
                "env workspace id should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_required_vars();
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("CHATRELAY_CONVERSATION_WORKSPACE_ID");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("conversation.workspace_id")
            );
            ensure(has_message, "validation failure should mention conversation.workspace_id")
        })();

        clear_required_vars();
        result
    }

    #[test]
    fn enabled_services_require_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("CHATRELAY_TONE_ANALYZER_ENABLED", "true");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("tone analyzer without credentials should fail".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("tone_analyzer.username")
                ),
                "validation failure should mention tone_analyzer.username",
            )
        })();

        clear_required_vars();
        clear_vars(&["CHATRELAY_TONE_ANALYZER_ENABLED"]);
        result
    }

    #[test]
    fn short_session_secret_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();

        let result = (|| -> Result<(), String> {
            let outcome = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    session_secret_key: Some("short".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            });
            ensure(
                matches!(
                    outcome,
                    Err(ConfigError::Validation(ref message)) if message.contains("session.secret_key")
                ),
                "short session secret should fail validation",
            )
        })();

        clear_required_vars();
        result
    }

    #[test]
    fn session_limits_come_from_env_and_must_be_positive() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("CHATRELAY_SESSION_IDLE_TTL_SECS", "600");
        env::set_var("CHATRELAY_SESSION_MAX_SESSIONS", "250");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default()).map_err(|e| e.to_string())?;
            ensure(config.session.idle_ttl_secs == 600, "idle ttl from env")?;
            ensure(config.session.max_sessions == 250, "max sessions from env")?;

            env::set_var("CHATRELAY_SESSION_MAX_SESSIONS", "0");
            let outcome = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(
                    outcome,
                    Err(ConfigError::Validation(ref message)) if message.contains("session.max_sessions")
                ),
                "zero max sessions should fail validation",
            )
        })();

        clear_required_vars();
        clear_vars(&["CHATRELAY_SESSION_IDLE_TTL_SECS", "CHATRELAY_SESSION_MAX_SESSIONS"]);
        result
    }

    #[test]
    fn invalid_boolean_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("CHATRELAY_NLU_ENABLED", "sometimes");

        let result = (|| -> Result<(), String> {
            let outcome = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(
                    outcome,
                    Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "CHATRELAY_NLU_ENABLED"
                ),
                "invalid boolean should name the offending variable",
            )
        })();

        clear_required_vars();
        clear_vars(&["CHATRELAY_NLU_ENABLED"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("CHATRELAY_CONVERSATION_PASSWORD", "conv-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("conv-secret-value"),
                "debug output should not contain the conversation password",
            )?;
            ensure(
                !debug.contains("0123456789abcdef0123"),
                "debug output should not contain the session secret",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_required_vars();
        result
    }
}
