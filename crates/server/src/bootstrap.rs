use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chatrelay_clients::{watson_collaborators, ClientError};
use chatrelay_core::config::{AppConfig, ConfigError, LoadOptions};
use chatrelay_core::{AugmentSettings, Augmenter, Collaborators};
use thiserror::Error;
use tracing::info;

use crate::chat::{self, ChatState};
use crate::health::{self, HealthState};
use crate::session::{InMemorySessionStore, SessionCookie, SessionError};

pub struct Application {
    pub config: AppConfig,
    pub chat: ChatState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("upstream client setup failed: {0}")]
    Clients(#[from] ClientError),
    #[error("session setup failed: {0}")]
    Session(#[from] SessionError),
    #[error("template setup failed: {0}")]
    Templates(#[from] tera::Error),
}

impl Application {
    pub fn router(&self) -> Router {
        chat::router(self.chat.clone())
            .merge(health::router(HealthState::new(self.chat.augmenter.settings().clone())))
    }
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let collaborators = watson_collaborators(&config)?;
    let application = assemble(config, collaborators)?;

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        nlu_enabled = application.config.nlu.enabled,
        tone_enabled = application.config.tone_analyzer.enabled,
        summarizer_enabled = application.config.summarizer.enabled,
        "upstream clients and session store initialized"
    );
    Ok(application)
}

/// Wires an application around an explicit collaborator set.
pub fn assemble(
    config: AppConfig,
    collaborators: Collaborators,
) -> Result<Application, BootstrapError> {
    let augmenter = Augmenter::new(AugmentSettings::from_config(&config), collaborators);
    let cookie = SessionCookie::new(config.session.cookie_name.clone(), &config.session.secret_key)?;

    let chat = ChatState {
        augmenter: Arc::new(augmenter),
        sessions: Arc::new(InMemorySessionStore::new(
            Duration::from_secs(config.session.idle_ttl_secs),
            config.session.max_sessions,
        )),
        cookie,
        templates: Arc::new(chat::templates()?),
    };
    Ok(Application { config, chat })
}
