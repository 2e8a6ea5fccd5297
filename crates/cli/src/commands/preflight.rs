use chatrelay_clients::watson_collaborators;
use chatrelay_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

const CONFIG_FAILURE_EXIT: u8 = 2;
const CLIENT_FAILURE_EXIT: u8 = 3;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "preflight",
                "config_validation",
                error.to_string(),
                CONFIG_FAILURE_EXIT,
            );
        }
    };

    if let Err(error) = watson_collaborators(&config) {
        return CommandResult::failure(
            "preflight",
            "client_setup",
            error.to_string(),
            CLIENT_FAILURE_EXIT,
        );
    }

    let toggle = |enabled: bool| if enabled { "enabled" } else { "disabled" };
    CommandResult::success(
        "preflight",
        format!(
            "ready to serve on {}:{}",
            config.server.bind_address, config.server.port
        ),
        vec![
            format!("conversation workspace `{}`", config.conversation.workspace_id),
            format!(
                "discovery collection `{}/{}`",
                config.discovery.environment_id, config.discovery.collection_id
            ),
            format!("natural language understanding {}", toggle(config.nlu.enabled)),
            format!("tone analyzer {}", toggle(config.tone_analyzer.enabled)),
            format!(
                "summarizer {} ({} words)",
                toggle(config.summarizer.enabled),
                config.summarizer.word_count
            ),
        ],
    )
}
