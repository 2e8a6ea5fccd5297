use std::time::{Duration, Instant};

use chatrelay_core::config::ServiceCredentials;
use chatrelay_core::ServiceError;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Authenticated, versioned access to one hosted service.
#[derive(Clone)]
pub struct WatsonTransport {
    service: &'static str,
    client: Client,
    credentials: ServiceCredentials,
}

impl WatsonTransport {
    pub fn new(service: &'static str, client: Client, credentials: ServiceCredentials) -> Self {
        Self { service, client, credentials }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.credentials.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        self.send(self.client.post(&url).json(body)).await
    }

    pub async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        self.send(self.client.get(&url).query(query)).await
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
    {
        let start = Instant::now();
        let response = request
            .query(&[("version", self.credentials.version.as_str())])
            .basic_auth(
                self.credentials.username.expose_secret(),
                Some(self.credentials.password.expose_secret()),
            )
            .send()
            .await
            .map_err(|error| ServiceError::Transport(error.to_string()))?;

        let status = response.status();
        debug!(
            event_name = "upstream.response",
            service = self.service,
            status = status.as_u16(),
            latency_ms = elapsed_millis(start.elapsed()),
            "upstream service responded"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status: status.as_u16(), body });
        }

        response.json::<T>().await.map_err(|error| ServiceError::Decode(error.to_string()))
    }
}

fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
