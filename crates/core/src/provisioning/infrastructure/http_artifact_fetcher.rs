use std::time::Duration;

use crate::provisioning::domain::artifact_fetcher::{ArtifactFetcher, FetchError, FetchResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Blocking HTTP(S) fetcher. Large model bodies are streamed, so only the
/// connect phase is bounded by a timeout.
pub struct HttpArtifactFetcher {
    client: reqwest::blocking::Client,
}

impl HttpArtifactFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .user_agent(concat!("facelens/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl ArtifactFetcher for HttpArtifactFetcher {
    fn fetch(&self, uri: &str) -> Result<FetchResponse, FetchError> {
        let response = self.client.get(uri).send()?;
        Ok(FetchResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}
