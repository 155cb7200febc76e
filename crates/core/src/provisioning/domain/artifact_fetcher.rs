use std::io::Read;

pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Response head plus a streaming body.
pub struct FetchResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Retrieves a remote artifact. Errors are transport-level only; HTTP
/// error statuses come back as a normal response.
pub trait ArtifactFetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<FetchResponse, FetchError>;
}
