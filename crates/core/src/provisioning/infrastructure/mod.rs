pub mod http_artifact_fetcher;
pub mod model_cache;
