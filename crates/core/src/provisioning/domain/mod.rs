pub mod artifact_fetcher;
pub mod model_artifact;
