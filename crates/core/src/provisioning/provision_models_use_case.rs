//! Downloads every model artifact into a target directory, one at a time.
//!
//! Each artifact succeeds or fails on its own: an error status or a broken
//! transfer is reported for that artifact and the batch moves on. A file
//! under the artifact's final name only ever appears complete.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::provisioning::domain::artifact_fetcher::{ArtifactFetcher, FetchError};
use crate::provisioning::domain::model_artifact::ModelArtifact;

#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("failed to create model directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request failed for {uri}: {source}")]
    Request {
        uri: String,
        #[source]
        source: FetchError,
    },
    #[error("{uri} answered with status {status}")]
    Status { uri: String, status: u16 },
    #[error("transfer of {uri} into {} failed: {source}", path.display())]
    Transfer {
        uri: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move finished download into {}: {source}", path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(artifact_name, bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(&str, u64, u64) + Send + Sync>;

#[derive(Debug)]
pub enum ArtifactOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    Skipped { path: PathBuf },
    Failed(ProvisioningError),
}

/// Per-artifact outcomes, in the order the artifacts were given.
#[derive(Debug, Default)]
pub struct ProvisionReport {
    outcomes: Vec<(ModelArtifact, ArtifactOutcome)>,
}

impl ProvisionReport {
    pub fn outcomes(&self) -> &[(ModelArtifact, ArtifactOutcome)] {
        &self.outcomes
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ModelArtifact, &ProvisioningError)> {
        self.outcomes.iter().filter_map(|(artifact, outcome)| match outcome {
            ArtifactOutcome::Failed(e) => Some((artifact, e)),
            _ => None,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

pub struct ProvisionModelsUseCase {
    fetcher: Box<dyn ArtifactFetcher>,
    target_dir: PathBuf,
    artifacts: Vec<ModelArtifact>,
    skip_existing: bool,
    on_progress: Option<ProgressFn>,
}

impl ProvisionModelsUseCase {
    pub fn new(
        fetcher: Box<dyn ArtifactFetcher>,
        target_dir: PathBuf,
        artifacts: Vec<ModelArtifact>,
    ) -> Self {
        Self {
            fetcher,
            target_dir,
            artifacts,
            skip_existing: false,
            on_progress: None,
        }
    }

    /// Leave artifacts whose final file already exists untouched.
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn on_progress(mut self, progress: ProgressFn) -> Self {
        self.on_progress = Some(progress);
        self
    }

    /// Attempt every artifact in order.
    ///
    /// Only an unusable target directory aborts the batch; per-artifact
    /// failures are logged and recorded in the report.
    pub fn provision_all(&self) -> Result<ProvisionReport, ProvisioningError> {
        fs::create_dir_all(&self.target_dir).map_err(|source| ProvisioningError::CreateDir {
            path: self.target_dir.clone(),
            source,
        })?;

        let mut report = ProvisionReport::default();
        for artifact in &self.artifacts {
            let outcome = match self.provision_one(artifact) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Model {}: {e}", artifact.name);
                    ArtifactOutcome::Failed(e)
                }
            };
            report.outcomes.push((artifact.clone(), outcome));
        }
        Ok(report)
    }

    fn provision_one(&self, artifact: &ModelArtifact) -> Result<ArtifactOutcome, ProvisioningError> {
        let dest = self.target_dir.join(&artifact.name);
        if self.skip_existing && dest.is_file() {
            log::info!("Model {} already present, skipping", artifact.name);
            return Ok(ArtifactOutcome::Skipped { path: dest });
        }

        let response = self
            .fetcher
            .fetch(&artifact.source_uri)
            .map_err(|source| ProvisioningError::Request {
                uri: artifact.source_uri.clone(),
                source,
            })?;
        if !response.is_success() {
            return Err(ProvisioningError::Status {
                uri: artifact.source_uri.clone(),
                status: response.status,
            });
        }

        let temp_path = partial_path(&dest);
        let total = response.content_length.unwrap_or(0);
        let result = self
            .stream_to(&artifact.name, response.body, total, &temp_path)
            .map_err(|source| ProvisioningError::Transfer {
                uri: artifact.source_uri.clone(),
                path: temp_path.clone(),
                source,
            })
            .and_then(|bytes| {
                fs::rename(&temp_path, &dest)
                    .map(|_| bytes)
                    .map_err(|source| ProvisioningError::Finalize {
                        path: dest.clone(),
                        source,
                    })
            });

        match result {
            Ok(bytes) => {
                log::info!("Downloaded {} ({bytes} bytes)", artifact.name);
                Ok(ArtifactOutcome::Downloaded { path: dest, bytes })
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    fn stream_to(
        &self,
        name: &str,
        mut body: Box<dyn Read + Send>,
        total: u64,
        temp_path: &Path,
    ) -> std::io::Result<u64> {
        let mut file = fs::File::create(temp_path)?;
        let mut buf = vec![0u8; 1024 * 1024];
        let mut downloaded: u64 = 0;
        loop {
            let n = body.read(&mut buf)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            downloaded += n as u64;
            if let Some(ref cb) = self.on_progress {
                cb(name, downloaded, total);
            }
        }
        file.flush()?;
        Ok(downloaded)
    }
}

/// `<dest>.part`, keeping the original extension visible.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::domain::artifact_fetcher::FetchResponse;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tempfile::TempDir;

    enum Script {
        Body(u16, Vec<u8>),
        /// Yields some bytes, then a connection reset.
        BrokenBody(Vec<u8>),
        Unreachable,
    }

    struct BrokenReader {
        head: Cursor<Vec<u8>>,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.head.read(buf)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                ));
            }
            Ok(n)
        }
    }

    struct StubFetcher {
        scripts: Mutex<HashMap<String, Script>>,
        calls: Arc<AtomicUsize>,
    }

    impl StubFetcher {
        fn new(scripts: Vec<(&str, Script)>) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(uri, s)| (uri.to_string(), s))
                        .collect(),
                ),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ArtifactFetcher for StubFetcher {
        fn fetch(&self, uri: &str) -> Result<FetchResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.scripts.lock().remove(uri) {
                Some(Script::Body(status, bytes)) => Ok(FetchResponse {
                    status,
                    content_length: Some(bytes.len() as u64),
                    body: Box::new(Cursor::new(bytes)),
                }),
                Some(Script::BrokenBody(head)) => Ok(FetchResponse {
                    status: 200,
                    content_length: Some(1_000_000),
                    body: Box::new(BrokenReader {
                        head: Cursor::new(head),
                    }),
                }),
                Some(Script::Unreachable) | None => Err("host unreachable".into()),
            }
        }
    }

    fn artifacts(n: usize) -> Vec<ModelArtifact> {
        (1..=n)
            .map(|i| ModelArtifact::new(format!("m{i}.onnx"), format!("http://host/m{i}")))
            .collect()
    }

    #[test]
    fn test_one_error_status_does_not_stop_the_batch() {
        let tmp = TempDir::new().unwrap();
        let fetcher = StubFetcher::new(vec![
            ("http://host/m1", Script::Body(200, b"one".to_vec())),
            ("http://host/m2", Script::Body(404, b"not found".to_vec())),
            ("http://host/m3", Script::Body(200, b"three".to_vec())),
            ("http://host/m4", Script::Body(200, b"four".to_vec())),
        ]);
        let use_case =
            ProvisionModelsUseCase::new(Box::new(fetcher), tmp.path().to_path_buf(), artifacts(4));

        let report = use_case.provision_all().unwrap();

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.name, "m2.onnx");
        assert!(matches!(
            failures[0].1,
            ProvisioningError::Status { status: 404, .. }
        ));
        assert!(!report.is_complete());

        assert_eq!(fs::read(tmp.path().join("m1.onnx")).unwrap(), b"one");
        assert_eq!(fs::read(tmp.path().join("m3.onnx")).unwrap(), b"three");
        assert_eq!(fs::read(tmp.path().join("m4.onnx")).unwrap(), b"four");
        assert!(!tmp.path().join("m2.onnx").exists());
        assert!(!tmp.path().join("m2.onnx.part").exists());
    }

    #[test]
    fn test_broken_transfer_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        let fetcher = StubFetcher::new(vec![(
            "http://host/m1",
            Script::BrokenBody(vec![7u8; 4096]),
        )]);
        let use_case =
            ProvisionModelsUseCase::new(Box::new(fetcher), tmp.path().to_path_buf(), artifacts(1));

        let report = use_case.provision_all().unwrap();

        let failures: Vec<_> = report.failures().collect();
        assert!(matches!(failures[0].1, ProvisioningError::Transfer { .. }));
        assert!(!tmp.path().join("m1.onnx").exists());
        assert!(!tmp.path().join("m1.onnx.part").exists());
    }

    #[test]
    fn test_unreachable_host_is_request_error() {
        let tmp = TempDir::new().unwrap();
        let fetcher = StubFetcher::new(vec![("http://host/m1", Script::Unreachable)]);
        let use_case =
            ProvisionModelsUseCase::new(Box::new(fetcher), tmp.path().to_path_buf(), artifacts(1));

        let report = use_case.provision_all().unwrap();
        let (_, err) = report.failures().next().unwrap();
        assert!(matches!(err, ProvisioningError::Request { .. }));
        assert!(err.to_string().contains("http://host/m1"));
    }

    #[test]
    fn test_creates_missing_target_directory() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("nested").join("models");
        let fetcher = StubFetcher::new(vec![("http://host/m1", Script::Body(200, b"x".to_vec()))]);
        let use_case = ProvisionModelsUseCase::new(Box::new(fetcher), target.clone(), artifacts(1));

        let report = use_case.provision_all().unwrap();
        assert!(report.is_complete());
        assert!(target.join("m1.onnx").is_file());
        match &report.outcomes()[0].1 {
            ArtifactOutcome::Downloaded { bytes, .. } => assert_eq!(*bytes, 1),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_unusable_target_directory_aborts() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let fetcher = StubFetcher::new(vec![]);
        let use_case =
            ProvisionModelsUseCase::new(Box::new(fetcher), blocker.join("models"), artifacts(1));

        assert!(matches!(
            use_case.provision_all(),
            Err(ProvisioningError::CreateDir { .. })
        ));
    }

    #[test]
    fn test_skip_existing_does_not_fetch() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("m1.onnx"), b"cached").unwrap();
        let fetcher = StubFetcher::new(vec![]);
        let calls = fetcher.calls.clone();
        let use_case =
            ProvisionModelsUseCase::new(Box::new(fetcher), tmp.path().to_path_buf(), artifacts(1))
                .skip_existing(true);

        let report = use_case.provision_all().unwrap();
        assert!(matches!(
            report.outcomes()[0].1,
            ArtifactOutcome::Skipped { .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read(tmp.path().join("m1.onnx")).unwrap(), b"cached");
    }

    #[test]
    fn test_existing_file_is_replaced_by_default() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("m1.onnx"), b"stale").unwrap();
        let fetcher =
            StubFetcher::new(vec![("http://host/m1", Script::Body(200, b"fresh".to_vec()))]);
        let use_case =
            ProvisionModelsUseCase::new(Box::new(fetcher), tmp.path().to_path_buf(), artifacts(1));

        use_case.provision_all().unwrap();
        assert_eq!(fs::read(tmp.path().join("m1.onnx")).unwrap(), b"fresh");
    }

    #[test]
    fn test_progress_reports_bytes() {
        let tmp = TempDir::new().unwrap();
        let fetcher =
            StubFetcher::new(vec![("http://host/m1", Script::Body(200, vec![1u8; 10]))]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let use_case =
            ProvisionModelsUseCase::new(Box::new(fetcher), tmp.path().to_path_buf(), artifacts(1))
                .on_progress(Box::new(move |name: &str, done, total| {
                    sink.lock().push((name.to_string(), done, total));
                }));

        use_case.provision_all().unwrap();
        let seen = seen.lock();
        assert_eq!(seen.last().unwrap(), &("m1.onnx".to_string(), 10, 10));
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/m/model.onnx")),
            PathBuf::from("/m/model.onnx.part")
        );
    }
}
