//! Loads the three inference capabilities concurrently from a model
//! directory, failing as soon as any one of them fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use thiserror::Error;

use crate::detection::domain::capability::{CapabilityError, CapabilityKind, CapabilitySet};
use crate::detection::domain::expression_classifier::ExpressionClassifier;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::landmark_locator::LandmarkLocator;
use crate::shared::constants::{DETECTOR_MODEL_NAME, EXPRESSION_MODEL_NAME, LANDMARK_MODEL_NAME};

use super::onnx_expression_classifier::OnnxExpressionClassifier;
use super::onnx_face_detector::OnnxFaceDetector;
use super::onnx_landmark_locator::OnnxLandmarkLocator;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to load {capability} from {}: {source}", path.display())]
    Capability {
        capability: CapabilityKind,
        path: PathBuf,
        #[source]
        source: CapabilityError,
    },
    #[error("model loading was interrupted before all capabilities reported")]
    Interrupted,
}

impl ModelLoadError {
    pub fn capability(&self) -> Option<CapabilityKind> {
        match self {
            ModelLoadError::Capability { capability, .. } => Some(*capability),
            ModelLoadError::Interrupted => None,
        }
    }
}

/// Builds each capability from its model file.
pub trait CapabilityFactory: Send + Sync {
    fn detector(&self, path: &Path) -> Result<Box<dyn FaceDetector>, CapabilityError>;
    fn landmarker(&self, path: &Path) -> Result<Box<dyn LandmarkLocator>, CapabilityError>;
    fn expression_classifier(
        &self,
        path: &Path,
    ) -> Result<Box<dyn ExpressionClassifier>, CapabilityError>;
}

/// ONNX Runtime backed capabilities.
pub struct OnnxCapabilityFactory;

impl CapabilityFactory for OnnxCapabilityFactory {
    fn detector(&self, path: &Path) -> Result<Box<dyn FaceDetector>, CapabilityError> {
        Ok(Box::new(OnnxFaceDetector::new(path)?))
    }

    fn landmarker(&self, path: &Path) -> Result<Box<dyn LandmarkLocator>, CapabilityError> {
        Ok(Box::new(OnnxLandmarkLocator::new(path)?))
    }

    fn expression_classifier(
        &self,
        path: &Path,
    ) -> Result<Box<dyn ExpressionClassifier>, CapabilityError> {
        Ok(Box::new(OnnxExpressionClassifier::new(path)?))
    }
}

enum Loaded {
    Detector(Box<dyn FaceDetector>),
    Landmarker(Box<dyn LandmarkLocator>),
    ExpressionClassifier(Box<dyn ExpressionClassifier>),
}

type LoadResult = Result<Loaded, ModelLoadError>;

pub struct CapabilityLoader {
    factory: Arc<dyn CapabilityFactory>,
}

impl CapabilityLoader {
    pub fn new(factory: Arc<dyn CapabilityFactory>) -> Self {
        Self { factory }
    }

    pub fn onnx() -> Self {
        Self::new(Arc::new(OnnxCapabilityFactory))
    }

    pub fn model_path(models_dir: &Path, kind: CapabilityKind) -> PathBuf {
        let name = match kind {
            CapabilityKind::Detector => DETECTOR_MODEL_NAME,
            CapabilityKind::Landmarker => LANDMARK_MODEL_NAME,
            CapabilityKind::ExpressionClassifier => EXPRESSION_MODEL_NAME,
        };
        models_dir.join(name)
    }

    /// Load all capabilities in parallel.
    ///
    /// Returns on the first failure without waiting for the remaining
    /// loads; their results are discarded when they finish.
    pub fn load_all(&self, models_dir: &Path) -> Result<CapabilitySet, ModelLoadError> {
        let (tx, rx) = crossbeam_channel::unbounded::<LoadResult>();

        for kind in CapabilityKind::ALL {
            let factory = Arc::clone(&self.factory);
            let path = Self::model_path(models_dir, kind);
            let tx = tx.clone();
            thread::Builder::new()
                .name(format!("load-{kind}"))
                .spawn(move || {
                    log::debug!("Loading {kind} from {}", path.display());
                    let result = load_one(factory.as_ref(), kind, &path).map_err(|source| {
                        ModelLoadError::Capability {
                            capability: kind,
                            path,
                            source,
                        }
                    });
                    // Receiver is gone once another load failed.
                    let _ = tx.send(result);
                })
                .map_err(|_| ModelLoadError::Interrupted)?;
        }
        drop(tx);

        let mut detector = None;
        let mut landmarker = None;
        let mut expression_classifier = None;

        for _ in CapabilityKind::ALL {
            match rx.recv().map_err(|_| ModelLoadError::Interrupted)?? {
                Loaded::Detector(d) => detector = Some(d),
                Loaded::Landmarker(l) => landmarker = Some(l),
                Loaded::ExpressionClassifier(c) => expression_classifier = Some(c),
            }
        }

        match (detector, landmarker, expression_classifier) {
            (Some(detector), Some(landmarker), Some(expression_classifier)) => {
                log::info!("Loaded all capabilities from {}", models_dir.display());
                Ok(CapabilitySet {
                    detector,
                    landmarker,
                    expression_classifier,
                })
            }
            _ => Err(ModelLoadError::Interrupted),
        }
    }
}

fn load_one(
    factory: &dyn CapabilityFactory,
    kind: CapabilityKind,
    path: &Path,
) -> Result<Loaded, CapabilityError> {
    Ok(match kind {
        CapabilityKind::Detector => Loaded::Detector(factory.detector(path)?),
        CapabilityKind::Landmarker => Loaded::Landmarker(factory.landmarker(path)?),
        CapabilityKind::ExpressionClassifier => {
            Loaded::ExpressionClassifier(factory.expression_classifier(path)?)
        }
    })
}
