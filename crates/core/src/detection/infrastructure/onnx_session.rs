//! Shared ONNX Runtime session setup for the inference adapters.

use std::path::Path;

use crate::detection::domain::capability::CapabilityError;

/// Converts ort's errors (some of which carry non-`Send` builder state)
/// into the capability error type.
pub(crate) fn ort_err(e: impl std::fmt::Display) -> CapabilityError {
    e.to_string().into()
}

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Open a model file with a single inter-op thread; the detection loop
/// never runs two inferences at once.
pub(crate) fn open_session(model_path: &Path) -> Result<ort::session::Session, CapabilityError> {
    if !model_path.is_file() {
        return Err(format!("model file not found: {}", model_path.display()).into());
    }
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    ort::session::Session::builder()
        .map_err(ort_err)?
        .with_inter_threads(1)
        .map_err(ort_err)?
        .with_intra_threads(intra_threads)
        .map_err(ort_err)?
        .with_execution_providers(preferred_execution_providers())
        .map_err(ort_err)?
        .commit_from_file(model_path)
        .map_err(ort_err)
}

/// Shape of the first model input, with dynamic axes reported as `-1`.
pub(crate) fn first_input_shape(session: &ort::session::Session) -> Option<Vec<i64>> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            Some(shape.to_vec())
        } else {
            None
        }
    })
}

/// Run the session on one tensor and return the first output, flattened.
pub(crate) fn run_single<D: ndarray::Dimension + 'static>(
    session: &mut ort::session::Session,
    input: ndarray::Array<f32, D>,
) -> Result<(Vec<usize>, Vec<f32>), CapabilityError> {
    let input_value = ort::value::Tensor::from_array(input).map_err(ort_err)?;
    let outputs = session.run(ort::inputs![input_value]).map_err(ort_err)?;
    if outputs.len() == 0 {
        return Err("model produced no outputs".into());
    }
    let tensor = outputs[0].try_extract_array::<f32>().map_err(ort_err)?;
    let shape = tensor.shape().to_vec();
    let data = tensor.iter().copied().collect();
    Ok((shape, data))
}
