pub mod capability_loader;
pub mod onnx_expression_classifier;
pub mod onnx_face_detector;
pub mod onnx_landmark_locator;
mod onnx_session;
