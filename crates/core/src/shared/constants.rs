pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const LANDMARK_MODEL_NAME: &str = "face_landmarks.onnx";
pub const LANDMARK_MODEL_URL: &str =
    "https://github.com/yinguobing/head-pose-estimation/releases/download/v3.0/face_landmarks.onnx";

pub const EXPRESSION_MODEL_NAME: &str = "emotion-ferplus-8.onnx";
pub const EXPRESSION_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";

/// Requested camera resolution.
pub const DEFAULT_CAPTURE_WIDTH: u32 = 480;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 360;

/// Detector working resolution (square input edge, pixels).
pub const DEFAULT_DETECTOR_INPUT_SIZE: u32 = 512;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;

/// Display refresh rate driving the detection loop.
pub const DEFAULT_REFRESH_HZ: f64 = 60.0;

pub const NUM_FACE_LANDMARKS: usize = 68;
