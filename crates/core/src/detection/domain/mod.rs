pub mod capability;
pub mod detection;
pub mod detection_cascade;
pub mod detector_options;
pub mod expression;
pub mod expression_classifier;
pub mod face_detector;
pub mod face_landmarks;
pub mod landmark_locator;
