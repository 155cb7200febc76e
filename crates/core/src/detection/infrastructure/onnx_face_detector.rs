/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing.
/// Boxes are returned in source-frame coordinates with their confidence.
use std::path::Path;

use crate::detection::domain::capability::CapabilityError;
use crate::detection::domain::detector_options::DetectorOptions;
use crate::detection::domain::face_detector::{FaceBox, FaceDetector};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::onnx_session::{first_input_shape, open_session, run_single};

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Letterbox padding value (114/255 gray, YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxFaceDetector {
    session: ort::session::Session,
    /// Input edge fixed by the model graph, if any.
    model_input_size: Option<u32>,
    options: DetectorOptions,
}

impl OnnxFaceDetector {
    /// Load a YOLO ONNX model.
    ///
    /// Models exported with a static NCHW input ignore the configured
    /// working resolution; dynamic models letterbox to `input_size`.
    pub fn new(model_path: &Path) -> Result<Self, CapabilityError> {
        let session = open_session(model_path)?;
        let model_input_size = first_input_shape(&session).and_then(|shape| {
            if shape.len() >= 4 && shape[2] > 0 {
                Some(shape[2] as u32)
            } else {
                None
            }
        });

        Ok(Self {
            session,
            model_input_size,
            options: DetectorOptions::default(),
        })
    }

    fn input_size(&self) -> u32 {
        self.model_input_size.unwrap_or(self.options.input_size)
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn configure(&mut self, options: &DetectorOptions) {
        if let Some(fixed) = self.model_input_size {
            if fixed != options.input_size {
                log::warn!(
                    "Detector model has a fixed {fixed}px input; ignoring requested {}px",
                    options.input_size
                );
            }
        }
        self.options = *options;
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, CapabilityError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let (input_tensor, lb) = letterbox(frame, self.input_size());
        let (shape, data) = run_single(&mut self.session, input_tensor)?;

        let mut raw = parse_output(&shape, &data, self.options.score_threshold)?;
        for b in &mut raw {
            b.region = lb.to_source(&b.region);
        }
        Ok(nms(&mut raw, NMS_IOU_THRESH))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// How a frame was placed inside the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LetterboxTransform {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl LetterboxTransform {
    fn to_source(&self, r: &Region) -> Region {
        Region::new(
            (r.x - self.pad_x as f64) / self.scale,
            (r.y - self.pad_y as f64) / self.scale,
            r.width / self.scale,
            r.height / self.scale,
        )
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size` as an NCHW
/// float tensor in `[0, 1]`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, LetterboxTransform) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        LetterboxTransform {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Decode `[1, features, N]` or `[1, N, features]` YOLO output rows of the
/// form `[cx, cy, w, h, conf, ...]` into boxes in letterbox coordinates.
fn parse_output(shape: &[usize], data: &[f32], threshold: f64) -> Result<Vec<FaceBox>, CapabilityError> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 {
        return Ok(Vec::new());
    }

    let at = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut boxes = Vec::new();
    for i in 0..num_dets {
        let conf = at(i, 4);
        if conf < threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));
        boxes.push(FaceBox {
            region: Region::from_corners(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0),
            score: conf,
        });
    }
    Ok(boxes)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(boxes: &mut [FaceBox], iou_thresh: f64) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes.iter() {
        if keep
            .iter()
            .all(|kept| kept.region.iou(&candidate.region) <= iou_thresh)
        {
            keep.push(*candidate);
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
