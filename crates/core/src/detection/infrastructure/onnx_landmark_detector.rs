//! YOLO-pose face detector producing five-point landmarks via `ort`.

use std::path::Path;

use ndarray::{Array4, ArrayViewD, Ix2};

use crate::detection::domain::face_landmarks::LandmarkSet;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Used when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_CONFIDENCE: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// Box (4) + score (1) + 5 keypoints of (x, y, conf).
const ROW_LEN: usize = 5 + 15;

/// Keypoints below this confidence are reported as invisible.
const KEYPOINT_CONF_THRESH: f32 = 0.5;

/// Letterbox fill, YOLO convention.
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxLandmarkDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxLandmarkDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(execution_providers())?
            .commit_from_file(model_path)?;

        // NCHW; a non-positive H means the dimension is dynamic.
        let input_size = match session.inputs().first().map(|i| i.dtype()) {
            Some(ort::value::ValueType::Tensor { shape, .. }) if shape.len() == 4 && shape[2] > 0 => {
                shape[2] as u32
            }
            _ => DEFAULT_INPUT_SIZE,
        };
        log::debug!("Landmark model input {input_size}x{input_size}");

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("expected an RGB frame, got {} channels", frame.channels()).into());
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let (input, geometry) = letterbox(frame, self.input_size);

        let outputs = self
            .session
            .run(ort::inputs![ort::value::Tensor::from_array(input)?])?;
        if outputs.len() == 0 {
            return Err("landmark model produced no outputs".into());
        }
        let raw = outputs[0].try_extract_array::<f32>()?;

        let mut candidates = decode(raw, &geometry, self.confidence)?;
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        let (fw, fh) = (frame.width() as f64, frame.height() as f64);
        Ok(kept
            .into_iter()
            .map(|c| {
                let b = c.bbox;
                let clamped = BoundingBox::new(
                    b.x_min.clamp(0.0, fw),
                    b.y_min.clamp(0.0, fh),
                    b.x_max.clamp(0.0, fw),
                    b.y_max.clamp(0.0, fh),
                );
                LandmarkSet::new(c.points, clamped)
            })
            .collect())
    }
}

#[allow(unused_mut)]
fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    let mut providers = Vec::new();
    #[cfg(target_os = "macos")]
    providers.push(ort::execution_providers::CoreMLExecutionProvider::default().build());
    #[cfg(target_os = "windows")]
    providers.push(ort::execution_providers::DirectMLExecutionProvider::default().build());
    providers
}

/// Maps model-input coordinates back to the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Geometry {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

impl Geometry {
    fn to_frame(self, x: f32, y: f32) -> (f64, f64) {
        (
            (x as f64 - self.pad_x) / self.scale,
            (y as f64 - self.pad_y) / self.scale,
        )
    }
}

/// Aspect-preserving nearest-neighbour resize into a padded square,
/// normalised to 0..1, NCHW.
fn letterbox(frame: &Frame, size: u32) -> (Array4<f32>, Geometry) {
    let (fw, fh) = (frame.width() as f64, frame.height() as f64);
    let scale = (size as f64 / fw).min(size as f64 / fh);
    let new_w = ((fw * scale).round() as usize).min(size as usize);
    let new_h = ((fh * scale).round() as usize).min(size as usize);
    let pad_x = (size as usize - new_w) / 2;
    let pad_y = (size as usize - new_h) / 2;

    let side = size as usize;
    let mut tensor = Array4::<f32>::from_elem((1, 3, side, side), PAD_VALUE);
    let src = frame.as_ndarray();
    let (max_y, max_x) = (frame.height() as usize - 1, frame.width() as usize - 1);

    for y in 0..new_h {
        let sy = ((y as f64 / scale) as usize).min(max_y);
        for x in 0..new_w {
            let sx = ((x as f64 / scale) as usize).min(max_x);
            for c in 0..3 {
                tensor[[0, c, pad_y + y, pad_x + x]] = src[[sy, sx, c]] as f32 / 255.0;
            }
        }
    }

    let geometry = Geometry {
        scale,
        pad_x: pad_x as f64,
        pad_y: pad_y as f64,
    };
    (tensor, geometry)
}

#[derive(Clone, Debug)]
struct Candidate {
    bbox: BoundingBox,
    score: f64,
    points: [(f64, f64); 5],
}

/// Reads candidates from a `[1, features, anchors]` or `[1, anchors, features]`
/// output. Export tools disagree on the order; features are always the
/// shorter axis.
fn decode(
    raw: ArrayViewD<'_, f32>,
    geometry: &Geometry,
    min_score: f64,
) -> Result<Vec<Candidate>, Box<dyn std::error::Error>> {
    let shape = raw.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(format!("unexpected landmark output shape {shape:?}").into());
    }
    let table = raw.index_axis_move(ndarray::Axis(0), 0).into_dimensionality::<Ix2>()?;
    let rows = if shape[1] < shape[2] { table.reversed_axes() } else { table };
    if rows.ncols() < 5 {
        return Err(format!("landmark output has only {} features", rows.ncols()).into());
    }

    let mut out = Vec::new();
    for row in rows.rows() {
        let score = row[4] as f64;
        if score < min_score {
            continue;
        }
        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let (x_min, y_min) = geometry.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x_max, y_max) = geometry.to_frame(cx + w / 2.0, cy + h / 2.0);

        let mut points = [(0.0, 0.0); 5];
        if row.len() >= ROW_LEN {
            for (k, point) in points.iter_mut().enumerate() {
                let base = 5 + k * 3;
                if row[base + 2] >= KEYPOINT_CONF_THRESH {
                    *point = geometry.to_frame(row[base], row[base + 1]);
                }
            }
        }

        out.push(Candidate {
            bbox: BoundingBox::new(x_min, y_min, x_max, y_max),
            score,
            points,
        });
    }
    Ok(out)
}

/// Greedy non-maximum suppression, best score first.
fn nms(candidates: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for c in candidates.iter() {
        if kept.iter().all(|k| k.bbox.iou(&c.bbox) <= iou_thresh) {
            kept.push(c.clone());
        }
    }
    kept
}
