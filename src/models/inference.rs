//! Inference adapter around the pre-trained loan classifier

use crate::error::InferenceError;
use crate::feature_encoder::EncodedFeatureVector;
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::types::decision::ProbabilityPair;
use ort::memory::Allocator;
use ort::value::{DynMapValueType, DynSequenceValueType, DowncastableTarget};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Largest deviation from 1.0 accepted for the raw class probabilities.
///
/// float32 model outputs rarely sum to exactly one; anything further off
/// than this is treated as a broken model.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Binary classifier contract: feature vector in, `[P(reject), P(approve)]` out.
pub trait Classifier: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Number of input columns the classifier was trained on.
    fn feature_count(&self) -> usize;

    /// Class probabilities for a single application.
    fn predict_proba(&self, features: &EncodedFeatureVector) -> Result<ProbabilityPair, InferenceError>;
}

/// Check raw class probabilities and rescale them to sum to exactly one.
pub fn normalize_probabilities(reject: f64, approve: f64) -> Result<ProbabilityPair, InferenceError> {
    for (label, p) in [("reject", reject), ("approve", approve)] {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(InferenceError::MalformedOutput(format!(
                "P({label}) = {p} is not a probability"
            )));
        }
    }

    let sum = reject + approve;
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(InferenceError::MalformedOutput(format!(
            "class probabilities sum to {sum:.6}"
        )));
    }

    let approve = approve / sum;
    Ok(ProbabilityPair {
        reject: 1.0 - approve,
        approve,
    })
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    /// Session requires exclusive access to run
    model: Mutex<LoadedModel>,
    name: String,
    feature_count: usize,
}

impl OnnxClassifier {
    /// Load the model artifact from disk.
    pub fn load<P: AsRef<Path>>(
        path: P,
        feature_count: usize,
        onnx_threads: usize,
    ) -> anyhow::Result<Self> {
        let loader = ModelLoader::with_threads(onnx_threads)?;
        let model = loader.load(path)?;
        Ok(Self::from_model(model, feature_count))
    }

    /// Wrap an already loaded model.
    pub fn from_model(model: LoadedModel, feature_count: usize) -> Self {
        info!(model = %model.name, feature_count = feature_count, "Inference adapter ready");
        Self {
            name: model.name.clone(),
            model: Mutex::new(model),
            feature_count,
        }
    }

    fn run(&self, features: &[f32]) -> Result<ProbabilityPair, InferenceError> {
        use ort::value::Tensor;

        let mut model = self
            .model
            .lock()
            .map_err(|_| InferenceError::Unavailable("model lock poisoned".to_string()))?;
        let model = &mut *model;

        // Shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_vec()))?;

        let outputs = model
            .session
            .run(ort::inputs![&model.input_name => input_tensor])?;

        if let Some(output) = outputs.get(&model.output_name) {
            if let Some(pair) = extract_pair(output, &model.name)? {
                return Ok(pair);
            }
        }

        // Fall back to any non-label output
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(pair) = extract_pair(&output, &model.name)? {
                return Ok(pair);
            }
        }

        Err(InferenceError::MalformedOutput(
            "no probability output found".to_string(),
        ))
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_count(&self) -> usize {
        self.feature_count
    }

    fn predict_proba(&self, features: &EncodedFeatureVector) -> Result<ProbabilityPair, InferenceError> {
        if features.len() != self.feature_count {
            return Err(InferenceError::FeatureCount {
                expected: self.feature_count,
                actual: features.len(),
            });
        }

        let pair = self.run(features.as_slice())?;
        debug!(
            model = %self.name,
            p_reject = pair.reject,
            p_approve = pair.approve,
            "Inference complete"
        );
        Ok(pair)
    }
}

/// Extract the class probability pair from one session output.
///
/// Handles plain tensors (`[1, 2]`, `[2]`, or a single approve column)
/// and the `seq(map(int64, float))` layout produced by zipmap exports.
/// Returns `Ok(None)` when the output has neither layout.
fn extract_pair(
    output: &ort::value::DynValue,
    model_name: &str,
) -> Result<Option<ProbabilityPair>, InferenceError> {
    let dtype = output.dtype();

    if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
        debug!(model = %model_name, values = data.len(), "Extracted from tensor");
        let pair = match data {
            [reject, approve, ..] => normalize_probabilities(*reject as f64, *approve as f64)?,
            [approve] => normalize_probabilities(1.0 - *approve as f64, *approve as f64)?,
            [] => {
                return Err(InferenceError::MalformedOutput(
                    "empty probability tensor".to_string(),
                ))
            }
        };
        return Ok(Some(pair));
    }

    if DynSequenceValueType::can_downcast(&dtype) {
        return extract_from_sequence_map(output, model_name).map(Some);
    }

    Ok(None)
}

fn extract_from_sequence_map(
    output: &ort::value::DynValue,
    model_name: &str,
) -> Result<ProbabilityPair, InferenceError> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| InferenceError::MalformedOutput(format!("not a sequence: {e}")))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    // batch size is always one
    let map_value = maps
        .first()
        .ok_or_else(|| InferenceError::MalformedOutput("empty sequence".to_string()))?;

    let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
    let class_prob = |class: i64| {
        kv_pairs
            .iter()
            .find(|(id, _)| *id == class)
            .map(|(_, p)| *p as f64)
    };

    debug!(model = %model_name, classes = kv_pairs.len(), "Extracted from seq(map)");

    match (class_prob(0), class_prob(1)) {
        (Some(reject), Some(approve)) => normalize_probabilities(reject, approve),
        (None, Some(approve)) => normalize_probabilities(1.0 - approve, approve),
        (Some(reject), None) => normalize_probabilities(reject, 1.0 - reject),
        (None, None) => Err(InferenceError::MalformedOutput(
            "no class probabilities in map".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepts_float32_noise() {
        let pair = normalize_probabilities(0.30000001, 0.70000005).unwrap();
        assert!((pair.reject + pair.approve - 1.0).abs() < 1e-6);
        assert!((pair.approve - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_rejects_bad_sums() {
        let err = normalize_probabilities(0.5, 0.7).unwrap_err();
        assert!(matches!(err, InferenceError::MalformedOutput(_)));
    }

    #[test]
    fn test_normalize_rejects_non_probabilities() {
        assert!(normalize_probabilities(f64::NAN, 0.5).is_err());
        assert!(normalize_probabilities(-0.2, 1.2).is_err());
    }
}
