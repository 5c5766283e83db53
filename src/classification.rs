use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;
use ndarray::ArrayD;

use crate::{
    engine::InferenceEngine,
    errors::{Result, WoundAnalysisError},
    preprocess::ImageTensor,
    types::{WoundClassification, WoundType},
};

/// Classify a preprocessed image. Never fails: an unavailable engine or a
/// bad model output yields a zero-confidence fallback with the reason.
pub async fn classify(engine: &InferenceEngine, tensor: Arc<ImageTensor>) -> WoundClassification {
    let outcome = engine
        .run_classifier(tensor)
        .await
        .and_then(|scores| classification_from_scores(&scores));
    match outcome {
        Ok(classification) => classification,
        Err(e) => {
            warn!("classification fell back: {e}");
            WoundClassification::fallback(e.to_string())
        }
    }
}

/// Softmax with the maximum logit subtracted first.
pub fn stable_softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn classification_from_scores(scores: &ArrayD<f32>) -> Result<WoundClassification> {
    let logits: Vec<f32> = scores.iter().copied().collect();
    if logits.is_empty() {
        return Err(WoundAnalysisError::inference(
            "classification",
            "model produced no scores",
        ));
    }
    if logits.len() != WoundType::CLASSES.len() {
        return Err(WoundAnalysisError::inference(
            "classification",
            format!(
                "model produced {} scores for {} known labels",
                logits.len(),
                WoundType::CLASSES.len()
            ),
        ));
    }
    if logits.iter().any(|l| !l.is_finite()) {
        return Err(WoundAnalysisError::inference(
            "classification",
            "model produced non-finite scores",
        ));
    }

    let probabilities = stable_softmax(&logits);
    let (best, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

    let primary_type = WoundType::from_index(best).ok_or_else(|| {
        WoundAnalysisError::inference(
            "classification",
            format!(
                "predicted index {best} outside the {} known labels",
                WoundType::CLASSES.len()
            ),
        )
    })?;

    let alternatives: BTreeMap<WoundType, f64> = WoundType::CLASSES
        .iter()
        .zip(&probabilities)
        .filter(|(label, _)| **label != primary_type)
        .map(|(label, p)| (*label, *p))
        .collect();

    Ok(WoundClassification {
        primary_type,
        confidence,
        alternatives,
        error_message: None,
    })
}
