use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use ndarray::ArrayD;
use rand::Rng;

use crate::{config::is_valid_calibration, engine::InferenceEngine, preprocess::ImageTensor};

/// Mask probability above which a pixel counts as wound.
pub const MASK_THRESHOLD: f32 = 0.5;

/// Smallest area reported when a mask exists.
pub const MIN_AREA_CM2: f64 = 0.01;

/// Bounds of the simulated estimate used without a segmentation model.
pub const FALLBACK_AREA_RANGE: std::ops::Range<f64> = 0.5..10.0;

/// Wound area in cm².
///
/// Uses the segmentation model when one is loaded. Otherwise, or when
/// inference fails or the calibration is unusable, returns a bounded
/// pseudo-random estimate after `fallback_delay`.
pub async fn estimate_area(
    engine: &InferenceEngine,
    tensor: Arc<ImageTensor>,
    pixels_per_cm2: f64,
    fallback_delay: Duration,
) -> f64 {
    if !is_valid_calibration(pixels_per_cm2) {
        warn!("calibration {pixels_per_cm2} px/cm² is unusable, simulating area");
        return simulated_area(fallback_delay).await;
    }
    match engine.run_segmenter(tensor).await {
        Ok(Some(mask)) => {
            let area = area_from_mask(&mask, pixels_per_cm2);
            debug!("segmentation area {area} cm²");
            return area;
        }
        Ok(None) => debug!("no segmentation model, simulating area"),
        Err(e) => warn!("segmentation fell back: {e}"),
    }
    simulated_area(fallback_delay).await
}

/// Count pixels above [`MASK_THRESHOLD`] and convert them with the
/// calibration constant. The result is floored to [`MIN_AREA_CM2`] and
/// rounded to two decimals.
pub fn area_from_mask(mask: &ArrayD<f32>, pixels_per_cm2: f64) -> f64 {
    let wound_pixels = mask.iter().filter(|&&p| p > MASK_THRESHOLD).count();
    let area = wound_pixels as f64 / pixels_per_cm2;
    round2(area.max(MIN_AREA_CM2))
}

async fn simulated_area(delay: Duration) -> f64 {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    round2(rand::rng().random_range(FALLBACK_AREA_RANGE))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{test_config, MockLoader, MockSession};
    use ndarray::{Array4, IxDyn};
    use tempfile::TempDir;

    fn mask(wound_pixels: usize, total: usize) -> ArrayD<f32> {
        let values = (0..total)
            .map(|i| if i < wound_pixels { 0.8 } else { 0.2 })
            .collect();
        ArrayD::from_shape_vec(IxDyn(&[1, total, 1]), values).unwrap()
    }

    #[test]
    fn test_mask_to_area() {
        assert_eq!(area_from_mask(&mask(2500, 10_000), 1000.0), 2.5);
        assert_eq!(area_from_mask(&mask(1234, 5000), 1000.0), 1.23);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let values = vec![0.5, 0.5, 0.51, 0.49];
        let mask = ArrayD::from_shape_vec(IxDyn(&[4]), values).unwrap();
        assert_eq!(area_from_mask(&mask, 1.0), 1.0);
    }

    #[test]
    fn test_empty_mask_is_floored() {
        assert_eq!(area_from_mask(&mask(0, 100), 1000.0), MIN_AREA_CM2);
    }

    #[tokio::test]
    async fn test_fallback_is_bounded_without_segmenter() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), true, false).unwrap();
        let engine = InferenceEngine::new(
            &config,
            Arc::new(MockLoader::new(MockSession::logits(vec![0.0; 10]))),
        );
        let tensor = Arc::new(ImageTensor::new(Array4::zeros((1, 2, 2, 3))));

        for _ in 0..20 {
            let area = estimate_area(&engine, tensor.clone(), 1000.0, Duration::ZERO).await;
            assert!(area >= FALLBACK_AREA_RANGE.start && area <= FALLBACK_AREA_RANGE.end);
            assert_eq!(area, round2(area));
        }
    }

    #[tokio::test]
    async fn test_segmenter_mask_drives_area() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), true, true).unwrap();
        let engine = InferenceEngine::new(
            &config,
            Arc::new(MockLoader::new(MockSession::fixed(mask(3000, 4000)))),
        );
        let tensor = Arc::new(ImageTensor::new(Array4::zeros((1, 2, 2, 3))));

        let area = estimate_area(&engine, tensor, 1000.0, Duration::ZERO).await;
        assert_eq!(area, 3.0);
    }

    #[tokio::test]
    async fn test_unusable_calibration_stays_finite() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), true, true).unwrap();
        let engine = InferenceEngine::new(
            &config,
            Arc::new(MockLoader::new(MockSession::fixed(mask(16, 64)))),
        );
        let tensor = Arc::new(ImageTensor::new(Array4::zeros((1, 2, 2, 3))));

        for pixels_per_cm2 in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let area =
                estimate_area(&engine, tensor.clone(), pixels_per_cm2, Duration::ZERO).await;
            assert!(area.is_finite());
            assert!(FALLBACK_AREA_RANGE.contains(&area) || area == FALLBACK_AREA_RANGE.end);
        }
    }
}
