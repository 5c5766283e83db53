use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use image::{Rgb, RgbImage};
use ndarray::{ArrayD, IxDyn};
use tempfile::TempDir;

use wound_analyzer::{
    mocks::{test_config, MockLoader, MockSession},
    DrainageType, EngineState, HealingTrend, InferenceEngine, PhotoRecord, RiskLevel, SymptomLog,
    WoundAnalysisError, WoundAnalyzer, WoundType,
};

fn write_photo(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(320, 240, Rgb(color)).save(&path).unwrap();
    path
}

fn history() -> Vec<PhotoRecord> {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    vec![
        PhotoRecord {
            id: 1,
            taken_at: start,
            area_cm2: Some(10.0),
            infection_risk_score: None,
        },
        PhotoRecord {
            id: 2,
            taken_at: start + Duration::days(10),
            area_cm2: Some(5.0),
            infection_risk_score: Some(0.3),
        },
    ]
}

fn analyzer(root: &Path, with_classifier: bool, loader: MockLoader) -> WoundAnalyzer {
    let config = test_config(root, with_classifier, false).unwrap();
    let engine = Arc::new(InferenceEngine::new(&config, Arc::new(loader)));
    WoundAnalyzer::new(engine, config)
}

fn burn_logits() -> MockSession {
    let mut logits = vec![0.0; WoundType::CLASSES.len()];
    logits[2] = 5.0;
    MockSession::logits(logits)
}

#[tokio::test]
async fn test_full_analysis_with_mock_models() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let photo = write_photo(temp_dir.path(), "wound.png", [128, 128, 128]);
    let analyzer = analyzer(temp_dir.path(), true, MockLoader::new(burn_logits()));

    let result = analyzer.analyze(7, &history(), &photo, None).await?;

    assert_eq!(result.wound_id, 7);
    assert!(result.error_message.is_none());
    assert_eq!(result.classification.primary_type, WoundType::Burns);
    assert!(!result.classification.alternatives.contains_key(&WoundType::Burns));
    assert!(result.area_cm2 > 0.0);
    assert_eq!(result.infection_risk.risk_level, RiskLevel::VeryLow);
    assert_eq!(result.healing.predicted_days, 10);
    assert_eq!(result.healing.trend, HealingTrend::Excellent);
    assert!((0.0..=1.0).contains(&result.confidence_score));
    assert_eq!(analyzer.engine().state(), EngineState::Ready);
    Ok(())
}

#[tokio::test]
async fn test_unresolvable_model_degrades() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let photo = write_photo(temp_dir.path(), "wound.png", [180, 60, 60]);
    let analyzer = analyzer(temp_dir.path(), false, MockLoader::new(burn_logits()));

    let result = analyzer.analyze(1, &[], &photo, None).await?;

    assert_eq!(result.classification.confidence, 0.0);
    assert_eq!(result.classification.primary_type, WoundType::Unknown);
    assert!(result
        .classification
        .error_message
        .as_deref()
        .is_some_and(|m| !m.is_empty()));
    assert!(result.area_cm2 > 0.0);
    assert_eq!(result.healing.trend, HealingTrend::InsufficientData);
    assert!(matches!(analyzer.engine().state(), EngineState::Failed(_)));
    Ok(())
}

#[tokio::test]
async fn test_missing_image_is_input_error() {
    let temp_dir = TempDir::new().unwrap();
    let analyzer = analyzer(temp_dir.path(), true, MockLoader::new(burn_logits()));

    let err = analyzer
        .analyze(1, &history(), &temp_dir.path().join("nope.jpg"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WoundAnalysisError::Input { .. }));

    let err = analyzer
        .analyze(1, &history(), Path::new(""), None)
        .await
        .unwrap_err();
    assert!(err.is_input_error());
}

#[tokio::test]
async fn test_corrupt_image_yields_whole_result_fallback() -> Result<(), Box<dyn std::error::Error>>
{
    let temp_dir = TempDir::new()?;
    let photo = temp_dir.path().join("corrupt.jpg");
    std::fs::write(&photo, b"definitely not a jpeg")?;
    let analyzer = analyzer(temp_dir.path(), true, MockLoader::new(burn_logits()));

    let result = analyzer.analyze(3, &history(), &photo, None).await?;

    assert!(result.error_message.is_some());
    assert_eq!(result.confidence_score, 0.0);
    assert_eq!(result.classification.confidence, 0.0);
    assert_eq!(result.infection_risk.risk_level, RiskLevel::Unknown);
    // history does not depend on the image
    assert_eq!(result.healing.predicted_days, 10);
    Ok(())
}

#[tokio::test]
async fn test_symptom_log_raises_risk() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let photo = write_photo(temp_dir.path(), "wound.png", [128, 128, 128]);
    let analyzer = analyzer(temp_dir.path(), true, MockLoader::new(burn_logits()));
    let log = SymptomLog {
        logged_at: Utc::now(),
        pain_level: 6,
        has_redness: true,
        has_swelling: true,
        has_drainage: true,
        drainage_type: Some(DrainageType::Pus),
    };

    let result = analyzer.analyze(4, &history(), &photo, Some(&log)).await?;

    assert_eq!(result.infection_risk.risk_level, RiskLevel::High);
    assert!(result
        .infection_risk
        .risk_factors
        .iter()
        .any(|f| f == "Purulent drainage"));
    assert_eq!(
        result.infection_risk.recommendations,
        vec!["Seek immediate medical attention", "Monitor for worsening symptoms"]
    );
    Ok(())
}

#[tokio::test]
async fn test_segmentation_model_sets_area() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let photo = write_photo(temp_dir.path(), "wound.png", [128, 128, 128]);
    let config = test_config(temp_dir.path(), true, true)?;
    let mask = ArrayD::from_elem(IxDyn(&[1, 224, 224, 1]), 0.9f32);
    let loader = MockLoader::with_sessions(burn_logits(), MockSession::fixed(mask));
    let engine = Arc::new(InferenceEngine::new(&config, Arc::new(loader)));
    let analyzer = WoundAnalyzer::new(engine, config.clone());

    let result = analyzer.analyze(5, &[], &photo, None).await?;

    let expected = ((224.0 * 224.0 / config.pixels_per_cm2) * 100.0_f64).round() / 100.0;
    assert_eq!(result.area_cm2, expected);
    assert_eq!(result.classification.primary_type, WoundType::Burns);
    Ok(())
}

#[test]
fn test_result_json_shape() -> Result<(), Box<dyn std::error::Error>> {
    let raw = r#"[
        {"id": 1, "taken_at": "2025-06-01T08:00:00Z", "area_cm2": 4.5},
        {"id": 2, "taken_at": "2025-06-08T08:00:00Z"}
    ]"#;
    let history: Vec<PhotoRecord> = serde_json::from_str(raw)?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].area_cm2, Some(4.5));
    assert_eq!(history[1].area_cm2, None);
    assert_eq!(history[1].infection_risk_score, None);
    Ok(())
}
