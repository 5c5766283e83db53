use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use ndarray::{ArrayD, IxDyn};
use tempfile::TempDir;

use wound_analyzer::{
    mocks::{test_config, InstrumentedSession, MockLoader, MockSession, ReentrancyProbe},
    InferenceEngine, WoundAnalyzer, WoundType,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_analyses_never_overlap_inference() -> Result<(), Box<dyn std::error::Error>>
{
    let temp_dir = TempDir::new()?;
    let config = test_config(temp_dir.path(), true, true)?;

    // classifier and segmenter report into the same probe
    let probe = ReentrancyProbe::new(Duration::from_millis(25));
    let mut logits = vec![0.0; WoundType::CLASSES.len()];
    logits[0] = 3.0;
    let classifier = InstrumentedSession::new(MockSession::logits(logits), probe.clone());
    let segmenter = InstrumentedSession::new(
        MockSession::fixed(ArrayD::from_elem(IxDyn(&[1, 224, 224, 1]), 0.7)),
        probe.clone(),
    );
    let loader = MockLoader::with_sessions(classifier, segmenter);
    let engine = Arc::new(InferenceEngine::new(&config, Arc::new(loader)));

    let mut photos = Vec::new();
    for i in 0..4u8 {
        let path = temp_dir.path().join(format!("wound_{i}.png"));
        RgbImage::from_pixel(64, 48, Rgb([100 + i * 20, 80, 70])).save(&path)?;
        photos.push(path);
    }

    let mut handles = Vec::new();
    for (i, photo) in photos.into_iter().enumerate() {
        let analyzer = WoundAnalyzer::new(Arc::clone(&engine), config.clone());
        handles.push(tokio::spawn(async move {
            analyzer.analyze(i as i64, &[], &photo, None).await
        }));
    }

    for handle in handles {
        let result = handle.await??;
        assert!(result.error_message.is_none());
        assert_eq!(result.classification.primary_type, WoundType::Abrasions);
    }

    // one classification and one segmentation per analysis
    assert_eq!(probe.calls(), 8);
    assert_eq!(probe.overlaps(), 0);
    Ok(())
}
