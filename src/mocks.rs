use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ndarray::prelude::*;

use crate::config::Config;
use crate::errors::{Result, WoundAnalysisError};
use crate::traits::{InferenceSession, SessionLoader};

/// Session that returns a fixed output for any input.
#[derive(Debug, Clone)]
pub struct MockSession {
    output: ArrayD<f32>,
}

impl MockSession {
    pub fn fixed(output: ArrayD<f32>) -> Self {
        Self { output }
    }

    /// Classifier-style `[1, n]` scores.
    pub fn logits(values: Vec<f32>) -> Self {
        let len = values.len();
        let output = Array2::from_shape_vec((1, len), values)
            .map(|a| a.into_dyn())
            .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[1, 0])));
        Self { output }
    }
}

impl InferenceSession for MockSession {
    fn run(&mut self, _input: ArrayView4<f32>) -> Result<ArrayD<f32>> {
        Ok(self.output.clone())
    }
}

/// Session that records overlapping calls through a flag shared by every
/// session built from the same probe.
#[derive(Debug, Clone)]
pub struct InstrumentedSession {
    inner: MockSession,
    probe: Arc<ReentrancyProbe>,
}

#[derive(Debug, Default)]
pub struct ReentrancyProbe {
    active: AtomicBool,
    overlaps: AtomicUsize,
    calls: AtomicUsize,
    hold: Duration,
}

impl ReentrancyProbe {
    pub fn new(hold: Duration) -> Arc<Self> {
        Arc::new(Self {
            hold,
            ..Self::default()
        })
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InstrumentedSession {
    pub fn new(inner: MockSession, probe: Arc<ReentrancyProbe>) -> Self {
        Self { inner, probe }
    }
}

impl InferenceSession for InstrumentedSession {
    fn run(&mut self, input: ArrayView4<f32>) -> Result<ArrayD<f32>> {
        if self.probe.active.swap(true, Ordering::SeqCst) {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.probe.hold);
        let output = self.inner.run(input);
        self.probe.active.store(false, Ordering::SeqCst);
        output
    }
}

type SessionFactory = Box<dyn Fn() -> Box<dyn InferenceSession> + Send + Sync>;

fn factory<S>(session: S) -> SessionFactory
where
    S: InferenceSession + Clone + Sync + 'static,
{
    Box::new(move || -> Box<dyn InferenceSession> { Box::new(session.clone()) })
}

/// Loader handing out clones of prepared sessions. Model files whose name
/// contains "segmentation" get the segmenter.
#[derive(Default)]
pub struct MockLoader {
    classifier: Option<SessionFactory>,
    segmenter: Option<SessionFactory>,
    loads: AtomicUsize,
}

impl MockLoader {
    /// Every model loads as a clone of `session`.
    pub fn new(session: MockSession) -> Self {
        Self::with_sessions(session.clone(), session)
    }

    pub fn with_sessions<C, S>(classifier: C, segmenter: S) -> Self
    where
        C: InferenceSession + Clone + Sync + 'static,
        S: InferenceSession + Clone + Sync + 'static,
    {
        Self {
            classifier: Some(factory(classifier)),
            segmenter: Some(factory(segmenter)),
            loads: AtomicUsize::new(0),
        }
    }

    /// Every load fails as a corrupt model would.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl SessionLoader for MockLoader {
    fn load(&self, model_path: &Path) -> Result<Box<dyn InferenceSession>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let is_segmenter = model_path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains("segmentation"));
        let factory = if is_segmenter {
            &self.segmenter
        } else {
            &self.classifier
        };
        factory.as_ref().map(|make| make()).ok_or_else(|| {
            WoundAnalysisError::inference(
                format!("mock load: {}", model_path.display()),
                "corrupt model",
            )
        })
    }
}

/// Config rooted at `root` whose bundle holds the requested placeholder
/// models, with fallback delays disabled.
pub fn test_config(root: &Path, with_classifier: bool, with_segmenter: bool) -> Result<Config> {
    let bundle_dir = root.join("bundle");
    fs::create_dir_all(&bundle_dir).map_err(|e| WoundAnalysisError::FileSystem {
        path: bundle_dir.clone(),
        operation: "create mock bundle".to_string(),
        source: e,
    })?;
    let config = Config {
        bundle_dir: bundle_dir.clone(),
        cache_dir: root.join("cache"),
        fallback_delay_ms: 0,
        ..Config::default()
    };

    let wanted = [
        (with_classifier, &config.classifier_model),
        (with_segmenter, &config.segmentation_model),
    ];
    for (_, name) in wanted.into_iter().filter(|(include, _)| *include) {
        let path = bundle_dir.join(name);
        fs::write(&path, b"mock").map_err(|e| WoundAnalysisError::FileSystem {
            path,
            operation: "write mock model".to_string(),
            source: e,
        })?;
    }
    Ok(config)
}
