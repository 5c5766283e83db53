use std::sync::{Arc, OnceLock};
use std::time::Instant;

use log::{debug, info, warn};
use ndarray::ArrayD;
use parking_lot::{Mutex, RwLock};

use crate::{
    config::Config,
    errors::{Result, WoundAnalysisError},
    preprocess::ImageTensor,
    provisioner::ModelProvisioner,
    traits::{InferenceSession, SessionLoader},
};

/// Observable lifecycle of the inference engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Failed(String),
}

struct LoadedSessions {
    classifier: Box<dyn InferenceSession>,
    segmenter: Option<Box<dyn InferenceSession>>,
}

#[derive(Clone)]
struct SessionHandle {
    sessions: Arc<Mutex<LoadedSessions>>,
    has_segmenter: bool,
}

/// Exclusive owner of the model sessions.
///
/// Initialization runs at most once; callers arriving while it is in flight
/// wait on `init_lock` for the same outcome. A failed initialization is
/// final. Every inference call goes through one session lock, so
/// classification and segmentation never run at the same time.
pub struct InferenceEngine {
    provisioner: ModelProvisioner,
    loader: Arc<dyn SessionLoader>,
    classifier_model: String,
    segmentation_model: String,
    state: RwLock<EngineState>,
    init_lock: tokio::sync::Mutex<()>,
    handle: OnceLock<SessionHandle>,
}

impl InferenceEngine {
    pub fn new(config: &Config, loader: Arc<dyn SessionLoader>) -> Self {
        Self {
            provisioner: ModelProvisioner::new(&config.bundle_dir, &config.cache_dir),
            loader,
            classifier_model: config.classifier_model.clone(),
            segmentation_model: config.segmentation_model.clone(),
            state: RwLock::new(EngineState::Uninitialized),
            init_lock: tokio::sync::Mutex::new(()),
            handle: OnceLock::new(),
        }
    }

    /// Construct the engine and, when called inside a tokio runtime, begin
    /// initialization in the background.
    pub fn start(config: &Config, loader: Arc<dyn SessionLoader>) -> Arc<Self> {
        let engine = Arc::new(Self::new(config, loader));
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let background = Arc::clone(&engine);
            runtime.spawn(async move {
                // outcome is recorded in the engine state
                let _ = background.initialize().await;
            });
        }
        engine
    }

    pub fn state(&self) -> EngineState {
        self.state.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.read() == EngineState::Ready
    }

    fn settled(&self) -> Option<Result<()>> {
        match &*self.state.read() {
            EngineState::Ready => Some(Ok(())),
            EngineState::Failed(reason) => Some(Err(WoundAnalysisError::EngineNotReady {
                reason: reason.clone(),
            })),
            EngineState::Uninitialized | EngineState::Initializing => None,
        }
    }

    /// Load the sessions once. Safe to call from any number of tasks.
    pub async fn initialize(&self) -> Result<()> {
        if let Some(outcome) = self.settled() {
            return outcome;
        }

        let _guard = self.init_lock.lock().await;
        if let Some(outcome) = self.settled() {
            return outcome;
        }
        *self.state.write() = EngineState::Initializing;
        info!("initializing inference engine");

        let provisioner = self.provisioner.clone();
        let loader = Arc::clone(&self.loader);
        let classifier_model = self.classifier_model.clone();
        let segmentation_model = self.segmentation_model.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            load_sessions(
                &provisioner,
                loader.as_ref(),
                &classifier_model,
                &segmentation_model,
            )
        })
        .await
        .map_err(WoundAnalysisError::from)
        .and_then(|loaded| loaded);

        match loaded {
            Ok(sessions) => {
                let has_segmenter = sessions.segmenter.is_some();
                // init_lock is held and the state was not Ready, so the cell is empty
                let _ = self.handle.set(SessionHandle {
                    sessions: Arc::new(Mutex::new(sessions)),
                    has_segmenter,
                });
                *self.state.write() = EngineState::Ready;
                info!("inference engine ready (segmentation: {has_segmenter})");
                Ok(())
            }
            Err(e) => {
                warn!("inference engine failed to initialize: {e}");
                *self.state.write() = EngineState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn ready_handle(&self) -> Result<SessionHandle> {
        self.initialize().await?;
        self.handle
            .get()
            .cloned()
            .ok_or_else(|| WoundAnalysisError::EngineNotReady {
                reason: "sessions missing after initialization".to_string(),
            })
    }

    pub async fn has_segmentation(&self) -> bool {
        self.ready_handle()
            .await
            .map(|handle| handle.has_segmenter)
            .unwrap_or(false)
    }

    /// Raw classifier scores for `tensor`.
    pub async fn run_classifier(&self, tensor: Arc<ImageTensor>) -> Result<ArrayD<f32>> {
        let handle = self.ready_handle().await?;
        run_serialized(handle, "classification", move |sessions| {
            sessions.classifier.run(tensor.view())
        })
        .await
    }

    /// Raw segmentation mask for `tensor`, or `None` without a segmentation model.
    pub async fn run_segmenter(&self, tensor: Arc<ImageTensor>) -> Result<Option<ArrayD<f32>>> {
        let handle = self.ready_handle().await?;
        if !handle.has_segmenter {
            return Ok(None);
        }
        run_serialized(handle, "segmentation", move |sessions| {
            sessions
                .segmenter
                .as_mut()
                .map(|segmenter| segmenter.run(tensor.view()))
                .transpose()
        })
        .await
    }
}

async fn run_serialized<T, F>(handle: SessionHandle, operation: &'static str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut LoadedSessions) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut sessions = handle.sessions.lock();
        let started = Instant::now();
        let output = f(&mut sessions);
        debug!("{operation} inference took {:?}", started.elapsed());
        output
    })
    .await?
}

fn load_sessions(
    provisioner: &ModelProvisioner,
    loader: &dyn SessionLoader,
    classifier_model: &str,
    segmentation_model: &str,
) -> Result<LoadedSessions> {
    let classifier_path =
        provisioner
            .resolve(classifier_model)
            .ok_or_else(|| WoundAnalysisError::ModelUnavailable {
                name: classifier_model.to_string(),
            })?;
    let classifier = loader.load(&classifier_path)?;

    let segmenter = match provisioner.resolve(segmentation_model) {
        Some(path) => match loader.load(&path) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("segmentation model {segmentation_model} failed to load: {e}");
                None
            }
        },
        None => None,
    };

    Ok(LoadedSessions {
        classifier,
        segmenter,
    })
}
