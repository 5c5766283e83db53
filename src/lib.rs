pub mod area;
pub mod classification;
pub mod config;
pub mod engine;
pub mod errors;
pub mod healing;
pub mod infection;
pub mod model;
pub mod preprocess;
pub mod provisioner;
pub mod traits;
pub mod types;

pub mod mocks;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

pub use config::Config;
pub use engine::{EngineState, InferenceEngine};
pub use errors::{Result, WoundAnalysisError};
pub use model::{OrtLoader, OrtSession};
pub use preprocess::{preprocess, validate_photo, ImageTensor};
pub use provisioner::ModelProvisioner;
pub use traits::*;
pub use types::*;

/// Outputs of the three stages that consume the preprocessed image.
struct ImageStages {
    area_cm2: f64,
    classification: WoundClassification,
    infection_risk: InfectionRiskAssessment,
}

/// Entry point of the pipeline: one photo plus history in, one
/// [`WoundAnalysisResult`] out.
pub struct WoundAnalyzer {
    engine: Arc<InferenceEngine>,
    config: Config,
}

impl WoundAnalyzer {
    pub const fn new(engine: Arc<InferenceEngine>, config: Config) -> Self {
        Self { engine, config }
    }

    /// Analyzer backed by ONNX Runtime sessions from `config`'s model bundle.
    pub fn with_onnx_models(config: Config) -> Self {
        let engine = InferenceEngine::start(&config, Arc::new(OrtLoader::new(config.device_id)));
        Self::new(engine, config)
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Analyze the photo at `image_path`.
    ///
    /// Only a missing or empty path is returned as `Err`. Every other failure
    /// degrades: a stage failure to that stage's fallback value, anything
    /// else to a whole-result fallback carrying the message.
    pub async fn analyze(
        &self,
        wound_id: i64,
        history: &[PhotoRecord],
        image_path: &Path,
        latest_log: Option<&SymptomLog>,
    ) -> Result<WoundAnalysisResult> {
        validate_input(image_path)?;
        info!("analyzing wound {wound_id} from {}", image_path.display());

        let latest_photo = history.iter().max_by_key(|photo| photo.taken_at);
        let (stages, healing) = tokio::join!(
            self.run_image_stages(image_path, latest_photo, latest_log),
            async { healing::predict_healing(history) },
        );
        let analyzed_at = Utc::now();

        let result = match stages {
            Ok(stages) => WoundAnalysisResult {
                wound_id,
                confidence_score: overall_confidence(
                    stages.classification.confidence,
                    stages.infection_risk.risk_score,
                ),
                area_cm2: stages.area_cm2,
                classification: stages.classification,
                infection_risk: stages.infection_risk,
                healing,
                analyzed_at,
                error_message: None,
            },
            Err(e) => {
                warn!("analysis of wound {wound_id} fell back: {e}");
                let message = e.to_string();
                WoundAnalysisResult {
                    wound_id,
                    area_cm2: 0.0,
                    classification: WoundClassification::fallback(message.clone()),
                    infection_risk: InfectionRiskAssessment::fallback(message.clone()),
                    healing,
                    confidence_score: 0.0,
                    analyzed_at,
                    error_message: Some(message),
                }
            }
        };
        Ok(result)
    }

    async fn run_image_stages(
        &self,
        image_path: &Path,
        latest_photo: Option<&PhotoRecord>,
        latest_log: Option<&SymptomLog>,
    ) -> Result<ImageStages> {
        let path = image_path.to_path_buf();
        let size = self.config.input_size;
        let tensor = tokio::task::spawn_blocking(move || preprocess(&path, size, size)).await??;
        debug!("preprocessed tensor of {} values", tensor.len());
        let tensor = Arc::new(tensor);

        let (classification, area_cm2, infection_risk) = tokio::join!(
            classification::classify(&self.engine, Arc::clone(&tensor)),
            area::estimate_area(
                &self.engine,
                Arc::clone(&tensor),
                self.config.pixels_per_cm2,
                self.config.fallback_delay(),
            ),
            assess_infection(Arc::clone(&tensor), latest_log.cloned(), latest_photo.cloned()),
        );

        Ok(ImageStages {
            area_cm2,
            classification,
            infection_risk,
        })
    }
}

async fn assess_infection(
    tensor: Arc<ImageTensor>,
    latest_log: Option<SymptomLog>,
    latest_photo: Option<PhotoRecord>,
) -> InfectionRiskAssessment {
    let assessed = tokio::task::spawn_blocking(move || {
        infection::assess_risk(&tensor, latest_log.as_ref(), latest_photo.as_ref())
    })
    .await;
    assessed.unwrap_or_else(|e| {
        warn!("infection risk fell back: {e}");
        InfectionRiskAssessment::fallback(e.to_string())
    })
}

fn validate_input(image_path: &Path) -> Result<()> {
    if image_path.as_os_str().is_empty() {
        return Err(WoundAnalysisError::input("image_path", "must not be empty"));
    }
    if !image_path.is_file() {
        return Err(WoundAnalysisError::input(
            "image_path",
            format!("{} does not exist", image_path.display()),
        ));
    }
    Ok(())
}

/// Mean of the classification confidence and the decisiveness of the risk
/// score. A score of exactly 0.5 is least decisive.
pub fn overall_confidence(classification_confidence: f64, risk_score: f64) -> f64 {
    let decisiveness = 0.5 + (risk_score - 0.5).abs();
    ((classification_confidence + decisiveness) / 2.0).clamp(0.0, 1.0)
}
