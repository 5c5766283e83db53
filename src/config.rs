use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CLASSIFIER_MODEL: &str = "wound_classifier.onnx";
pub const DEFAULT_SEGMENTATION_MODEL: &str = "wound_segmentation.onnx";

/// Placeholder calibration: wound pixels per cm² at the model input size,
/// assuming no reference object in the photo.
pub const DEFAULT_PIXELS_PER_CM2: f64 = 1000.0;

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Directory holding the packaged model artifacts
    #[arg(long, default_value = "models")]
    pub bundle_dir: PathBuf,

    /// Writable directory the models are mirrored into on first use
    #[arg(long, default_value = "cache/models")]
    pub cache_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_CLASSIFIER_MODEL)]
    pub classifier_model: String,

    #[arg(long, default_value = DEFAULT_SEGMENTATION_MODEL)]
    pub segmentation_model: String,

    /// Edge length of the square model input
    #[arg(long, default_value_t = 224, value_parser = clap::value_parser!(u32).range(1..))]
    pub input_size: u32,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    /// Wound pixels per cm² at the model input size
    #[arg(long, default_value_t = DEFAULT_PIXELS_PER_CM2, value_parser = check_calibration)]
    pub pixels_per_cm2: f64,

    /// Simulated latency applied on fallback paths
    #[arg(long, default_value_t = 500)]
    pub fallback_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle_dir: PathBuf::from("models"),
            cache_dir: PathBuf::from("cache/models"),
            classifier_model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            segmentation_model: DEFAULT_SEGMENTATION_MODEL.to_string(),
            input_size: 224,
            device_id: 0,
            pixels_per_cm2: DEFAULT_PIXELS_PER_CM2,
            fallback_delay_ms: 500,
        }
    }
}

impl Config {
    pub const fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }
}

/// A usable calibration constant is finite and strictly positive.
pub fn is_valid_calibration(pixels_per_cm2: f64) -> bool {
    pixels_per_cm2.is_finite() && pixels_per_cm2 > 0.0
}

fn check_calibration(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|e| format!("{s} is not a number: {e}"))?;
    if !is_valid_calibration(value) {
        return Err(format!("{s} must be a finite, positive pixels-per-cm² value"));
    }
    Ok(value)
}
