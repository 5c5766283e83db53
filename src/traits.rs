use crate::errors::Result;
use ndarray::prelude::*;
use std::path::Path;

/// A loaded, runnable model.
///
/// Implementations are not required to be reentrant; the inference engine
/// serializes every call behind its session lock.
pub trait InferenceSession: Send {
    /// Run the model on one NHWC input tensor and return its first output.
    fn run(&mut self, input: ArrayView4<f32>) -> Result<ArrayD<f32>>;
}

/// Turns a resolved model artifact into a session.
pub trait SessionLoader: Send + Sync {
    fn load(&self, model_path: &Path) -> Result<Box<dyn InferenceSession>>;
}
