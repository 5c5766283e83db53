use std::path::Path;

use crate::{
    errors::{WoundAnalysisError, Result},
    traits::{InferenceSession, SessionLoader},
};
use log::{debug, info};
use ndarray::prelude::*;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};

/// Tags an ONNX Runtime failure with the setup step it came from.
fn session_error(operation: impl Into<String>) -> impl FnOnce(ort::Error) -> WoundAnalysisError {
    let operation = operation.into();
    move |e| WoundAnalysisError::Inference {
        operation,
        source: Box::new(e),
    }
}

/// ONNX Runtime backed session.
pub struct OrtSession {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OrtSession {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let providers = [
            TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
        ];
        let session = SessionBuilder::new()
            .map_err(session_error("session builder init"))?
            .with_execution_providers(providers)
            .map_err(session_error("execution provider setup"))?
            .with_memory_pattern(true)
            .map_err(session_error("memory pattern setup"))?
            .commit_from_file(model_path)
            .map_err(session_error(format!("model load: {}", model_path.display())))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| WoundAnalysisError::inference("model input lookup", "model has no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| {
                WoundAnalysisError::inference("model output lookup", "model has no outputs")
            })?;

        info!(
            "loaded {} (input `{}`, output `{}`)",
            model_path.display(),
            input_name,
            output_name
        );

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }
}

impl InferenceSession for OrtSession {
    fn run(&mut self, input: ArrayView4<f32>) -> Result<ArrayD<f32>> {
        let input = input.as_standard_layout();
        let outputs = self.session.run(
            ort::inputs![self.input_name.as_str() => TensorRef::from_array_view(&input)?],
        )?;
        let output = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .to_owned();
        debug!("{} -> {:?}", self.input_name, output.shape());
        Ok(output)
    }
}

/// Loads models through ONNX Runtime, preferring GPU providers when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrtLoader {
    pub device_id: i32,
}

impl OrtLoader {
    pub const fn new(device_id: i32) -> Self {
        Self { device_id }
    }
}

impl SessionLoader for OrtLoader {
    fn load(&self, model_path: &Path) -> Result<Box<dyn InferenceSession>> {
        Ok(Box::new(OrtSession::new(model_path, self.device_id)?))
    }
}
