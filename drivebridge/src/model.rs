use std::path::Path;

use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Value,
};
use tracing::info;

use crate::error::{FrameError, StartupError};
use crate::manifest::ModelDefinition;

/// A single-item input batch, batch dimension leading.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn zeros(shape: [usize; 4]) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }
}

/// A loaded steering predictor: one raw scalar in the model's native
/// [0, 1] range per input frame.
pub trait SteeringModel: Send {
    fn predict(&mut self, input: Tensor) -> Result<f32, FrameError>;
}

pub struct OnnxSteeringModel {
    session: Session,
    input_name: String,
}

impl OnnxSteeringModel {
    pub fn load(weights_path: &Path, definition: &ModelDefinition) -> Result<Self, StartupError> {
        if !weights_path.is_file() {
            return Err(StartupError::WeightsMissing(weights_path.to_path_buf()));
        }
        let session = build_session(weights_path).map_err(|source| StartupError::WeightsLoad {
            path: weights_path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            session,
            input_name: definition.input.name.clone(),
        })
    }
}

fn build_session(weights_path: &Path) -> Result<Session, ort::Error> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .commit_from_file(weights_path)
}

impl SteeringModel for OnnxSteeringModel {
    fn predict(&mut self, input: Tensor) -> Result<f32, FrameError> {
        let value = Value::from_array((input.shape.as_slice(), input.data.into_boxed_slice()))?;
        let name = self.input_name.as_str();
        let outputs = self.session.run(ort::inputs![name => value])?;
        let (_, data) = outputs[0].try_extract_tensor::<f32>()?;
        data.first().copied().ok_or(FrameError::EmptyOutput)
    }
}

/// Load the weights next to the definition and verify the declared input
/// shape with one inference pass before any peer is accepted.
pub fn load_model(
    weights_path: &Path,
    definition: &ModelDefinition,
) -> Result<Box<dyn SteeringModel>, StartupError> {
    let mut model = OnnxSteeringModel::load(weights_path, definition)?;
    let shape = definition.input_shape();
    model
        .predict(Tensor::zeros(shape))
        .map_err(|source| StartupError::InputShapeRejected { shape, source })?;
    info!(model = %definition.name, "model loaded and probed");
    Ok(Box::new(model))
}

#[cfg(test)]
mod tests {
    use super::Tensor;

    #[test]
    fn zeros_sizes_the_buffer_from_the_shape() {
        let tensor = Tensor::zeros([1, 4, 8, 3]);
        assert_eq!(tensor.shape, [1, 4, 8, 3]);
        assert_eq!(tensor.data.len(), 96);
        assert!(tensor.data.iter().all(|v| *v == 0.0));
    }
}
