use std::path::PathBuf;

/// Errors that abort startup before the bridge begins serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to read model definition {}: {source}", .path.display())]
    DefinitionRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse model definition {}: {source}", .path.display())]
    DefinitionParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid model definition: {0}")]
    DefinitionInvalid(String),

    #[error("model weights not found at {}", .0.display())]
    WeightsMissing(PathBuf),

    #[error("failed to load model weights {}: {source}", .path.display())]
    WeightsLoad { path: PathBuf, source: ort::Error },

    #[error("model rejected input shape {shape:?}: {source}")]
    InputShapeRejected {
        shape: [usize; 4],
        source: FrameError,
    },
}

/// Errors confined to a single telemetry frame. The control loop logs
/// these, drops the frame, and keeps serving.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("telemetry field {field} is not a number: {value:?}")]
    Telemetry { field: &'static str, value: String },

    #[error("image payload is not valid base64: {0}")]
    ImageEncoding(#[from] base64::DecodeError),

    #[error("image payload could not be decoded: {0}")]
    ImageFormat(#[from] image::ImageError),

    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("model returned no output values")]
    EmptyOutput,
}
