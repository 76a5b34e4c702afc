use std::path::Path;

use serde::Deserialize;

use crate::error::StartupError;

pub const VGG_INPUT_SIZE: u32 = 224;

/// Per-channel means removed by the vgg variant, BGR order.
pub const VGG_CHANNEL_MEANS: [f32; 3] = [103.939, 116.779, 123.68];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreprocessKind {
    Vgg,
    YcbcrNormalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub layout: TensorLayout,
}

/// Model definition file: what the weights next to it expect as input.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub preprocess: PreprocessKind,
    pub input: InputSpec,
    #[serde(default = "default_channel_means")]
    pub channel_means: [f32; 3],
}

fn default_channel_means() -> [f32; 3] {
    VGG_CHANNEL_MEANS
}

impl ModelDefinition {
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let text =
            std::fs::read_to_string(path).map_err(|source| StartupError::DefinitionRead {
                path: path.to_path_buf(),
                source,
            })?;
        let definition: Self =
            serde_json::from_str(&text).map_err(|source| StartupError::DefinitionParse {
                path: path.to_path_buf(),
                source,
            })?;
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> Result<(), StartupError> {
        if self.input.width == 0 || self.input.height == 0 {
            return Err(StartupError::DefinitionInvalid(format!(
                "input dimensions must be non-zero, got {}x{}",
                self.input.width, self.input.height
            )));
        }
        if self.preprocess == PreprocessKind::Vgg
            && (self.input.width != VGG_INPUT_SIZE || self.input.height != VGG_INPUT_SIZE)
        {
            return Err(StartupError::DefinitionInvalid(format!(
                "vgg preprocessing expects a {VGG_INPUT_SIZE}x{VGG_INPUT_SIZE} input, got {}x{}",
                self.input.width, self.input.height
            )));
        }
        Ok(())
    }

    /// Tensor shape for a single-frame batch, in the declared layout.
    pub fn input_shape(&self) -> [usize; 4] {
        let (w, h) = (self.input.width as usize, self.input.height as usize);
        match self.input.layout {
            TensorLayout::Nhwc => [1, h, w, 3],
            TensorLayout::Nchw => [1, 3, h, w],
        }
    }
}
