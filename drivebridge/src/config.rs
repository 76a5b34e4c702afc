use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "0.0.0.0:4567";

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub bind: String,
    pub definition_path: PathBuf,
}

impl BridgeConfig {
    pub fn new(definition_path: impl Into<PathBuf>) -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            definition_path: definition_path.into(),
        }
    }

    /// Weights live next to the definition, same stem, `.onnx` extension.
    pub fn weights_path(&self) -> PathBuf {
        self.definition_path.with_extension("onnx")
    }
}

#[cfg(test)]
mod tests {
    use super::BridgeConfig;
    use std::path::Path;

    #[test]
    fn weights_path_swaps_the_extension() {
        let config = BridgeConfig::new("models/drive.json");
        assert_eq!(config.weights_path(), Path::new("models/drive.onnx"));
    }

    #[test]
    fn weights_path_handles_missing_extension() {
        let config = BridgeConfig::new("drive");
        assert_eq!(config.weights_path(), Path::new("drive.onnx"));
    }

    #[test]
    fn default_bind_is_the_simulator_port() {
        let config = BridgeConfig::new("drive.json");
        assert_eq!(config.bind, "0.0.0.0:4567");
    }
}
