use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::conv::PaddingMode;
use crate::error::Result;

/// Arithmetic used by every weighted and pooling layer of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    #[default]
    Float,
    /// INT8 operands, INT32 accumulation, calibrated per call.
    Quantized,
}

/// Reduction performed by both pooling layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolMode {
    #[default]
    Max,
    Average,
}

/// Build-time options of a LeNet model.
///
/// Consumed once when the network is assembled; a built network cannot change
/// precision, padding or pooling afterwards. Missing JSON fields take their
/// defaults, which give the classic LeNet build (float, no padding, max
/// pooling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub precision: Precision,
    pub conv1_padding: PaddingMode,
    pub conv2_padding: PaddingMode,
    pub pooling: PoolMode,
}

impl ModelConfig {
    pub fn quantized() -> Self {
        ModelConfig {
            precision: Precision::Quantized,
            ..Default::default()
        }
    }

    pub fn with_precision(self, precision: Precision) -> Self {
        ModelConfig { precision, ..self }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        info!("loaded model config from {}: {:?}", path.as_ref().display(), config);
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
