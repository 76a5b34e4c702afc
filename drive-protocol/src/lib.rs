use serde::{Deserialize, Serialize};

/// One telemetry tick from the simulator. The simulator serializes every
/// field as a string, numbers included; `image` is a base64-encoded
/// compressed camera frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub steering_angle: String,
    pub throttle: String,
    pub speed: String,
    pub image: String,
}

/// Steering command returned to the simulator, values as text to match
/// what the simulator parses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPayload {
    pub steering_angle: String,
    pub throttle: String,
}

impl ControlPayload {
    pub fn from_values(steering_angle: f32, throttle: f32) -> Self {
        Self {
            steering_angle: steering_angle.to_string(),
            throttle: throttle.to_string(),
        }
    }

    /// The command sent on connect: wheel centered, no throttle.
    pub fn neutral() -> Self {
        Self::from_values(0.0, 0.0)
    }
}

/// Messages the simulator sends, framed as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SimulatorMessage {
    Telemetry(TelemetryPayload),
}

/// Messages the bridge sends back, same framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum BridgeMessage {
    Steer(ControlPayload),
}
