use base64::Engine;
use drive_protocol::{BridgeMessage, ControlPayload, TelemetryPayload};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::FrameError;
use crate::model::SteeringModel;
use crate::policy::{ThrottlePolicy, rescale_steering};
use crate::preprocess::Preprocessor;

/// Telemetry outpacing the loop backs up here before the transport
/// stalls the socket.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Transport-side handle for the simulator currently driving.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    pub id: u64,
    pub commands: mpsc::UnboundedSender<BridgeMessage>,
}

#[derive(Debug)]
pub enum BridgeEvent {
    PeerConnected { peer: PeerHandle },
    Telemetry { peer_id: u64, frame: TelemetryPayload },
    PeerDisconnected { peer_id: u64 },
}

enum LinkState {
    Ready,
    Connected(PeerHandle),
}

/// The control loop. Owns the model outright, so a whole iteration runs
/// without locks or yields, one event at a time.
pub struct Driver {
    model: Box<dyn SteeringModel>,
    preprocessor: Preprocessor,
    policy: ThrottlePolicy,
    state: LinkState,
}

impl Driver {
    pub fn new(model: Box<dyn SteeringModel>, preprocessor: Preprocessor) -> Self {
        Self {
            model,
            preprocessor,
            policy: ThrottlePolicy::default(),
            state: LinkState::Ready,
        }
    }

    /// Drain events until every transport sender is gone. Runs on its own
    /// thread and blocks between events.
    pub fn run(mut self, mut events: mpsc::Receiver<BridgeEvent>) {
        while let Some(event) = events.blocking_recv() {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::PeerConnected { peer } => {
                info!(peer = peer.id, "simulator connected");
                send_to(&peer, ControlPayload::neutral());
                self.state = LinkState::Connected(peer);
            }
            BridgeEvent::Telemetry { peer_id, frame } => {
                let connected =
                    matches!(&self.state, LinkState::Connected(peer) if peer.id == peer_id);
                if !connected {
                    warn!(peer = peer_id, "telemetry from a peer that is not connected");
                    return;
                }
                match self.compute_command(&frame) {
                    Ok(control) => {
                        if let LinkState::Connected(peer) = &self.state {
                            debug!(
                                peer = peer.id,
                                steering_angle = %control.steering_angle,
                                throttle = %control.throttle,
                                "steer"
                            );
                            send_to(peer, control);
                        }
                    }
                    Err(error) => warn!(peer = peer_id, %error, "dropping frame"),
                }
            }
            BridgeEvent::PeerDisconnected { peer_id } => {
                if matches!(&self.state, LinkState::Connected(peer) if peer.id == peer_id) {
                    info!(peer = peer_id, "simulator disconnected");
                    self.state = LinkState::Ready;
                }
            }
        }
    }

    /// One full pipeline pass: decode, preprocess, infer, rescale, shape
    /// the throttle. Any failure drops the frame without a command.
    fn compute_command(&mut self, frame: &TelemetryPayload) -> Result<ControlPayload, FrameError> {
        let speed = parse_field("speed", &frame.speed)?;
        let reported_throttle = parse_field("throttle", &frame.throttle)?;

        let image_bytes =
            base64::engine::general_purpose::STANDARD.decode(frame.image.as_bytes())?;
        let image = image::load_from_memory(&image_bytes)?;
        let input = self.preprocessor.run(&image);

        let raw = self.model.predict(input)?;
        let steering_angle = rescale_steering(raw);
        let throttle = self.policy.decide(steering_angle, speed, reported_throttle);
        Ok(ControlPayload::from_values(steering_angle, throttle))
    }
}

fn parse_field(field: &'static str, value: &str) -> Result<f32, FrameError> {
    value.trim().parse().map_err(|_| FrameError::Telemetry {
        field,
        value: value.to_string(),
    })
}

fn send_to(peer: &PeerHandle, control: ControlPayload) {
    if peer.commands.send(BridgeMessage::Steer(control)).is_err() {
        warn!(peer = peer.id, "peer command channel closed");
    }
}
