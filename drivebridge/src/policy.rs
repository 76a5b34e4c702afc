/// Throttle shaping constants, carried over from road testing.
#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    pub throttle_max: f32,
    pub throttle_min: f32,
    pub steering_max: f32,
    pub top_speed: f32,
    pub crawl_speed: f32,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            throttle_max: 0.1,
            throttle_min: -0.2,
            steering_max: 2.0 / 25.0,
            top_speed: 10.0,
            crawl_speed: 5.0,
        }
    }
}

impl ThrottlePolicy {
    /// Pick the next throttle from the predicted angle and the telemetry
    /// readings. The speed ceiling shrinks as the wheel turns; past it,
    /// braking strength scales with the angle. Below crawl speed the
    /// throttle is forced up no matter what, and when no rule fires the
    /// reported throttle passes through unchanged.
    pub fn decide(&self, steering_angle: f32, speed: f32, reported_throttle: f32) -> f32 {
        let mut throttle = reported_throttle;
        if speed > (1.0 - steering_angle.abs()) * self.top_speed {
            throttle = (steering_angle.abs() / self.steering_max * self.throttle_min)
                .max(self.throttle_min);
        }
        if speed < self.crawl_speed {
            throttle = self.throttle_max;
        }
        throttle
    }
}

/// Map the model's native [0, 1] output onto the simulator's [-1, 1]
/// steering range.
pub fn rescale_steering(raw: f32) -> f32 {
    raw * 2.0 - 1.0
}
