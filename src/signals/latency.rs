use std::time::Instant;

/// Measures caller speech-end → agent final response time
///
/// At most one timer is armed. A timer that is not closed by an agent final
/// is discarded on speech-start or call end and produces no measurement.
#[derive(Debug, Default, Clone)]
pub struct LatencyTimer {
    armed_at: Option<Instant>,
    last_latency_ms: Option<u64>,
    total_ms: u64,
    samples: u32,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer
    pub fn arm(&mut self, now: Instant) {
        self.armed_at = Some(now);
    }

    /// Discard the armed timer without producing a measurement
    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    /// Close the armed timer, if any, and record the measurement
    pub fn complete(&mut self, now: Instant) -> Option<u64> {
        let armed_at = self.armed_at.take()?;
        let ms = now.saturating_duration_since(armed_at).as_millis() as u64;
        self.last_latency_ms = Some(ms);
        self.total_ms = self.total_ms.saturating_add(ms);
        self.samples += 1;
        Some(ms)
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn last_latency_ms(&self) -> Option<u64> {
        self.last_latency_ms
    }

    pub fn average_latency_ms(&self) -> Option<u64> {
        (self.samples > 0).then(|| self.total_ms / u64::from(self.samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_complete_without_arm_is_none() {
        let mut timer = LatencyTimer::new();
        assert_eq!(timer.complete(Instant::now()), None);
        assert_eq!(timer.last_latency_ms(), None);
    }

    #[test]
    fn test_measurement_and_average() {
        let mut timer = LatencyTimer::new();
        let t0 = Instant::now();

        timer.arm(t0);
        assert_eq!(timer.complete(t0 + Duration::from_millis(400)), Some(400));
        assert!(!timer.is_armed());

        timer.arm(t0);
        timer.complete(t0 + Duration::from_millis(800));
        assert_eq!(timer.last_latency_ms(), Some(800));
        assert_eq!(timer.average_latency_ms(), Some(600));
    }

    #[test]
    fn test_disarm_discards() {
        let mut timer = LatencyTimer::new();
        let t0 = Instant::now();
        timer.arm(t0);
        timer.disarm();
        assert_eq!(timer.complete(t0 + Duration::from_millis(50)), None);
    }
}
