use std::time::Duration;

/// What the session does when the broker connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    Disabled,
    Backoff { initial: Duration, max: Duration },
}

impl ReconnectPolicy {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ReconnectPolicy::Backoff { .. })
    }

    pub fn backoff(&self) -> Option<Backoff> {
        match *self {
            ReconnectPolicy::Disabled => None,
            ReconnectPolicy::Backoff { initial, max } => Some(Backoff::new(initial, max)),
        }
    }
}

/// Exponential delay between reconnect attempts, doubled per attempt and capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self { initial, max, current: initial }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
