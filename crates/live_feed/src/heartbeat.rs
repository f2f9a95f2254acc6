//! Heartbeat watchdog.
//!
//! Spojení může vypadat otevřené, i když server už nic neposílá. Když od
//! posledního ack (nebo od connectu) uběhne víc než `timeout`, je mrtvé.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    timeout: Duration,
    last_ack: Instant,
    last_sent: Option<Instant>,
    sent: u64,
    acked: u64,
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_ack: Instant::now(),
            last_sent: None,
            sent: 0,
            acked: 0,
        }
    }

    pub fn record_sent(&mut self) {
        self.last_sent = Some(Instant::now());
        self.sent += 1;
    }

    pub fn record_ack(&mut self) {
        self.last_ack = Instant::now();
        self.acked += 1;
    }

    pub fn since_ack(&self) -> Duration {
        self.last_ack.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.since_ack() > self.timeout
    }

    pub fn counts(&self) -> (u64, u64) {
        (self.sent, self.acked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expires_without_ack() {
        let mut m = HeartbeatMonitor::new(Duration::from_secs(45));
        m.record_sent();
        tokio::time::advance(Duration::from_secs(44)).await;
        assert!(!m.is_expired());

        m.record_ack();
        tokio::time::advance(Duration::from_secs(44)).await;
        assert!(!m.is_expired());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(m.is_expired());
        assert_eq!(m.counts(), (1, 1));
    }
}
