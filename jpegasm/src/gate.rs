use tokio::sync::watch;

/// Fire-once broadcast signal that the codec module is safe to call into.
///
/// Any number of tasks may wait; all of them resume when the gate fires, and
/// tasks arriving afterwards resume immediately.
#[derive(Debug)]
pub struct ReadinessGate {
    tx: watch::Sender<bool>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Opens the gate. Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn await_ready(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_exactly_once() {
        let gate = ReadinessGate::new();
        assert!(!gate.is_ready());
        assert!(gate.fire());
        assert!(!gate.fire());
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn wakes_every_pending_waiter() {
        let gate = Arc::new(ReadinessGate::new());
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.await_ready().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(waiters.iter().all(|w| !w.is_finished()));

        gate.fire();
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(5), waiter)
                .await
                .expect("waiter resumed")
                .expect("waiter task");
        }
    }

    #[tokio::test]
    async fn late_waiters_pass_straight_through() {
        let gate = ReadinessGate::new();
        gate.fire();
        tokio::time::timeout(Duration::from_millis(100), gate.await_ready())
            .await
            .expect("already-open gate does not block");
    }
}
