use crate::client::RpcClient;
use phantom_core::{Error, Result};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Polls the dispatcher's `/ping` until it answers or the deadline passes.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    client: RpcClient,
    interval: Duration,
    deadline: Duration,
}

impl ReadinessProbe {
    pub fn new(client: RpcClient) -> Self {
        Self {
            client,
            interval: DEFAULT_INTERVAL,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Failed probes only mean "not ready yet"; the deadline is the only
    /// fatal outcome. It also cuts short a probe that is still in flight.
    pub async fn wait(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::Config("probe interval must be positive".to_string()));
        }
        let poll = async {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut attempts: u32 = 0;
            loop {
                ticker.tick().await;
                attempts += 1;
                match self.client.ping().await {
                    Ok(()) => return attempts,
                    Err(e) => debug!(attempt = attempts, error = %e, "Dispatcher not ready yet"),
                }
            }
        };

        match tokio::time::timeout(self.deadline, poll).await {
            Ok(attempts) => {
                info!(url = %self.client.base_url(), attempts, "Dispatcher ready");
                Ok(())
            }
            Err(_) => Err(Error::ReadinessTimeout(format!(
                "{} did not answer {} within {:?}",
                self.client.base_url(),
                phantom_core::protocol::PING_PATH,
                self.deadline
            ))),
        }
    }
}
