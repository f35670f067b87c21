/// The liveness-by-progress loop: polls the pool balance on a fixed interval
/// and restarts the miner when the balance stops advancing.
///
/// The restart is deliberately split across two ticks: a stall with a live
/// process only stops the miner; the following tick, still stalled but with
/// the process gone, starts it again. The gap gives the killed process time
/// to vacate the process table and the pool time to notice the disconnect.
use crate::process::MinerControl;
use crate::stats::{StatsClient, StatsError};
use crate::status::{StatusStore, WatchState};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How a fetched balance relates to the previous observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sample {
    /// No previous balance; this sample becomes the baseline.
    Bootstrap,
    /// The balance changed. A payout lowers the balance, which also lands
    /// here: any strict change counts as progress.
    Progress,
    /// Identical to the previous sample: the miner has produced no work
    /// for a full poll interval.
    Stall,
}

pub(crate) fn classify(prev: Option<f64>, balance: f64) -> Sample {
    match prev {
        None => Sample::Bootstrap,
        // Exact equality is the stall definition: balances arrive as decimal
        // strings, so an unchanged pool value parses to the identical f64.
        Some(prev) if prev == balance => Sample::Stall,
        Some(_) => Sample::Progress,
    }
}

pub struct Monitor {
    wallet: String,
    stats: StatsClient,
    control: Arc<dyn MinerControl>,
    store: StatusStore,
    poll_interval: Duration,
    last_balance: Option<f64>,
}

impl Monitor {
    pub fn new(
        wallet: String,
        stats: StatsClient,
        control: Arc<dyn MinerControl>,
        store: StatusStore,
        poll_interval: Duration,
    ) -> Self {
        Self {
            wallet,
            stats,
            control,
            store,
            poll_interval,
            last_balance: None,
        }
    }

    /// Run forever. There is no cancellation path; the loop lives as long
    /// as the process.
    pub async fn run(mut self) {
        info!(wallet = %self.wallet, "monitoring miner");
        loop {
            tokio::time::sleep(self.poll_interval).await;
            self.tick().await;
        }
    }

    async fn tick(&mut self) {
        self.store.set_last_check(Utc::now());
        let fetched = self.stats.fetch(&self.wallet).await;
        self.observe(fetched).await;
    }

    /// Apply one poll result. Fetch failures never touch the baseline or
    /// the miner process; only a positively observed stall does.
    pub(crate) async fn observe(&mut self, fetched: Result<f64, StatsError>) {
        let balance = match fetched {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to fetch pool stats");
                self.store
                    .set_state(WatchState::Error(format!("error getting statistics: {e}")));
                return;
            }
        };

        self.store.set_last_balance(Some(balance));

        match classify(self.last_balance, balance) {
            Sample::Bootstrap => {
                info!(balance, "balance baseline established");
                self.last_balance = Some(balance);
                self.store.set_state(WatchState::Running);
            }
            Sample::Progress => {
                info!(balance, "miner running, balance advanced");
                self.last_balance = Some(balance);
                self.store.set_state(WatchState::Running);
            }
            Sample::Stall => self.handle_stall(balance).await,
        }
    }

    async fn handle_stall(&mut self, balance: f64) {
        match self.control.is_running().await {
            Err(e) => {
                warn!(error = %e, "failed to check miner process");
                self.store.set_state(WatchState::Error(format!(
                    "error checking if miner is running: {e}"
                )));
            }
            Ok(true) => {
                // Stop only; the start happens on a later stalled tick once
                // the process has actually vacated the process table.
                info!(balance, "balance unchanged with miner alive, stopping miner");
                self.store.set_state(WatchState::StoppingMiner);
                self.control.stop().await;
            }
            Ok(false) => {
                info!(balance, "balance unchanged with miner gone, starting miner");
                self.store.set_state(WatchState::StartingMiner);
                if let Err(e) = self.control.start().await {
                    warn!(error = %e, "failed to start miner, will retry on next stall");
                    self.store
                        .set_state(WatchState::Error(format!("error starting miner: {e}")));
                }
                // Re-bootstrap either way so the post-restart tick records a
                // fresh baseline instead of reading as another stall.
                self.last_balance = None;
                self.store.set_last_balance(None);
            }
        }
    }
}
