/// Shared watchdog status: written field-by-field by the monitor, read as a
/// consistent snapshot by the control surface.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Watchdog states published to status readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Starting,
    Running,
    StartingMiner,
    StoppingMiner,
    Error(String),
}

/// A consistent copy of the watchdog status at one moment in time.
///
/// `message` is derived at snapshot time: non-empty when the monitor has not
/// checked in for more than twice the poll interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub last_check_time: DateTime<Utc>,
    pub last_balance: Option<f64>,
    pub state_label: WatchState,
    pub message: String,
}

struct StatusFields {
    last_check_time: DateTime<Utc>,
    last_balance: Option<f64>,
    state_label: WatchState,
}

/// Handle to the shared status record. Cheap to clone; all clones observe
/// the same fields.
#[derive(Clone)]
pub struct StatusStore {
    fields: Arc<RwLock<StatusFields>>,
    /// A gap beyond this means the monitor loop itself has stalled.
    stale_after: Duration,
}

impl StatusStore {
    /// Create a store in the Starting state, stamped with the current time.
    pub fn new(poll_interval: std::time::Duration) -> Self {
        Self {
            fields: Arc::new(RwLock::new(StatusFields {
                last_check_time: Utc::now(),
                last_balance: None,
                state_label: WatchState::Starting,
            })),
            stale_after: Duration::seconds(2 * poll_interval.as_secs() as i64),
        }
    }

    pub fn set_last_check(&self, t: DateTime<Utc>) {
        self.write().last_check_time = t;
    }

    pub fn set_last_balance(&self, balance: Option<f64>) {
        self.write().last_balance = balance;
    }

    pub fn set_state(&self, state: WatchState) {
        self.write().state_label = state;
    }

    /// Snapshot the current status with `message` derived from `now`.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> StatusSnapshot {
        let fields = match self.fields.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let gap = now.signed_duration_since(fields.last_check_time);
        let message = if gap > self.stale_after {
            format!(
                "time since last check exceeds {} seconds",
                self.stale_after.num_seconds()
            )
        } else {
            String::new()
        };
        StatusSnapshot {
            last_check_time: fields.last_check_time,
            last_balance: fields.last_balance,
            state_label: fields.state_label.clone(),
            message,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot_at(Utc::now())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StatusFields> {
        match self.fields.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("status store lock poisoned, continuing");
                poisoned.into_inner()
            }
        }
    }
}
