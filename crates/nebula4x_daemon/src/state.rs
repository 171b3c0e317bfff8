use crate::analytics::{MetricsFileWriter, MetricsSnapshot};
use nebula4x_control::Engine;
use nebula4x_core::SimEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Maximum number of metrics snapshots kept in memory.
pub(crate) const MAX_METRICS_HISTORY: usize = 10_000;

pub struct SimState {
    pub engine: Engine,
    pub metrics_every: u32,
    pub metrics_history: VecDeque<MetricsSnapshot>,
    pub metrics_writer: Option<MetricsFileWriter>,
    pub alert_engine: Option<crate::alerts::AlertEngine>,
}

impl SimState {
    pub fn push_metrics(&mut self, snapshot: MetricsSnapshot) {
        if self.metrics_history.len() >= MAX_METRICS_HISTORY {
            self.metrics_history.pop_front();
        }
        if let Some(ref mut writer) = self.metrics_writer {
            if let Err(err) = writer.write_row(&snapshot) {
                tracing::warn!("metrics CSV write failed: {err}");
            }
        }
        self.metrics_history.push_back(snapshot);
    }
}

pub type SharedSim = Arc<Mutex<SimState>>;
pub type EventTx = broadcast::Sender<Vec<SimEvent>>;

/// `ticks_per_sec` packs an `f64` rate into an atomic `u64` (via `to_bits`)
/// so it can be changed live from an HTTP handler while the tick loop reads
/// it every iteration without a lock.
#[derive(Clone)]
pub struct AppState {
    pub sim: SharedSim,
    pub event_tx: EventTx,
    pub ticks_per_sec: Arc<AtomicU64>,
    pub run_dir: Option<PathBuf>,
    pub paused: Arc<AtomicBool>,
}
