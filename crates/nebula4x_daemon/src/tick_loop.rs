use crate::analytics::compute_metrics;
use crate::state::{EventTx, SharedSim};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the tick loop yields to the tokio runtime when running flat-out.
/// Lower = more responsive HTTP/SSE but more overhead. 1ms is a good balance.
const YIELD_INTERVAL: Duration = Duration::from_millis(1);

/// How often to log throughput stats.
const PERF_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Drives the engine forward `step_hours` at a time, pacing to
/// `ticks_per_sec` (an atomic bit-packed `f64`; 0 means unlimited) and
/// broadcasting the events each step produced. Runs until `max_ticks` steps
/// have executed, or forever if `None`.
#[allow(clippy::too_many_arguments)]
pub async fn run_tick_loop(
    sim: SharedSim,
    event_tx: EventTx,
    ticks_per_sec: Arc<AtomicU64>,
    max_ticks: Option<u64>,
    paused: Arc<AtomicBool>,
    step_hours: u32,
) {
    let mut next_tick_at: Option<Instant> = None;
    let mut last_yield_at = Instant::now();
    let mut perf_window_start = Instant::now();
    let mut perf_window_ticks: u64 = 0;
    let mut ticks_run: u64 = 0;

    loop {
        while paused.load(Ordering::Relaxed) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            next_tick_at = None;
            last_yield_at = Instant::now();
            perf_window_start = Instant::now();
            perf_window_ticks = 0;
        }

        // --- Pacing ---
        let rate = f64::from_bits(ticks_per_sec.load(Ordering::Relaxed));
        if rate > 0.0 {
            let now = Instant::now();
            let target = next_tick_at.unwrap_or(now);
            if now < target {
                tokio::time::sleep(target - now).await;
                last_yield_at = Instant::now();
            } else if now.duration_since(last_yield_at) >= YIELD_INTERVAL {
                tokio::task::yield_now().await;
                last_yield_at = Instant::now();
            }
            next_tick_at =
                Some(next_tick_at.unwrap_or(now).checked_add(Duration::from_secs_f64(1.0 / rate)).unwrap_or(now));
        } else {
            let now = Instant::now();
            if now.duration_since(last_yield_at) >= YIELD_INTERVAL {
                tokio::task::yield_now().await;
                last_yield_at = Instant::now();
            }
            next_tick_at = None;
        }

        // --- Execute one step ---
        let (events, done) = {
            let mut guard = sim.lock();
            let events_seen = guard.engine.state().events.len();
            guard.engine.advance_hours(step_hours);
            let mut events: Vec<_> = guard.engine.state().events[events_seen..].to_vec();

            let metrics_every = u64::from(guard.metrics_every);
            if metrics_every > 0 && ticks_run % metrics_every == 0 {
                let snapshot = compute_metrics(guard.engine.state(), guard.engine.content());
                let day = snapshot.day;
                guard.push_metrics(snapshot);

                let history = guard.metrics_history.clone();
                if let Some(engine) = guard.alert_engine.as_mut() {
                    let hour = guard.engine.state().date.hour_of_day;
                    let alert_events = engine.evaluate(&history, day, hour);
                    events.extend(alert_events);
                }
            }

            let done = max_ticks.is_some_and(|max| ticks_run + 1 >= max);
            (events, done)
        };

        let _ = event_tx.send(events);
        ticks_run += 1;

        // --- Performance logging ---
        perf_window_ticks += 1;
        let elapsed = perf_window_start.elapsed();
        if elapsed >= PERF_LOG_INTERVAL {
            let tps = perf_window_ticks as f64 / elapsed.as_secs_f64();
            tracing::info!(tps = format_args!("{tps:.1}"), ticks = perf_window_ticks, "tick loop throughput");
            perf_window_start = Instant::now();
            perf_window_ticks = 0;
        }

        if done {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SimState;
    use nebula4x_control::Engine;
    use nebula4x_core::procgen::GalaxyConfig;
    use nebula4x_core::test_fixtures::base_content;
    use nebula4x_core::{ControlMode, EngineConfig, SimEvent};
    use nebula4x_world::bootstrap_scenario;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::broadcast;

    fn make_test_sim() -> (SharedSim, EventTx, Arc<AtomicBool>) {
        let content = base_content();
        let config = GalaxyConfig { seed: 0, num_systems: 2, ..GalaxyConfig::default() };
        let (state, _faction_id) = bootstrap_scenario(&content, &config, "Test Faction", ControlMode::Player);
        let mut engine = Engine::new(content, EngineConfig::default());
        engine.load(state);

        let (event_tx, _) = broadcast::channel::<Vec<SimEvent>>(256);
        let sim = Arc::new(Mutex::new(SimState { engine, metrics_every: 0, metrics_history: VecDeque::new(), metrics_writer: None, alert_engine: None }));
        let paused = Arc::new(AtomicBool::new(false));
        (sim, event_tx, paused)
    }

    #[tokio::test]
    async fn test_tick_loop_advances_day() {
        let (sim, event_tx, paused) = make_test_sim();
        run_tick_loop(sim.clone(), event_tx, Arc::new(AtomicU64::new(0.0_f64.to_bits())), Some(5), paused, 24).await;
        let guard = sim.lock();
        assert_eq!(guard.engine.state().date.day, 5);
    }

    #[tokio::test]
    async fn test_tick_loop_broadcasts_events() {
        let (sim, event_tx, paused) = make_test_sim();
        let mut rx = event_tx.subscribe();
        run_tick_loop(sim, event_tx, Arc::new(AtomicU64::new(0.0_f64.to_bits())), Some(3), paused, 24).await;

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert!(received >= 3, "expected at least 3 event batches, got {received}");
    }

    #[tokio::test]
    async fn test_tick_loop_respects_pause() {
        let (sim, event_tx, paused) = make_test_sim();
        paused.store(true, Ordering::Relaxed);

        let sim_clone = sim.clone();
        let paused_clone = paused.clone();
        let handle = tokio::spawn(async move {
            run_tick_loop(sim_clone, event_tx, Arc::new(AtomicU64::new(0.0_f64.to_bits())), Some(5), paused_clone, 24).await;
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sim.lock().engine.state().date.day, 0, "day should not advance while paused");

        paused.store(false, Ordering::Relaxed);
        handle.await.unwrap();
        assert_eq!(sim.lock().engine.state().date.day, 5);
    }

    #[tokio::test]
    async fn test_tick_loop_collects_metrics() {
        let (sim, event_tx, paused) = make_test_sim();
        sim.lock().metrics_every = 1;

        run_tick_loop(sim.clone(), event_tx, Arc::new(AtomicU64::new(0.0_f64.to_bits())), Some(5), paused, 24).await;
        let guard = sim.lock();
        assert_eq!(guard.metrics_history.len(), 5, "expected 5 metrics snapshots (one per tick with metrics_every=1)");
    }
}
