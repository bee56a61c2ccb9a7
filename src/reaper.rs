use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::lock;
use crate::manager::PopoutManager;
use crate::WindowId;

impl PopoutManager {
    /// Closes every window whose handle reports closed or that has been idle
    /// for longer than the configured TTL. Returns the reaped ids.
    pub fn sweep_stale(&self) -> Vec<WindowId> {
        let now = self.inner.clock.now_ms();
        let ttl_ms = u64::try_from(self.inner.config.stale_ttl().as_millis()).unwrap_or(u64::MAX);
        let stale = lock(&self.inner.registry).stale_ids(now, ttl_ms);
        for id in &stale {
            info!(target: "popout::reaper", popout_id = %id, "reaping stale popout");
            self.close_window(id);
        }
        stale
    }

    /// Starts the periodic sweep using the configured interval. Must be called
    /// from within a Tokio runtime.
    pub fn spawn_reaper(&self) -> StaleWindowReaper {
        StaleWindowReaper::spawn(self, self.inner.config.reap_interval())
    }
}

/// Background task running [`PopoutManager::sweep_stale`] on a fixed period.
///
/// The sweep runs inline in the timer loop and late ticks are delayed rather
/// than bursted, so two sweeps never overlap. The task holds only a weak
/// reference to the manager and exits once the manager is dropped, the reaper
/// is shut down, or the reaper itself is dropped.
pub struct StaleWindowReaper {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl StaleWindowReaper {
    pub fn spawn(manager: &PopoutManager, period: Duration) -> Self {
        let manager = manager.downgrade();
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        let reaped = manager.sweep_stale();
                        debug!(target: "popout::reaper", reaped = reaped.len(), "sweep finished");
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            debug!(target: "popout::reaper", "reaper stopped");
        });

        Self { shutdown, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::host::memory::MemoryWindowHost;
    use crate::host::{ScreenSize, WindowEvent, WindowHandle};
    use crate::placement::OpenOptions;
    use crate::time::ManualClock;
    use std::sync::Arc;

    const NO_PARAMS: [(&str, &str); 0] = [];

    fn setup() -> (Arc<MemoryWindowHost>, Arc<ManualClock>, PopoutManager) {
        let host = Arc::new(MemoryWindowHost::new(
            "https://app.test",
            ScreenSize {
                width: 1600,
                height: 1200,
            },
        ));
        let clock = Arc::new(ManualClock::new(0));
        let config = ManagerConfig {
            stale_ttl_secs: 60,
            reap_interval_secs: 10,
            ..ManagerConfig::default()
        };
        let manager = PopoutManager::with_clock(host.clone(), config, clock.clone());
        (host, clock, manager)
    }

    #[test]
    fn sweep_reaps_idle_and_crashed_windows() {
        let (host, clock, manager) = setup();
        let idle = manager.open_window("/a", NO_PARAMS, OpenOptions::new()).unwrap();
        let crashed = manager.open_window("/b", NO_PARAMS, OpenOptions::new()).unwrap();
        let fresh = manager.open_window("/c", NO_PARAMS, OpenOptions::new()).unwrap();
        manager.handle_window_event(&idle, WindowEvent::Load);
        clock.advance(61_000);
        manager.handle_window_event(&fresh, WindowEvent::Focus);
        host.window_named(&crashed.to_string()).unwrap().crash();

        let mut reaped = manager.sweep_stale();
        reaped.sort();
        let mut expected = vec![idle, crashed];
        expected.sort();
        assert_eq!(reaped, expected);
        assert_eq!(manager.list_active(), vec![fresh]);
        assert!(host.window_named(&idle.to_string()).unwrap().is_closed());
    }

    #[test]
    fn never_loaded_window_is_not_reaped_by_ttl() {
        let (_, clock, manager) = setup();
        let id = manager.open_window("/a", NO_PARAMS, OpenOptions::new()).unwrap();
        clock.advance(10 * 60_000);
        assert!(manager.sweep_stale().is_empty());
        assert_eq!(manager.list_active(), vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_sweeps_on_interval() {
        let (_, clock, manager) = setup();
        let id = manager.open_window("/a", NO_PARAMS, OpenOptions::new()).unwrap();
        manager.handle_window_event(&id, WindowEvent::Load);
        let reaper = manager.spawn_reaper();

        clock.advance(61_000);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(manager.list_active(), vec![id]);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(manager.list_active().is_empty());

        reaper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_stops_when_manager_is_dropped() {
        let (_, _, manager) = setup();
        let reaper = manager.spawn_reaper();
        drop(manager);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(reaper.is_finished());
    }
}
