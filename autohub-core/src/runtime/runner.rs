use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error};

use crate::plugin::Plugin;

/// Outcome of one interruptible wait. A dropped stop sender means the host
/// handle is gone and is treated like a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Elapsed,
    Cancelled,
    Closed,
}

/// The background loop: one bounded work unit per iteration inside a
/// failure boundary, then an interruptible wait of the plugin's current
/// interval. The wait is the loop's only suspension point, so cancellation
/// takes effect within one interval.
pub(super) struct PollRunner {
    pub(super) id: String,
    pub(super) plugin: Arc<dyn Plugin>,
    pub(super) stop_rx: watch::Receiver<bool>,
}

impl PollRunner {
    fn stop_requested(stop_rx: &watch::Receiver<bool>) -> bool {
        *stop_rx.borrow()
    }

    async fn wait(&mut self, interval: Duration) -> Wait {
        let sleep = time::sleep(interval);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Wait::Elapsed,
                changed = self.stop_rx.changed() => match changed {
                    Ok(()) if Self::stop_requested(&self.stop_rx) => return Wait::Cancelled,
                    // flag flipped back to false; the timer keeps running
                    Ok(()) => {}
                    Err(_) => return Wait::Closed,
                },
            }
        }
    }

    pub(super) async fn run(mut self) {
        debug!("[{}] poll loop started", self.id);
        loop {
            if Self::stop_requested(&self.stop_rx) {
                break;
            }
            if let Err(err) = self.plugin.poll().await {
                // no single iteration's failure may end the loop
                error!("[{}] poll failed: {:#}", self.id, err);
            }
            match self.wait(self.plugin.poll_interval()).await {
                Wait::Elapsed => {}
                Wait::Cancelled | Wait::Closed => break,
            }
        }
        debug!("[{}] poll loop stopped", self.id);
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::plugin::PluginInfo;

    struct TickPlugin {
        info: PluginInfo,
        polls: Arc<AtomicUsize>,
        fail: bool,
        interval: Duration,
    }

    impl TickPlugin {
        fn new(fail: bool, interval: Duration) -> (Arc<Self>, Arc<AtomicUsize>) {
            let polls = Arc::new(AtomicUsize::new(0));
            let plugin = Arc::new(Self {
                info: PluginInfo {
                    id: "tick".to_string(),
                    display_name: "Tick".to_string(),
                    version: "0.0.0".to_string(),
                },
                polls: Arc::clone(&polls),
                fail,
                interval,
            });
            (plugin, polls)
        }
    }

    #[async_trait]
    impl Plugin for TickPlugin {
        fn info(&self) -> &PluginInfo {
            &self.info
        }

        async fn poll(&self) -> anyhow::Result<()> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("injected poll failure");
            }
            Ok(())
        }

        fn poll_interval(&self) -> Duration {
            self.interval
        }
    }

    fn runner(plugin: Arc<TickPlugin>, stop_rx: watch::Receiver<bool>) -> PollRunner {
        PollRunner {
            id: plugin.info.id.clone(),
            plugin,
            stop_rx,
        }
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_the_wait() {
        // a 60s interval: the runner must come back because of the signal,
        // not because the wait ran out
        let (plugin, polls) = TickPlugin::new(false, Duration::from_secs(60));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(runner(plugin, stop_rx).run());

        time::sleep(Duration::from_millis(50)).await;
        let _ = stop_tx.send(true);
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("runner did not stop within one interval")
            .expect("runner panicked");
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_work_unit_failure_does_not_end_the_loop() {
        let (plugin, polls) = TickPlugin::new(true, Duration::from_millis(10));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(runner(plugin, stop_rx).run());

        time::sleep(Duration::from_millis(120)).await;
        let _ = stop_tx.send(true);
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("runner did not stop")
            .expect("runner panicked");
        assert!(polls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_dropped_stop_sender_ends_the_loop() {
        let (plugin, _polls) = TickPlugin::new(false, Duration::from_secs(60));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(runner(plugin, stop_rx).run());

        time::sleep(Duration::from_millis(50)).await;
        drop(stop_tx);
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("runner did not notice the closed channel")
            .expect("runner panicked");
    }

    #[tokio::test]
    async fn test_already_cancelled_runner_exits_before_polling() {
        let (plugin, polls) = TickPlugin::new(false, Duration::from_secs(60));
        let (_stop_tx, stop_rx) = watch::channel(true);
        runner(plugin, stop_rx).run().await;
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }
}
