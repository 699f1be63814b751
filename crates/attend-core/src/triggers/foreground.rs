//! Foreground trigger driven by a connectivity stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::ConnectivityState;
use crate::client::SubmissionClient;
use crate::queue::CheckInQueue;
use crate::sync::SyncOrchestrator;
use crate::{Error, Result};

/// Starts a sync pass each time connectivity comes back
pub struct ForegroundTrigger;

impl ForegroundTrigger {
    /// Listen on `connectivity` until its sender is dropped.
    ///
    /// Every offline-to-online transition spawns one orchestrator run. The
    /// state at subscription time is taken as the baseline and does not
    /// trigger a run on its own.
    pub fn spawn<Q, C>(
        orchestrator: Arc<SyncOrchestrator<Q, C>>,
        mut connectivity: watch::Receiver<ConnectivityState>,
    ) -> JoinHandle<()>
    where
        Q: CheckInQueue + 'static,
        C: SubmissionClient + 'static,
    {
        tokio::spawn(async move {
            let mut was_online = connectivity.borrow_and_update().is_online();

            while connectivity.changed().await.is_ok() {
                let online = connectivity.borrow_and_update().is_online();
                if online && !was_online {
                    tracing::info!("Connectivity restored, triggering sync");
                    let orchestrator = Arc::clone(&orchestrator);
                    tokio::spawn(async move {
                        match orchestrator.run().await {
                            Ok(report) => tracing::debug!(
                                success = report.success,
                                failed = report.failed,
                                "Foreground sync finished"
                            ),
                            Err(error) => tracing::error!("Foreground sync failed: {error}"),
                        }
                    });
                } else if !online && was_online {
                    tracing::info!("Connectivity lost");
                }
                was_online = online;
            }

            tracing::debug!("Connectivity stream closed, foreground trigger stopped");
        })
    }
}

/// Polls a URL and publishes reachability into a watch channel.
///
/// Any HTTP response counts as reachable; a connect error means no usable
/// network; other failures (timeouts) mean a link without internet.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    url: String,
    interval: Duration,
    client: reqwest::Client,
}

impl ConnectivityProbe {
    pub fn new(url: impl Into<String>, interval: Duration, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Configuration(format!("invalid probe client: {error}")))?;

        Ok(Self {
            url: url.into(),
            interval,
            client,
        })
    }

    /// Probe once
    pub async fn check(&self) -> ConnectivityState {
        match self.client.head(&self.url).send().await {
            Ok(_) => ConnectivityState::ONLINE,
            Err(error) if error.is_connect() => ConnectivityState::OFFLINE,
            Err(error) => {
                tracing::debug!("Connectivity probe failed: {error}");
                ConnectivityState {
                    connected: true,
                    internet_reachable: false,
                }
            }
        }
    }

    /// Probe on every tick until all receivers are gone.
    ///
    /// Only changes are published, so receivers wake on transitions.
    pub fn spawn(self, sender: watch::Sender<ConnectivityState>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if sender.is_closed() {
                    break;
                }

                let state = self.check().await;
                let changed = sender.send_if_modified(|current| {
                    if *current == state {
                        false
                    } else {
                        *current = state;
                        true
                    }
                });
                if changed {
                    tracing::debug!(online = state.is_online(), "Connectivity changed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueService;
    use crate::testing::{event, eventually, AcceptingClient};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn orchestrator() -> Arc<SyncOrchestrator<QueueService, AcceptingClient>> {
        let queue = QueueService::open_in_memory().await.unwrap();
        Arc::new(SyncOrchestrator::new(queue, AcceptingClient::default()))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn each_reconnect_triggers_a_run() {
        let orchestrator = orchestrator().await;
        let (tx, rx) = watch::channel(ConnectivityState::OFFLINE);
        let handle = ForegroundTrigger::spawn(Arc::clone(&orchestrator), rx);

        orchestrator.queue().enqueue(event()).await.unwrap();
        tx.send(ConnectivityState::ONLINE).unwrap();
        assert!(eventually(|| orchestrator.client().calls() == 1).await);
        assert!(eventually(|| !orchestrator.is_running()).await);

        tx.send(ConnectivityState::OFFLINE).unwrap();
        // Let the listener observe the drop before reconnecting.
        tokio::time::sleep(Duration::from_millis(50)).await;
        orchestrator.queue().enqueue(event()).await.unwrap();
        tx.send(ConnectivityState::ONLINE).unwrap();
        assert!(eventually(|| orchestrator.client().calls() == 2).await);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn staying_online_does_not_trigger() {
        let orchestrator = orchestrator().await;
        orchestrator.queue().enqueue(event()).await.unwrap();
        let (tx, rx) = watch::channel(ConnectivityState::ONLINE);
        let handle = ForegroundTrigger::spawn(Arc::clone(&orchestrator), rx);

        tx.send(ConnectivityState::ONLINE).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(orchestrator.client().calls(), 0);
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reachable_link_without_internet_does_not_trigger() {
        let orchestrator = orchestrator().await;
        orchestrator.queue().enqueue(event()).await.unwrap();
        let (tx, rx) = watch::channel(ConnectivityState::OFFLINE);
        let handle = ForegroundTrigger::spawn(Arc::clone(&orchestrator), rx);

        tx.send(ConnectivityState {
            connected: true,
            internet_reachable: false,
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(orchestrator.client().calls(), 0);
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_reports_online_when_server_answers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 1024];
            let _ = stream.read(&mut buf).await.unwrap();
            stream
                .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let probe = ConnectivityProbe::new(
            format!("http://{addr}/"),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(probe.check().await, ConnectivityState::ONLINE);
        server.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_reports_offline_when_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = ConnectivityProbe::new(
            format!("http://{addr}/"),
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(probe.check().await, ConnectivityState::OFFLINE);

        // The spawned poller publishes nothing while the state is unchanged.
        let (tx, rx) = watch::channel(ConnectivityState::OFFLINE);
        let handle = probe.spawn(tx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!rx.has_changed().unwrap());

        drop(rx);
        handle.await.unwrap();
    }
}
