//! Capture-to-transport streaming pipeline.
//!
//! Two tasks per pipeline: the capture task paces the sensor and pushes
//! frames into the bounded [`FrameQueue`], and the sender task drains the
//! queue onto the [`FrameTransport`]. The queue decouples them so a slow or
//! failing network sheds frames instead of stalling capture.

use crate::capture::SensorCapture;
use crate::error::{StreamError, StreamResult};
use crate::frame::Frame;
use crate::queue::FrameQueue;
use crate::transport::FrameTransport;
use cubefleet_core::AgentId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Pause after a failed send before draining the next frame. The failed
/// frame itself is not retried.
const SEND_FAILURE_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub capture_interval: Duration,
    pub queue_depth: usize,
    /// Prefix each datagram with the agent-id header. Off for the observer
    /// feed.
    pub tagged: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_millis(33),
            queue_depth: 8,
            tagged: true,
        }
    }
}

pub struct StreamingPipeline {
    agent: AgentId,
    queue: Arc<FrameQueue>,
    shutdown: watch::Sender<bool>,
    capture_task: JoinHandle<()>,
    sender_task: JoinHandle<()>,
}

impl StreamingPipeline {
    /// Start capture and sender tasks for one agent feed.
    pub fn spawn(
        agent: AgentId,
        capture: Arc<dyn SensorCapture>,
        transport: Arc<dyn FrameTransport>,
        config: PipelineConfig,
    ) -> Self {
        let queue = Arc::new(FrameQueue::new(config.queue_depth));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let capture_task = tokio::spawn(capture_loop(
            agent,
            capture,
            Arc::clone(&queue),
            config.capture_interval,
            shutdown_rx,
        ));
        let sender_task = tokio::spawn(send_loop(
            agent,
            Arc::clone(&queue),
            transport,
            config.tagged,
        ));

        Self {
            agent,
            queue,
            shutdown,
            capture_task,
            sender_task,
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Frames shed by the queue so far.
    pub fn frames_dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Stop both tasks, waiting up to `timeout` for each to finish. Tasks
    /// still running after the deadline are aborted.
    pub async fn shutdown(mut self, timeout: Duration) -> StreamResult<()> {
        let _ = self.shutdown.send(true);
        self.queue.close();

        let joined = tokio::time::timeout(timeout, async {
            let _ = (&mut self.capture_task).await;
            let _ = (&mut self.sender_task).await;
        })
        .await;

        match joined {
            Ok(()) => {
                debug!(agent = %self.agent, "pipeline stopped");
                Ok(())
            }
            Err(_) => {
                warn!(agent = %self.agent, "pipeline tasks did not stop in time, aborting");
                self.capture_task.abort();
                self.sender_task.abort();
                Err(StreamError::ShutdownTimeout(timeout))
            }
        }
    }
}

async fn capture_loop(
    agent: AgentId,
    capture: Arc<dyn SensorCapture>,
    queue: Arc<FrameQueue>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => return,
        }

        match capture.capture().await {
            Ok((payload, timestamp_ms)) => {
                queue.push(Frame::new(agent, seq, timestamp_ms, payload));
                seq += 1;
            }
            Err(err) => {
                warn!(agent = %agent, error = %err, "frame capture failed, skipping tick");
            }
        }
    }
}

async fn send_loop(
    agent: AgentId,
    queue: Arc<FrameQueue>,
    transport: Arc<dyn FrameTransport>,
    tagged: bool,
) {
    while let Some(frame) = queue.pop().await {
        let datagram = if tagged {
            frame.encode_tagged()
        } else {
            frame.encode_untagged()
        };
        if let Err(err) = transport.send(frame.agent, datagram).await {
            warn!(agent = %agent, seq = frame.seq, error = %err,
                "frame send failed, dropping frame");
            tokio::time::sleep(SEND_FAILURE_BACKOFF).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingCapture {
        counter: AtomicU64,
    }

    #[async_trait]
    impl SensorCapture for CountingCapture {
        async fn capture(&self) -> StreamResult<(Bytes, u64)> {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            Ok((Bytes::from(n.to_le_bytes().to_vec()), n))
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(AgentId, Bytes)>>,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<(AgentId, Bytes)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FrameTransport for RecordingTransport {
        async fn send(&self, agent: AgentId, datagram: Bytes) -> StreamResult<()> {
            self.sent.lock().unwrap().push((agent, datagram));
            Ok(())
        }
    }

    struct FailingTransport {
        attempts: AtomicU64,
    }

    #[async_trait]
    impl FrameTransport for FailingTransport {
        async fn send(&self, _agent: AgentId, _datagram: Bytes) -> StreamResult<()> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Err(StreamError::Transport(std::io::Error::other("no route")))
        }
    }

    #[tokio::test]
    async fn frames_flow_from_capture_to_transport_with_the_agent_header() {
        let transport = Arc::new(RecordingTransport::default());
        let pipeline = StreamingPipeline::spawn(
            AgentId::new(4),
            Arc::new(CountingCapture {
                counter: AtomicU64::new(0),
            }),
            Arc::clone(&transport) as Arc<dyn FrameTransport>,
            PipelineConfig {
                capture_interval: Duration::from_millis(5),
                queue_depth: 8,
                tagged: true,
            },
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        pipeline
            .shutdown(Duration::from_secs(1))
            .await
            .expect("clean shutdown");

        let sent = transport.sent();
        assert!(!sent.is_empty());
        for (agent, datagram) in &sent {
            assert_eq!(*agent, AgentId::new(4));
            assert_eq!(&datagram[..4], &4u32.to_le_bytes());
        }
    }

    #[tokio::test]
    async fn untagged_pipeline_sends_bare_payloads() {
        let transport = Arc::new(RecordingTransport::default());
        let pipeline = StreamingPipeline::spawn(
            AgentId::new(0),
            Arc::new(CountingCapture {
                counter: AtomicU64::new(0),
            }),
            Arc::clone(&transport) as Arc<dyn FrameTransport>,
            PipelineConfig {
                capture_interval: Duration::from_millis(5),
                queue_depth: 8,
                tagged: false,
            },
        );

        tokio::time::sleep(Duration::from_millis(40)).await;
        pipeline
            .shutdown(Duration::from_secs(1))
            .await
            .expect("clean shutdown");

        let sent = transport.sent();
        assert!(!sent.is_empty());
        // First captured payload is the 8-byte counter value, no header.
        assert_eq!(sent[0].1.len(), 8);
    }

    #[tokio::test]
    async fn send_failures_do_not_stall_capture() {
        let transport = Arc::new(FailingTransport {
            attempts: AtomicU64::new(0),
        });
        let pipeline = StreamingPipeline::spawn(
            AgentId::new(1),
            Arc::new(CountingCapture {
                counter: AtomicU64::new(0),
            }),
            Arc::clone(&transport) as Arc<dyn FrameTransport>,
            PipelineConfig {
                capture_interval: Duration::from_millis(5),
                queue_depth: 2,
                tagged: true,
            },
        );

        tokio::time::sleep(Duration::from_millis(120)).await;
        let attempts = transport.attempts.load(Ordering::Relaxed);
        assert!(attempts >= 2, "sender keeps draining despite failures");

        pipeline
            .shutdown(Duration::from_secs(1))
            .await
            .expect("clean shutdown");
    }

    #[tokio::test]
    async fn shutdown_reports_saturation_drops() {
        // A transport that never completes keeps the queue full.
        struct StuckTransport;

        #[async_trait]
        impl FrameTransport for StuckTransport {
            async fn send(&self, _agent: AgentId, _datagram: Bytes) -> StreamResult<()> {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }

        let pipeline = StreamingPipeline::spawn(
            AgentId::new(2),
            Arc::new(CountingCapture {
                counter: AtomicU64::new(0),
            }),
            Arc::new(StuckTransport),
            PipelineConfig {
                capture_interval: Duration::from_millis(2),
                queue_depth: 2,
                tagged: true,
            },
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(pipeline.frames_dropped() > 0, "full queue sheds oldest frames");

        // The sender is parked inside the stuck transport, so the deadline
        // fires and the task is aborted.
        let result = pipeline.shutdown(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(StreamError::ShutdownTimeout(_))));
    }
}
