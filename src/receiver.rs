// src/receiver.rs - UDP landmark stream into the dispatch queue
use chrono::Local;
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::avatar::PoseSink;
use crate::dispatch::DispatchHandle;
use crate::error::PoseError;
use crate::pose::{Landmarks, PoseFrame};

const MAX_DATAGRAM: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub datagrams: u64,
    pub enqueued: u64,
    pub decode_failures: u64,
    pub incomplete: u64,
}

/// Decodes datagrams off the frame loop and enqueues complete poses onto it.
pub struct PoseReceiver<C> {
    socket: UdpSocket,
    dispatch: DispatchHandle<C>,
    stats: ReceiverStats,
}

impl<C: PoseSink + 'static> PoseReceiver<C> {
    pub async fn bind(addr: SocketAddr, dispatch: DispatchHandle<C>) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("UDP Receiver started on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            dispatch,
            stats: ReceiverStats::default(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Receive until `shutdown` turns true or its sender goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> io::Result<ReceiverStats> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            debug!("Received {} bytes from {}", len, peer);
                            self.handle_datagram(&buf[..len]);
                        }
                        Err(e) => warn!("Error receiving data: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            "UDP Receiver stopped: {} datagrams, {} poses enqueued, {} undecodable, {} incomplete",
            self.stats.datagrams, self.stats.enqueued, self.stats.decode_failures, self.stats.incomplete
        );
        Ok(self.stats)
    }

    /// Returns whether a pose update was enqueued.
    pub fn handle_datagram(&mut self, payload: &[u8]) -> bool {
        self.stats.datagrams += 1;
        match decode_landmarks(payload) {
            Ok(landmarks) => {
                self.dispatch
                    .enqueue_action(move |sink: &mut C| sink.update_pose(&landmarks));
                self.stats.enqueued += 1;
                true
            }
            Err(err @ PoseError::Incomplete { .. }) => {
                debug!("Dropping frame: {}", err);
                self.stats.incomplete += 1;
                false
            }
            Err(err) => {
                warn!("Dropping frame: {}", err);
                self.stats.decode_failures += 1;
                false
            }
        }
    }
}

fn decode_landmarks(payload: &[u8]) -> Result<Landmarks, PoseError> {
    let frame = PoseFrame::decode(payload)?;
    debug!(
        "[{}] Current Pose Data:\n{}",
        Local::now().format("%H:%M:%S"),
        frame.summary()
    );
    frame.into_landmarks()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MainThreadDispatcher;
    use crate::pose::{Joint, PosePacket};
    use nalgebra::Vector3;
    use std::time::Duration;

    #[derive(Default)]
    struct Collector {
        poses: Vec<Landmarks>,
    }

    impl PoseSink for Collector {
        fn update_pose(&mut self, source: &Landmarks) {
            self.poses.push(*source);
        }
    }

    fn packet(offset: f32) -> Vec<u8> {
        let landmarks = Landmarks::from_fn(|joint| Vector3::new(joint as usize as f32, offset, 0.0));
        serde_json::to_vec(&PosePacket::from_landmarks(&landmarks)).unwrap()
    }

    async fn local_receiver(dispatcher: &MainThreadDispatcher<Collector>) -> PoseReceiver<Collector> {
        PoseReceiver::bind("127.0.0.1:0".parse().unwrap(), dispatcher.handle())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_handle_datagram_classifies_frames() {
        let mut dispatcher = MainThreadDispatcher::<Collector>::new();
        let mut receiver = local_receiver(&dispatcher).await;

        assert!(receiver.handle_datagram(&packet(0.1)));
        assert!(!receiver.handle_datagram(br#"{"pose": [{"name": "Head", "x": 0, "y": 0, "z": 0}]}"#));
        assert!(!receiver.handle_datagram(b"{\"pose\": ["));

        assert_eq!(
            receiver.stats(),
            ReceiverStats { datagrams: 3, enqueued: 1, decode_failures: 1, incomplete: 1 }
        );

        let mut collector = Collector::default();
        assert_eq!(dispatcher.drain(&mut collector), 1);
        assert_eq!(collector.poses[0][Joint::LeftShoulder], Vector3::new(1.0, 0.1, 0.0));
    }

    #[tokio::test]
    async fn test_run_receives_over_udp_until_shutdown() {
        let mut dispatcher = MainThreadDispatcher::<Collector>::new();
        let receiver = local_receiver(&dispatcher).await;
        let addr = receiver.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(receiver.run(shutdown_rx));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for i in 0..3 {
            sender.send_to(&packet(i as f32), addr).await.unwrap();
        }

        // wait for all three to land in the queue
        for _ in 0..200 {
            if dispatcher.len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        shutdown_tx.send(true).unwrap();
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.enqueued, 3);

        let mut collector = Collector::default();
        assert_eq!(dispatcher.drain(&mut collector), 3);
        let order: Vec<f32> = collector.poses.iter().map(|p| p[Joint::Head].y).collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0]);
    }
}
