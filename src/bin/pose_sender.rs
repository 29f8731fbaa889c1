// Streams a synthetic arm-waving pose to a running pose_mimic instance.
use anyhow::{Context, Result};
use nalgebra::Vector3;
use std::net::UdpSocket;
use std::time::{Duration, Instant};
use tracing::info;

use pose_mimic::pose::{Landmarks, PosePacket};

const DEFAULT_TARGET: &str = "127.0.0.1:5052";
const FRAME_RATE: f64 = 30.0;

/// Landmarks in estimator space: x and y in [0, 1] with y growing downward.
fn simulated_pose(t: f64) -> Landmarks {
    let p = |x: f64, y: f64, z: f64| Vector3::new(x as f32, y as f32, z as f32);

    Landmarks::new(
        p(0.5 + 0.02 * (t * 0.7).sin(), 0.2, -0.3),
        p(0.6, 0.4, 0.0),
        p(0.4, 0.4, 0.0),
        p(0.68, 0.5 + 0.05 * t.sin(), 0.0),
        p(0.32, 0.5 + 0.05 * (t + 1.5).sin(), 0.0),
        p(0.75 + 0.1 * (t * 0.5).cos(), 0.6 + 0.1 * t.sin(), -0.1),
        p(0.25 - 0.1 * (t * 0.5 + 1.0).cos(), 0.6 + 0.1 * (t + 1.5).sin(), -0.1),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let target = args.next().unwrap_or_else(|| DEFAULT_TARGET.to_string());
    let frames: Option<u64> = args
        .next()
        .map(|n| n.parse())
        .transpose()
        .context("Frame count must be a number")?;

    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind sender socket")?;
    info!("Sending synthetic pose to {} at {} Hz", target, FRAME_RATE);

    let interval = Duration::from_secs_f64(1.0 / FRAME_RATE);
    let start = Instant::now();
    let mut sent = 0u64;

    while frames.map_or(true, |limit| sent < limit) {
        let packet = PosePacket::from_landmarks(&simulated_pose(start.elapsed().as_secs_f64()));
        let payload = serde_json::to_vec(&packet)?;
        socket
            .send_to(&payload, &target)
            .with_context(|| format!("Failed to send to {target}"))?;
        sent += 1;
        std::thread::sleep(interval);
    }

    info!("Sent {} frames", sent);
    Ok(())
}
