// src/app.rs - Frame loop owning the avatar, its rig and the dispatch queue
use nalgebra::Vector3;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::avatar::{AvatarController, PoseSink};
use crate::config::{RetargetConfig, TICK_RATE_RANGE_HZ};
use crate::data::PoseRecorder;
use crate::dispatch::{DispatchHandle, MainThreadDispatcher};
use crate::pose::Landmarks;
use crate::rig::RigSkeleton;

/// Everything the frame loop owns. Queued actions receive it mutably.
pub struct Stage {
    pub avatar: AvatarController,
    pub rig: RigSkeleton,
    pub recorder: Option<PoseRecorder>,
    started: Instant,
}

impl Stage {
    pub fn new(config: &RetargetConfig, rig: RigSkeleton) -> Self {
        let avatar = AvatarController::new(config, &rig);
        let recorder = config
            .recording
            .enabled
            .then(|| PoseRecorder::new(&config.recording.output_directory, None));

        Self {
            avatar,
            rig,
            recorder,
            started: Instant::now(),
        }
    }
}

impl PoseSink for Stage {
    fn update_pose(&mut self, source: &Landmarks) {
        self.avatar.update_pose(source);
        if let (Some(recorder), Some(pose)) = (self.recorder.as_mut(), self.avatar.current_pose()) {
            let timestamp = self.started.elapsed().as_secs_f64();
            recorder.add_frame(self.avatar.accepted_frames(), pose, timestamp);
        }
    }
}

pub struct MimicApp {
    dispatcher: MainThreadDispatcher<Stage>,
    stage: Stage,
    frame_interval: Duration,
    frame_count: u64,
}

impl MimicApp {
    pub fn new(config: &RetargetConfig) -> Self {
        let rig = RigSkeleton::humanoid(&config.bone_prefix, Vector3::zeros());
        Self::with_rig(config, rig)
    }

    pub fn with_rig(config: &RetargetConfig, rig: RigSkeleton) -> Self {
        Self {
            dispatcher: MainThreadDispatcher::new(),
            stage: Stage::new(config, rig),
            frame_interval: frame_interval(config.tick_rate_hz),
            frame_count: 0,
        }
    }

    pub fn dispatch_handle(&self) -> DispatchHandle<Stage> {
        self.dispatcher.handle()
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// One frame: queued pose updates, then the driver, then the IK pass.
    pub fn tick(&mut self, dt: f32) {
        let applied = self.dispatcher.drain(&mut self.stage);
        if applied > 1 {
            debug!("{} pose updates applied in one frame", applied);
        }

        let stage = &mut self.stage;
        stage.avatar.tick(&mut stage.rig, dt);
        stage.rig.clear_ik_requests();
        stage.avatar.on_animator_ik(&mut stage.rig);
        self.frame_count += 1;
    }

    /// Tick at the configured rate until `running` goes false.
    pub fn run(&mut self, running: &AtomicBool) {
        info!("Frame loop running at {:.0} Hz", 1.0 / self.frame_interval.as_secs_f32());
        let mut last = Instant::now();

        while running.load(Ordering::SeqCst) {
            let frame_start = Instant::now();
            let dt = frame_start.duration_since(last).as_secs_f32();
            last = frame_start;

            self.tick(dt);

            if let Some(remaining) = self.frame_interval.checked_sub(frame_start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }

        info!(
            "Frame loop stopped after {} frames, {} poses applied",
            self.frame_count,
            self.stage.avatar.accepted_frames()
        );
    }

    /// Restore the rest pose and hand back the recorder, if any.
    pub fn shutdown(mut self) -> Option<PoseRecorder> {
        // updates still queued are dropped with the dispatcher
        let stage = &mut self.stage;
        stage.avatar.restore_rest_pose(&mut stage.rig);
        stage.recorder.take()
    }
}

// Configs built in code skip validation, so clamp instead of panicking
fn frame_interval(tick_rate_hz: f32) -> Duration {
    let rate = if TICK_RATE_RANGE_HZ.contains(&tick_rate_hz) {
        tick_rate_hz
    } else {
        let clamped = tick_rate_hz.clamp(*TICK_RATE_RANGE_HZ.start(), *TICK_RATE_RANGE_HZ.end());
        let rate = if clamped.is_nan() { 60.0 } else { clamped };
        warn!("Tick rate {} Hz out of range, using {} Hz", tick_rate_hz, rate);
        rate
    };
    Duration::from_secs_f32(1.0 / rate)
}
