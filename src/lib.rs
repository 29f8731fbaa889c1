// src/lib.rs
pub mod app;
pub mod avatar;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod pose;
pub mod receiver;
pub mod rig;
pub mod skeleton;

pub use avatar::{AvatarController, PoseSink};
pub use config::RetargetConfig;
pub use dispatch::{DispatchHandle, MainThreadDispatcher};
pub use pose::{Joint, Landmarks, PoseFrame};
