//! Animated background: scene graph, rendering, frame loop and lifecycle

pub mod background;
pub mod frames;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use background::{SceneError, SceneLifecycleManager};
pub use frames::{FrameScheduler, ManualClock};
