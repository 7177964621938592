mod camera;
mod stage;
mod transition;

pub use camera::{CameraConfig, OrbitCamera};
pub use stage::{ModelId, SceneModel, Stage, Transform, TweenPose};
pub use transition::{
    AnimationTask, OnComplete, Scheduler, TransitionConfig, TransitionController, TransitionState,
    TweenKind,
};
