//! Exit / enter animation used when the displayed model changes.
//!
//! Every running tween is an [`AnimationTask`] owned by the [`Scheduler`], which
//! advances all of them once per tick. The [`TransitionController`] reacts to
//! finished tasks: an exited model is detached and the queued model enters.

use std::f32::consts::PI;
use std::sync::Arc;

use glam::Vec3;
use log::{debug, info};
use serde::Deserialize;

use super::stage::{ModelId, Stage, TweenPose};
use crate::model::Model;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Progress added per frame.
    pub increment: f32,
    /// Where an exiting model ends up, relative to its rest position.
    pub exit_offset: Vec3,
    /// Yaw an exiting model gains on its way out.
    pub exit_spin: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            increment: 0.05,
            exit_offset: Vec3::new(3.0, 0.0, 0.0),
            exit_spin: PI,
        }
    }
}

impl TransitionConfig {
    /// Frames until progress reaches 1 when it grows by `increment` each frame.
    pub fn steps(&self) -> u32 {
        frames_for(self.increment)
    }
}

fn valid_increment(increment: f32) -> f32 {
    if increment > 0.0 && increment.is_finite() {
        increment.min(1.0)
    } else {
        1.0
    }
}

fn frames_for(increment: f32) -> u32 {
    // float drift must not turn 1 / 0.05 into 21 frames
    ((1.0 / valid_increment(increment)) - 1e-4).ceil().max(1.0) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenKind {
    Entering,
    Exiting,
}

impl TweenKind {
    /// Linear pose at `progress` in `[0, 1]`. Entering mirrors exiting back to rest.
    pub fn pose(self, progress: f32, config: &TransitionConfig) -> TweenPose {
        let t = match self {
            TweenKind::Exiting => progress,
            TweenKind::Entering => progress - 1.0,
        };
        TweenPose {
            offset: config.exit_offset * t,
            spin: config.exit_spin * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnComplete {
    Detach,
    Rest,
}

#[derive(Debug, Clone)]
pub struct AnimationTask {
    pub target: ModelId,
    pub kind: TweenKind,
    pub on_complete: OnComplete,
    increment: f32,
    step: u32,
    steps: u32,
}

impl AnimationTask {
    /// A tween whose progress grows by `increment` every frame until it reaches 1.
    pub fn new(target: ModelId, kind: TweenKind, increment: f32) -> Self {
        let on_complete = match kind {
            TweenKind::Exiting => OnComplete::Detach,
            TweenKind::Entering => OnComplete::Rest,
        };
        Self {
            target,
            kind,
            on_complete,
            increment: valid_increment(increment),
            step: 0,
            steps: frames_for(increment),
        }
    }

    pub fn progress(&self) -> f32 {
        if self.is_finished() {
            1.0
        } else {
            (self.step as f32 * self.increment).min(1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.steps
    }
}

/// Owns every running tween; holds at most one per target.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<AnimationTask>,
}

impl Scheduler {
    /// Replaces any task already running on the same target.
    pub fn schedule(&mut self, task: AnimationTask) {
        self.cancel(task.target);
        self.tasks.push(task);
    }

    pub fn cancel(&mut self, target: ModelId) -> Option<AnimationTask> {
        let index = self.tasks.iter().position(|t| t.target == target)?;
        Some(self.tasks.remove(index))
    }

    pub fn task_for(&self, target: ModelId) -> Option<&AnimationTask> {
        self.tasks.iter().find(|t| t.target == target)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Moves every task one frame forward and returns the ones that finished.
    /// A task whose target left the stage finishes immediately.
    pub fn advance(&mut self, stage: &mut Stage, config: &TransitionConfig) -> Vec<AnimationTask> {
        for task in self.tasks.iter_mut() {
            task.step = (task.step + 1).min(task.steps);
            match stage.get_mut(task.target) {
                Some(model) => model.tween = task.kind.pose(task.progress(), config),
                None => task.step = task.steps,
            }
        }
        let (finished, running): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(AnimationTask::is_finished);
        self.tasks = running;
        finished
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Exiting { outgoing: ModelId },
    Entering { incoming: ModelId },
}

pub struct TransitionController {
    config: TransitionConfig,
    scheduler: Scheduler,
    pending: Option<Arc<Model>>,
    state: TransitionState,
}

impl TransitionController {
    pub fn new(config: TransitionConfig) -> Self {
        Self {
            config,
            scheduler: Scheduler::default(),
            pending: None,
            state: TransitionState::Idle,
        }
    }

    /// Starts showing `model`.
    ///
    /// The very first model appears at rest without animating. Otherwise the
    /// current model exits first. A request that arrives mid-transition
    /// replaces the queued model, and an entering model is sent back out.
    pub fn request(&mut self, stage: &mut Stage, model: Arc<Model>) {
        match self.state {
            TransitionState::Idle => match stage.current() {
                None => {
                    info!("showing {}", model.name);
                    let id = stage.attach(model, TweenPose::REST);
                    stage.set_current(id);
                }
                Some(current) => {
                    self.begin_exit(current);
                    self.pending = Some(model);
                }
            },
            TransitionState::Exiting { outgoing } => {
                debug!("{} still exiting, queueing {} instead", outgoing, model.name);
                self.pending = Some(model);
            }
            TransitionState::Entering { incoming } => {
                debug!("interrupting entrance of {}", incoming);
                self.scheduler.cancel(incoming);
                if let Some(entering) = stage.get_mut(incoming) {
                    entering.tween = TweenPose::REST;
                }
                self.begin_exit(incoming);
                self.pending = Some(model);
            }
        }
    }

    /// One frame of animation.
    pub fn advance(&mut self, stage: &mut Stage) {
        for task in self.scheduler.advance(stage, &self.config) {
            match task.on_complete {
                OnComplete::Detach => {
                    stage.detach(task.target);
                    match self.pending.take() {
                        Some(model) => {
                            info!("showing {}", model.name);
                            let start = TweenKind::Entering.pose(0.0, &self.config);
                            let id = stage.attach(model, start);
                            stage.set_current(id);
                            self.scheduler.schedule(AnimationTask::new(
                                id,
                                TweenKind::Entering,
                                self.config.increment,
                            ));
                            self.state = TransitionState::Entering { incoming: id };
                        }
                        None => self.state = TransitionState::Idle,
                    }
                }
                OnComplete::Rest => {
                    if let Some(model) = stage.get_mut(task.target) {
                        model.tween = TweenPose::REST;
                    }
                    self.state = TransitionState::Idle;
                }
            }
        }
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TransitionState::Idle
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    fn begin_exit(&mut self, target: ModelId) {
        self.scheduler.schedule(AnimationTask::new(
            target,
            TweenKind::Exiting,
            self.config.increment,
        ));
        self.state = TransitionState::Exiting { outgoing: target };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str) -> Arc<Model> {
        Arc::new(Model::new(name, Vec::new()))
    }

    fn names(stage: &Stage) -> Vec<String> {
        stage.iter().map(|(_, m)| m.model.name.clone()).collect()
    }

    fn current_name(stage: &Stage) -> Option<String> {
        let id = stage.current()?;
        stage.get(id).map(|m| m.model.name.clone())
    }

    #[test]
    fn increment_matches_step_count() {
        let config = TransitionConfig::default();
        assert_eq!(config.steps(), 20);
        let coarse = TransitionConfig {
            increment: 0.3,
            ..TransitionConfig::default()
        };
        assert_eq!(coarse.steps(), 4);
        let uneven = TransitionConfig {
            increment: 0.45,
            ..TransitionConfig::default()
        };
        assert_eq!(uneven.steps(), 3);
        let broken = TransitionConfig {
            increment: 0.0,
            ..TransitionConfig::default()
        };
        assert_eq!(broken.steps(), 1);
    }

    #[test]
    fn progress_grows_by_the_configured_increment() {
        let config = TransitionConfig {
            increment: 0.3,
            ..TransitionConfig::default()
        };
        let mut stage = Stage::new();
        let mut transitions = TransitionController::new(config);
        transitions.request(&mut stage, model("a"));
        let a = stage.current().unwrap();
        transitions.request(&mut stage, model("b"));

        transitions.advance(&mut stage);
        let pose = stage.get(a).unwrap().tween;
        assert!((pose.offset.x - 0.9).abs() < 1e-5, "{:?}", pose);

        for frame in 2..4 {
            transitions.advance(&mut stage);
            assert_eq!(names(&stage), ["a"], "frame {}", frame);
        }
        transitions.advance(&mut stage);
        assert_eq!(names(&stage), ["b"]);
    }

    #[test]
    fn first_load_does_not_animate() {
        let mut stage = Stage::new();
        let mut transitions = TransitionController::new(TransitionConfig::default());
        transitions.request(&mut stage, model("a"));

        assert!(transitions.is_idle());
        assert!(transitions.scheduler().is_empty());
        assert_eq!(current_name(&stage).as_deref(), Some("a"));
        let id = stage.current().unwrap();
        assert_eq!(stage.get(id).unwrap().tween, TweenPose::REST);
    }

    #[test]
    fn exit_completes_in_exactly_twenty_frames() {
        let mut stage = Stage::new();
        let mut transitions = TransitionController::new(TransitionConfig::default());
        transitions.request(&mut stage, model("a"));
        let a = stage.current().unwrap();
        transitions.request(&mut stage, model("b"));
        assert_eq!(transitions.state(), TransitionState::Exiting { outgoing: a });

        for frame in 1..20 {
            transitions.advance(&mut stage);
            assert_eq!(names(&stage), ["a"], "frame {}", frame);
        }
        let halfway = TweenKind::Exiting.pose(0.5, transitions.config());
        assert!((halfway.offset - Vec3::new(1.5, 0.0, 0.0)).length() < 1e-6);

        transitions.advance(&mut stage);
        assert_eq!(names(&stage), ["b"]);
        assert_eq!(current_name(&stage).as_deref(), Some("b"));
        let b = stage.current().unwrap();
        assert_eq!(transitions.state(), TransitionState::Entering { incoming: b });
        assert_eq!(
            stage.get(b).unwrap().tween,
            TweenKind::Entering.pose(0.0, transitions.config())
        );

        for _ in 0..20 {
            transitions.advance(&mut stage);
        }
        assert!(transitions.is_idle());
        assert_eq!(stage.get(b).unwrap().tween, TweenPose::REST);
    }

    #[test]
    fn exit_pose_is_linear() {
        let mut stage = Stage::new();
        let mut transitions = TransitionController::new(TransitionConfig::default());
        transitions.request(&mut stage, model("a"));
        let a = stage.current().unwrap();
        transitions.request(&mut stage, model("b"));

        for _ in 0..10 {
            transitions.advance(&mut stage);
        }
        let pose = stage.get(a).unwrap().tween;
        assert!((pose.offset.x - 1.5).abs() < 1e-5);
        assert!((pose.spin - PI / 2.0).abs() < 1e-5);
    }

    #[test]
    fn latest_request_wins_while_exiting() {
        let mut stage = Stage::new();
        let mut transitions = TransitionController::new(TransitionConfig::default());
        transitions.request(&mut stage, model("a"));
        transitions.request(&mut stage, model("b"));
        for _ in 0..5 {
            transitions.advance(&mut stage);
        }
        transitions.request(&mut stage, model("c"));
        assert_eq!(transitions.scheduler().len(), 1);

        // the exit keeps its progress: 15 more frames finish it
        for _ in 0..15 {
            transitions.advance(&mut stage);
        }
        assert_eq!(names(&stage), ["c"]);
    }

    #[test]
    fn request_while_entering_sends_the_newcomer_back_out() {
        let mut stage = Stage::new();
        let mut transitions = TransitionController::new(TransitionConfig::default());
        transitions.request(&mut stage, model("a"));
        transitions.request(&mut stage, model("b"));
        for _ in 0..20 {
            transitions.advance(&mut stage);
        }
        let b = stage.current().unwrap();
        for _ in 0..5 {
            transitions.advance(&mut stage);
        }
        assert_eq!(transitions.state(), TransitionState::Entering { incoming: b });
        assert_ne!(stage.get(b).unwrap().tween, TweenPose::REST);

        transitions.request(&mut stage, model("c"));
        assert_eq!(transitions.state(), TransitionState::Exiting { outgoing: b });
        assert_eq!(stage.get(b).unwrap().tween, TweenPose::REST);
        let task = transitions.scheduler().task_for(b).unwrap();
        assert_eq!(task.kind, TweenKind::Exiting);
        assert_eq!(task.progress(), 0.0);
        assert_eq!(transitions.scheduler().len(), 1);

        for _ in 0..20 {
            transitions.advance(&mut stage);
        }
        assert_eq!(names(&stage), ["c"]);
    }

    #[test]
    fn switching_mid_transition_never_stacks_tweens() {
        let mut stage = Stage::new();
        let mut transitions = TransitionController::new(TransitionConfig::default());
        transitions.request(&mut stage, model("a"));
        transitions.request(&mut stage, model("b"));

        let mut requests = ["c", "d", "e", "f"].into_iter();
        for frame in 0..200 {
            if frame % 13 == 0 {
                if let Some(name) = requests.next() {
                    transitions.request(&mut stage, model(name));
                }
            }
            transitions.advance(&mut stage);

            // the queued model is only attached once the outgoing one is gone
            assert_eq!(stage.len(), 1, "frame {}: {:?}", frame, names(&stage));
            assert!(transitions.scheduler().len() <= 1);
            if let Some(current) = stage.current() {
                let tasks_on_current = transitions.scheduler().task_for(current).into_iter().count();
                assert_eq!(tasks_on_current, transitions.scheduler().len());
            }
        }
        assert!(transitions.is_idle());
        assert_eq!(names(&stage), ["f"]);
    }

    #[test]
    fn scheduler_keeps_one_task_per_target() {
        let mut stage = Stage::new();
        let id = stage.attach(model("a"), TweenPose::REST);
        let mut scheduler = Scheduler::default();
        scheduler.schedule(AnimationTask::new(id, TweenKind::Exiting, 0.25));
        scheduler.schedule(AnimationTask::new(id, TweenKind::Entering, 0.25));
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.task_for(id).map(|t| t.kind), Some(TweenKind::Entering));

        stage.detach(id);
        let finished = scheduler.advance(&mut stage, &TransitionConfig::default());
        assert_eq!(finished.len(), 1);
        assert!(scheduler.is_empty());
    }
}
