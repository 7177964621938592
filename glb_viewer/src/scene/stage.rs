use std::fmt;
use std::sync::Arc;

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(u64);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// XYZ euler angles in radians.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// Displacement a transition layers on top of a model's own transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TweenPose {
    pub offset: Vec3,
    pub spin: f32,
}

impl TweenPose {
    pub const REST: TweenPose = TweenPose {
        offset: Vec3::ZERO,
        spin: 0.0,
    };
}

pub struct SceneModel {
    pub model: Arc<Model>,
    pub transform: Transform,
    pub tween: TweenPose,
}

impl SceneModel {
    pub fn world_matrix(&self) -> Mat4 {
        let mut transform = self.transform;
        transform.position += self.tween.offset;
        transform.rotation.y += self.tween.spin;
        transform.matrix()
    }
}

/// Models attached to the scene. At most one of them is the current model.
#[derive(Default)]
pub struct Stage {
    models: Vec<(ModelId, SceneModel)>,
    current: Option<ModelId>,
    next_id: u64,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, model: Arc<Model>, tween: TweenPose) -> ModelId {
        self.next_id += 1;
        let id = ModelId(self.next_id);
        self.models.push((
            id,
            SceneModel {
                model,
                transform: Transform::default(),
                tween,
            },
        ));
        id
    }

    pub fn detach(&mut self, id: ModelId) -> Option<SceneModel> {
        let index = self.models.iter().position(|(i, _)| *i == id)?;
        if self.current == Some(id) {
            self.current = None;
        }
        Some(self.models.remove(index).1)
    }

    pub fn get(&self, id: ModelId) -> Option<&SceneModel> {
        self.models.iter().find(|(i, _)| *i == id).map(|(_, m)| m)
    }

    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut SceneModel> {
        self.models
            .iter_mut()
            .find(|(i, _)| *i == id)
            .map(|(_, m)| m)
    }

    pub fn current(&self) -> Option<ModelId> {
        self.current
    }

    pub fn set_current(&mut self, id: ModelId) {
        if self.get(id).is_some() {
            self.current = Some(id);
        }
    }

    pub fn current_model_mut(&mut self) -> Option<&mut SceneModel> {
        let id = self.current?;
        self.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &SceneModel)> {
        self.models.iter().map(|(id, m)| (*id, m))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_model() -> Arc<Model> {
        Arc::new(Model::new("empty", Vec::new()))
    }

    #[test]
    fn detaching_current_clears_it() {
        let mut stage = Stage::new();
        let a = stage.attach(empty_model(), TweenPose::REST);
        let b = stage.attach(empty_model(), TweenPose::REST);
        stage.set_current(a);

        assert!(stage.detach(a).is_some());
        assert_eq!(stage.current(), None);
        assert!(stage.detach(a).is_none());
        assert_eq!(stage.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn tween_is_layered_on_the_transform() {
        let mut stage = Stage::new();
        let id = stage.attach(
            empty_model(),
            TweenPose {
                offset: Vec3::new(1.0, 0.0, 0.0),
                spin: 0.0,
            },
        );
        let model = stage.get_mut(id).unwrap();
        model.transform.position = Vec3::new(0.0, 2.0, 0.0);
        let origin = model.world_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }
}
