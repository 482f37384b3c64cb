//! Manipulation handle synchronization.
//!
//! While one entity is selected its proxy carries the handle. Each tick the
//! proxy's live transform is compared with the last recorded one and any
//! drift beyond `drag_epsilon` is written back into metadata. Hosts whose
//! surface reports drag start/end can call `begin_drag`/`end_drag` as well;
//! both paths share `sync_manipulation`.

use super::{SceneEvent, SceneProject};
use crate::config::EditorConfig;
use crate::render::{HandleParams, Primitive, RenderSurface, Transform};
use crate::scene::{MeshEntity, MeshId};
use glam::Vec3;

const MIN_HANDLE_SCALE: f32 = 0.04;
const MAX_HANDLE_SCALE: f32 = 0.12;
const MESH_RADIUS_CAP: f32 = 0.9;
const HANDLE_SIZE_FACTOR: f32 = 0.5;
const FALLBACK_CAMERA_RADIUS: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Translate,
    Rotate,
    Scale,
}

#[derive(Debug, Default)]
pub(super) struct DragTracker {
    target: Option<MeshId>,
    last: Option<Transform>,
    mode: Option<DragMode>,
    // Real scaling of a rotate-dragged proxy while it shows the averaged one.
    stashed_scaling: Option<Vec3>,
}

impl DragTracker {
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn seed(&mut self, id: &str, live: Option<Transform>) {
        *self = Self {
            target: Some(id.to_string()),
            last: live,
            mode: None,
            stashed_scaling: None,
        };
    }

    /// Accept the proxy's current state as the new baseline after an
    /// external write.
    pub fn reseed(&mut self, id: &str, live: Option<Transform>, scaling_replaced: bool) {
        if self.target() != Some(id) {
            return;
        }
        self.last = live;
        if scaling_replaced {
            self.stashed_scaling = None;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn mode(&self) -> Option<DragMode> {
        self.mode
    }

    pub fn stashed_scaling_for(&self, id: &str) -> Option<Vec3> {
        self.stashed_scaling.filter(|_| self.target() == Some(id))
    }
}

pub fn is_uniform_scale(scaling: Vec3, epsilon: f32) -> bool {
    (scaling.x - scaling.y).abs() <= epsilon
        && (scaling.x - scaling.z).abs() <= epsilon
        && (scaling.y - scaling.z).abs() <= epsilon
}

fn drifted(last: &Transform, live: &Transform, epsilon: f32) -> bool {
    (last.position - live.position).abs().max_element() > epsilon
        || (last.rotation - live.rotation).abs().max_element() > epsilon
        || (last.scaling - live.scaling).abs().max_element() > epsilon
}

/// Handle size: follows camera distance, never larger than the mesh.
pub fn handle_scale_ratio(camera_radius: f32, mesh_radius: Option<f32>, factor: f32) -> f32 {
    let mesh_radius = mesh_radius.filter(|radius| *radius > 0.0);
    let mut desired = camera_radius * factor;
    if let Some(radius) = mesh_radius {
        desired = desired.min(radius * MESH_RADIUS_CAP);
    }
    let max = mesh_radius.map_or(MAX_HANDLE_SCALE, |radius| radius.max(MAX_HANDLE_SCALE));
    desired.max(MIN_HANDLE_SCALE).min(max) * HANDLE_SIZE_FACTOR
}

pub(super) fn handle_params_for<S: RenderSurface>(
    config: &EditorConfig,
    surface: &S,
    entity: Option<&MeshEntity>,
) -> HandleParams {
    let camera_radius = surface
        .camera()
        .map_or(FALLBACK_CAMERA_RADIUS, |camera| camera.radius);
    let mesh_radius = entity.and_then(|entity| {
        Primitive::for_entity(entity)
            .bounding_radius()
            .map(|radius| radius * entity.scaling.abs().max_element())
    });
    HandleParams {
        scale_ratio: handle_scale_ratio(camera_radius, mesh_radius, config.handle_scale_factor),
        snap_distance: config.snap_distance(),
    }
}

impl<S: RenderSurface> SceneProject<S> {
    pub fn drag_mode(&self) -> Option<DragMode> {
        self.drag.mode()
    }

    /// Write the handle target's live transform into metadata if it moved.
    /// Returns whether anything changed.
    pub fn sync_manipulation(&mut self) -> bool {
        let Some(id) = self.drag.target.clone() else {
            return false;
        };
        let Some(live) = self.live_transform(&id) else {
            return false;
        };
        if let Some(last) = &self.drag.last {
            if !drifted(last, &live, self.config.drag_epsilon) {
                return false;
            }
        }
        let Some(entity) = self.store.get_mut(&id) else {
            return false;
        };
        entity.position = live.position;
        entity.rotation = live.rotation;
        entity.scaling = self.drag.stashed_scaling.unwrap_or(live.scaling);
        self.drag.last = Some(live);
        self.emit(SceneEvent::TransformChanged(id));
        true
    }

    /// Drag start. A rotation drag on a non-uniformly scaled proxy shows the
    /// mean scale until `end_drag`.
    pub fn begin_drag(&mut self, mode: DragMode) -> bool {
        self.sync_manipulation();
        let epsilon = self.config.uniform_scale_epsilon;
        let Some(id) = self.drag.target.clone() else {
            return false;
        };
        let Some(runtime) = self.runtime.as_mut() else {
            return false;
        };
        let Some(proxy) = runtime.proxy(&id) else {
            return false;
        };
        self.drag.mode = Some(mode);
        if mode != DragMode::Rotate || self.drag.stashed_scaling.is_some() {
            return true;
        }
        let Some(mut live) = runtime.surface().transform(proxy) else {
            return true;
        };
        if is_uniform_scale(live.scaling, epsilon) {
            return true;
        }
        let original = live.scaling;
        live.scaling = Vec3::splat((original.x + original.y + original.z) / 3.0);
        match runtime.surface_mut().set_transform(proxy, live) {
            Ok(()) => {
                self.drag.stashed_scaling = Some(original);
                if let Some(last) = self.drag.last.as_mut() {
                    last.scaling = live.scaling;
                }
                log::debug!("Normalized scaling of '{}' for rotation", id);
            }
            Err(err) => log::warn!("Failed to normalize scaling of '{}': {}", id, err),
        }
        true
    }

    pub fn drag_update(&mut self) -> bool {
        self.sync_manipulation()
    }

    /// Drag end: final sync, then the stashed scaling goes back on the proxy.
    pub fn end_drag(&mut self) -> bool {
        let changed = self.sync_manipulation();
        self.drag.mode = None;
        let Some(original) = self.drag.stashed_scaling.take() else {
            return changed;
        };
        let Some(id) = self.drag.target.clone() else {
            return changed;
        };
        let Some(runtime) = self.runtime.as_mut() else {
            return changed;
        };
        let Some(proxy) = runtime.proxy(&id) else {
            return changed;
        };
        if let Some(mut live) = runtime.surface().transform(proxy) {
            live.scaling = original;
            match runtime.surface_mut().set_transform(proxy, live) {
                Ok(()) => {
                    if let Some(last) = self.drag.last.as_mut() {
                        last.scaling = original;
                    }
                }
                Err(err) => log::warn!("Failed to restore scaling of '{}': {}", id, err),
            }
        }
        changed
    }
}
