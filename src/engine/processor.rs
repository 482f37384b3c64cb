use super::SceneProject;
use crate::render::{RenderError, RenderSurface};
use crate::scene::command::{CameraUpdate, Command, MeshChanges};
use crate::scene::params::ParamsError;
use crate::scene::{create_entity, MeshSpec};
use glam::Vec3;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid mesh params: {0}")]
    InvalidParams(#[from] ParamsError),
    #[error("render surface: {0}")]
    Render(#[from] RenderError),
}

/// Quantize each axis to the nearest multiple of `step`.
pub(crate) fn snap_to_grid(position: Vec3, step: f32) -> Vec3 {
    (position / step).round() * step
}

impl<S: RenderSurface> SceneProject<S> {
    /// Apply every queued command in submission order. A failing command is
    /// logged and skipped; the rest of the batch still runs. Returns how many
    /// applied cleanly.
    pub fn process_commands(&mut self) -> usize {
        let batch = self.queue.drain();
        if batch.is_empty() {
            return 0;
        }
        let total = batch.len();
        let mut applied = 0;
        for command in batch {
            let kind = command.type_name();
            match self.apply_command(command) {
                Ok(()) => applied += 1,
                Err(err) => log::warn!("Scene '{}': {} failed: {}", self.id, kind, err),
            }
        }
        log::debug!("Scene '{}': applied {}/{} commands", self.id, applied, total);
        applied
    }

    fn apply_command(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::CreateMesh(spec) => self.create_mesh(spec),
            Command::UpdateMesh { id, changes } => self.update_mesh(&id, changes),
            Command::RemoveMesh { id } => {
                self.remove_mesh(&id);
                Ok(())
            }
            Command::SetCamera(update) => {
                self.set_camera(&update);
                Ok(())
            }
            Command::SplitMerged { id } => self.split_merged(&id),
        }
    }

    /// A colliding id replaces the entity; its proxy is rebuilt in place.
    fn create_mesh(&mut self, spec: MeshSpec) -> Result<(), CommandError> {
        let entity = create_entity(spec)?;
        let id = entity.id.clone();
        if self.store.upsert(entity).is_some() {
            log::debug!("Scene '{}': replaced mesh '{}'", self.id, id);
        } else {
            log::debug!("Scene '{}': created mesh '{}'", self.id, id);
        }

        let Some(runtime) = self.runtime.as_mut() else {
            return Ok(());
        };
        let Some(entity) = self.store.get(&id) else {
            return Ok(());
        };
        runtime.build(entity, &self.store)?;
        if self.selection.contains(&id) {
            self.refresh_selection_visuals();
        }
        Ok(())
    }

    fn update_mesh(&mut self, id: &str, changes: MeshChanges) -> Result<(), CommandError> {
        if !self.store.contains(id) {
            log::debug!("Scene '{}': updateMesh for unknown '{}'", self.id, id);
            return Ok(());
        }
        let parent = match &changes.parent {
            Some(Some(parent)) if self.store.would_create_cycle(id, parent) => {
                log::warn!(
                    "Scene '{}': parent '{}' for '{}' would create a cycle, ignored",
                    self.id,
                    parent,
                    id
                );
                None
            }
            other => other.clone(),
        };
        let position = changes.position.map(|position| {
            if changes.exact_position {
                position
            } else {
                self.snapped_position(position)
            }
        });

        let Some(entity) = self.store.get_mut(id) else {
            return Ok(());
        };
        if let Some(name) = &changes.name {
            entity.name = name.clone();
        }
        if let Some(position) = position {
            entity.position = position;
        }
        if let Some(rotation) = changes.rotation {
            entity.rotation = rotation;
        }
        if let Some(scaling) = changes.scaling {
            entity.scaling = scaling;
        }
        if let Some(material) = changes.material {
            entity.material = material;
        }
        if let Some(parent) = &parent {
            entity.parent = parent.clone();
        }
        let entity = entity.clone();
        log::debug!("Scene '{}': updated mesh '{}'", self.id, id);

        let Some(runtime) = self.runtime.as_mut() else {
            return Ok(());
        };
        if !runtime.contains(id) {
            return Ok(());
        }
        if changes.name.is_some() {
            runtime.set_name(id, &entity.name)?;
        }
        if changes.touches_transform() {
            runtime.push_transform(id, position, changes.rotation, changes.scaling)?;
            self.drag
                .reseed(id, runtime.live_transform(id), changes.scaling.is_some());
        }
        if parent.is_some() {
            runtime.link_parent(&entity, &self.store)?;
        }
        if changes.material.is_some() {
            runtime.apply_material(&entity)?;
        }
        Ok(())
    }

    fn remove_mesh(&mut self, id: &str) {
        if self.selection.contains(id) {
            self.forget_selected(id);
        }
        let disposed = self
            .runtime
            .as_mut()
            .is_some_and(|runtime| runtime.dispose(id, &self.store));
        if self.store.remove(id).is_some() || disposed {
            log::debug!("Scene '{}': removed mesh '{}'", self.id, id);
        }
    }

    fn split_merged(&mut self, id: &str) -> Result<(), CommandError> {
        let Some(params) = self
            .store
            .get(id)
            .filter(|entity| entity.is_merged())
            .and_then(|entity| entity.params.merged())
            .cloned()
        else {
            log::debug!("Scene '{}': '{}' is not a merged group", self.id, id);
            return Ok(());
        };

        for child in &params.merged_ids {
            let restored = params.original_parents.get(child).cloned().flatten();
            let Some(entity) = self.store.get_mut(child) else {
                continue;
            };
            entity.parent = restored;
            let entity = entity.clone();
            if let Some(runtime) = self.runtime.as_mut() {
                if let Err(err) = runtime.link_parent(&entity, &self.store) {
                    log::warn!("Scene '{}': failed to re-link '{}': {}", self.id, child, err);
                }
            }
        }

        self.remove_mesh(id);
        log::debug!(
            "Scene '{}': split '{}' into {} meshes",
            self.id,
            id,
            params.merged_ids.len()
        );
        Ok(())
    }

    fn set_camera(&mut self, update: &CameraUpdate) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.surface_mut().set_camera(update);
        } else {
            log::debug!("Scene '{}': setCamera while detached, ignored", self.id);
        }
    }
}
