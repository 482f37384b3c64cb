use super::SceneProject;
use crate::config::EditorConfig;
use crate::render::RenderSurface;
use crate::scene::serialization::{CameraSnapshot, MeshRecord, SceneDocument, SerializationError};
use crate::scene::MeshId;
use std::collections::HashSet;

impl<S: RenderSurface> SceneProject<S> {
    /// Detached project restored from `document`, camera included. The
    /// camera is applied on the next `attach`.
    pub fn from_document(
        document: &SceneDocument,
        config: EditorConfig,
    ) -> Result<Self, SerializationError> {
        let mut project = Self::new(document.id.clone(), document.name.clone(), config);
        if document.created_at > 0 {
            project.created_at = document.created_at;
        }
        project.load(document)?;
        project.parked_camera = document.camera.clone();
        Ok(project)
    }

    /// Snapshot the scene. Live proxy transforms win over metadata so a drag
    /// that has not been synced yet is still captured.
    pub fn serialize(&self) -> SceneDocument {
        let meshes = self
            .store
            .iter()
            .map(|entity| {
                let mut record = MeshRecord::from_entity(entity);
                if let Some(live) = self.live_transform(&entity.id) {
                    record.position = live.position;
                    record.rotation = live.rotation;
                    record.scaling = self
                        .drag
                        .stashed_scaling_for(&entity.id)
                        .unwrap_or(live.scaling);
                }
                record
            })
            .collect();
        SceneDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            camera: self.camera_snapshot(),
            meshes,
            created_at: self.created_at,
        }
    }

    pub fn serialize_json(&self) -> Result<String, SerializationError> {
        self.serialize().to_json_pretty()
    }

    pub fn camera_snapshot(&self) -> Option<CameraSnapshot> {
        match self.surface() {
            Some(surface) => surface.camera(),
            None => self.parked_camera.clone(),
        }
    }

    /// Merge a document into the scene. Every mesh is validated before
    /// anything is touched; existing ids are overwritten.
    pub fn load(&mut self, document: &SceneDocument) -> Result<usize, SerializationError> {
        let entities = document.decode_entities()?;
        let loaded: Vec<MeshId> = entities.iter().map(|entity| entity.id.clone()).collect();
        for entity in entities {
            self.store.upsert(entity);
        }
        self.project_loaded(&loaded);
        log::info!("Scene '{}': loaded {} meshes", self.id, loaded.len());
        Ok(loaded.len())
    }

    /// Drop every entity and proxy, then load `document`. Nothing changes if
    /// the document is invalid.
    pub fn replace(&mut self, document: &SceneDocument) -> Result<usize, SerializationError> {
        let entities = document.decode_entities()?;
        self.clear_selection();
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.dispose_all();
        }
        self.drag.reset();
        self.store.clear();
        let loaded: Vec<MeshId> = entities.iter().map(|entity| entity.id.clone()).collect();
        for entity in entities {
            self.store.upsert(entity);
        }
        self.project_loaded(&loaded);
        log::info!("Scene '{}': replaced with {} meshes", self.id, loaded.len());
        Ok(loaded.len())
    }

    pub fn load_json(&mut self, json: &str) -> Result<usize, SerializationError> {
        let document = SceneDocument::from_json_str(json)?;
        self.load(&document)
    }

    pub fn replace_json(&mut self, json: &str) -> Result<usize, SerializationError> {
        let document = SceneDocument::from_json_str(json)?;
        self.replace(&document)
    }

    // Missing proxies are built; proxies of reloaded ids are refreshed.
    fn project_loaded(&mut self, loaded: &[MeshId]) {
        let Some(runtime) = self.runtime.as_mut() else {
            return;
        };
        let loaded: HashSet<&str> = loaded.iter().map(String::as_str).collect();
        for id in self.store.ids_parents_first() {
            let Some(entity) = self.store.get(&id) else {
                continue;
            };
            let result = if !runtime.contains(&id) {
                runtime.build(entity, &self.store).map(|_| ())
            } else if loaded.contains(id.as_str()) {
                runtime.refresh(entity, &self.store)
            } else {
                Ok(())
            };
            if let Err(err) = result {
                log::warn!("Scene '{}': proxy for '{}' failed: {}", self.id, id, err);
            }
        }
        self.refresh_selection_visuals();
    }
}
