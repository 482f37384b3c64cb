use super::history::{CommandSink, HistoryError};
use crate::config::EditorConfig;
use crate::engine::SceneProject;
use crate::render::RenderSurface;
use crate::scene::command::Command;
use crate::scene::generate_id;
use crate::scene::serialization::{SceneDocument, SerializationError};

pub const DEFAULT_SCENE_NAME: &str = "Untitled Scene";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown scene '{0}'")]
    UnknownScene(String),
    #[error("stored document is unusable: {0}")]
    Document(#[from] SerializationError),
}

/// A scene the host knows about. `document` is its last saved state; the
/// open scene's slot is refreshed whenever it is switched away from.
#[derive(Debug, Clone)]
pub struct SceneSlot {
    pub id: String,
    pub name: String,
    pub document: Option<SceneDocument>,
}

/// All scenes of a session plus the one that is open. Only the open scene
/// holds the render surface; the rest live as documents.
pub struct SceneRegistry<S: RenderSurface> {
    config: EditorConfig,
    slots: Vec<SceneSlot>,
    current: Option<SceneProject<S>>,
    idle_surface: Option<S>,
}

impl<S: RenderSurface> SceneRegistry<S> {
    pub fn new(surface: S, config: EditorConfig) -> Self {
        Self {
            config: config.normalized(),
            slots: Vec::new(),
            current: None,
            idle_surface: Some(surface),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn scenes(&self) -> &[SceneSlot] {
        &self.slots
    }

    pub fn current(&self) -> Option<&SceneProject<S>> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut SceneProject<S>> {
        self.current.as_mut()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(SceneProject::id)
    }

    /// Register an empty scene and open it.
    pub fn create(&mut self, name: Option<&str>) -> String {
        let id = generate_id("scene");
        let name = name
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SCENE_NAME)
            .to_string();
        self.slots.push(SceneSlot {
            id: id.clone(),
            name,
            document: None,
        });
        if let Err(err) = self.switch_to(&id) {
            log::error!("Failed to open new scene '{}': {}", id, err);
        }
        id
    }

    /// Register a scene from a document and open it. A slot with the same id
    /// is overwritten.
    pub fn open_document(&mut self, document: SceneDocument) -> Result<String, RegistryError> {
        document.decode_entities()?;
        let id = document.id.clone();
        if self.current_id() == Some(id.as_str()) {
            self.close_current();
        }
        let slot = SceneSlot {
            id: id.clone(),
            name: document.name.clone(),
            document: Some(document),
        };
        match self.slots.iter_mut().find(|slot| slot.id == id) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
        self.switch_to(&id)?;
        Ok(id)
    }

    /// Open `id`. The previous scene is serialized into its slot and
    /// detached; the surface moves to the new scene.
    pub fn switch_to(&mut self, id: &str) -> Result<(), RegistryError> {
        if self.current_id() == Some(id) {
            return Ok(());
        }
        let slot = self
            .slots
            .iter()
            .find(|slot| slot.id == id)
            .ok_or_else(|| RegistryError::UnknownScene(id.to_string()))?;
        let mut next = match &slot.document {
            Some(document) => {
                let mut project = SceneProject::from_document(document, self.config)?;
                project.set_name(slot.name.clone());
                project
            }
            None => SceneProject::new(slot.id.clone(), slot.name.clone(), self.config),
        };

        self.close_current();
        if let Some(surface) = self.idle_surface.take() {
            next.attach(surface);
        }
        log::info!("Switched to scene '{}' ({})", next.id(), next.name());
        self.current = Some(next);
        Ok(())
    }

    /// Serialize the open scene into its slot and return the document.
    pub fn save_current(&mut self) -> Option<SceneDocument> {
        let document = self.current.as_ref()?.serialize();
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.id == document.id) {
            slot.name = document.name.clone();
            slot.document = Some(document.clone());
        }
        Some(document)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|slot| slot.id == id) else {
            return false;
        };
        slot.name = name.to_string();
        if let Some(document) = slot.document.as_mut() {
            document.name = name.to_string();
        }
        if let Some(project) = self.current.as_mut().filter(|project| project.id() == id) {
            project.set_name(name);
        }
        true
    }

    /// Forget a scene. Deleting the open scene disposes it and leaves no
    /// scene open.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(index) = self.slots.iter().position(|slot| slot.id == id) else {
            return false;
        };
        self.slots.remove(index);
        if self.current_id() == Some(id) {
            if let Some(mut project) = self.current.take() {
                if let Some(surface) = project.dispose_completely() {
                    self.idle_surface = Some(surface);
                }
            }
        }
        log::info!("Deleted scene '{}'", id);
        true
    }

    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.config.snap_enabled = enabled;
        if let Some(project) = self.current.as_mut() {
            project.set_snap_enabled(enabled);
        }
    }

    pub fn set_snap_value(&mut self, value: f32) {
        self.config.snap_value = crate::config::clamp_snap_value(value);
        if let Some(project) = self.current.as_mut() {
            project.set_snap_value(value);
        }
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.config.grid_visible = visible;
        if let Some(project) = self.current.as_mut() {
            project.set_grid_visible(visible);
        }
    }

    pub fn set_axes_visible(&mut self, visible: bool) {
        self.config.axes_visible = visible;
        if let Some(project) = self.current.as_mut() {
            project.set_axes_visible(visible);
        }
    }

    fn close_current(&mut self) {
        let Some(mut previous) = self.current.take() else {
            return;
        };
        let document = previous.serialize();
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.id == previous.id()) {
            slot.document = Some(document);
        }
        if let Some(surface) = previous.detach() {
            self.idle_surface = Some(surface);
        }
    }
}

/// Replays land in whichever scene is open at the time.
impl<S: RenderSurface> CommandSink for SceneRegistry<S> {
    fn submit(&mut self, commands: &[Command]) -> Result<(), HistoryError> {
        match self.current.as_mut() {
            Some(project) => project.submit(commands),
            None => Err(HistoryError::NoScene),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessSurface;
    use crate::scene::{MeshKind, MeshSpec};

    fn registry() -> SceneRegistry<HeadlessSurface> {
        SceneRegistry::new(HeadlessSurface::new(64, 64), EditorConfig::default())
    }

    fn add_box(registry: &mut SceneRegistry<HeadlessSurface>, id: &str) {
        let project = registry.current_mut().unwrap();
        project.enqueue(Command::create(MeshSpec::new(MeshKind::Box).with_id(id)));
        project.tick();
    }

    #[test]
    fn create_opens_scene_on_the_surface() {
        let mut registry = registry();
        let id = registry.create(None);
        assert_eq!(registry.current_id(), Some(id.as_str()));
        assert_eq!(registry.scenes()[0].name, DEFAULT_SCENE_NAME);
        assert!(registry.current().unwrap().is_attached());
    }

    #[test]
    fn switching_keeps_each_scene_content() {
        let mut registry = registry();
        let first = registry.create(Some("First"));
        add_box(&mut registry, "a");
        let second = registry.create(Some("Second"));
        assert!(registry.current().unwrap().store().is_empty());
        add_box(&mut registry, "b");

        registry.switch_to(&first).unwrap();
        let project = registry.current().unwrap();
        assert_eq!(project.name(), "First");
        assert!(project.get("a").is_some());
        assert!(project.get("b").is_none());
        assert_eq!(project.surface().unwrap().proxy_count(), 1);

        let stored = registry
            .scenes()
            .iter()
            .find(|slot| slot.id == second)
            .and_then(|slot| slot.document.as_ref())
            .unwrap();
        assert_eq!(stored.meshes.len(), 1);
        assert_eq!(stored.meshes[0].id, "b");
    }

    #[test]
    fn unknown_scene_is_refused() {
        let mut registry = registry();
        let id = registry.create(None);
        assert!(matches!(
            registry.switch_to("nope"),
            Err(RegistryError::UnknownScene(_))
        ));
        assert_eq!(registry.current_id(), Some(id.as_str()));
    }

    #[test]
    fn deleting_open_scene_frees_the_surface() {
        let mut registry = registry();
        let first = registry.create(None);
        add_box(&mut registry, "a");
        assert!(registry.delete(&first));
        assert!(registry.current().is_none());
        assert!(registry.scenes().is_empty());
        assert!(matches!(
            registry.submit(&[Command::remove("a")]),
            Err(HistoryError::NoScene)
        ));

        registry.create(None);
        assert!(registry.current().unwrap().is_attached());
        assert_eq!(registry.current().unwrap().surface().unwrap().proxy_count(), 0);
    }

    #[test]
    fn open_document_registers_and_attaches() {
        let mut registry = registry();
        registry.create(None);
        add_box(&mut registry, "a");
        let mut document = registry.save_current().unwrap();
        document.id = "imported".to_string();
        document.name = "Imported".to_string();

        let id = registry.open_document(document).unwrap();
        assert_eq!(id, "imported");
        assert_eq!(registry.scenes().len(), 2);
        assert!(registry.current().unwrap().proxy_of("a").is_some());
    }

    #[test]
    fn toggles_follow_into_new_scenes() {
        let mut registry = registry();
        registry.set_grid_visible(false);
        registry.set_snap_enabled(true);
        registry.set_snap_value(0.25);
        registry.create(None);
        let project = registry.current().unwrap();
        assert!(!project.surface().unwrap().grid_visible());
        assert_eq!(project.surface().unwrap().snap_distance(), Some(0.25));
    }
}
