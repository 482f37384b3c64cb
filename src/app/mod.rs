//! Editor host layered over the engine: multi-scene registry, undo/redo,
//! keyboard shortcuts and the tick loop. User actions go through the
//! engine's command queue like everything else; each one records an
//! `UndoEntry` holding its forward and inverse commands.

mod history;
mod input;
mod registry;
mod timing;

pub use history::{CommandSink, History, HistoryError, UndoEntry};
pub use input::{EditorAction, InputState, Key};
pub use registry::{RegistryError, SceneRegistry, SceneSlot, DEFAULT_SCENE_NAME};
pub use timing::FrameTiming;

use crate::config::EditorConfig;
use crate::engine::{SceneEvent, SceneProject};
use crate::render::{HeadlessSurface, RenderSurface};
use crate::scene::command::{Command, MeshChanges};
use crate::scene::params::{MergedParams, MeshParams};
use crate::scene::serialization::{
    load_document_from_file, save_document_to_file, SceneDocument, SerializationError,
};
use crate::scene::{generate_id, Color, Material, MeshEntity, MeshId, MeshKind, MeshSpec};
use glam::Vec3;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("no scene is open")]
    NoScene,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

pub struct Editor<S: RenderSurface> {
    registry: SceneRegistry<S>,
    history: History,
    input: InputState,
    timing: FrameTiming,
    // Freshly added mesh to select once its proxy exists.
    pending_highlight: Option<MeshId>,
    selected: Option<MeshId>,
}

impl<S: RenderSurface> Editor<S> {
    pub fn new(surface: S, config: EditorConfig) -> Self {
        Self {
            registry: SceneRegistry::new(surface, config),
            history: History::new(),
            input: InputState::default(),
            timing: FrameTiming::new("meshforge", Instant::now()),
            pending_highlight: None,
            selected: None,
        }
    }

    pub fn registry(&self) -> &SceneRegistry<S> {
        &self.registry
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    pub fn current(&self) -> Option<&SceneProject<S>> {
        self.registry.current()
    }

    /// The open scene, e.g. for camera control or drag entry points.
    pub fn current_mut(&mut self) -> Option<&mut SceneProject<S>> {
        self.registry.current_mut()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn create_scene(&mut self, name: Option<&str>) -> String {
        self.reset_session();
        self.registry.create(name)
    }

    pub fn switch_scene(&mut self, id: &str) -> Result<(), EditorError> {
        if self.registry.current_id() == Some(id) {
            return Ok(());
        }
        self.registry.switch_to(id)?;
        self.reset_session();
        Ok(())
    }

    pub fn delete_scene(&mut self, id: &str) -> bool {
        if self.registry.current_id() == Some(id) {
            self.reset_session();
        }
        self.registry.delete(id)
    }

    pub fn rename_scene(&mut self, id: &str, name: &str) -> bool {
        self.registry.rename(id, name)
    }

    /// Create a top-level mesh of `kind` with kind defaults. It is selected
    /// after the tick that builds it.
    pub fn add_mesh(&mut self, kind: impl Into<MeshKind>) -> Option<MeshId> {
        let kind = kind.into();
        let id = generate_id(kind.as_str());
        let spec = MeshSpec::new(kind).with_id(id.clone());
        let entry = UndoEntry::new(
            format!("add {}", id),
            vec![Command::create(spec)],
            vec![Command::remove(id.clone())],
        );
        if !self.perform(entry) {
            return None;
        }
        self.pending_highlight = Some(id.clone());
        Some(id)
    }

    pub fn delete_mesh(&mut self, id: &str) -> bool {
        self.settle();
        let Some(snapshot) = self.snapshot(id) else {
            return false;
        };
        let entry = UndoEntry::new(
            format!("delete {}", id),
            vec![Command::remove(id)],
            vec![Command::create(snapshot.to_spec())],
        );
        if !self.perform(entry) {
            return false;
        }
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        true
    }

    pub fn delete_selection(&mut self) -> bool {
        match self.selected.clone() {
            Some(id) => self.delete_mesh(&id),
            None => false,
        }
    }

    /// Partial update. The inverse restores exactly the fields touched and
    /// the forward replays the position that was actually stored.
    pub fn update_mesh(&mut self, id: &str, mut changes: MeshChanges) -> bool {
        if changes.is_empty() {
            return false;
        }
        self.settle();
        let Some(before) = self.snapshot(id) else {
            return false;
        };
        if let Some(position) = changes.position.filter(|_| !changes.exact_position) {
            if let Some(project) = self.registry.current() {
                changes.position = Some(project.snapped_position(position));
                changes.exact_position = true;
            }
        }
        let inverse = inverse_changes(&before, &changes);
        let entry = UndoEntry::new(
            format!("update {}", id),
            vec![Command::update(id, changes)],
            vec![Command::update(id, inverse)],
        );
        self.perform(entry)
    }

    /// Group existing meshes under a new merged node at the origin. Needs at
    /// least two known ids; unknown and repeated ids are skipped.
    pub fn merge(&mut self, ids: &[MeshId]) -> Option<MeshId> {
        self.settle();
        let project = self.current_or_warn()?;
        let mut members: Vec<MeshEntity> = Vec::new();
        for id in ids {
            if members.iter().any(|member| &member.id == id) {
                continue;
            }
            match project.get(id) {
                Some(entity) => members.push(entity),
                None => log::warn!("Merge: unknown mesh '{}' skipped", id),
            }
        }
        if members.len() < 2 {
            log::warn!("Merge needs at least two meshes, got {}", members.len());
            return None;
        }

        let group = generate_id(MeshKind::Merged.as_str());
        let params = MeshParams::Merged(MergedParams {
            merged_ids: members.iter().map(|member| member.id.clone()).collect(),
            original_parents: members
                .iter()
                .map(|member| (member.id.clone(), member.parent.clone()))
                .collect(),
            ..MergedParams::default()
        });
        let spec = MeshSpec::new(MeshKind::Merged)
            .with_id(group.clone())
            .with_params(params.to_value());
        let mut forward = vec![Command::create(spec)];
        forward.extend(members.iter().map(|member| {
            Command::update(
                member.id.clone(),
                MeshChanges::new().parent(Some(group.clone())),
            )
        }));
        let entry = UndoEntry::new(
            format!("merge {}", group),
            forward,
            vec![Command::split(group.clone())],
        );
        if !self.perform(entry) {
            return None;
        }
        self.pending_highlight = Some(group.clone());
        Some(group)
    }

    pub fn split(&mut self, id: &str) -> bool {
        self.settle();
        let Some(group) = self.snapshot(id).filter(MeshEntity::is_merged) else {
            return false;
        };
        let Some(params) = group.params.merged() else {
            return false;
        };
        let mut inverse = vec![Command::create(group.to_spec())];
        inverse.extend(params.merged_ids.iter().map(|child| {
            Command::update(child.clone(), MeshChanges::new().parent(Some(group.id.clone())))
        }));
        let entry = UndoEntry::new(format!("split {}", id), vec![Command::split(id)], inverse);
        self.perform(entry)
    }

    pub fn select(&mut self, id: Option<&str>) -> bool {
        let Some(project) = self.registry.current_mut() else {
            return false;
        };
        if !project.highlight(id) {
            return false;
        }
        self.selected = id.map(str::to_string);
        true
    }

    pub fn select_at(&mut self, x: f32, y: f32, toggle: bool) -> Option<MeshId> {
        let project = self.registry.current_mut()?;
        let hit = project.select_at(x, y, toggle);
        self.selected = project.selected_id().map(str::to_string);
        hit
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.registry)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.registry)
    }

    /// Feed a key transition; returns whether a shortcut ran.
    pub fn handle_key(&mut self, key: Key, pressed: bool) -> bool {
        match self.input.handle_key(key, pressed) {
            Some(EditorAction::DeleteSelection) => self.delete_selection(),
            Some(EditorAction::Undo) => self.undo(),
            Some(EditorAction::Redo) => self.redo(),
            None => false,
        }
    }

    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.registry.set_snap_enabled(enabled);
    }

    pub fn set_snap_value(&mut self, value: f32) {
        self.registry.set_snap_value(value);
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.registry.set_grid_visible(visible);
    }

    pub fn set_axes_visible(&mut self, visible: bool) {
        self.registry.set_axes_visible(visible);
    }

    /// One host frame: run the open scene's tick, resolve a pending
    /// selection and hand back the scene's notifications.
    pub fn tick(&mut self, now: Instant) -> Vec<SceneEvent> {
        let started = Instant::now();
        let mut events = Vec::new();
        if let Some(project) = self.registry.current_mut() {
            project.tick();
            if let Some(id) = self.pending_highlight.take() {
                if !project.highlight(Some(id.as_str())) {
                    log::debug!("Pending selection '{}' no longer exists", id);
                }
            }
            events = project.take_events();
        }
        for event in &events {
            if let SceneEvent::SelectionChanged(id) = event {
                self.selected = id.clone();
            }
        }
        self.timing.set_tick_ms(started.elapsed().as_secs_f32() * 1000.0);
        self.timing.update(now);
        events
    }

    /// Serialize the open scene into its slot and write it to `path`.
    pub fn save_to_file(&mut self, path: &Path) -> Result<SceneDocument, EditorError> {
        let document = self.registry.save_current().ok_or(EditorError::NoScene)?;
        save_document_to_file(&document, path)?;
        log::info!("Saved scene '{}' to {}", document.id, path.display());
        Ok(document)
    }

    /// Import a document into the open scene, merging or overwriting.
    /// Imports are not undoable and reset the history.
    pub fn import_file(&mut self, path: &Path, overwrite: bool) -> Result<usize, EditorError> {
        let document = load_document_from_file(path)?;
        let project = self.registry.current_mut().ok_or(EditorError::NoScene)?;
        let count = if overwrite {
            project.replace(&document)?
        } else {
            project.load(&document)?
        };
        self.history.clear();
        if overwrite {
            self.selected = None;
        }
        Ok(count)
    }

    /// Open a document file as a scene of its own.
    pub fn open_file(&mut self, path: &Path) -> Result<String, EditorError> {
        let document = load_document_from_file(path)?;
        let id = self.registry.open_document(document)?;
        self.reset_session();
        Ok(id)
    }

    fn perform(&mut self, entry: UndoEntry) -> bool {
        let Some(project) = self.registry.current_mut() else {
            log::warn!("No scene is open, '{}' ignored", entry.label);
            return false;
        };
        match project.submit(&entry.forward) {
            Ok(()) => {
                self.history.record(entry);
                true
            }
            Err(err) => {
                log::warn!("'{}' rejected: {}", entry.label, err);
                false
            }
        }
    }

    /// Apply commands still queued from earlier actions, so snapshots see
    /// the state the next command will actually run against.
    fn settle(&mut self) {
        if let Some(project) = self.registry.current_mut() {
            project.process_commands();
        }
    }

    fn snapshot(&self, id: &str) -> Option<MeshEntity> {
        let entity = self.current_or_warn()?.get(id);
        if entity.is_none() {
            log::debug!("No mesh '{}' in the open scene", id);
        }
        entity
    }

    fn current_or_warn(&self) -> Option<&SceneProject<S>> {
        let project = self.registry.current();
        if project.is_none() {
            log::warn!("No scene is open");
        }
        project
    }

    fn reset_session(&mut self) {
        self.history.clear();
        self.pending_highlight = None;
        self.selected = None;
    }
}

/// Prior values of exactly the fields `changes` touches. Positions are
/// restored verbatim, bypassing grid snap.
fn inverse_changes(before: &MeshEntity, changes: &MeshChanges) -> MeshChanges {
    MeshChanges {
        name: changes.name.as_ref().map(|_| before.name.clone()),
        position: changes.position.map(|_| before.position),
        rotation: changes.rotation.map(|_| before.rotation),
        scaling: changes.scaling.map(|_| before.scaling),
        material: changes.material.map(|_| before.material),
        parent: changes.parent.as_ref().map(|_| before.parent.clone()),
        exact_position: changes.position.is_some(),
    }
}

fn step(editor: &mut Editor<HeadlessSurface>, clock: &mut Instant) {
    *clock += Duration::from_millis(16);
    for event in editor.tick(*clock) {
        log::info!("Scene event: {:?}", event);
    }
}

/// Scripted headless session: builds a small scene through the editor,
/// exercising undo/redo, merge and split, then prints the document and
/// optionally writes it to `output`.
pub fn run(config: EditorConfig, output: Option<&Path>) -> Result<SceneDocument, EditorError> {
    let mut editor = Editor::new(HeadlessSurface::default(), config);
    let mut clock = Instant::now();

    editor.create_scene(Some("Demo"));
    let crate_id = editor.add_mesh(MeshKind::Box).ok_or(EditorError::NoScene)?;
    let ball = editor.add_mesh(MeshKind::Sphere).ok_or(EditorError::NoScene)?;
    let marker = editor.add_mesh(MeshKind::Cone).ok_or(EditorError::NoScene)?;
    step(&mut editor, &mut clock);

    editor.update_mesh(
        &crate_id,
        MeshChanges::new()
            .name("Crate")
            .position(Vec3::new(1.3, 0.0, 0.2)),
    );
    editor.update_mesh(
        &ball,
        MeshChanges::new()
            .position(Vec3::new(-2.0, 1.0, 0.0))
            .material(Material {
                color: Color {
                    r: 0.2,
                    g: 0.4,
                    b: 0.9,
                },
                specular_power: 32.0,
            }),
    );
    step(&mut editor, &mut clock);

    if let Some(group) = editor.merge(&[crate_id.clone(), ball.clone()]) {
        step(&mut editor, &mut clock);
        editor.undo();
        step(&mut editor, &mut clock);
        editor.redo();
        step(&mut editor, &mut clock);
        editor.split(&group);
        step(&mut editor, &mut clock);
    }

    editor.delete_mesh(&marker);
    step(&mut editor, &mut clock);
    editor.undo();
    step(&mut editor, &mut clock);

    let document = match output {
        Some(path) => editor.save_to_file(path)?,
        None => editor
            .registry
            .save_current()
            .ok_or(EditorError::NoScene)?,
    };
    println!("{}", document.to_json_pretty()?);
    log::info!(
        "Session finished: {} meshes, {} undo steps",
        document.meshes.len(),
        editor.history().undo_len()
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> Editor<HeadlessSurface> {
        let mut editor = Editor::new(HeadlessSurface::new(64, 64), EditorConfig::default());
        editor.create_scene(Some("Test"));
        editor
    }

    fn tick(editor: &mut Editor<HeadlessSurface>) -> Vec<SceneEvent> {
        editor.tick(Instant::now())
    }

    fn mesh(editor: &Editor<HeadlessSurface>, id: &str) -> Option<MeshEntity> {
        editor.current().and_then(|project| project.get(id))
    }

    #[test]
    fn added_mesh_is_selected_after_its_tick() {
        let mut editor = editor();
        let id = editor.add_mesh(MeshKind::Box).unwrap();
        assert!(mesh(&editor, &id).is_none());
        let events = tick(&mut editor);
        assert!(mesh(&editor, &id).is_some());
        assert_eq!(editor.selected_id(), Some(id.as_str()));
        assert!(events.contains(&SceneEvent::SelectionChanged(Some(id.clone()))));
    }

    #[test]
    fn add_undo_redo() {
        let mut editor = editor();
        let id = editor.add_mesh(MeshKind::Sphere).unwrap();
        tick(&mut editor);

        assert!(editor.undo());
        tick(&mut editor);
        assert!(mesh(&editor, &id).is_none());
        assert_eq!(editor.selected_id(), None);

        assert!(editor.redo());
        tick(&mut editor);
        assert_eq!(mesh(&editor, &id).unwrap().kind, MeshKind::Sphere);
        assert!(!editor.redo());
    }

    #[test]
    fn update_undo_restores_exact_prior_values() {
        let mut editor = editor();
        editor.set_snap_enabled(true);
        let id = editor.add_mesh(MeshKind::Box).unwrap();
        tick(&mut editor);
        editor.current_mut().unwrap().enqueue(Command::update(
            &*id,
            MeshChanges {
                position: Some(Vec3::new(0.3, 0.0, 0.0)),
                exact_position: true,
                ..MeshChanges::default()
            },
        ));
        tick(&mut editor);

        editor.update_mesh(
            &id,
            MeshChanges::new()
                .position(Vec3::new(2.2, 0.0, 0.0))
                .name("moved"),
        );
        tick(&mut editor);
        let moved = mesh(&editor, &id).unwrap();
        assert_eq!(moved.position.x, 2.0);
        assert_eq!(moved.name, "moved");

        editor.undo();
        tick(&mut editor);
        let restored = mesh(&editor, &id).unwrap();
        assert_eq!(restored.position.x, 0.3);
        assert_eq!(restored.name, id);
    }

    #[test]
    fn updates_queued_in_one_frame_undo_one_at_a_time() {
        let mut editor = editor();
        let id = editor.add_mesh(MeshKind::Box).unwrap();
        tick(&mut editor);

        assert!(editor.update_mesh(&id, MeshChanges::new().position(Vec3::X)));
        assert!(editor.update_mesh(&id, MeshChanges::new().position(Vec3::new(2.0, 0.0, 0.0))));
        tick(&mut editor);
        assert_eq!(mesh(&editor, &id).unwrap().position.x, 2.0);

        assert!(editor.undo());
        tick(&mut editor);
        assert_eq!(mesh(&editor, &id).unwrap().position.x, 1.0);
        assert!(editor.undo());
        tick(&mut editor);
        assert_eq!(mesh(&editor, &id).unwrap().position.x, 0.0);
    }

    #[test]
    fn mesh_can_be_deleted_before_its_first_tick() {
        let mut editor = editor();
        let id = editor.add_mesh(MeshKind::Sphere).unwrap();
        assert!(editor.delete_mesh(&id));
        tick(&mut editor);
        assert!(mesh(&editor, &id).is_none());
        assert_eq!(editor.current().unwrap().proxy_count(), 0);

        assert!(editor.undo());
        tick(&mut editor);
        assert_eq!(mesh(&editor, &id).unwrap().kind, MeshKind::Sphere);
    }

    #[test]
    fn redo_restores_stored_position_regardless_of_snap() {
        let mut editor = editor();
        let id = editor.add_mesh(MeshKind::Box).unwrap();
        tick(&mut editor);

        editor.update_mesh(&id, MeshChanges::new().position(Vec3::new(0.3, 0.0, 0.0)));
        tick(&mut editor);
        editor.undo();
        tick(&mut editor);
        editor.set_snap_enabled(true);
        assert!(editor.redo());
        tick(&mut editor);
        assert_eq!(mesh(&editor, &id).unwrap().position.x, 0.3);

        editor.update_mesh(&id, MeshChanges::new().position(Vec3::new(2.2, 0.0, 0.0)));
        tick(&mut editor);
        assert_eq!(mesh(&editor, &id).unwrap().position.x, 2.0);
        editor.undo();
        tick(&mut editor);
        editor.set_snap_enabled(false);
        editor.redo();
        tick(&mut editor);
        assert_eq!(mesh(&editor, &id).unwrap().position.x, 2.0);
    }

    #[test]
    fn delete_undo_restores_entity_and_links() {
        let mut editor = editor();
        let parent = editor.add_mesh(MeshKind::Box).unwrap();
        let child = editor.add_mesh(MeshKind::Cylinder).unwrap();
        tick(&mut editor);
        editor.update_mesh(&child, MeshChanges::new().parent(Some(parent.clone())));
        tick(&mut editor);
        let before = mesh(&editor, &parent).unwrap();

        editor.select(Some(parent.as_str()));
        assert!(editor.handle_key(Key::Delete, true));
        tick(&mut editor);
        assert!(mesh(&editor, &parent).is_none());
        assert_eq!(editor.selected_id(), None);

        editor.handle_key(Key::Control, true);
        assert!(editor.handle_key(Key::Character('z'), true));
        tick(&mut editor);
        assert_eq!(mesh(&editor, &parent), Some(before));
        let project = editor.current().unwrap();
        let child_proxy = project.proxy_of(&child).unwrap();
        assert_eq!(
            project.surface().unwrap().proxy(child_proxy).unwrap().parent,
            project.proxy_of(&parent)
        );
    }

    #[test]
    fn merge_and_split_are_undoable() {
        let mut editor = editor();
        let a = editor.add_mesh(MeshKind::Box).unwrap();
        let b = editor.add_mesh(MeshKind::Box).unwrap();
        tick(&mut editor);
        assert!(editor.merge(&[a.clone()]).is_none());

        let group = editor
            .merge(&[a.clone(), b.clone(), a.clone(), "ghost".to_string()])
            .unwrap();
        tick(&mut editor);
        assert_eq!(mesh(&editor, &a).unwrap().parent.as_deref(), Some(group.as_str()));
        assert_eq!(editor.selected_id(), Some(group.as_str()));

        editor.undo();
        tick(&mut editor);
        assert!(mesh(&editor, &group).is_none());
        assert_eq!(mesh(&editor, &a).unwrap().parent, None);

        editor.redo();
        tick(&mut editor);
        assert!(editor.split(&group));
        tick(&mut editor);
        assert!(mesh(&editor, &group).is_none());
        assert_eq!(mesh(&editor, &b).unwrap().parent, None);

        editor.undo();
        tick(&mut editor);
        assert!(mesh(&editor, &group).unwrap().is_merged());
        assert_eq!(mesh(&editor, &b).unwrap().parent.as_deref(), Some(group.as_str()));
        assert!(!editor.split(&a));
    }

    #[test]
    fn switching_scenes_resets_history() {
        let mut editor = editor();
        let first = editor.registry().current_id().unwrap().to_string();
        editor.add_mesh(MeshKind::Box);
        tick(&mut editor);
        assert!(editor.history().can_undo());

        editor.create_scene(Some("Second"));
        assert!(!editor.history().can_undo());
        editor.switch_scene(&first).unwrap();
        assert_eq!(editor.current().unwrap().store().len(), 1);
        assert!(!editor.undo());
    }

    #[test]
    fn actions_without_scene_are_ignored() {
        let mut editor = Editor::new(HeadlessSurface::new(8, 8), EditorConfig::default());
        assert!(editor.add_mesh(MeshKind::Box).is_none());
        assert!(!editor.delete_mesh("x"));
        assert!(!editor.undo());
        assert!(tick(&mut editor).is_empty());
        assert!(matches!(
            editor.save_to_file(Path::new("unused.json")),
            Err(EditorError::NoScene)
        ));
    }

    #[test]
    fn save_then_import_overwrites_scene() {
        let mut editor = editor();
        let id = editor.add_mesh(MeshKind::Line).unwrap();
        tick(&mut editor);
        let mut path = std::env::temp_dir();
        path.push(format!("meshforge-editor-{}.json", id));
        let saved = editor.save_to_file(&path).unwrap();
        assert_eq!(saved.meshes.len(), 1);

        editor.add_mesh(MeshKind::Box);
        tick(&mut editor);
        assert_eq!(editor.import_file(&path, true).unwrap(), 1);
        assert_eq!(editor.current().unwrap().store().ids(), &[id]);
        assert!(!editor.history().can_undo());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn scripted_session_produces_a_document() {
        let document = run(EditorConfig::default(), None).unwrap();
        assert_eq!(document.name, "Demo");
        assert_eq!(document.meshes.len(), 3);
        assert!(document.meshes.iter().all(|mesh| mesh.parent.is_none()));
        assert!(document
            .meshes
            .iter()
            .any(|mesh| mesh.name == "Crate" && mesh.position == Vec3::new(1.3, 0.0, 0.2)));
    }
}
