//! Scene mutation engine.
//!
//! A `SceneProject` owns the canonical `MeshStore` and, while a render
//! surface is attached, exactly one proxy per entity. Mutations are queued
//! as `Command`s and applied by `tick`, which runs in a fixed order: drain
//! the queue, sync the manipulation handle, render.

mod document;
mod manipulation;
mod processor;
mod queue;
mod runtime;
mod selection;

pub use manipulation::{handle_scale_ratio, is_uniform_scale, DragMode};
pub use processor::CommandError;
pub use queue::CommandQueue;
pub use selection::Selection;

use crate::config::{clamp_snap_value, EditorConfig};
use crate::render::{ProxyHandle, RenderSurface, Transform};
use crate::scene::command::{CameraUpdate, Command};
use crate::scene::serialization::CameraSnapshot;
use crate::scene::{now_millis, MeshEntity, MeshId, MeshStore, TreeNode};
use glam::Vec3;
use manipulation::DragTracker;
use runtime::Runtime;

/// Notifications for the host, drained with `take_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    SelectionChanged(Option<MeshId>),
    TransformChanged(MeshId),
}

pub struct SceneProject<S: RenderSurface> {
    id: String,
    name: String,
    created_at: u64,
    config: EditorConfig,
    store: MeshStore,
    queue: CommandQueue,
    runtime: Option<Runtime<S>>,
    selection: Selection,
    drag: DragTracker,
    // Camera captured on detach, restored on the next attach.
    parked_camera: Option<CameraSnapshot>,
    events: Vec<SceneEvent>,
    disposed: bool,
}

impl<S: RenderSurface> SceneProject<S> {
    pub fn new(id: impl Into<String>, name: impl Into<String>, config: EditorConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: now_millis(),
            config: config.normalized(),
            store: MeshStore::new(),
            queue: CommandQueue::new(),
            runtime: None,
            selection: Selection::None,
            drag: DragTracker::default(),
            parked_camera: None,
            events: Vec::new(),
            disposed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Where an updateMesh position lands under the current snap settings.
    pub fn snapped_position(&self, position: Vec3) -> Vec3 {
        if self.config.snap_enabled {
            processor::snap_to_grid(position, self.config.snap_value)
        } else {
            position
        }
    }

    pub fn store(&self) -> &MeshStore {
        &self.store
    }

    pub fn get(&self, id: &str) -> Option<MeshEntity> {
        self.store.get(id).cloned()
    }

    pub fn list(&self) -> Vec<MeshEntity> {
        self.store.list()
    }

    pub fn to_tree(&self) -> Vec<TreeNode> {
        self.store.to_tree()
    }

    pub fn is_attached(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn surface(&self) -> Option<&S> {
        self.runtime.as_ref().map(Runtime::surface)
    }

    /// Direct surface access, e.g. for camera control or a live drag.
    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.runtime.as_mut().map(Runtime::surface_mut)
    }

    pub fn proxy_of(&self, id: &str) -> Option<ProxyHandle> {
        self.runtime.as_ref().and_then(|runtime| runtime.proxy(id))
    }

    pub fn proxy_count(&self) -> usize {
        self.runtime.as_ref().map_or(0, Runtime::len)
    }

    pub(crate) fn live_transform(&self, id: &str) -> Option<Transform> {
        self.runtime
            .as_ref()
            .and_then(|runtime| runtime.live_transform(id))
    }

    pub fn enqueue(&mut self, command: Command) {
        if self.disposed {
            log::warn!(
                "Scene '{}' is disposed, dropping {}",
                self.id,
                command.type_name()
            );
            return;
        }
        self.queue.push(command);
    }

    /// Decode and enqueue a loose JSON command. Unknown or malformed
    /// commands are logged and dropped.
    pub fn enqueue_value(&mut self, value: serde_json::Value) -> bool {
        match Command::from_value(value) {
            Ok(command) => {
                self.enqueue(command);
                true
            }
            Err(err) => {
                log::warn!("Scene '{}': ignoring command: {}", self.id, err);
                false
            }
        }
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    pub fn tick(&mut self) {
        self.process_commands();
        self.sync_manipulation();
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.surface_mut().render_frame();
        }
    }

    /// Project every entity onto `surface`, parents first. Returns the
    /// previously attached surface, if any.
    pub fn attach(&mut self, surface: S) -> Option<S> {
        let previous = self.detach();
        let mut runtime = Runtime::new(surface);
        {
            let surface = runtime.surface_mut();
            surface.set_grid_visible(self.config.grid_visible);
            surface.set_axes_visible(self.config.axes_visible);
            surface.set_snap_distance(self.config.snap_distance());
            if let Some(camera) = self.parked_camera.take() {
                surface.set_camera(&CameraUpdate::from(&camera));
            }
        }
        for id in self.store.ids_parents_first() {
            let Some(entity) = self.store.get(&id) else {
                continue;
            };
            if let Err(err) = runtime.build(entity, &self.store) {
                log::warn!("Scene '{}': failed to build '{}': {}", self.id, id, err);
            }
        }
        log::info!(
            "Scene '{}' attached ({} of {} meshes live)",
            self.id,
            runtime.len(),
            self.store.len()
        );
        self.runtime = Some(runtime);
        self.refresh_selection_visuals();
        previous
    }

    /// Dispose every proxy and hand the surface back. Metadata and selection
    /// survive; an in-progress drag is written back first.
    pub fn detach(&mut self) -> Option<S> {
        self.end_drag();
        self.drag.reset();
        let mut runtime = self.runtime.take()?;
        self.parked_camera = runtime.surface().camera();
        runtime.surface_mut().detach_handle();
        runtime.dispose_all();
        log::info!("Scene '{}' detached", self.id);
        Some(runtime.into_surface())
    }

    /// Detach and drop all metadata. Later commands are refused.
    pub fn dispose_completely(&mut self) -> Option<S> {
        let surface = self.detach();
        self.store.clear();
        self.queue.clear();
        self.selection = Selection::None;
        self.events.clear();
        self.disposed = true;
        log::info!("Scene '{}' disposed", self.id);
        surface
    }

    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.config.snap_enabled = enabled;
        self.push_snap_distance();
    }

    pub fn set_snap_value(&mut self, value: f32) {
        self.config.snap_value = clamp_snap_value(value);
        self.push_snap_distance();
    }

    fn push_snap_distance(&mut self) {
        let distance = self.config.snap_distance();
        if let Some(surface) = self.surface_mut() {
            surface.set_snap_distance(distance);
        }
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.config.grid_visible = visible;
        if let Some(surface) = self.surface_mut() {
            surface.set_grid_visible(visible);
        }
    }

    pub fn set_axes_visible(&mut self, visible: bool) {
        self.config.axes_visible = visible;
        if let Some(surface) = self.surface_mut() {
            surface.set_axes_visible(visible);
        }
    }

    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: SceneEvent) {
        log::debug!("Scene '{}': {:?}", self.id, event);
        self.events.push(event);
    }
}
