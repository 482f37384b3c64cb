use crate::render::{
    MaterialHandle, Primitive, ProxyHandle, RenderError, RenderSurface, Transform,
};
use crate::scene::{MeshEntity, MeshId, MeshStore};
use glam::Vec3;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct ProxyEntry {
    proxy: ProxyHandle,
    material: Option<MaterialHandle>,
    lines: bool,
    geometry: bool,
}

/// The attached render surface plus the id ⇄ proxy index. At most one proxy
/// per entity id.
pub(super) struct Runtime<S> {
    surface: S,
    entries: HashMap<MeshId, ProxyEntry>,
    ids: HashMap<ProxyHandle, MeshId>,
}

impl<S: RenderSurface> Runtime<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            entries: HashMap::new(),
            ids: HashMap::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    pub fn proxy(&self, id: &str) -> Option<ProxyHandle> {
        self.entries.get(id).map(|entry| entry.proxy)
    }

    pub fn id_of(&self, proxy: ProxyHandle) -> Option<&MeshId> {
        self.ids.get(&proxy)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn live_transform(&self, id: &str) -> Option<Transform> {
        self.proxy(id).and_then(|proxy| self.surface.transform(proxy))
    }

    /// Create the proxy for `entity`, replacing any existing one, then
    /// re-link live children under it.
    pub fn build(&mut self, entity: &MeshEntity, store: &MeshStore) -> Result<ProxyHandle, RenderError> {
        if self.contains(&entity.id) {
            self.dispose(&entity.id, store);
        }
        let primitive = Primitive::for_entity(entity);
        let proxy = self.surface.create_primitive(&entity.name, &primitive)?;
        self.entries.insert(
            entity.id.clone(),
            ProxyEntry {
                proxy,
                material: None,
                lines: primitive.is_lines(),
                geometry: primitive.has_geometry(),
            },
        );
        self.ids.insert(proxy, entity.id.clone());

        self.link_parent(entity, store)?;
        self.surface.set_transform(proxy, Transform::of(entity))?;
        self.apply_material(entity)?;

        for child in store.children_of(&entity.id) {
            if child == entity.id || store.would_create_cycle(&child, &entity.id) {
                continue;
            }
            if let Some(child_proxy) = self.proxy(&child) {
                if let Err(err) = self.surface.set_parent(child_proxy, Some(proxy)) {
                    log::warn!("Failed to re-link '{}' under '{}': {}", child, entity.id, err);
                }
            }
        }
        Ok(proxy)
    }

    /// Push every mirrored field of `entity` onto its existing proxy.
    pub fn refresh(&mut self, entity: &MeshEntity, store: &MeshStore) -> Result<(), RenderError> {
        let Some(proxy) = self.proxy(&entity.id) else {
            return Ok(());
        };
        self.surface.set_name(proxy, &entity.name)?;
        self.link_parent(entity, store)?;
        self.surface.set_transform(proxy, Transform::of(entity))?;
        self.apply_material(entity)
    }

    /// Parent the proxy under its parent's proxy when that exists. Missing,
    /// self or looping parents leave it at top level.
    pub fn link_parent(&mut self, entity: &MeshEntity, store: &MeshStore) -> Result<(), RenderError> {
        let Some(proxy) = self.proxy(&entity.id) else {
            return Ok(());
        };
        let parent = entity
            .parent
            .as_deref()
            .filter(|parent| *parent != entity.id && !store.would_create_cycle(&entity.id, parent))
            .and_then(|parent| self.proxy(parent));
        self.surface.set_parent(proxy, parent)
    }

    pub fn set_name(&mut self, id: &str, name: &str) -> Result<(), RenderError> {
        match self.proxy(id) {
            Some(proxy) => self.surface.set_name(proxy, name),
            None => Ok(()),
        }
    }

    /// Overwrite only the given components, keeping the live values of the rest.
    pub fn push_transform(
        &mut self,
        id: &str,
        position: Option<Vec3>,
        rotation: Option<Vec3>,
        scaling: Option<Vec3>,
    ) -> Result<(), RenderError> {
        let Some(proxy) = self.proxy(id) else {
            return Ok(());
        };
        let mut transform = self
            .surface
            .transform(proxy)
            .ok_or(RenderError::UnknownProxy(proxy))?;
        if let Some(position) = position {
            transform.position = position;
        }
        if let Some(rotation) = rotation {
            transform.rotation = rotation;
        }
        if let Some(scaling) = scaling {
            transform.scaling = scaling;
        }
        self.surface.set_transform(proxy, transform)
    }

    /// Lines take the color directly; solids get a dedicated material,
    /// created once and updated afterwards. Group nodes have nothing to paint.
    pub fn apply_material(&mut self, entity: &MeshEntity) -> Result<(), RenderError> {
        let Some(entry) = self.entries.get(&entity.id).copied() else {
            return Ok(());
        };
        if !entry.geometry {
            return Ok(());
        }
        if entry.lines {
            return self.surface.set_line_color(entry.proxy, entity.material.color);
        }
        if let Some(material) = entry.material {
            return self.surface.update_material(material, &entity.material);
        }
        let material = self
            .surface
            .create_material(&format!("{}-material", entity.id), &entity.material)?;
        if let Some(slot) = self.entries.get_mut(&entity.id) {
            slot.material = Some(material);
        }
        self.surface.assign_material(entry.proxy, material)
    }

    /// Best-effort disposal of one proxy and its material. Children in the
    /// store are unlinked first so they survive at top level.
    pub fn dispose(&mut self, id: &str, store: &MeshStore) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        self.ids.remove(&entry.proxy);
        for child in store.children_of(id) {
            if let Some(child_proxy) = self.proxy(&child) {
                let _ = self.surface.set_parent(child_proxy, None);
            }
        }
        self.release(id, entry);
        true
    }

    pub fn dispose_all(&mut self) {
        let entries: Vec<(MeshId, ProxyEntry)> = self.entries.drain().collect();
        self.ids.clear();
        for (id, entry) in entries {
            self.release(&id, entry);
        }
    }

    fn release(&mut self, id: &str, entry: ProxyEntry) {
        if let Some(material) = entry.material {
            if let Err(err) = self.surface.dispose_material(material) {
                log::debug!("Ignoring material disposal failure for '{}': {}", id, err);
            }
        }
        if let Err(err) = self.surface.dispose_proxy(entry.proxy) {
            log::debug!("Ignoring proxy disposal failure for '{}': {}", id, err);
        }
    }
}
