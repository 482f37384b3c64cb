use super::{
    ArcRotateCamera, HandleParams, MaterialHandle, PickBuffer, PickKey, PickKind, Primitive,
    ProxyHandle, RenderError, RenderSurface, SelectionStyle, Transform,
};
use crate::scene::command::CameraUpdate;
use crate::scene::serialization::CameraSnapshot;
use crate::scene::{Color, Material};
use std::collections::{HashMap, HashSet};

/// One live object inside the headless surface.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessProxy {
    pub name: String,
    pub primitive: Primitive,
    pub transform: Transform,
    pub parent: Option<ProxyHandle>,
    pub material: Option<MaterialHandle>,
    pub line_color: Option<Color>,
    pub selection_style: Option<SelectionStyle>,
}

/// In-memory render surface. Keeps the full proxy graph so it can be
/// inspected, and can be told to fail creation or disposal.
#[derive(Debug)]
pub struct HeadlessSurface {
    next_handle: u32,
    proxies: HashMap<ProxyHandle, HeadlessProxy>,
    materials: HashMap<MaterialHandle, Material>,
    handle: Option<(ProxyHandle, HandleParams)>,
    snap_distance: Option<f32>,
    grid_visible: bool,
    axes_visible: bool,
    camera: ArcRotateCamera,
    pick_buffer: PickBuffer,
    frames_rendered: u64,
    failing_names: HashSet<String>,
    fail_disposal: bool,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        log::info!("Headless surface initialized ({}×{})", width, height);
        Self {
            next_handle: 1,
            proxies: HashMap::new(),
            materials: HashMap::new(),
            handle: None,
            snap_distance: None,
            grid_visible: false,
            axes_visible: false,
            camera: ArcRotateCamera::default(),
            pick_buffer: PickBuffer::new(width, height),
            frames_rendered: 0,
            failing_names: HashSet::new(),
            fail_disposal: false,
        }
    }

    pub fn proxy(&self, handle: ProxyHandle) -> Option<&HeadlessProxy> {
        self.proxies.get(&handle)
    }

    pub fn proxy_named(&self, name: &str) -> Option<(ProxyHandle, &HeadlessProxy)> {
        self.proxies
            .iter()
            .find(|(_, proxy)| proxy.name == name)
            .map(|(handle, proxy)| (*handle, proxy))
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(&handle)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn handle_target(&self) -> Option<ProxyHandle> {
        self.handle.map(|(proxy, _)| proxy)
    }

    pub fn handle_params(&self) -> Option<HandleParams> {
        self.handle.map(|(_, params)| params)
    }

    pub fn snap_distance(&self) -> Option<f32> {
        self.snap_distance
    }

    pub fn grid_visible(&self) -> bool {
        self.grid_visible
    }

    pub fn axes_visible(&self) -> bool {
        self.axes_visible
    }

    pub fn camera_state(&self) -> &ArcRotateCamera {
        &self.camera
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Record the screen footprint of a proxy for picking.
    pub fn place_on_screen(&mut self, proxy: ProxyHandle, min: (u32, u32), max: (u32, u32)) {
        if self.proxies.contains_key(&proxy) {
            self.pick_buffer
                .fill_rect(min, max, PickKey::scene_mesh(proxy.0));
        }
    }

    /// Make every later `create_primitive` for `name` fail.
    pub fn fail_creation_of(&mut self, name: impl Into<String>) {
        self.failing_names.insert(name.into());
    }

    pub fn set_fail_disposal(&mut self, fail: bool) {
        self.fail_disposal = fail;
    }

    fn proxy_mut(&mut self, handle: ProxyHandle) -> Result<&mut HeadlessProxy, RenderError> {
        self.proxies
            .get_mut(&handle)
            .ok_or(RenderError::UnknownProxy(handle))
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_handle;
        self.next_handle = if id >= PickKey::MAX_OBJECT_ID { 1 } else { id + 1 };
        id
    }
}

impl RenderSurface for HeadlessSurface {
    fn create_primitive(
        &mut self,
        name: &str,
        primitive: &Primitive,
    ) -> Result<ProxyHandle, RenderError> {
        if self.failing_names.contains(name) {
            return Err(RenderError::PrimitiveCreateFailed(name.to_string()));
        }
        let handle = ProxyHandle(self.allocate());
        self.proxies.insert(
            handle,
            HeadlessProxy {
                name: name.to_string(),
                primitive: primitive.clone(),
                transform: Transform::IDENTITY,
                parent: None,
                material: None,
                line_color: None,
                selection_style: None,
            },
        );
        Ok(handle)
    }

    fn dispose_proxy(&mut self, proxy: ProxyHandle) -> Result<(), RenderError> {
        if self.fail_disposal {
            return Err(RenderError::DisposeFailed(format!("{:?}", proxy)));
        }
        self.proxies
            .remove(&proxy)
            .ok_or(RenderError::UnknownProxy(proxy))?;
        for child in self.proxies.values_mut() {
            if child.parent == Some(proxy) {
                child.parent = None;
            }
        }
        if self.handle_target() == Some(proxy) {
            self.handle = None;
        }
        self.pick_buffer.erase(PickKey::scene_mesh(proxy.0));
        Ok(())
    }

    fn set_name(&mut self, proxy: ProxyHandle, name: &str) -> Result<(), RenderError> {
        self.proxy_mut(proxy)?.name = name.to_string();
        Ok(())
    }

    fn set_transform(&mut self, proxy: ProxyHandle, transform: Transform) -> Result<(), RenderError> {
        self.proxy_mut(proxy)?.transform = transform;
        Ok(())
    }

    fn transform(&self, proxy: ProxyHandle) -> Option<Transform> {
        self.proxies.get(&proxy).map(|proxy| proxy.transform)
    }

    fn set_parent(
        &mut self,
        proxy: ProxyHandle,
        parent: Option<ProxyHandle>,
    ) -> Result<(), RenderError> {
        if let Some(parent) = parent {
            if !self.proxies.contains_key(&parent) {
                return Err(RenderError::UnknownProxy(parent));
            }
        }
        self.proxy_mut(proxy)?.parent = parent;
        Ok(())
    }

    fn create_material(
        &mut self,
        name: &str,
        material: &Material,
    ) -> Result<MaterialHandle, RenderError> {
        if self.failing_names.contains(name) {
            return Err(RenderError::MaterialCreateFailed(name.to_string()));
        }
        let handle = MaterialHandle(self.allocate());
        self.materials.insert(handle, *material);
        Ok(handle)
    }

    fn update_material(
        &mut self,
        handle: MaterialHandle,
        material: &Material,
    ) -> Result<(), RenderError> {
        let slot = self
            .materials
            .get_mut(&handle)
            .ok_or(RenderError::UnknownMaterial(handle))?;
        *slot = *material;
        Ok(())
    }

    fn assign_material(
        &mut self,
        proxy: ProxyHandle,
        handle: MaterialHandle,
    ) -> Result<(), RenderError> {
        if !self.materials.contains_key(&handle) {
            return Err(RenderError::UnknownMaterial(handle));
        }
        self.proxy_mut(proxy)?.material = Some(handle);
        Ok(())
    }

    fn dispose_material(&mut self, handle: MaterialHandle) -> Result<(), RenderError> {
        if self.fail_disposal {
            return Err(RenderError::DisposeFailed(format!("{:?}", handle)));
        }
        self.materials
            .remove(&handle)
            .ok_or(RenderError::UnknownMaterial(handle))?;
        for proxy in self.proxies.values_mut() {
            if proxy.material == Some(handle) {
                proxy.material = None;
            }
        }
        Ok(())
    }

    fn set_line_color(&mut self, proxy: ProxyHandle, color: Color) -> Result<(), RenderError> {
        self.proxy_mut(proxy)?.line_color = Some(color);
        Ok(())
    }

    fn set_selection_style(
        &mut self,
        proxy: ProxyHandle,
        style: Option<SelectionStyle>,
    ) -> Result<(), RenderError> {
        self.proxy_mut(proxy)?.selection_style = style;
        Ok(())
    }

    fn attach_handle(&mut self, proxy: ProxyHandle, params: HandleParams) {
        self.handle = self
            .proxies
            .contains_key(&proxy)
            .then_some((proxy, params));
        self.snap_distance = params.snap_distance;
    }

    fn detach_handle(&mut self) {
        self.handle = None;
    }

    fn set_snap_distance(&mut self, distance: Option<f32>) {
        self.snap_distance = distance;
        if let Some((_, params)) = self.handle.as_mut() {
            params.snap_distance = distance;
        }
    }

    fn pick(&self, x: f32, y: f32) -> Option<ProxyHandle> {
        let key = self.pick_buffer.read(x, y);
        if key.kind != PickKind::SceneMesh {
            return None;
        }
        let handle = ProxyHandle(key.object_id);
        self.proxies.contains_key(&handle).then_some(handle)
    }

    fn set_camera(&mut self, update: &CameraUpdate) {
        self.camera.apply(update);
    }

    fn camera(&self) -> Option<CameraSnapshot> {
        Some(self.camera.snapshot())
    }

    fn set_grid_visible(&mut self, visible: bool) {
        self.grid_visible = visible;
    }

    fn set_axes_visible(&mut self, visible: bool) {
        self.axes_visible = visible;
    }

    fn render_frame(&mut self) {
        self.frames_rendered += 1;
    }
}
