mod camera;
mod headless;
pub mod pick;

pub use camera::ArcRotateCamera;
pub use headless::{HeadlessProxy, HeadlessSurface};
pub use pick::{PickBuffer, PickKey, PickKind};

use crate::scene::command::CameraUpdate;
use crate::scene::params::MeshParams;
use crate::scene::serialization::CameraSnapshot;
use crate::scene::{Color, Material, MeshEntity};
use glam::Vec3;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unknown proxy {0:?}")]
    UnknownProxy(ProxyHandle),
    #[error("unknown material {0:?}")]
    UnknownMaterial(MaterialHandle),
    #[error("failed to create primitive '{0}'")]
    PrimitiveCreateFailed(String),
    #[error("failed to create material '{0}'")]
    MaterialCreateFailed(String),
    #[error("failed to dispose {0}")]
    DisposeFailed(String),
}

/// Opaque reference to one live render object owned by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u32);

/// Local transform, Euler rotation in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scaling: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scaling: Vec3::ONE,
    };

    pub fn of(entity: &MeshEntity) -> Self {
        Self {
            position: entity.position,
            rotation: entity.rotation,
            scaling: entity.scaling,
        }
    }
}

/// Concrete geometry requested for one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Box {
        size: f32,
    },
    Sphere {
        diameter: f32,
    },
    Cylinder {
        height: f32,
        diameter_top: f32,
        diameter_bottom: f32,
        tessellation: u32,
    },
    Lines {
        points: Vec<Vec3>,
    },
    /// Geometry-less grouping node.
    TransformNode,
}

impl Primitive {
    pub fn for_entity(entity: &MeshEntity) -> Self {
        match &entity.params {
            MeshParams::Box(params) => Self::Box { size: params.size },
            MeshParams::Sphere(params) => Self::Sphere {
                diameter: params.diameter,
            },
            MeshParams::Cylinder(params) | MeshParams::Cone(params) => Self::Cylinder {
                height: params.height,
                diameter_top: params.diameter_top,
                diameter_bottom: params.diameter_bottom,
                tessellation: params.tessellation,
            },
            MeshParams::Line(params) => Self::Lines {
                points: params.points.clone(),
            },
            MeshParams::Merged(_) => Self::TransformNode,
            MeshParams::Other(_) => Self::Box { size: 1.0 },
        }
    }

    pub fn is_lines(&self) -> bool {
        matches!(self, Self::Lines { .. })
    }

    pub fn has_geometry(&self) -> bool {
        !matches!(self, Self::TransformNode)
    }

    /// Radius of the bounding sphere around the local origin, unscaled.
    pub fn bounding_radius(&self) -> Option<f32> {
        match self {
            Self::Box { size } => Some(size * 3f32.sqrt() * 0.5),
            Self::Sphere { diameter } => Some(diameter * 0.5),
            Self::Cylinder {
                height,
                diameter_top,
                diameter_bottom,
                ..
            } => {
                let radius = diameter_top.max(*diameter_bottom) * 0.5;
                Some(Vec3::new(radius, height * 0.5, 0.0).length())
            }
            Self::Lines { points } => points
                .iter()
                .map(|point| point.length())
                .reduce(f32::max),
            Self::TransformNode => None,
        }
    }
}

/// Selection highlight drawn around a proxy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionStyle {
    pub color: Color,
    pub width: f32,
}

impl SelectionStyle {
    pub const OUTLINE: Self = Self {
        color: Color {
            r: 1.0,
            g: 0.62,
            b: 0.25,
        },
        width: 0.02,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleParams {
    pub scale_ratio: f32,
    /// Translation snap step, `None` when snapping is off.
    pub snap_distance: Option<f32>,
}

/// Rendering collaborator driven by the scene engine. Implementations own
/// every proxy and material; the engine only keeps handles.
pub trait RenderSurface {
    fn create_primitive(
        &mut self,
        name: &str,
        primitive: &Primitive,
    ) -> Result<ProxyHandle, RenderError>;
    fn dispose_proxy(&mut self, proxy: ProxyHandle) -> Result<(), RenderError>;
    fn set_name(&mut self, proxy: ProxyHandle, name: &str) -> Result<(), RenderError>;
    fn set_transform(&mut self, proxy: ProxyHandle, transform: Transform) -> Result<(), RenderError>;
    fn transform(&self, proxy: ProxyHandle) -> Option<Transform>;
    fn set_parent(
        &mut self,
        proxy: ProxyHandle,
        parent: Option<ProxyHandle>,
    ) -> Result<(), RenderError>;

    fn create_material(&mut self, name: &str, material: &Material)
        -> Result<MaterialHandle, RenderError>;
    fn update_material(
        &mut self,
        handle: MaterialHandle,
        material: &Material,
    ) -> Result<(), RenderError>;
    fn assign_material(
        &mut self,
        proxy: ProxyHandle,
        handle: MaterialHandle,
    ) -> Result<(), RenderError>;
    fn dispose_material(&mut self, handle: MaterialHandle) -> Result<(), RenderError>;
    fn set_line_color(&mut self, proxy: ProxyHandle, color: Color) -> Result<(), RenderError>;

    fn set_selection_style(
        &mut self,
        proxy: ProxyHandle,
        style: Option<SelectionStyle>,
    ) -> Result<(), RenderError>;
    fn attach_handle(&mut self, proxy: ProxyHandle, params: HandleParams);
    fn detach_handle(&mut self);
    fn set_snap_distance(&mut self, distance: Option<f32>);

    /// Resolve viewport pixel coordinates (origin top-left) to a proxy.
    fn pick(&self, x: f32, y: f32) -> Option<ProxyHandle>;

    fn set_camera(&mut self, update: &CameraUpdate);
    fn camera(&self) -> Option<CameraSnapshot>;

    fn set_grid_visible(&mut self, visible: bool);
    fn set_axes_visible(&mut self, visible: bool);

    fn render_frame(&mut self) {}
}
