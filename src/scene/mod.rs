pub mod command;
pub mod params;
pub mod serialization;

use glam::Vec3;
use params::{MeshParams, ParamsError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub type MeshId = String;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Box,
    Sphere,
    Cylinder,
    Cone,
    Line,
    Merged,
    Other(String),
}

impl MeshKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Box => "box",
            Self::Sphere => "sphere",
            Self::Cylinder => "cylinder",
            Self::Cone => "cone",
            Self::Line => "line",
            Self::Merged => "merged",
            Self::Other(kind) => kind,
        }
    }
}

impl From<&str> for MeshKind {
    fn from(value: &str) -> Self {
        match value {
            "box" => Self::Box,
            "sphere" => Self::Sphere,
            "cylinder" => Self::Cylinder,
            "cone" => Self::Cone,
            "line" => Self::Line,
            "merged" => Self::Merged,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for MeshKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MeshKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = String::deserialize(deserializer)?;
        Ok(Self::from(kind.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub color: Color,
    pub specular_power: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Color {
                r: 0.9,
                g: 0.9,
                b: 0.9,
            },
            specular_power: 64.0,
        }
    }
}

/// One scene object: shape, transform, material and parent link.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEntity {
    pub id: MeshId,
    pub name: String,
    pub kind: MeshKind,
    pub params: MeshParams,
    pub parent: Option<MeshId>,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scaling: Vec3,
    pub material: Material,
}

/// Everything needed to build an entity; absent fields take kind defaults.
/// This is the `createMesh` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshSpec {
    pub kind: MeshKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MeshId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<MeshId>,
    #[serde(default, with = "xyz::option", skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, with = "xyz::option", skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(default, with = "xyz::option", skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Material>,
}

impl MeshSpec {
    pub fn new(kind: impl Into<MeshKind>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            name: None,
            params: None,
            parent: None,
            position: None,
            rotation: None,
            scaling: None,
            material: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<MeshId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<MeshId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_scaling(mut self, scaling: Vec3) -> Self {
        self.scaling = Some(scaling);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }
}

impl From<MeshKind> for MeshSpec {
    fn from(kind: MeshKind) -> Self {
        Self::new(kind)
    }
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// `<prefix>-<millis>-<sequence>`, unique within the process.
pub fn generate_id(prefix: &str) -> MeshId {
    let sequence = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", prefix, now_millis(), sequence)
}

/// Entity factory shared by `createMesh` and document loading. Unknown
/// kinds still produce an entity; only params that cannot be decoded for a
/// known kind fail.
pub fn create_entity(spec: MeshSpec) -> Result<MeshEntity, ParamsError> {
    let params = MeshParams::from_overlay(&spec.kind, spec.params.as_ref())?;
    let id = spec
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| generate_id(spec.kind.as_str()));
    let name = spec
        .name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| id.clone());
    Ok(MeshEntity {
        id,
        name,
        kind: spec.kind,
        params,
        parent: spec.parent,
        position: spec.position.unwrap_or(Vec3::ZERO),
        rotation: spec.rotation.unwrap_or(Vec3::ZERO),
        scaling: spec.scaling.unwrap_or(Vec3::ONE),
        material: spec.material.unwrap_or_default(),
    })
}

impl MeshEntity {
    /// A spec that rebuilds this exact entity.
    pub fn to_spec(&self) -> MeshSpec {
        MeshSpec {
            kind: self.kind.clone(),
            id: Some(self.id.clone()),
            name: Some(self.name.clone()),
            params: Some(self.params.to_value()),
            parent: self.parent.clone(),
            position: Some(self.position),
            rotation: Some(self.rotation),
            scaling: Some(self.scaling),
            material: Some(self.material),
        }
    }

    pub fn is_merged(&self) -> bool {
        self.kind == MeshKind::Merged
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: MeshId,
    pub name: String,
    pub kind: MeshKind,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn flatten_into(&self, out: &mut Vec<MeshId>) {
        out.push(self.id.clone());
        for child in &self.children {
            child.flatten_into(out);
        }
    }
}

/// Canonical id-keyed entity map. Iteration follows insertion order; an
/// upsert of an existing id keeps its slot.
#[derive(Debug, Clone, Default)]
pub struct MeshStore {
    entities: HashMap<MeshId, MeshEntity>,
    order: Vec<MeshId>,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the replaced entity, if any.
    pub fn upsert(&mut self, entity: MeshEntity) -> Option<MeshEntity> {
        let id = entity.id.clone();
        let previous = self.entities.insert(id.clone(), entity);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    pub fn get(&self, id: &str) -> Option<&MeshEntity> {
        self.entities.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut MeshEntity> {
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<MeshEntity> {
        let removed = self.entities.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids(&self) -> &[MeshId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeshEntity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    /// Detached copies; nothing returned here aliases store internals.
    pub fn list(&self) -> Vec<MeshEntity> {
        self.iter().cloned().collect()
    }

    /// Ids whose `parent` is `id`, in store order.
    pub fn children_of(&self, id: &str) -> Vec<MeshId> {
        self.iter()
            .filter(|entity| entity.parent.as_deref() == Some(id))
            .map(|entity| entity.id.clone())
            .collect()
    }

    /// Would parenting `id` under `parent` close a loop in the parent chain?
    pub fn would_create_cycle(&self, id: &str, parent: &str) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == id {
                return true;
            }
            if !visited.insert(current) {
                // Existing loop further up that does not involve `id`.
                return false;
            }
            cursor = self.get(current).and_then(|entity| entity.parent.as_deref());
        }
        false
    }

    /// Parent/child forest built from `parent` references. Dangling or
    /// self-referencing parents make an entity a root; entities stuck in a
    /// parent loop are promoted to roots so the walk always terminates.
    pub fn to_tree(&self) -> Vec<TreeNode> {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut roots: Vec<&str> = Vec::new();
        for entity in self.iter() {
            match entity.parent.as_deref() {
                Some(parent) if parent != entity.id && self.contains(parent) => {
                    children.entry(parent).or_default().push(&entity.id);
                }
                _ => roots.push(&entity.id),
            }
        }

        let mut visited = HashSet::new();
        let mut forest = Vec::new();
        for root in roots {
            if let Some(node) = self.build_node(root, &children, &mut visited) {
                forest.push(node);
            }
        }
        for id in &self.order {
            if !visited.contains(id.as_str()) {
                if let Some(node) = self.build_node(id, &children, &mut visited) {
                    forest.push(node);
                }
            }
        }
        forest
    }

    fn build_node<'a>(
        &'a self,
        id: &'a str,
        children: &HashMap<&str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
    ) -> Option<TreeNode> {
        if !visited.insert(id) {
            return None;
        }
        let entity = self.get(id)?;
        let nodes = children
            .get(id)
            .map(|kids| {
                kids.iter()
                    .filter_map(|child| self.build_node(*child, children, visited))
                    .collect()
            })
            .unwrap_or_default();
        Some(TreeNode {
            id: entity.id.clone(),
            name: entity.name.clone(),
            kind: entity.kind.clone(),
            children: nodes,
        })
    }

    /// Every id, parents before their children.
    pub fn ids_parents_first(&self) -> Vec<MeshId> {
        let mut out = Vec::with_capacity(self.len());
        for node in self.to_tree() {
            node.flatten_into(&mut out);
        }
        out
    }
}

/// `{x, y, z}` wire form for `glam::Vec3` fields.
pub mod xyz {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xyz {
        #[serde(default)]
        x: f32,
        #[serde(default)]
        y: f32,
        #[serde(default)]
        z: f32,
    }

    impl From<Vec3> for Xyz {
        fn from(v: Vec3) -> Self {
            Self {
                x: v.x,
                y: v.y,
                z: v.z,
            }
        }
    }

    impl From<Xyz> for Vec3 {
        fn from(v: Xyz) -> Self {
            Vec3::new(v.x, v.y, v.z)
        }
    }

    pub fn serialize<S: Serializer>(value: &Vec3, serializer: S) -> Result<S::Ok, S::Error> {
        Xyz::from(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec3, D::Error> {
        Xyz::deserialize(deserializer).map(Vec3::from)
    }

    pub mod option {
        use super::Xyz;
        use glam::Vec3;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Vec3>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.map(Xyz::from).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec3>, D::Error> {
            Ok(Option::<Xyz>::deserialize(deserializer)?.map(Vec3::from))
        }
    }

    pub mod list {
        use super::Xyz;
        use glam::Vec3;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(value: &[Vec3], serializer: S) -> Result<S::Ok, S::Error> {
            let points: Vec<Xyz> = value.iter().copied().map(Xyz::from).collect();
            points.serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<Vec3>, D::Error> {
            let points = Vec::<Xyz>::deserialize(deserializer)?;
            Ok(points.into_iter().map(Vec3::from).collect())
        }
    }
}
