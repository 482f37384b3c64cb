//! Mutation commands: plain data, applied by the scene processor.
//!
//! On the wire a command is `{ "type": "...", "payload": { ... } }`.

use super::serialization::CameraSnapshot;
use super::{xyz, Material, MeshId, MeshSpec};
use glam::Vec3;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Command {
    CreateMesh(MeshSpec),
    UpdateMesh {
        id: MeshId,
        #[serde(default)]
        changes: MeshChanges,
    },
    RemoveMesh {
        id: MeshId,
    },
    SetCamera(CameraUpdate),
    #[serde(alias = "splitMesh")]
    SplitMerged {
        id: MeshId,
    },
}

impl Command {
    pub fn create(spec: impl Into<MeshSpec>) -> Self {
        Self::CreateMesh(spec.into())
    }

    pub fn update(id: impl Into<MeshId>, changes: MeshChanges) -> Self {
        Self::UpdateMesh {
            id: id.into(),
            changes,
        }
    }

    pub fn remove(id: impl Into<MeshId>) -> Self {
        Self::RemoveMesh { id: id.into() }
    }

    pub fn split(id: impl Into<MeshId>) -> Self {
        Self::SplitMerged { id: id.into() }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CreateMesh(_) => "createMesh",
            Self::UpdateMesh { .. } => "updateMesh",
            Self::RemoveMesh { .. } => "removeMesh",
            Self::SetCamera(_) => "setCamera",
            Self::SplitMerged { .. } => "splitMerged",
        }
    }

    /// Decode a command from loose JSON, e.g. one built by a UI layer.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Partial update: every `Some` field overwrites the entity field, `None`
/// leaves it alone. `parent: Some(None)` detaches to top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, with = "xyz::option", skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, with = "xyz::option", skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(default, with = "xyz::option", skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Material>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent: Option<Option<MeshId>>,
    /// Store `position` as given, bypassing grid snap. Used when replaying
    /// recorded values that must come back bit for bit.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exact_position: bool,
}

impl MeshChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn scaling(mut self, scaling: Vec3) -> Self {
        self.scaling = Some(scaling);
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    pub fn parent(mut self, parent: Option<MeshId>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn touches_transform(&self) -> bool {
        self.position.is_some() || self.rotation.is_some() || self.scaling.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && !self.touches_transform()
            && self.material.is_none()
            && self.parent.is_none()
    }
}

// Distinguishes an explicit `null` (Some(None)) from an absent key (None).
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    #[serde(default, with = "xyz::option", skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec3>,
}

impl From<&CameraSnapshot> for CameraUpdate {
    fn from(snapshot: &CameraSnapshot) -> Self {
        Self {
            alpha: Some(snapshot.alpha),
            beta: Some(snapshot.beta),
            radius: Some(snapshot.radius),
            target: None,
        }
    }
}
