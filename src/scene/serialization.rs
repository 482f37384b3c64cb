use crate::scene::params::ParamsError;
use crate::scene::{create_entity, xyz, Material, MeshEntity, MeshId, MeshKind, MeshSpec};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("mesh #{index} has an empty id")]
    EmptyId { index: usize },
    #[error("mesh id '{0}' appears more than once")]
    DuplicateId(MeshId),
    #[error("mesh '{id}' is invalid: {source}")]
    InvalidMesh {
        id: MeshId,
        #[source]
        source: ParamsError,
    },
}

pub type Result<T> = std::result::Result<T, SerializationError>;

/// Camera state captured alongside the meshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub alpha: f32,
    pub beta: f32,
    pub radius: f32,
}

fn zero() -> Vec3 {
    Vec3::ZERO
}

fn one() -> Vec3 {
    Vec3::ONE
}

// `null` reads like an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshRecord {
    pub id: MeshId,
    /// Empty means "use the id".
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub kind: MeshKind,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub parent: Option<MeshId>,
    #[serde(with = "xyz", default = "zero")]
    pub position: Vec3,
    #[serde(with = "xyz", default = "zero")]
    pub rotation: Vec3,
    #[serde(with = "xyz", default = "one")]
    pub scaling: Vec3,
    #[serde(default, deserialize_with = "null_as_default")]
    pub material: Material,
}

impl MeshRecord {
    pub fn from_entity(entity: &MeshEntity) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
            kind: entity.kind.clone(),
            params: entity.params.to_value(),
            parent: entity.parent.clone(),
            position: entity.position,
            rotation: entity.rotation,
            scaling: entity.scaling,
            material: entity.material,
        }
    }

    pub fn to_spec(&self) -> MeshSpec {
        MeshSpec {
            kind: self.kind.clone(),
            id: Some(self.id.clone()),
            name: Some(self.name.clone()),
            params: Some(self.params.clone()),
            parent: self.parent.clone(),
            position: Some(self.position),
            rotation: Some(self.rotation),
            scaling: Some(self.scaling),
            material: Some(self.material),
        }
    }
}

/// Persistable scene: identity, camera and every mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub camera: Option<CameraSnapshot>,
    pub meshes: Vec<MeshRecord>,
    #[serde(default)]
    pub created_at: u64,
}

impl SceneDocument {
    pub fn empty(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            camera: None,
            meshes: Vec::new(),
            created_at: crate::scene::now_millis(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build every entity through the mesh factory, or fail without
    /// producing any of them.
    pub fn decode_entities(&self) -> Result<Vec<MeshEntity>> {
        let mut seen = HashSet::with_capacity(self.meshes.len());
        let mut entities = Vec::with_capacity(self.meshes.len());
        for (index, record) in self.meshes.iter().enumerate() {
            if record.id.is_empty() {
                return Err(SerializationError::EmptyId { index });
            }
            if !seen.insert(record.id.as_str()) {
                return Err(SerializationError::DuplicateId(record.id.clone()));
            }
            let entity =
                create_entity(record.to_spec()).map_err(|source| SerializationError::InvalidMesh {
                    id: record.id.clone(),
                    source,
                })?;
            entities.push(entity);
        }
        Ok(entities)
    }
}

pub fn save_document_to_file(document: &SceneDocument, path: &Path) -> Result<()> {
    let json = document.to_json_pretty()?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_document_from_file(path: &Path) -> Result<SceneDocument> {
    let json = std::fs::read_to_string(path)?;
    SceneDocument::from_json_str(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> SceneDocument {
        let mut document = SceneDocument::empty("scene-1", "Sample");
        document.camera = Some(CameraSnapshot {
            kind: "arcRotate".to_string(),
            alpha: 0.5,
            beta: 1.0,
            radius: 20.0,
        });
        for spec in [
            MeshSpec::new(MeshKind::Box).with_id("b1").with_position(Vec3::new(1.0, 2.0, 3.0)),
            MeshSpec::new(MeshKind::Line)
                .with_id("l1")
                .with_params(json!({ "points": [{ "x": 0, "y": 0, "z": 0 }, { "x": 0, "y": 4, "z": 0 }] })),
            MeshSpec::new(MeshKind::Sphere).with_id("s1").with_parent("b1"),
        ] {
            let entity = create_entity(spec).unwrap();
            document.meshes.push(MeshRecord::from_entity(&entity));
        }
        document
    }

    #[test]
    fn test_empty_document_serialization() {
        let document = SceneDocument::empty("scene-0", "Empty");
        let json = document.to_json_pretty().unwrap();
        let loaded = SceneDocument::from_json_str(&json).unwrap();
        assert_eq!(loaded.meshes.len(), 0);
        assert_eq!(loaded.name, "Empty");
    }

    #[test]
    fn test_document_uses_expected_field_names() {
        let value = serde_json::to_value(sample_document()).unwrap();
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["camera"]["type"], json!("arcRotate"));
        let mesh = &value["meshes"][0];
        assert_eq!(mesh["position"], json!({ "x": 1.0, "y": 2.0, "z": 3.0 }));
        assert_eq!(mesh["material"]["specularPower"], json!(64.0));
        assert_eq!(value["meshes"][2]["parent"], json!("b1"));
    }

    #[test]
    fn test_decode_rebuilds_entities() {
        let entities = sample_document().decode_entities().unwrap();
        let ids: Vec<&str> = entities.iter().map(|entity| entity.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "l1", "s1"]);
        assert_eq!(entities[0].position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(
            entities[1].params.to_value()["points"][1],
            json!({ "x": 0.0, "y": 4.0, "z": 0.0 })
        );
    }

    #[test]
    fn test_missing_meshes_is_rejected() {
        let result = SceneDocument::from_json_str(r#"{ "id": "s", "name": "n" }"#);
        assert!(matches!(result, Err(SerializationError::Json(_))));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut document = sample_document();
        let duplicate = document.meshes[0].clone();
        document.meshes.push(duplicate);
        assert!(matches!(
            document.decode_entities(),
            Err(SerializationError::DuplicateId(id)) if id == "b1"
        ));
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let mut document = sample_document();
        document.meshes[0].params = json!({ "size": "huge" });
        assert!(matches!(
            document.decode_entities(),
            Err(SerializationError::InvalidMesh { id, .. }) if id == "b1"
        ));
    }

    #[test]
    fn test_null_name_and_material_fall_back() {
        let document = SceneDocument::from_json_str(
            r#"{
                "id": "scene-null",
                "meshes": [
                    { "id": "b1", "name": null, "kind": "box", "material": null }
                ]
            }"#,
        )
        .unwrap();
        let entities = document.decode_entities().unwrap();
        assert_eq!(entities[0].name, "b1");
        assert_eq!(entities[0].material, Material::default());
    }

    #[test]
    fn test_unrecognized_params_survive_a_round_trip() {
        let mut document = sample_document();
        document.meshes[0].params = json!({ "size": 2.0, "width": 3.0 });
        let entities = document.decode_entities().unwrap();
        let record = MeshRecord::from_entity(&entities[0]);
        assert_eq!(record.params, json!({ "size": 2.0, "width": 3.0 }));

        let json = document.to_json_pretty().unwrap();
        let reloaded = SceneDocument::from_json_str(&json).unwrap();
        assert_eq!(reloaded.meshes[0].params["width"], json!(3.0));
    }

    #[test]
    fn test_save_load_stress_loop_via_file() {
        let mut document = sample_document();

        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!(
            "meshforge_scene_stress_{}_{}.json",
            std::process::id(),
            nonce
        ));

        for _ in 0..50 {
            save_document_to_file(&document, &path).unwrap();
            document = load_document_from_file(&path).unwrap();
            assert_eq!(document.meshes.len(), 3);
            assert_eq!(document.meshes[0].kind, MeshKind::Box);
        }
        assert_eq!(document, sample_document_with_time(document.created_at));

        let _ = std::fs::remove_file(path);
    }

    fn sample_document_with_time(created_at: u64) -> SceneDocument {
        let mut document = sample_document();
        document.created_at = created_at;
        document
    }
}
