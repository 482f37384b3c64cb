//! Kind-specific mesh parameters.
//!
//! Parameters travel as loose JSON objects (commands, documents) and are
//! decoded against the entity kind: supplied keys overlay the kind defaults
//! one by one, so `{ "size": 2 }` on a box keeps every other default.

use super::{xyz, MeshId, MeshKind};
use glam::Vec3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("params for kind '{kind}' must be an object")]
    NotAnObject { kind: String },
    #[error("invalid params for kind '{kind}': {source}")]
    Invalid {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxParams {
    pub size: f32,
    /// Keys this crate has no use for, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BoxParams {
    fn default() -> Self {
        Self {
            size: 1.0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphereParams {
    pub diameter: f32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SphereParams {
    fn default() -> Self {
        Self {
            diameter: 1.0,
            extra: Map::new(),
        }
    }
}

/// Shared by cylinders and cones; a cone only differs in its default top diameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CylinderParams {
    pub height: f32,
    pub diameter_top: f32,
    pub diameter_bottom: f32,
    pub tessellation: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CylinderParams {
    pub fn cylinder() -> Self {
        Self {
            height: 1.0,
            diameter_top: 1.0,
            diameter_bottom: 1.0,
            tessellation: 16,
            extra: Map::new(),
        }
    }

    pub fn cone() -> Self {
        Self {
            diameter_top: 0.0,
            ..Self::cylinder()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineParams {
    #[serde(with = "xyz::list")]
    pub points: Vec<Vec3>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for LineParams {
    fn default() -> Self {
        Self {
            points: vec![Vec3::ZERO, Vec3::X],
            extra: Map::new(),
        }
    }
}

/// Grouping node parameters. `original_parents` remembers every child's
/// parent from before the merge so a split can put it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedParams {
    pub merged_ids: Vec<MeshId>,
    pub original_parents: BTreeMap<MeshId, Option<MeshId>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MeshParams {
    Box(BoxParams),
    Sphere(SphereParams),
    Cylinder(CylinderParams),
    Cone(CylinderParams),
    Line(LineParams),
    Merged(MergedParams),
    /// Params of a kind this crate has no geometry for, kept verbatim.
    Other(Map<String, Value>),
}

impl MeshParams {
    pub fn defaults(kind: &MeshKind) -> Self {
        match kind {
            MeshKind::Box => Self::Box(BoxParams::default()),
            MeshKind::Sphere => Self::Sphere(SphereParams::default()),
            MeshKind::Cylinder => Self::Cylinder(CylinderParams::cylinder()),
            MeshKind::Cone => Self::Cone(CylinderParams::cone()),
            MeshKind::Line => Self::Line(LineParams::default()),
            MeshKind::Merged => Self::Merged(MergedParams::default()),
            MeshKind::Other(_) => Self::Other(Map::new()),
        }
    }

    /// Decode `provided` for `kind`, overlaying it key by key on the defaults.
    /// `None` and `null` both mean "all defaults".
    pub fn from_overlay(kind: &MeshKind, provided: Option<&Value>) -> Result<Self, ParamsError> {
        let fields = match provided {
            None | Some(Value::Null) => None,
            Some(Value::Object(fields)) => Some(fields),
            Some(_) => {
                return Err(ParamsError::NotAnObject {
                    kind: kind.as_str().to_string(),
                })
            }
        };
        let invalid = |source| ParamsError::Invalid {
            kind: kind.as_str().to_string(),
            source,
        };
        let params = match kind {
            MeshKind::Box => Self::Box(overlay(BoxParams::default(), fields).map_err(invalid)?),
            MeshKind::Sphere => {
                Self::Sphere(overlay(SphereParams::default(), fields).map_err(invalid)?)
            }
            MeshKind::Cylinder => {
                Self::Cylinder(overlay(CylinderParams::cylinder(), fields).map_err(invalid)?)
            }
            MeshKind::Cone => Self::Cone(overlay(CylinderParams::cone(), fields).map_err(invalid)?),
            MeshKind::Line => Self::Line(overlay(LineParams::default(), fields).map_err(invalid)?),
            MeshKind::Merged => {
                Self::Merged(overlay(MergedParams::default(), fields).map_err(invalid)?)
            }
            MeshKind::Other(_) => Self::Other(fields.cloned().unwrap_or_default()),
        };
        Ok(params)
    }

    pub fn to_value(&self) -> Value {
        // Every variant is a plain struct or map of numbers and strings.
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn merged(&self) -> Option<&MergedParams> {
        match self {
            Self::Merged(params) => Some(params),
            _ => None,
        }
    }
}

fn overlay<T>(defaults: T, fields: Option<&Map<String, Value>>) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let Some(fields) = fields else {
        return Ok(defaults);
    };
    let mut base = serde_json::to_value(&defaults)?;
    if let Value::Object(map) = &mut base {
        for (key, value) in fields {
            map.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_keeps_unspecified_defaults() {
        let params =
            MeshParams::from_overlay(&MeshKind::Cylinder, Some(&json!({ "height": 3.0 }))).unwrap();
        match params {
            MeshParams::Cylinder(cylinder) => {
                assert_eq!(cylinder.height, 3.0);
                assert_eq!(cylinder.diameter_top, 1.0);
                assert_eq!(cylinder.tessellation, 16);
            }
            other => panic!("Expected cylinder params, got {:?}", other),
        }
    }

    #[test]
    fn cone_defaults_to_closed_top() {
        match MeshParams::from_overlay(&MeshKind::Cone, None).unwrap() {
            MeshParams::Cone(cone) => {
                assert_eq!(cone.diameter_top, 0.0);
                assert_eq!(cone.diameter_bottom, 1.0);
            }
            other => panic!("Expected cone params, got {:?}", other),
        }
    }

    #[test]
    fn line_defaults_to_two_points() {
        match MeshParams::defaults(&MeshKind::Line) {
            MeshParams::Line(line) => assert_eq!(line.points, vec![Vec3::ZERO, Vec3::X]),
            other => panic!("Expected line params, got {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_keeps_params_verbatim() {
        let kind = MeshKind::from("torus");
        let params =
            MeshParams::from_overlay(&kind, Some(&json!({ "thickness": 0.2, "label": "t" })))
                .unwrap();
        assert_eq!(params.to_value(), json!({ "thickness": 0.2, "label": "t" }));
    }

    #[test]
    fn known_kinds_keep_unrecognized_keys() {
        let provided = json!({ "size": 2.0, "width": 3.0, "label": "crate" });
        let params = MeshParams::from_overlay(&MeshKind::Box, Some(&provided)).unwrap();
        match &params {
            MeshParams::Box(params) => {
                assert_eq!(params.size, 2.0);
                assert_eq!(params.extra.get("width"), Some(&json!(3.0)));
            }
            other => panic!("Expected box params, got {:?}", other),
        }
        assert_eq!(params.to_value(), provided);

        let cone = MeshParams::from_overlay(&MeshKind::Cone, Some(&json!({ "arc": 0.5 }))).unwrap();
        assert_eq!(cone.to_value()["arc"], json!(0.5));
        assert_eq!(cone.to_value()["diameterTop"], json!(0.0));
    }

    #[test]
    fn rejects_non_object_params() {
        let result = MeshParams::from_overlay(&MeshKind::Box, Some(&json!([1, 2, 3])));
        assert!(matches!(result, Err(ParamsError::NotAnObject { .. })));
    }

    #[test]
    fn rejects_mistyped_params() {
        let result = MeshParams::from_overlay(&MeshKind::Box, Some(&json!({ "size": "big" })));
        assert!(matches!(result, Err(ParamsError::Invalid { .. })));
    }

    #[test]
    fn merged_params_use_camel_case_on_the_wire() {
        let mut params = MergedParams::default();
        params.merged_ids = vec!["a".to_string(), "b".to_string()];
        params.original_parents.insert("a".to_string(), None);
        params
            .original_parents
            .insert("b".to_string(), Some("root".to_string()));
        let value = MeshParams::Merged(params).to_value();
        assert_eq!(
            value,
            json!({ "mergedIds": ["a", "b"], "originalParents": { "a": null, "b": "root" } })
        );
    }
}
