//! Special channels: blend shapes, the camera rig and light parameters.
//!
//! These use the same retarget/emit engine as joints; only the binding and
//! the data paths differ.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::action::{DriverSpec, DriverVariable};
use crate::path_hash::{blend_shape_hash, path_hash, property_hash, PathHash};

/// Shape-key names of one mesh, keyed by the hash Unity stores in the curve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendShapeTable {
    /// Host mesh (shape-key owner) name.
    pub mesh: String,
    /// Path hash of the transform carrying the skinned mesh renderer.
    pub container_hash: PathHash,
    pub shapes: HashMap<u32, String>,
}

impl BlendShapeTable {
    /// Build from the mesh's container path and its shape-key names.
    pub fn from_names<I, S>(mesh: impl Into<String>, container_path: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let shapes = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (blend_shape_hash(&name), name)
            })
            .collect();
        Self {
            mesh: mesh.into(),
            container_hash: path_hash(container_path),
            shapes,
        }
    }

    pub fn shape(&self, name_hash: u32) -> Option<&str> {
        self.shapes.get(&name_hash).map(String::as_str)
    }
}

/// Camera rig: the main camera transform, the parameter transform whose
/// translation X carries the vertical field of view, and the sub-camera target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraRigConfig {
    /// Host camera object name.
    pub rig: String,
    pub main_path: String,
    pub parameter_path: String,
    pub sub_target_path: String,
    /// Sensor height in millimetres, exposed to the lens driver.
    pub sensor_height: f32,
}

impl Default for CameraRigConfig {
    fn default() -> Self {
        Self {
            rig: "Camera".to_string(),
            main_path: "Main Camera".to_string(),
            parameter_path: "Camera Parameter".to_string(),
            sub_target_path: "Sub Camera Target".to_string(),
            sensor_height: 24.0,
        }
    }
}

impl CameraRigConfig {
    pub fn main_hash(&self) -> PathHash {
        path_hash(&self.main_path)
    }

    pub fn parameter_hash(&self) -> PathHash {
        path_hash(&self.parameter_path)
    }

    pub fn sub_target_hash(&self) -> PathHash {
        path_hash(&self.sub_target_path)
    }

    pub fn fov_path(&self) -> String {
        format!("camera.{}.fov", self.rig)
    }

    /// Driver computing the lens focal length from the animated field of view.
    pub fn lens_driver(&self) -> DriverSpec {
        DriverSpec {
            data_path: format!("camera.{}.lens", self.rig),
            expression: "(sensor / 2) / tan(radians(fov) / 2)".to_string(),
            variables: vec![
                DriverVariable {
                    name: "fov".to_string(),
                    source_path: self.fov_path(),
                },
                DriverVariable {
                    name: "sensor".to_string(),
                    source_path: format!("camera.{}.sensor_height", self.rig),
                },
            ],
        }
    }
}

/// Light whose user properties receive light-parameter curves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightRigConfig {
    /// Host object carrying the user properties.
    pub object: String,
    /// Unity transform path the light curves are keyed on.
    pub path: String,
}

impl Default for LightRigConfig {
    fn default() -> Self {
        Self {
            object: "Light".to_string(),
            path: "Directional Light".to_string(),
        }
    }
}

impl LightRigConfig {
    pub fn path_hash(&self) -> PathHash {
        path_hash(&self.path)
    }
}

/// Property names recognised on the light rig.
pub const LIGHT_PARAMETERS: &[&str] = &[
    "m_Intensity",
    "m_Color.r",
    "m_Color.g",
    "m_Color.b",
    "m_Color.a",
    "_RimIntensity",
    "_RimColor.r",
    "_RimColor.g",
    "_RimColor.b",
    "_RimThreshold",
    "_RimSharpness",
];

/// Name of the light parameter with the given property hash.
pub fn light_parameter(name_hash: u32) -> Option<&'static str> {
    LIGHT_PARAMETERS
        .iter()
        .copied()
        .find(|name| property_hash(name) == name_hash)
}

/// Everything the resolver needs to bind non-joint channels.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialChannelConfig {
    pub blend_shapes: Vec<BlendShapeTable>,
    pub camera: Option<CameraRigConfig>,
    pub light: Option<LightRigConfig>,
    /// Named float properties that may be animated on joints.
    pub user_properties: HashMap<u32, String>,
}

impl SpecialChannelConfig {
    pub fn with_blend_shapes(mut self, table: BlendShapeTable) -> Self {
        self.blend_shapes.push(table);
        self
    }

    pub fn with_camera(mut self, camera: CameraRigConfig) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_light(mut self, light: LightRigConfig) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_user_property(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.user_properties.insert(property_hash(&name), name);
        self
    }

    pub fn blend_shape_table(&self, container_hash: PathHash) -> Option<&BlendShapeTable> {
        self.blend_shapes
            .iter()
            .find(|t| t.container_hash == container_hash)
    }

    pub fn user_property(&self, name_hash: u32) -> Option<&str> {
        self.user_properties.get(&name_hash).map(String::as_str)
    }
}
