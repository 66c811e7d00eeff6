use serde::{Deserialize, Serialize};

/// Suffix the server appends to the name of an entity spawned as a base.
pub const BASE_SUFFIX: &str = "_BASE";

/// A point or Euler rotation in simulation space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3(pub [f64; 3]);

impl Vec3 {
    pub const ZERO: Vec3 = Vec3([0.0, 0.0, 0.0]);

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }

    pub fn as_array(&self) -> [f64; 3] {
        self.0
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(value: [f64; 3]) -> Self {
        Self(value)
    }
}

/// A named object created on the remote simulation by a spawn command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    /// Caller-chosen name
    pub name: String,
    /// Name the server knows the entity by
    pub remote_name: String,
    pub position: Vec3,
    /// Always zero at creation
    pub rotation: Vec3,
    /// Entities are created frozen
    pub frozen: bool,
    pub is_base: bool,
}

impl Entity {
    /// Describe an entity about to be spawned as a base.
    pub fn new(name: impl Into<String>, position: impl Into<Vec3>) -> Self {
        Self::with_base(name, position, true)
    }

    pub fn with_base(name: impl Into<String>, position: impl Into<Vec3>, is_base: bool) -> Self {
        let name = name.into();
        Self {
            remote_name: remote_name_for(&name, is_base),
            name,
            position: position.into(),
            rotation: Vec3::ZERO,
            frozen: true,
            is_base,
        }
    }
}

/// Name the server assigns to an entity spawned under `name`.
pub fn remote_name_for(name: &str, is_base: bool) -> String {
    if is_base {
        format!("{}{}", name, BASE_SUFFIX)
    } else {
        name.to_string()
    }
}
