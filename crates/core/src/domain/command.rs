use serde::{Deserialize, Serialize};

use super::entity::{Entity, Vec3};
use super::link::{JointParams, Link};

/// The fixed command set understood by the simulation server.
///
/// Serialized as a JSON object whose `type` field selects the operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SpawnCube {
        cube_name: String,
        position: Vec3,
        rotation: Vec3,
        is_base: bool,
    },
    FreezeCube {
        cube_name: String,
        freeze: bool,
    },
    DespawnCube {
        cube_name: String,
    },
    CreateJoint {
        cube1: String,
        cube2: String,
        joint_type: String,
        joint_name: String,
    },
    SetJointParam {
        joint_name: String,
        param_name: String,
        value: f64,
    },
    SetJointParams {
        joint_name: String,
        params: JointParams,
    },
    SetColor {
        cube_name: String,
        hex: String,
    },
    /// Server-side bulk link of every entity sharing a name prefix
    LinkBodyCubes {
        prefix: String,
        joint_type: String,
        joint_params: JointParams,
    },
    LinkCubeChains {
        chains: Vec<Vec<String>>,
        joint_type: String,
        joint_params: JointParams,
    },
    GetJointsForCube {
        cube_name: String,
    },
}

impl Command {
    /// Spawn `entity` under its caller-chosen name.
    pub fn spawn(entity: &Entity) -> Self {
        Self::SpawnCube {
            cube_name: entity.name.clone(),
            position: entity.position,
            rotation: entity.rotation,
            is_base: entity.is_base,
        }
    }

    pub fn freeze(cube_name: impl Into<String>, freeze: bool) -> Self {
        Self::FreezeCube {
            cube_name: cube_name.into(),
            freeze,
        }
    }

    pub fn despawn(cube_name: impl Into<String>) -> Self {
        Self::DespawnCube {
            cube_name: cube_name.into(),
        }
    }

    pub fn create_joint(link: &Link) -> Self {
        Self::CreateJoint {
            cube1: link.entity_a.clone(),
            cube2: link.entity_b.clone(),
            joint_type: link.joint_type.clone(),
            joint_name: link.joint_name.clone(),
        }
    }

    pub fn set_joint_param(
        joint_name: impl Into<String>,
        param_name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self::SetJointParam {
            joint_name: joint_name.into(),
            param_name: param_name.into(),
            value,
        }
    }

    pub fn set_joint_params(joint_name: impl Into<String>, params: JointParams) -> Self {
        Self::SetJointParams {
            joint_name: joint_name.into(),
            params,
        }
    }

    pub fn set_color(cube_name: impl Into<String>, hex: impl Into<String>) -> Self {
        Self::SetColor {
            cube_name: cube_name.into(),
            hex: hex.into(),
        }
    }

    pub fn link_by_prefix(
        prefix: impl Into<String>,
        joint_type: impl Into<String>,
        joint_params: JointParams,
    ) -> Self {
        Self::LinkBodyCubes {
            prefix: prefix.into(),
            joint_type: joint_type.into(),
            joint_params,
        }
    }

    pub fn link_chains(
        chains: Vec<Vec<String>>,
        joint_type: impl Into<String>,
        joint_params: JointParams,
    ) -> Self {
        Self::LinkCubeChains {
            chains,
            joint_type: joint_type.into(),
            joint_params,
        }
    }

    pub fn joints_for(cube_name: impl Into<String>) -> Self {
        Self::GetJointsForCube {
            cube_name: cube_name.into(),
        }
    }

    /// Wire value of the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpawnCube { .. } => "spawn_cube",
            Self::FreezeCube { .. } => "freeze_cube",
            Self::DespawnCube { .. } => "despawn_cube",
            Self::CreateJoint { .. } => "create_joint",
            Self::SetJointParam { .. } => "set_joint_param",
            Self::SetJointParams { .. } => "set_joint_params",
            Self::SetColor { .. } => "set_color",
            Self::LinkBodyCubes { .. } => "link_body_cubes",
            Self::LinkCubeChains { .. } => "link_cube_chains",
            Self::GetJointsForCube { .. } => "get_joints_for_cube",
        }
    }

    /// The entity, joint or prefix the command acts on, for diagnostics.
    pub fn subject(&self) -> &str {
        match self {
            Self::SpawnCube { cube_name, .. }
            | Self::FreezeCube { cube_name, .. }
            | Self::DespawnCube { cube_name }
            | Self::SetColor { cube_name, .. }
            | Self::GetJointsForCube { cube_name } => cube_name,
            Self::CreateJoint { joint_name, .. }
            | Self::SetJointParam { joint_name, .. }
            | Self::SetJointParams { joint_name, .. } => joint_name,
            Self::LinkBodyCubes { prefix, .. } => prefix,
            Self::LinkCubeChains { joint_type, .. } => joint_type,
        }
    }
}
