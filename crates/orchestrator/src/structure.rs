//! Description of what one session builds on the server.

use cubewright_core::{expand_chain, remote_name_for, Entity, JointParams, Link, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Structure {
    pub name: String,
    /// Send each chain as one `link_cube_chains` instead of one
    /// `create_joint` per pair
    pub server_chains: bool,
    pub entities: Vec<EntitySpec>,
    /// Entity name to hex colour
    pub colors: BTreeMap<String, String>,
    pub links: Vec<LinkSpec>,
    pub chains: Vec<ChainSpec>,
    /// Server-side links by name prefix
    pub bulk_links: Vec<BulkLinkSpec>,
    pub stiffen: StiffenSpec,
    pub actuate: Vec<ActuateSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntitySpec {
    pub name: String,
    pub position: [f64; 3],
    #[serde(default = "default_true")]
    pub is_base: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSpec {
    pub a: String,
    pub b: String,
    pub joint_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_name: Option<String>,
    #[serde(default)]
    pub params: JointParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainSpec {
    pub names: Vec<String>,
    pub joint_type: String,
    #[serde(default)]
    pub params: JointParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkLinkSpec {
    pub prefix: String,
    pub joint_type: String,
    #[serde(default)]
    pub params: JointParams,
}

/// Parameter set that locks every known joint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StiffenSpec {
    pub params: JointParams,
    /// One `set_joint_params` per joint instead of one `set_joint_param`
    /// per parameter
    pub batched: bool,
}

impl Default for StiffenSpec {
    fn default() -> Self {
        Self {
            params: JointParams::new(),
            batched: true,
        }
    }
}

/// Drive cycle for every joint touching one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuateSpec {
    pub entity: String,
    #[serde(default = "default_drive_param")]
    pub drive_param: String,
    #[serde(default = "default_rate_param")]
    pub rate_param: String,
    pub target_rate: f64,
    pub hold_ms: u64,
}

impl ActuateSpec {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_drive_param() -> String {
    "enable_motor".to_string()
}

fn default_rate_param() -> String {
    "motor_target_velocity".to_string()
}

impl Structure {
    /// Entities to spawn, in definition order.
    pub fn entities(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .map(|spec| Entity::with_base(spec.name.clone(), Vec3(spec.position), spec.is_base))
            .collect()
    }

    /// Remote name for a caller name; unknown names pass through unchanged.
    pub fn resolve(&self, name: &str) -> String {
        self.entities
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| remote_name_for(&spec.name, spec.is_base))
            .unwrap_or_else(|| name.to_string())
    }

    /// Chains with every name resolved to its remote name.
    pub fn resolved_chains(&self) -> Vec<(Vec<String>, &ChainSpec)> {
        self.chains
            .iter()
            .map(|chain| {
                let names = chain.names.iter().map(|n| self.resolve(n)).collect();
                (names, chain)
            })
            .collect()
    }

    /// Explicitly listed links, endpoints resolved.
    pub fn individual_links(&self) -> Vec<Link> {
        self.links
            .iter()
            .map(|spec| {
                Link::new(
                    self.resolve(&spec.a),
                    self.resolve(&spec.b),
                    spec.joint_type.clone(),
                    spec.joint_name.clone(),
                )
                .with_parameters(spec.params.clone())
            })
            .collect()
    }

    /// Every link the structure describes: individual links first, then
    /// chain links in chain order.
    pub fn planned_links(&self) -> Vec<Link> {
        let mut links = self.individual_links();
        for (names, chain) in self.resolved_chains() {
            links.extend(expand_chain(&names, &chain.joint_type, &chain.params));
        }
        links
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.entities {
            if spec.name.is_empty() {
                return Err(OrchestratorError::structure("entity with empty name"));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(OrchestratorError::structure(format!(
                    "duplicate entity name {}",
                    spec.name
                )));
            }
        }

        for chain in &self.chains {
            if chain.names.len() < 2 {
                return Err(OrchestratorError::structure(format!(
                    "chain {:?} needs at least two names",
                    chain.names
                )));
            }
        }

        let mut joints = HashSet::new();
        for link in self.planned_links() {
            if !joints.insert(link.joint_name.clone()) {
                return Err(OrchestratorError::structure(format!(
                    "duplicate joint name {}",
                    link.joint_name
                )));
            }
        }

        for (name, hex) in &self.colors {
            if hex.trim().is_empty() {
                return Err(OrchestratorError::structure(format!(
                    "empty colour for {}",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Reject any name, joint or colour that would contain the frame
    /// sentinel once sent.
    pub fn ensure_frameable(&self, sentinel: &str) -> Result<()> {
        if sentinel.is_empty() {
            return Ok(());
        }

        let mut fields: Vec<(&str, String)> = Vec::new();
        for entity in self.entities() {
            fields.push(("entity", entity.remote_name));
        }
        for link in self.planned_links() {
            fields.push(("joint", link.joint_name));
            fields.push(("joint type", link.joint_type));
            fields.extend(link.parameters.into_keys().map(|p| ("joint parameter", p)));
        }
        for (name, hex) in &self.colors {
            fields.push(("colour target", self.resolve(name)));
            fields.push(("colour", hex.clone()));
        }
        for bulk in &self.bulk_links {
            fields.push(("prefix", bulk.prefix.clone()));
            fields.push(("joint type", bulk.joint_type.clone()));
            fields.extend(bulk.params.keys().map(|p| ("joint parameter", p.clone())));
        }
        fields.extend(self.stiffen.params.keys().map(|p| ("joint parameter", p.clone())));
        for spec in &self.actuate {
            fields.push(("actuated entity", self.resolve(&spec.entity)));
            fields.push(("joint parameter", spec.drive_param.clone()));
            fields.push(("joint parameter", spec.rate_param.clone()));
        }

        match fields.into_iter().find(|(_, value)| value.contains(sentinel)) {
            Some((what, value)) => Err(OrchestratorError::structure(format!(
                "{} {:?} contains the frame sentinel",
                what, value
            ))),
            None => Ok(()),
        }
    }

    /// Small two-tier figure used by `init`.
    pub fn demo() -> Self {
        let entity = |name: &str, position: [f64; 3]| EntitySpec {
            name: name.to_string(),
            position,
            is_base: true,
        };
        let mut stiffen = JointParams::new();
        stiffen.insert("lower_limit".to_string(), 0.0);
        stiffen.insert("upper_limit".to_string(), 0.0);

        let mut colors = BTreeMap::new();
        colors.insert("leftear".to_string(), "#f4c2c2".to_string());
        colors.insert("rightear".to_string(), "#f4c2c2".to_string());

        Self {
            name: "demo".to_string(),
            server_chains: false,
            entities: vec![
                entity("rightear", [0.0, 130.0, 0.0]),
                entity("leftear", [2.0, 130.0, 0.0]),
                entity("head1", [0.0, 128.9, 0.0]),
                entity("head2", [1.0, 128.9, 0.0]),
                entity("head3", [2.0, 128.9, 0.0]),
                entity("neck", [1.0, 126.9, 0.5]),
                entity("body1", [0.0, 125.9, 0.0]),
                entity("body2", [1.0, 125.9, 0.0]),
                entity("body3", [2.0, 125.9, 0.0]),
            ],
            colors,
            links: vec![
                LinkSpec {
                    a: "rightear".to_string(),
                    b: "head1".to_string(),
                    joint_type: "fixed".to_string(),
                    joint_name: None,
                    params: JointParams::new(),
                },
                LinkSpec {
                    a: "leftear".to_string(),
                    b: "head3".to_string(),
                    joint_type: "fixed".to_string(),
                    joint_name: None,
                    params: JointParams::new(),
                },
            ],
            chains: vec![
                ChainSpec {
                    names: vec!["head1".into(), "head2".into(), "head3".into()],
                    joint_type: "fixed".to_string(),
                    params: JointParams::new(),
                },
                ChainSpec {
                    names: vec!["head2".into(), "neck".into(), "body2".into()],
                    joint_type: "hinge".to_string(),
                    params: JointParams::new(),
                },
                ChainSpec {
                    names: vec!["body1".into(), "body2".into(), "body3".into()],
                    joint_type: "fixed".to_string(),
                    params: JointParams::new(),
                },
            ],
            bulk_links: Vec::new(),
            stiffen: StiffenSpec {
                params: stiffen,
                batched: true,
            },
            actuate: vec![ActuateSpec {
                entity: "neck".to_string(),
                drive_param: default_drive_param(),
                rate_param: default_rate_param(),
                target_rate: 2.0,
                hold_ms: 1500,
            }],
        }
    }
}
