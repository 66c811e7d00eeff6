use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar joint parameters keyed by name.
pub type JointParams = BTreeMap<String, f64>;

/// A named constraint between two remote entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub joint_name: String,
    /// Remote name of the first endpoint
    pub entity_a: String,
    /// Remote name of the second endpoint
    pub entity_b: String,
    pub joint_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: JointParams,
}

impl Link {
    /// Build a link, synthesizing the joint name when none is given.
    pub fn new(
        entity_a: impl Into<String>,
        entity_b: impl Into<String>,
        joint_type: impl Into<String>,
        joint_name: Option<String>,
    ) -> Self {
        let entity_a = entity_a.into();
        let entity_b = entity_b.into();
        let joint_type = joint_type.into();
        let joint_name =
            joint_name.unwrap_or_else(|| synthesize_joint_name(&joint_type, &entity_a, &entity_b));
        Self {
            joint_name,
            entity_a,
            entity_b,
            joint_type,
            parameters: JointParams::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: JointParams) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn touches(&self, entity: &str) -> bool {
        self.entity_a == entity || self.entity_b == entity
    }
}

/// `joint_<type>_<A>_<B>`
pub fn synthesize_joint_name(joint_type: &str, entity_a: &str, entity_b: &str) -> String {
    format!("joint_{}_{}_{}", joint_type, entity_a, entity_b)
}

/// Expand a chain of K names into the K-1 links joining consecutive names.
pub fn expand_chain(names: &[String], joint_type: &str, parameters: &JointParams) -> Vec<Link> {
    names
        .windows(2)
        .map(|pair| {
            Link::new(pair[0].clone(), pair[1].clone(), joint_type, None)
                .with_parameters(parameters.clone())
        })
        .collect()
}
