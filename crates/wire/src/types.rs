use serde::{Deserialize, Serialize};

/// How a read that ends before the sentinel is treated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Whatever was read so far is accepted as the response.
    #[default]
    Lenient,
    /// Only a response terminated by the sentinel is accepted.
    Strict,
}

/// Reply to `get_joints_for_cube`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JointsResponse {
    pub joints: Vec<String>,
}
