use serde::{Deserialize, Serialize};

/// Wrapper for a Bedrock entity unique ID, as assigned
/// to the local player by `StartGame`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityUniqueId(i64);

impl EntityUniqueId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}
