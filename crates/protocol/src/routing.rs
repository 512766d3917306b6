//! Routing-task notification payloads.

use serde::{Deserialize, Serialize};

/// Body of a `RoutingTaskNotification`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub changes: Vec<RoutingChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Upsert,
    Delete,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingChange {
    pub r#type: ChangeType,
    #[serde(default)]
    pub result: RoutingTask,
}

impl RoutingChange {
    /// Rings offered by this change that are still waiting for an answer.
    ///
    /// Only `UPSERT` changes offer rings; anything else yields nothing.
    pub fn waiting_rings(&self) -> impl Iterator<Item = &RingDetails> {
        let rings: &[RingDetails] = match self.r#type {
            ChangeType::Upsert => &self.result.rings_details,
            ChangeType::Delete | ChangeType::Other => &[],
        };
        rings
            .iter()
            .filter(|ring| ring.ring_state == RingState::Waiting)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub rings_details: Vec<RingDetails>,
}

/// A conversation assignment offered to this agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingDetails {
    pub ring_id: String,
    pub ring_state: RingState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RingState {
    Waiting,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
    #[serde(other)]
    Other,
}
