//! Outbound action event emission
//!
//! Every committed mutation appends one tagged event to the action queue,
//! the core's only persistence-intent channel; no direct I/O happens in
//! the core. The queue is an unbounded multi-producer channel so external
//! consumers can drain concurrently with tree operations. Bulk operations
//! near the tree root can emit one event per affected descendant; callers
//! performing bulk or startup loads must drain between operations to
//! bound memory.

use canopy_core_types::EntityKind;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Action tag carried by every outbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    MemberNew,
    MemberRemoved,
    PropertyNew,
    PropertyUpdate,
    PropertyDelete,
    CheckNew,
    CheckRemoved,
    CheckInstanceCreate,
    CheckInstanceUpdate,
    CheckInstanceDelete,
    /// Bookkeeping: event wiring attached to a tree
    Attached,
    /// Bookkeeping: event wiring released during destroy
    RemoveActionchannel,
}

impl ActionKind {
    /// Stable wire string for this action
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::MemberNew => "member_new",
            ActionKind::MemberRemoved => "member_removed",
            ActionKind::PropertyNew => "property_new",
            ActionKind::PropertyUpdate => "property_update",
            ActionKind::PropertyDelete => "property_delete",
            ActionKind::CheckNew => "check_new",
            ActionKind::CheckRemoved => "check_removed",
            ActionKind::CheckInstanceCreate => "check_instance_create",
            ActionKind::CheckInstanceUpdate => "check_instance_update",
            ActionKind::CheckInstanceDelete => "check_instance_delete",
            ActionKind::Attached => "attached",
            ActionKind::RemoveActionchannel => "remove_actionchannel",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One outbound change record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action: ActionKind,
    /// Kind of the entity the mutation was observed on
    pub object_kind: EntityKind,
    /// Id of the entity the mutation was observed on
    pub object_id: String,
    /// Export snapshot of the affected object
    pub payload: serde_json::Value,
}

/// Cloneable handle emitting actions onto the outbound queue
#[derive(Debug, Clone)]
pub struct ActionEmitter {
    tx: Sender<Action>,
}

impl ActionEmitter {
    /// Create an emitter and the receiver its events drain from
    pub fn channel() -> (ActionEmitter, Receiver<Action>) {
        let (tx, rx) = unbounded();
        (ActionEmitter { tx }, rx)
    }

    /// Append one event to the queue
    ///
    /// A dropped consumer is tolerated: the event is discarded and logged,
    /// since event delivery must never fail a tree mutation that already
    /// happened.
    pub fn emit(
        &self,
        action: ActionKind,
        object_kind: EntityKind,
        object_id: &str,
        payload: serde_json::Value,
    ) {
        tracing::debug!(
            action = action.as_str(),
            object_kind = object_kind.as_str(),
            object_id,
            "emit action"
        );
        let event = Action {
            action,
            object_kind,
            object_id: object_id.to_string(),
            payload,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(action = action.as_str(), "action consumer gone, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_wire_strings() {
        assert_eq!(ActionKind::MemberNew.as_str(), "member_new");
        assert_eq!(
            ActionKind::CheckInstanceCreate.as_str(),
            "check_instance_create"
        );
        assert_eq!(ActionKind::RemoveActionchannel.as_str(), "remove_actionchannel");
    }

    #[test]
    fn test_action_kind_serde_matches_wire() {
        let json = serde_json::to_string(&ActionKind::PropertyNew).unwrap();
        assert_eq!(json, "\"property_new\"");
    }

    #[test]
    fn test_emit_delivers_in_order() {
        let (emitter, rx) = ActionEmitter::channel();
        emitter.emit(
            ActionKind::Create,
            EntityKind::Bucket,
            "b1",
            serde_json::Value::Null,
        );
        emitter.emit(
            ActionKind::MemberNew,
            EntityKind::Repository,
            "r1",
            serde_json::Value::Null,
        );
        let first = rx.recv().unwrap();
        let second = rx.recv().unwrap();
        assert_eq!(first.action, ActionKind::Create);
        assert_eq!(second.action, ActionKind::MemberNew);
    }

    #[test]
    fn test_emit_survives_dropped_consumer() {
        let (emitter, rx) = ActionEmitter::channel();
        drop(rx);
        emitter.emit(
            ActionKind::Delete,
            EntityKind::Node,
            "n1",
            serde_json::Value::Null,
        );
    }
}
