//! Domain entities mirrored from persistent storage.
//!
//! Field names match the wire format served by `/get-objects`.

use serde::{Deserialize, Serialize};

/// A placed object. Position and rotation are kept as the `x,y,z` text the
/// client sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObjectRecord {
    pub id: i64,
    pub u_uuid: String,
    pub o_type: i32,
    pub o_pos: String,
    pub o_rot: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub u_uuid: String,
    pub part1: String,
    pub part2: String,
    pub part3: String,
}

/// One sampled step of a recorded movement. Serialised as `[pos, rot]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhantomFrame(pub String, pub String);

impl PhantomFrame {
    pub fn new(pos: impl Into<String>, rot: impl Into<String>) -> Self {
        Self(pos.into(), rot.into())
    }

    pub fn pos(&self) -> &str {
        &self.0
    }

    pub fn rot(&self) -> &str {
        &self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhantomRecord {
    pub id: i64,
    pub u_uuid: String,
    pub data: Vec<PhantomFrame>,
}

/// The aggregate recent window served to every reader.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceWindow {
    pub objects: Vec<GameObjectRecord>,
    pub messages: Vec<MessageRecord>,
    pub phantoms: Vec<PhantomRecord>,
}
