//! Worker message protocol.
//!
//! One request variant per facade operation. Every reply carries the ledger
//! snapshot and heap usage after the operation, so a remote client can keep
//! a local copy without extra round trips.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{ExportOptions, HasOptions, ImportOptions, KeyOptions, Metadata, SetOptions};
use crate::config::CachemapOptions;

// == Message ==
/// Request sent to a cachemap running behind an RPC boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    Create {
        #[serde(default)]
        options: CachemapOptions,
    },
    Get {
        key: String,
        #[serde(default)]
        options: KeyOptions,
    },
    Set {
        key: String,
        value: Value,
        #[serde(default)]
        options: SetOptions,
    },
    Has {
        key: String,
        #[serde(default)]
        options: HasOptions,
    },
    Delete {
        key: String,
        #[serde(default)]
        options: KeyOptions,
    },
    Clear,
    Size,
    Entries {
        #[serde(default)]
        keys: Option<Vec<String>>,
    },
    Export {
        #[serde(default)]
        options: ExportOptions,
    },
    Import {
        options: ImportOptions,
    },
}

impl Message {
    /// Wire name of the message type, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Create { .. } => "create",
            Message::Get { .. } => "get",
            Message::Set { .. } => "set",
            Message::Has { .. } => "has",
            Message::Delete { .. } => "delete",
            Message::Clear => "clear",
            Message::Size => "size",
            Message::Entries { .. } => "entries",
            Message::Export { .. } => "export",
            Message::Import { .. } => "import",
        }
    }
}

// == Reply ==
/// Response to a [`Message`].
///
/// `result` is `null` for operations without a result and for lookups that
/// found nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub metadata: Vec<Metadata>,
    #[serde(default)]
    pub result: Value,
    pub used_heap_size: u64,
}
