//! Newline-delimited JSON framing between the view and a backend process.
//!
//! Outbound: `{"id": 7, "call": {"command": "set_zoom", "args": {"nodeId": 3}}}`
//! Inbound reply: `{"id": 7, "result": ..}` or `{"id": 7, "error": ".."}`
//! Inbound event: `{"event": "treemap_update", "payload": {"rects": [..]}}`

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::BackendEvent;
use crate::error::{Result, ViewError};
use crate::treemap::{BreadcrumbItem, NodeId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum Call {
    StartScan {
        root: String,
        #[serde(rename = "minSizeKb")]
        min_size_kb: u64,
    },
    SetZoom {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
    GetParentNode,
    GetHomeDir,
    GetBreadcrumbs,
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::StartScan { .. } => "start_scan",
            Call::SetZoom { .. } => "set_zoom",
            Call::GetParentNode => "get_parent_node",
            Call::GetHomeDir => "get_home_dir",
            Call::GetBreadcrumbs => "get_breadcrumbs",
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    call: &'a Call,
}

/// One request line, without the trailing newline.
pub fn encode_request(id: u64, call: &Call) -> Result<String> {
    Ok(serde_json::to_string(&Request { id, call })?)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reply {
    pub id: u64,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl Reply {
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(message) => Err(ViewError::Backend(message)),
            None => Ok(self.result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    Reply(Reply),
    Event(BackendEvent),
}

pub fn decode_line(line: &str) -> Result<Incoming> {
    Ok(serde_json::from_str(line)?)
}

/// Typed view of a reply's `result` field.
pub fn decode_result<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

#[derive(Deserialize)]
struct BreadcrumbsResponse {
    items: Vec<BreadcrumbItem>,
}

/// `get_breadcrumbs` answers with `{"items": [..]}`.
pub fn decode_breadcrumbs(value: Value) -> Result<Vec<BreadcrumbItem>> {
    decode_result::<BreadcrumbsResponse>(value).map(|r| r.items)
}
