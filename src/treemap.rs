use serde::{Deserialize, Deserializer, Serialize};

/// Backend identifier of a filesystem node. Stable for one scan only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub u32);

// Accepts both `3` and the tuple-struct form `[3]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNodeId {
    Plain(u32),
    Wrapped([u32; 1]),
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawNodeId::deserialize(deserializer)? {
            RawNodeId::Plain(id) | RawNodeId::Wrapped([id]) => NodeId(id),
        })
    }
}

/// One treemap cell, in coordinates normalized to the viewport (origin top-left).
///
/// Geometry is taken as-is from the backend; out-of-range or inverted spans are
/// not rejected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub id: NodeId,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

impl Rect {
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// Inclusive on every edge.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }
}

/// Ancestor path entry, root first. The last entry is the current zoom focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreadcrumbItem {
    pub id: NodeId,
    pub name: String,
}

/// Latest counters of an in-flight scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub files: u64,
    pub dirs: u64,
    pub errors: u64,
}
