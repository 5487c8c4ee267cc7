//! Model snapshots.
//!
//! A snapshot stores every node of the build graph exactly once, in a table,
//! and refers to nodes by their position in that table. Loading rebuilds one
//! instance per table entry, so a part reachable from two steps (or from a
//! registry and a step) is still a single shared instance afterwards.
//!
//! # Format
//!
//! ```text
//! # modeltrack snapshot v1
//! # checksum: blake3:<hex of body>
//! {"name": ..., "nodes": [...], "steps": [...], ...}
//! ```
//!
//! The body is JSON. The checksum covers the body bytes only.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::detail::{Decal, Paint};
use crate::error::ErrorCode;
use crate::graph::node::{Kind, Node, NodeLink, NodeRef, Shape};
use crate::graph::part::sealed::HasNode;
use crate::graph::{Assembly, Part, Step};
use crate::map::{DecalMap, PaintMap, Status};
use crate::model::{Model, PaintKey};

/// First line of every snapshot file.
pub const SNAPSHOT_HEADER: &str = "# modeltrack snapshot v1";

const CHECKSUM_PREFIX: &str = "# checksum: ";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while writing or reading a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The body is not valid snapshot JSON.
    #[error("snapshot body is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or unsupported header lines.
    #[error("not a modeltrack snapshot (found {0:?})")]
    BadHeader(String),

    #[error("snapshot checksum mismatch: header says {expected}, body hashes to {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// A node index outside the node table.
    #[error("snapshot refers to node {index}, but only {len} nodes exist")]
    DanglingReference { index: usize, len: usize },

    /// A reference to a node of the wrong kind.
    #[error("snapshot node {index} is a {found}, expected {expected}")]
    KindMismatch {
        index: usize,
        expected: &'static str,
        found: Kind,
    },

    /// An assembly that contains itself.
    #[error("snapshot node {index} contains itself")]
    MemberCycle { index: usize },
}

impl PersistError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Write { .. } => ErrorCode::SnapshotWriteFailed,
            Self::Read { .. } => ErrorCode::SnapshotReadFailed,
            Self::BadHeader(_) => ErrorCode::SnapshotHeaderInvalid,
            Self::ChecksumMismatch { .. } => ErrorCode::SnapshotChecksumMismatch,
            Self::KindMismatch { .. } => ErrorCode::KindMismatch,
            Self::Json(_) | Self::DanglingReference { .. } | Self::MemberCycle { .. } => {
                ErrorCode::SnapshotCorrupt
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    name: String,
    nodes: Vec<NodeRecord>,
    steps: Vec<usize>,
    parts: BTreeMap<String, usize>,
    assemblies: BTreeMap<String, usize>,
    paints: Vec<(PaintKey, Paint)>,
    decals: BTreeMap<String, Decal>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    kind: Kind,
    id: String,
    #[serde(default)]
    paints: Vec<(Paint, Status)>,
    #[serde(default)]
    decals: Vec<(Decal, Status)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    members: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    master: Option<usize>,
    /// Owned by a step that no longer exists. Nodes orphaned by the same
    /// step share a group number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    orphan_group: Option<usize>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Encode `model` as snapshot text.
///
/// # Errors
///
/// Returns [`PersistError::Json`] if serialization fails.
pub fn to_string(model: &Model, pretty: bool) -> Result<String, PersistError> {
    let snapshot = encode(model);
    let body = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    Ok(format!(
        "{SNAPSHOT_HEADER}\n{CHECKSUM_PREFIX}{}\n{body}\n",
        checksum(&body)
    ))
}

/// Decode snapshot text produced by [`to_string`].
///
/// # Errors
///
/// Returns [`PersistError`] if the header, checksum or body fail
/// verification.
pub fn from_str(text: &str) -> Result<Model, PersistError> {
    let body = verified_body(text)?;
    let snapshot: Snapshot = serde_json::from_str(body)?;
    decode(snapshot)
}

/// Write `model` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`PersistError::Write`] on I/O failure.
pub fn save(model: &Model, path: &Path, pretty: bool) -> Result<(), PersistError> {
    let text = to_string(model, pretty)?;
    let write_err = |source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, text).map_err(write_err)?;
    tracing::info!(
        model = %model.name(),
        steps = model.len(),
        path = %path.display(),
        "saved snapshot"
    );
    Ok(())
}

/// Read a model from `path`.
///
/// # Errors
///
/// Returns [`PersistError::Read`] on I/O failure, or any decoding error from
/// [`from_str`].
pub fn load(path: &Path) -> Result<Model, PersistError> {
    let text = std::fs::read_to_string(path).map_err(|source| PersistError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let model = from_str(&text)?;
    tracing::info!(
        model = %model.name(),
        steps = model.len(),
        path = %path.display(),
        "loaded snapshot"
    );
    Ok(model)
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// `blake3:<hex>` over `body`.
fn checksum(body: &str) -> String {
    format!("blake3:{}", blake3::hash(body.as_bytes()).to_hex())
}

fn verified_body(text: &str) -> Result<&str, PersistError> {
    let mut lines = text.splitn(3, '\n');

    let header = lines.next().unwrap_or_default();
    if header != SNAPSHOT_HEADER {
        return Err(PersistError::BadHeader(header.to_string()));
    }

    let checksum_line = lines.next().unwrap_or_default();
    let Some(expected) = checksum_line.strip_prefix(CHECKSUM_PREFIX) else {
        return Err(PersistError::BadHeader(checksum_line.to_string()));
    };

    let rest = lines.next().unwrap_or_default();
    let body = rest.strip_suffix('\n').unwrap_or(rest);
    let actual = checksum(body);
    if actual != expected {
        return Err(PersistError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(body)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

type NodeKey = *const RefCell<Node>;

/// Assigns each reachable node one table position.
#[derive(Default)]
struct Encoder {
    index: HashMap<NodeKey, usize>,
    order: Vec<NodeRef>,
    orphans: HashMap<NodeKey, usize>,
}

impl Encoder {
    fn visit(&mut self, node: &NodeRef) -> usize {
        if let Some(&i) = self.index.get(&Rc::as_ptr(node)) {
            return i;
        }
        let i = self.order.len();
        self.index.insert(Rc::as_ptr(node), i);
        self.order.push(Rc::clone(node));

        let (members, previous, link) = {
            let n = node.borrow();
            (n.members().to_vec(), n.previous().cloned(), n.master.clone())
        };
        let master = link.as_ref().and_then(Weak::upgrade);
        if let (Some(link), None) = (&link, &master) {
            let group = self.orphans.len();
            self.orphans.entry(link.as_ptr()).or_insert(group);
        }
        for member in &members {
            self.visit(member);
        }
        if let Some(previous) = previous {
            self.visit(&previous);
        }
        if let Some(master) = master {
            self.visit(&master);
        }
        i
    }

    fn position(&self, node: &NodeRef) -> usize {
        self.index[&Rc::as_ptr(node)]
    }

    fn record(&self, node: &NodeRef) -> NodeRecord {
        let n = node.borrow();
        let owner = n.master.as_ref().map(|link| (link, link.upgrade()));
        NodeRecord {
            kind: n.kind(),
            id: n.id.clone(),
            paints: n.paints.iter().map(|(k, s)| (k.clone(), s)).collect(),
            decals: n.decals.iter().map(|(k, s)| (k.clone(), s)).collect(),
            members: n.members().iter().map(|m| self.position(m)).collect(),
            previous: n.previous().map(|p| self.position(p)),
            master: owner
                .as_ref()
                .and_then(|(_, step)| step.as_ref().map(|s| self.position(s))),
            orphan_group: owner
                .as_ref()
                .filter(|(_, step)| step.is_none())
                .map(|(link, _)| self.orphans[&link.as_ptr()]),
        }
    }
}

fn encode(model: &Model) -> Snapshot {
    let mut encoder = Encoder::default();

    let steps = model.iter().map(|s| encoder.visit(s.node())).collect();
    let parts = model
        .parts()
        .iter()
        .map(|(id, p)| (id.clone(), encoder.visit(p.node())))
        .collect();
    let assemblies = model
        .assemblies()
        .iter()
        .map(|(id, a)| (id.clone(), encoder.visit(a.node())))
        .collect();

    let nodes = encoder.order.iter().map(|n| encoder.record(n)).collect();

    Snapshot {
        name: model.name().to_string(),
        nodes,
        steps,
        parts,
        assemblies,
        paints: model
            .paints()
            .iter()
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect(),
        decals: model.decals().clone(),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Check that `index` exists and names a node of an allowed kind.
fn check(
    records: &[NodeRecord],
    index: usize,
    allowed: &[Kind],
    expected: &'static str,
) -> Result<usize, PersistError> {
    let record = records.get(index).ok_or(PersistError::DanglingReference {
        index,
        len: records.len(),
    })?;
    if allowed.contains(&record.kind) {
        Ok(index)
    } else {
        Err(PersistError::KindMismatch {
            index,
            expected,
            found: record.kind,
        })
    }
}

/// Reject member graphs in which a node contains itself.
fn check_acyclic(records: &[NodeRecord]) -> Result<(), PersistError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        New,
        Open,
        Closed,
    }

    fn walk(records: &[NodeRecord], marks: &mut [Mark], i: usize) -> Result<(), PersistError> {
        match marks[i] {
            Mark::Closed => return Ok(()),
            Mark::Open => return Err(PersistError::MemberCycle { index: i }),
            Mark::New => {}
        }
        marks[i] = Mark::Open;
        for &m in &records[i].members {
            walk(records, marks, m)?;
        }
        marks[i] = Mark::Closed;
        Ok(())
    }

    let mut marks = vec![Mark::New; records.len()];
    for i in 0..records.len() {
        walk(records, &mut marks, i)?;
    }
    Ok(())
}

const MEMBER_KINDS: &[Kind] = &[Kind::Part, Kind::Assembly];

fn decode(snapshot: Snapshot) -> Result<Model, PersistError> {
    let records = &snapshot.nodes;

    // Pass 1: validate every reference before building anything.
    for (i, record) in records.iter().enumerate() {
        if record.kind == Kind::Part && !record.members.is_empty() {
            return Err(PersistError::KindMismatch {
                index: i,
                expected: "assembly or step",
                found: Kind::Part,
            });
        }
        if record.previous.is_some() && record.kind != Kind::Step {
            return Err(PersistError::KindMismatch {
                index: i,
                expected: "step",
                found: record.kind,
            });
        }
        for &m in &record.members {
            check(records, m, MEMBER_KINDS, "part or assembly")?;
        }
        if let Some(p) = record.previous {
            check(records, p, &[Kind::Step], "step")?;
        }
        if let Some(s) = record.master {
            check(records, s, &[Kind::Step], "step")?;
        }
    }
    check_acyclic(records)?;

    // Pass 2: one instance per record.
    let nodes: Vec<NodeRef> = records
        .iter()
        .map(|r| {
            Rc::new(RefCell::new(Node {
                id: r.id.clone(),
                paints: r.paints.iter().cloned().collect(),
                decals: r.decals.iter().cloned().collect(),
                master: None,
                shape: match r.kind {
                    Kind::Part => Shape::Part,
                    Kind::Assembly => Shape::Assembly {
                        members: Rc::new(Vec::new()),
                    },
                    Kind::Step => Shape::Step {
                        members: Rc::new(Vec::new()),
                        previous: None,
                    },
                },
            }))
        })
        .collect();

    // Pass 3: wire references.
    let mut orphan_links: HashMap<usize, NodeLink> = HashMap::new();
    for (record, node) in records.iter().zip(&nodes) {
        let members: Vec<NodeRef> = record.members.iter().map(|&m| Rc::clone(&nodes[m])).collect();
        let previous = record.previous.map(|p| Rc::clone(&nodes[p]));
        let master = match (record.master, record.orphan_group) {
            (Some(s), _) => Some(Rc::downgrade(&nodes[s])),
            (None, Some(group)) => Some(Weak::clone(
                orphan_links.entry(group).or_insert_with(dead_link),
            )),
            (None, None) => None,
        };

        let mut n = node.borrow_mut();
        match &mut n.shape {
            Shape::Part => {}
            Shape::Assembly { members: list } => *list = Rc::new(members),
            Shape::Step {
                members: list,
                previous: prev,
            } => {
                *list = Rc::new(members);
                *prev = previous;
            }
        }
        n.master = master;
    }

    let steps = snapshot
        .steps
        .iter()
        .map(|&i| check(records, i, &[Kind::Step], "step").map(|i| Step::from_node(Rc::clone(&nodes[i]))))
        .collect::<Result<Vec<_>, _>>()?;
    let parts = snapshot
        .parts
        .iter()
        .map(|(id, &i)| {
            check(records, i, &[Kind::Part], "part")
                .map(|i| (id.clone(), Part::from_node(Rc::clone(&nodes[i]))))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    let assemblies = snapshot
        .assemblies
        .iter()
        .map(|(id, &i)| {
            check(records, i, &[Kind::Assembly], "assembly")
                .map(|i| (id.clone(), Assembly::from_node(Rc::clone(&nodes[i]))))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    Ok(Model::from_raw(
        snapshot.name,
        steps,
        parts,
        assemblies,
        snapshot.paints.into_iter().collect(),
        snapshot.decals,
    ))
}

/// A link to a step that no longer exists, distinct from every other link.
fn dead_link() -> NodeLink {
    let gone = Rc::new(RefCell::new(Node::part(
        String::new(),
        PaintMap::new(),
        DecalMap::new(),
    )));
    Rc::downgrade(&gone)
}
