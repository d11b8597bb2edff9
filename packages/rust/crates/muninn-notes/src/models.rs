//! Shared models for document parsing, caching and backlink lookup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Node type tag. Serialized with mdast names (`listItem`, `inlineCode`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Root,
    Paragraph,
    Heading,
    Text,
    Emphasis,
    Strong,
    Delete,
    InlineCode,
    Code,
    Html,
    Link,
    Image,
    List,
    ListItem,
    Blockquote,
    ThematicBreak,
    Break,
    Table,
    TableRow,
    TableCell,
    FootnoteDefinition,
    FootnoteReference,
    /// Any tag this build does not know about.
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    /// Nodes whose `url` points at another document.
    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Link | Self::Image)
    }

    /// Block-level containers used as display context around a reference.
    #[must_use]
    pub const fn is_context_block(self) -> bool {
        matches!(
            self,
            Self::Paragraph | Self::Heading | Self::TableCell | Self::ListItem | Self::Blockquote
        )
    }
}

/// One-based line/column in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based).
    pub column: usize,
}

/// Source span of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// First character of the node.
    pub start: Point,
    /// Last character of the node.
    pub end: Point,
}

/// One node of a parsed document tree.
///
/// `id` is the positional handle assigned at parse time and is carried
/// verbatim through the cache snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node type tag.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Positional identifier (`""` for the root, `"0-2-1"` below it).
    #[serde(default)]
    pub id: String,
    /// Ordered child nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    /// Literal text for text/code/html nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Raw reference target for links and images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Reference title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Fenced code info string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Heading level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u8>,
    /// Source span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    /// Empty node of the given kind.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            id: String::new(),
            children: Vec::new(),
            value: None,
            url: None,
            title: None,
            lang: None,
            depth: None,
            position: None,
        }
    }

    /// Builder: set the literal value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Builder: set the reference target.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Builder: append children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Concatenated text of this node and its descendants.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self.kind {
            NodeKind::Text | NodeKind::InlineCode => {
                if let Some(value) = &self.value {
                    out.push_str(value);
                }
            }
            NodeKind::Break => out.push('\n'),
            _ => {}
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

/// Rooted, owned document tree. Holds no upward links, so it serializes as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentTree {
    root: Node,
}

impl DocumentTree {
    /// Wrap an already identified root node.
    #[must_use]
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    /// Root node.
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Cursor positioned at the root.
    #[must_use]
    pub fn cursor(&self) -> NodeRef<'_> {
        NodeRef {
            root: &self.root,
            path: Vec::new(),
        }
    }

    /// Node addressed by child indices from the root.
    #[must_use]
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(&self.root, |node, index| node.children.get(*index))
    }
}

/// Borrowed position inside a tree: "node at path P".
///
/// The parent of P is the node at P minus its last segment, so upward
/// navigation needs no back-pointers on the tree. Cursors live only for the
/// duration of one traversal.
#[derive(Debug, Clone)]
pub struct NodeRef<'t> {
    root: &'t Node,
    path: Vec<usize>,
}

impl<'t> NodeRef<'t> {
    /// Node under the cursor.
    #[must_use]
    pub fn node(&self) -> &'t Node {
        let mut node = self.root;
        for index in &self.path {
            match node.children.get(*index) {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    /// Child-index path from the root.
    #[must_use]
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Cursor at the `index`-th child.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<Self> {
        self.node().children.get(index)?;
        let mut path = self.path.clone();
        path.push(index);
        Some(Self {
            root: self.root,
            path,
        })
    }

    /// Cursor at the enclosing node; `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, parent_path) = self.path.split_last()?;
        Some(Self {
            root: self.root,
            path: parent_path.to_vec(),
        })
    }

    /// Enclosing nodes from the nearest outwards.
    pub fn ancestors(&self) -> impl Iterator<Item = &'t Node> + '_ {
        (0..self.path.len()).rev().filter_map(move |depth| {
            self.path[..depth]
                .iter()
                .try_fold(self.root, |node, index| node.children.get(*index))
        })
    }
}

/// File modification timestamp, split the way `SystemTime` stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModTime {
    /// Seconds since `UNIX_EPOCH`.
    pub secs: u64,
    /// Sub-second nanoseconds.
    pub nanos: u32,
}

impl ModTime {
    /// Convert a filesystem timestamp; `None` before the epoch.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let duration = time.duration_since(UNIX_EPOCH).ok()?;
        Some(Self {
            secs: duration.as_secs(),
            nanos: duration.subsec_nanos(),
        })
    }
}

/// Cached payload of one document: what a parse produced for one mtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Modification time the content was read at; `None` is always stale.
    #[serde(default)]
    pub mod_time: Option<ModTime>,
    /// Raw document text.
    pub content: String,
    /// Parsed tree.
    pub tree: DocumentTree,
}

/// One scanned document. Replaced wholesale when its file changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    relative_path: String,
    absolute_path: PathBuf,
    parsed: Arc<ParsedDocument>,
}

impl Document {
    /// Assemble a document from its paths and shared parse result.
    #[must_use]
    pub fn new(
        relative_path: impl Into<String>,
        absolute_path: impl Into<PathBuf>,
        parsed: Arc<ParsedDocument>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            absolute_path: absolute_path.into(),
            parsed,
        }
    }

    /// Path relative to the scan root, `/`-separated.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Absolute path; also the cache key.
    #[must_use]
    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    /// Modification time the content was read at.
    #[must_use]
    pub fn mod_time(&self) -> Option<ModTime> {
        self.parsed.mod_time
    }

    /// Raw text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.parsed.content
    }

    /// Parsed tree (read-only).
    #[must_use]
    pub fn tree(&self) -> &DocumentTree {
        &self.parsed.tree
    }
}

/// Scan result: relative path -> document, ordered by path.
pub type DocumentMap = BTreeMap<String, Document>;
