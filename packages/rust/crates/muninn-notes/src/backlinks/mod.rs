//! Backlink index: which documents reference a given one.
//!
//! Derived on demand from a published [`DocumentMap`]; nothing here is
//! stored or mutates the map.

mod paths;

use serde::Serialize;

use crate::models::{Document, DocumentMap, Node, NodeRef};

pub use self::paths::{ResolveOptions, normalize_relative_path, resolve_reference};

/// One reference node found in a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backlink {
    /// Root-relative path of the referencing document.
    pub source: String,
    /// The link/image node itself.
    pub node: Node,
    /// Nearest enclosing block (paragraph, heading, list item, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Node>,
}

/// All backlinks from one source document, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BacklinkGroup {
    /// Root-relative path of the referencing document.
    pub source: String,
    /// References, first encountered first.
    pub backlinks: Vec<Backlink>,
}

/// Read-only backlink queries over one scan result.
#[derive(Debug, Clone, Copy)]
pub struct BacklinkIndex<'m> {
    documents: &'m DocumentMap,
    options: ResolveOptions,
}

impl<'m> BacklinkIndex<'m> {
    /// Index over `documents` with default resolution.
    #[must_use]
    pub fn new(documents: &'m DocumentMap) -> Self {
        Self {
            documents,
            options: ResolveOptions::default(),
        }
    }

    /// Override reference resolution.
    #[must_use]
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Backlinks to `target`, grouped by source path ascending.
    ///
    /// Empty when nothing references the target, the target is unknown or
    /// the mapping is empty.
    #[must_use]
    pub fn find(&self, target: &str) -> Vec<BacklinkGroup> {
        let Some(target) = normalize_relative_path(target) else {
            return Vec::new();
        };
        // BTreeMap iteration is already ordered by source path.
        self.documents
            .iter()
            .filter(|(source, _)| **source != target)
            .filter_map(|(source, doc)| {
                let backlinks = self.references_in(source, doc, &target);
                if backlinks.is_empty() {
                    None
                } else {
                    Some(BacklinkGroup {
                        source: source.clone(),
                        backlinks,
                    })
                }
            })
            .collect()
    }

    /// Depth-first walk of one tree, collecting references that resolve to `target`.
    fn references_in(&self, source: &str, doc: &Document, target: &str) -> Vec<Backlink> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef<'_>> = vec![doc.tree().cursor()];
        while let Some(cursor) = stack.pop() {
            let node = cursor.node();
            if node.kind.is_reference()
                && let Some(url) = node.url.as_deref()
                && resolve_reference(url, source, self.options).as_deref() == Some(target)
            {
                out.push(Backlink {
                    source: source.to_string(),
                    node: node.clone(),
                    context: cursor
                        .ancestors()
                        .find(|ancestor| ancestor.kind.is_context_block())
                        .cloned(),
                });
            }
            // Reverse so the first child is visited first.
            for index in (0..node.children.len()).rev() {
                if let Some(child) = cursor.child(index) {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Flatten groups into the ordered `(source, node)` sequence.
    #[must_use]
    pub fn flatten(groups: Vec<BacklinkGroup>) -> Vec<Backlink> {
        groups.into_iter().flat_map(|group| group.backlinks).collect()
    }
}

/// Convenience wrapper around [`BacklinkIndex::find`].
#[must_use]
pub fn find_backlinks(
    target: &str,
    documents: &DocumentMap,
    options: ResolveOptions,
) -> Vec<BacklinkGroup> {
    BacklinkIndex::new(documents).with_options(options).find(target)
}
