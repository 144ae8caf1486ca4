//! Tree Index
//!
//! Id-keyed arena of `DocumentNode`s mirroring the metadata store. Parent and
//! child links are ids resolved through the arena, so the index owns every
//! node and no node owns another.

use crate::error::{DocumentError, DocumentResult};
use crate::store::{DocumentRecord, MetadataStore};
use crate::tree::node::DocumentNode;
use crate::types::{DocumentId, PATH_SEPARATOR, ROOT_ID};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TreeIndex {
    nodes: HashMap<DocumentId, DocumentNode>,
}

impl TreeIndex {
    /// Load records from the store and link them into a tree
    ///
    /// With `include_versions` false, version records stay out of the index.
    pub fn initialize(
        store: &dyn MetadataStore,
        include_versions: bool,
    ) -> DocumentResult<Self> {
        let records = if include_versions {
            store.find_all()?
        } else {
            store.find_all_without_versions()?
        };
        let index = Self::build(records)?;
        info!(
            nodes = index.len(),
            include_versions, "Document tree index built"
        );
        Ok(index)
    }

    /// Link flat records into a tree
    ///
    /// Children are linked in ascending id order. Fails if the root is
    /// missing, a parent does not resolve, or a record is unreachable from
    /// the root.
    pub fn build(records: Vec<DocumentRecord>) -> DocumentResult<Self> {
        let mut nodes: HashMap<DocumentId, DocumentNode> = records
            .into_iter()
            .map(|record| (record.id, DocumentNode::from(record)))
            .collect();

        match nodes.get(&ROOT_ID) {
            Some(root) if root.parent_id.is_none() && root.is_folder => {}
            Some(_) => {
                return Err(DocumentError::Corrupt(
                    "root record has a parent or is not a folder".to_string(),
                ))
            }
            None => return Err(DocumentError::Corrupt("root record missing".to_string())),
        }

        let mut ids: Vec<DocumentId> = nodes.keys().copied().filter(|id| *id != ROOT_ID).collect();
        ids.sort_unstable();

        for id in &ids {
            let parent_id = nodes[id].parent_id.ok_or_else(|| {
                DocumentError::Corrupt(format!("document {} has no parent", id))
            })?;
            match nodes.get_mut(&parent_id) {
                Some(parent) if parent.is_folder => parent.children.push(*id),
                Some(_) => {
                    return Err(DocumentError::Corrupt(format!(
                        "parent {} of document {} is not a folder",
                        parent_id, id
                    )))
                }
                None => {
                    return Err(DocumentError::Corrupt(format!(
                        "parent {} of document {} does not exist",
                        parent_id, id
                    )))
                }
            }
        }

        let index = Self { nodes };
        let reachable = index.count_reachable(ROOT_ID);
        if reachable != index.nodes.len() {
            return Err(DocumentError::Corrupt(format!(
                "{} documents are not reachable from the root",
                index.nodes.len() - reachable
            )));
        }
        Ok(index)
    }

    fn count_reachable(&self, from: DocumentId) -> usize {
        let mut count = 0;
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                count += 1;
                stack.extend(node.children.iter().copied());
            }
        }
        count
    }

    pub fn root(&self) -> &DocumentNode {
        // build() refuses to produce an index without the root
        &self.nodes[&ROOT_ID]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DocumentNode> {
        self.nodes.values()
    }

    pub fn resolve_by_id(&self, id: DocumentId) -> Option<&DocumentNode> {
        self.nodes.get(&id)
    }

    /// Resolve a `/`-separated path from the root
    ///
    /// Every segment but the last must name a folder. A trailing separator
    /// is ignored.
    pub fn resolve_by_path(&self, path: &str) -> Option<&DocumentNode> {
        let path = path
            .strip_prefix(PATH_SEPARATOR)
            .unwrap_or(path)
            .trim_end_matches(PATH_SEPARATOR);
        if path.is_empty() {
            return Some(self.root());
        }

        let mut current = self.root();
        for segment in path.split(PATH_SEPARATOR) {
            if !current.is_folder {
                return None;
            }
            current = self.child_by_name(current, segment)?;
        }
        Some(current)
    }

    pub fn child_by_name(&self, node: &DocumentNode, name: &str) -> Option<&DocumentNode> {
        node.children
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find(|child| child.name == name)
    }

    pub fn children_of(&self, id: DocumentId) -> impl Iterator<Item = &DocumentNode> {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .filter_map(|child| self.nodes.get(child))
    }

    /// Full path of a node; `/` for the root
    pub fn path_of(&self, id: DocumentId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = self.nodes.get(&id)?;
        // Bounded walk: a well-formed tree is never deeper than its node count
        for _ in 0..=self.nodes.len() {
            if current.is_root() {
                segments.reverse();
                return Some(format!("/{}", segments.join("/")));
            }
            segments.push(current.name.as_str());
            current = self.nodes.get(&current.parent_id?)?;
        }
        None
    }

    /// Every non-root node whose path contains `fragment`, ignoring case
    pub fn find_by_fuzzy_path<'a>(
        &'a self,
        fragment: &str,
        include_versions: bool,
    ) -> impl Iterator<Item = &'a DocumentNode> + 'a {
        let needle = fragment.to_lowercase();
        self.nodes.values().filter(move |node| {
            if node.is_root() || (node.is_version && !include_versions) {
                return false;
            }
            self.path_of(node.id)
                .map(|path| path.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
    }

    /// Add a node under its parent
    pub fn insert(&mut self, node: DocumentNode) -> DocumentResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(DocumentError::Corrupt(format!(
                "document {} is already indexed",
                node.id
            )));
        }
        let parent_id = node
            .parent_id
            .ok_or_else(|| DocumentError::Corrupt(format!("document {} has no parent", node.id)))?;
        let parent = self
            .nodes
            .get_mut(&parent_id)
            .ok_or_else(|| DocumentError::not_found_id(parent_id))?;
        parent.children.push(node.id);
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Mirror an updated record into its node; false if the node is not indexed
    pub fn update(&mut self, record: &DocumentRecord) -> bool {
        match self.nodes.get_mut(&record.id) {
            Some(node) => {
                node.apply_record(record);
                true
            }
            None => false,
        }
    }

    /// Detach a node from its parent and drop it from the arena
    ///
    /// Descendants are left in place; the root is never removed.
    pub fn remove(&mut self, id: DocumentId) -> Option<DocumentNode> {
        if id == ROOT_ID {
            return None;
        }
        let node = self.nodes.remove(&id)?;
        if let Some(parent) = node.parent_id.and_then(|pid| self.nodes.get_mut(&pid)) {
            parent.children.retain(|child| *child != id);
        }
        Some(node)
    }
}
