use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Index of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Literal(char),
    Sequence(Vec<NodeId>),
    Alternative(Vec<NodeId>),
    Branch(Vec<NodeId>),
    Repeat(NodeId),
    /// `number` is `None` for `(?:...)`.
    Group {
        number: Option<u8>,
        children: Vec<NodeId>,
    },
    /// `(?N)`
    GroupRef(u8),
    /// `\N`
    StringRef(u8),
}

impl NodeKind {
    pub fn children(&self) -> &[NodeId] {
        match self {
            NodeKind::Sequence(children)
            | NodeKind::Alternative(children)
            | NodeKind::Branch(children)
            | NodeKind::Group { children, .. } => children,
            NodeKind::Repeat(child) => std::slice::from_ref(child),
            NodeKind::Literal(_) | NodeKind::GroupRef(_) | NodeKind::StringRef(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Non-owning link used for upward queries; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Character index where the construct starts in the source pattern.
    pub position: usize,
}

/// Parsed pattern: an arena of nodes rooted at a `Sequence`, plus the table
/// of capturing groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    groups: BTreeMap<u8, NodeId>,
}

impl Tree {
    pub(crate) fn new() -> Self {
        let root = Node {
            kind: NodeKind::Sequence(Vec::new()),
            parent: None,
            position: 0,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            groups: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kind(self.root).children().is_empty()
    }

    /// Capturing groups by number, each mapped to its `Group` node.
    pub fn groups(&self) -> &BTreeMap<u8, NodeId> {
        &self.groups
    }

    pub fn group(&self, number: u8) -> Option<NodeId> {
        self.groups.get(&number).copied()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// All node ids in creation order, which follows the scan order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Walks from the parent of `id` up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&current| self.parent(current))
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    pub(crate) fn push(&mut self, kind: NodeKind, parent: NodeId, position: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            position,
        });
        id
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        self.nodes[id.0].parent = Some(parent);
    }

    pub(crate) fn children_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Sequence(children)
            | NodeKind::Alternative(children)
            | NodeKind::Branch(children)
            | NodeKind::Group { children, .. } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn register_group(&mut self, number: u8, id: NodeId) {
        self.groups.insert(number, id);
    }
}

enum Emit {
    Node(NodeId),
    Text(&'static str),
}

/// Renders the canonical pattern text. Uses an explicit stack, so nesting
/// depth is bounded by memory only.
impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Emit::Node(self.root)];
        while let Some(item) = stack.pop() {
            let id = match item {
                Emit::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Emit::Node(id) => id,
            };
            match self.kind(id) {
                NodeKind::Literal(c) => write!(f, "{}", c)?,
                NodeKind::Sequence(children) | NodeKind::Branch(children) => {
                    stack.extend(children.iter().rev().map(|c| Emit::Node(*c)));
                }
                NodeKind::Alternative(branches) => {
                    for (i, branch) in branches.iter().enumerate().rev() {
                        stack.push(Emit::Node(*branch));
                        if i > 0 {
                            stack.push(Emit::Text("|"));
                        }
                    }
                }
                NodeKind::Repeat(child) => {
                    stack.push(Emit::Text("*"));
                    stack.push(Emit::Node(*child));
                }
                NodeKind::Group { number, children } => {
                    f.write_str(if number.is_some() { "(" } else { "(?:" })?;
                    stack.push(Emit::Text(")"));
                    stack.extend(children.iter().rev().map(|c| Emit::Node(*c)));
                }
                NodeKind::GroupRef(n) => write!(f, "(?{})", n)?,
                NodeKind::StringRef(n) => write!(f, "\\{}", n)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{NodeKind, Tree};

    #[test]
    fn test_build_and_render() {
        let mut tree = Tree::new();
        let root = tree.root();
        let group = tree.push(
            NodeKind::Group {
                number: Some(1),
                children: vec![],
            },
            root,
            0,
        );
        let a = tree.push(NodeKind::Literal('a'), group, 1);
        tree.children_mut(group).unwrap().push(a);
        tree.register_group(1, group);
        let r = tree.push(NodeKind::StringRef(1), root, 3);
        tree.children_mut(root).unwrap().extend([group, r]);

        assert_eq!(tree.to_string(), r"(a)\1");
        assert_eq!(tree.group(1), Some(group));
        assert_eq!(tree.ancestors(a).collect::<Vec<_>>(), vec![group, root]);
        assert!(tree.is_descendant_of(a, root));
        assert!(!tree.is_descendant_of(r, group));
    }

    #[test]
    fn test_render_deep_nesting() {
        let depth = 100_000;
        let pattern = format!("{}a{}", "(?:".repeat(depth), ")".repeat(depth));
        let tree = crate::parser::parse_from_str(&pattern).unwrap();
        assert_eq!(tree.len(), depth + 2);
        assert_eq!(tree.to_string(), pattern);
    }

    #[test]
    fn test_render_alternation_and_repeat() {
        let pattern = r"(a|bc|)*(?:d(?1)|\1)";
        let tree = crate::parser::parse_from_str(pattern).unwrap();
        assert_eq!(tree.to_string(), pattern);
    }

    #[test]
    fn test_empty_tree() {
        let tree = Tree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.to_string(), "");
        assert_eq!(tree.group_count(), 0);
    }
}
