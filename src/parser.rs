use crate::alphabet::Alphabet;
use crate::ast::{NodeId, NodeKind, Tree};
use crate::error::Error;

/// Highest capturing group number a pattern may declare.
pub const MAX_GROUPS: u8 = 9;

/// Single-pass parser for the pattern grammar.
///
/// The parser walks the pattern once, left to right, keeping a stack of the
/// nodes that are currently open (the root sequence, groups, and alternation
/// branches). New nodes are appended to whatever sits on top of that stack.
pub struct Parser<'a> {
    alphabet: &'a Alphabet,
    chars: Vec<char>,
    pos: usize,
    tree: Tree,
    open: Vec<NodeId>,
    depth: usize,
    group_count: u8,
    max_expr_ref: u8,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given pattern.
    pub fn new(alphabet: &'a Alphabet, pattern: &str) -> Self {
        let tree = Tree::new();
        let root = tree.root();
        Self {
            alphabet,
            chars: pattern.chars().collect(),
            pos: 0,
            tree,
            open: vec![root],
            depth: 0,
            group_count: 0,
            max_expr_ref: 0,
        }
    }

    /// Entry point: consume the whole pattern and return the finished tree.
    ///
    /// Examples:
    /// - `a|b`     → Sequence[Alternative[Branch[a], Branch[b]]]
    /// - `(a)*\1`  → Sequence[Repeat(Group 1[a]), StringRef(1)]
    pub fn parse(mut self) -> Result<Tree, Error> {
        while let Some(ch) = self.char_at(self.pos)? {
            let start = self.pos;
            match ch {
                '*' => self.parse_star(start)?,
                '|' => self.parse_bar(start)?,
                '(' => self.parse_open(start)?,
                ')' => self.parse_close(start)?,
                '\\' => self.parse_string_ref(start)?,
                c if self.alphabet.is_letter(c) => {
                    self.append(NodeKind::Literal(c), start);
                    self.pos += 1;
                }
                c => return Err(Error::UnexpectedChar { ch: c, index: start }),
            }
        }
        self.finish()
    }

    /// Character at `index`, checked against the alphabet.
    fn char_at(&self, index: usize) -> Result<Option<char>, Error> {
        match self.chars.get(index) {
            Some(&ch) if !self.alphabet.contains(ch) => Err(Error::InvalidChar { ch, index }),
            other => Ok(other.copied()),
        }
    }

    fn current(&self) -> NodeId {
        // The root is pushed first and never popped.
        self.open[self.open.len() - 1]
    }

    fn append(&mut self, kind: NodeKind, position: usize) -> NodeId {
        let parent = self.current();
        let id = self.tree.push(kind, parent, position);
        if let Some(children) = self.tree.children_mut(parent) {
            children.push(id);
        }
        id
    }

    /// `*` rewraps the last child of the current node into a `Repeat`.
    fn parse_star(&mut self, start: usize) -> Result<(), Error> {
        let follows_atom = start > 0 && {
            let prev = self.chars[start - 1];
            prev == ')' || self.alphabet.is_letter(prev)
        };
        if !follows_atom {
            return Err(Error::MisplacedStar { index: start });
        }

        let current = self.current();
        let last = self
            .tree
            .kind(current)
            .children()
            .last()
            .copied()
            .ok_or(Error::MisplacedStar { index: start })?;
        let position = self.tree.node(last).position;
        let repeat = self.tree.push(NodeKind::Repeat(last), current, position);
        self.tree.set_parent(last, repeat);
        if let Some(slot) = self.tree.children_mut(current).and_then(|c| c.last_mut()) {
            *slot = repeat;
        }

        self.pos += 1;
        Ok(())
    }

    /// `|` either starts an alternation in the current node or moves on to
    /// the next branch of the one in progress.
    fn parse_bar(&mut self, start: usize) -> Result<(), Error> {
        if start == 0 || start + 1 == self.chars.len() {
            return Err(Error::MisplacedBar { index: start });
        }

        let alternative = match self.close_branch() {
            Some(branch) => self.tree.parent(branch).unwrap_or(self.tree.root()),
            None => self.start_alternative(start),
        };

        let branch = self
            .tree
            .push(NodeKind::Branch(Vec::new()), alternative, start + 1);
        self.open.push(branch);

        self.pos += 1;
        Ok(())
    }

    /// Moves the children of the current node into the first branch of a new
    /// `Alternative`, which becomes the current node's only child.
    fn start_alternative(&mut self, start: usize) -> NodeId {
        let current = self.current();
        let moved = self
            .tree
            .children_mut(current)
            .map(std::mem::take)
            .unwrap_or_default();
        let position = moved
            .first()
            .map(|id| self.tree.node(*id).position)
            .unwrap_or(start);

        let alternative = self
            .tree
            .push(NodeKind::Alternative(Vec::new()), current, position);
        let first = self.tree.push(NodeKind::Branch(Vec::new()), alternative, position);
        for child in &moved {
            self.tree.set_parent(*child, first);
        }
        if let Some(children) = self.tree.children_mut(first) {
            *children = moved;
        }
        if let Some(branches) = self.tree.children_mut(alternative) {
            branches.push(first);
        }
        if let Some(children) = self.tree.children_mut(current) {
            children.push(alternative);
        }
        alternative
    }

    /// Pops a dangling `Branch` off the open stack and attaches it to its
    /// `Alternative`. Returns the closed branch, if there was one.
    fn close_branch(&mut self) -> Option<NodeId> {
        let top = self.current();
        if !matches!(self.tree.kind(top), NodeKind::Branch(_)) {
            return None;
        }
        self.open.pop();
        if let Some(alternative) = self.tree.parent(top) {
            if let Some(branches) = self.tree.children_mut(alternative) {
                if !branches.contains(&top) {
                    branches.push(top);
                }
            }
        }
        Some(top)
    }

    /// `(`, `(?:` and `(?N)`.
    fn parse_open(&mut self, start: usize) -> Result<(), Error> {
        if self.char_at(start + 1)? != Some('?') {
            if self.group_count == MAX_GROUPS {
                return Err(Error::TooManyGroups { index: start });
            }
            self.group_count += 1;
            self.open_group(Some(self.group_count), start);
            self.pos = start + 1;
            return Ok(());
        }

        match self.char_at(start + 2)? {
            Some(':') => {
                self.open_group(None, start);
                self.pos = start + 3;
                Ok(())
            }
            Some(ch) => {
                let group = self
                    .alphabet
                    .digit_value(ch)
                    .ok_or(Error::UnexpectedChar { ch, index: start + 2 })?;
                match self.char_at(start + 3)? {
                    Some(')') => {
                        self.max_expr_ref = self.max_expr_ref.max(group);
                        self.append(NodeKind::GroupRef(group), start);
                        self.pos = start + 4;
                        Ok(())
                    }
                    Some(ch) => Err(Error::UnexpectedChar {
                        ch,
                        index: start + 3,
                    }),
                    None => Err(Error::UnexpectedEnd { index: start + 3 }),
                }
            }
            None => Err(Error::UnexpectedEnd { index: start + 2 }),
        }
    }

    fn open_group(&mut self, number: Option<u8>, start: usize) {
        self.depth += 1;
        let group = self.append(
            NodeKind::Group {
                number,
                children: Vec::new(),
            },
            start,
        );
        self.open.push(group);
    }

    fn parse_close(&mut self, start: usize) -> Result<(), Error> {
        if self.depth == 0 {
            return Err(Error::UnmatchedClose { index: start });
        }
        self.depth -= 1;
        self.close_branch();

        if let Some(group) = self.open.pop() {
            if let NodeKind::Group {
                number: Some(number),
                ..
            } = self.tree.kind(group)
            {
                let number = *number;
                self.tree.register_group(number, group);
            }
        }

        self.pos += 1;
        Ok(())
    }

    /// `\N`: N must already have been opened at this point of the scan.
    fn parse_string_ref(&mut self, start: usize) -> Result<(), Error> {
        let ch = self
            .char_at(start + 1)?
            .ok_or(Error::UnexpectedEnd { index: start + 1 })?;
        let group = self
            .alphabet
            .digit_value(ch)
            .ok_or(Error::UnexpectedChar { ch, index: start + 1 })?;
        if group > self.group_count {
            return Err(Error::UndeclaredGroup {
                group,
                index: start,
            });
        }
        self.append(NodeKind::StringRef(group), start);
        self.pos = start + 2;
        Ok(())
    }

    fn finish(mut self) -> Result<Tree, Error> {
        if self.depth != 0 {
            return Err(Error::Unclosed { count: self.depth });
        }
        self.close_branch();
        if self.max_expr_ref > self.group_count {
            return Err(Error::UnknownGroup {
                group: self.max_expr_ref,
                count: self.group_count,
            });
        }
        Ok(self.tree)
    }
}

/// Parse a pattern with a fresh alphabet.
pub fn parse_from_str(pattern: &str) -> Result<Tree, Error> {
    let alphabet = Alphabet::new();
    Parser::new(&alphabet, pattern).parse()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::ast::{NodeKind, Tree};
    use crate::error::Error;

    use super::parse_from_str;

    fn root_kinds(tree: &Tree) -> Vec<NodeKind> {
        tree.kind(tree.root())
            .children()
            .iter()
            .map(|id| tree.kind(*id).clone())
            .collect()
    }

    #[test]
    fn test_parse_literals() {
        let tree = parse_from_str("ab").unwrap();
        assert_eq!(
            root_kinds(&tree),
            vec![NodeKind::Literal('a'), NodeKind::Literal('b')]
        );
        assert!(tree.groups().is_empty());
    }

    #[test]
    fn test_parse_empty() {
        let tree = parse_from_str("").unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_parse_alternation_in_group() {
        let tree = parse_from_str("(aa|bb)(?1)").unwrap();
        let root_children = tree.kind(tree.root()).children().to_vec();
        assert_eq!(root_children.len(), 2);

        let group = root_children[0];
        assert_eq!(tree.group(1), Some(group));
        let NodeKind::Group { number, children } = tree.kind(group) else {
            panic!("expected group, got {:?}", tree.kind(group));
        };
        assert_eq!(*number, Some(1));
        assert_eq!(children.len(), 1);

        let alternative = children[0];
        let branches = tree.kind(alternative).children();
        assert_eq!(branches.len(), 2);
        for branch in branches {
            assert!(matches!(tree.kind(*branch), NodeKind::Branch(c) if c.len() == 2));
            assert_eq!(tree.parent(*branch), Some(alternative));
        }

        assert_eq!(tree.kind(root_children[1]), &NodeKind::GroupRef(1));
        assert_eq!(tree.to_string(), "(aa|bb)(?1)");
    }

    #[test]
    fn test_parse_top_level_alternation() {
        let tree = parse_from_str("ab|c|d").unwrap();
        let root_children = tree.kind(tree.root()).children();
        assert_eq!(root_children.len(), 1);
        let alternative = root_children[0];
        assert_eq!(tree.kind(alternative).children().len(), 3);
        assert_eq!(tree.to_string(), "ab|c|d");
    }

    #[test]
    fn test_parse_star_rewraps_last_child() {
        let tree = parse_from_str("a(b)*c*").unwrap();
        let kinds = root_kinds(&tree);
        assert_eq!(kinds.len(), 3);
        let NodeKind::Repeat(group) = &kinds[1] else {
            panic!("expected repeat, got {:?}", kinds[1]);
        };
        let group = *group;
        assert!(matches!(tree.kind(group), NodeKind::Group { number: Some(1), .. }));
        assert!(matches!(tree.kind(tree.parent(group).unwrap()), NodeKind::Repeat(_)));
        assert!(matches!(kinds[2], NodeKind::Repeat(_)));
        assert_eq!(tree.to_string(), "a(b)*c*");
    }

    #[test]
    fn test_parse_non_capturing_group() {
        let tree = parse_from_str("(?:a|b)(c)").unwrap();
        assert_eq!(tree.group_count(), 1);
        let group = tree.group(1).unwrap();
        assert_eq!(tree.node(group).position, 7);
        assert_eq!(tree.to_string(), "(?:a|b)(c)");
    }

    #[test]
    fn test_groups_numbered_by_opening_parenthesis() {
        let tree = parse_from_str("((a)(b))").unwrap();
        let outer = tree.group(1).unwrap();
        let second = tree.group(2).unwrap();
        let third = tree.group(3).unwrap();
        assert_eq!(tree.node(outer).position, 0);
        assert_eq!(tree.node(second).position, 1);
        assert_eq!(tree.node(third).position, 4);
        assert!(tree.is_descendant_of(third, outer));
    }

    #[test]
    fn test_expression_reference_may_point_forward() {
        let tree = parse_from_str("(?2)(a)(b)").unwrap();
        assert_eq!(tree.group_count(), 2);
        assert_eq!(
            parse_from_str("(?3)(a)(b)"),
            Err(Error::UnknownGroup { group: 3, count: 2 })
        );
    }

    #[test]
    fn test_self_expression_reference() {
        assert!(parse_from_str("(a(?1)*)").is_ok());
    }

    #[test]
    fn test_lexical_errors() {
        assert_eq!(
            parse_from_str("abC"),
            Err(Error::InvalidChar { ch: 'C', index: 2 })
        );
        assert_eq!(
            parse_from_str("(?0)"),
            Err(Error::InvalidChar { ch: '0', index: 2 })
        );
    }

    #[test]
    fn test_star_placement() {
        assert_eq!(parse_from_str("*a"), Err(Error::MisplacedStar { index: 0 }));
        assert_eq!(parse_from_str("a**"), Err(Error::MisplacedStar { index: 2 }));
        assert_eq!(parse_from_str("(*a)"), Err(Error::MisplacedStar { index: 1 }));
        assert_eq!(parse_from_str("a|*"), Err(Error::MisplacedStar { index: 2 }));
        assert_eq!(parse_from_str(r"(a)\1*"), Err(Error::MisplacedStar { index: 5 }));
    }

    #[test]
    fn test_bar_placement() {
        assert_eq!(parse_from_str("|a"), Err(Error::MisplacedBar { index: 0 }));
        assert_eq!(parse_from_str("a|"), Err(Error::MisplacedBar { index: 1 }));
        assert!(parse_from_str("(a|)").is_ok());
    }

    #[test]
    fn test_parentheses_balance() {
        assert_eq!(
            parse_from_str("(aa)b))a)"),
            Err(Error::UnmatchedClose { index: 5 })
        );
        assert_eq!(parse_from_str("((a)"), Err(Error::Unclosed { count: 1 }));
    }

    #[test]
    fn test_string_reference_must_be_opened_already() {
        assert_eq!(
            parse_from_str(r"\1(a)"),
            Err(Error::UndeclaredGroup { group: 1, index: 0 })
        );
        assert!(parse_from_str(r"(a\1)").is_ok());
        assert_eq!(parse_from_str(r"a\"), Err(Error::UnexpectedEnd { index: 2 }));
        assert_eq!(
            parse_from_str(r"(a)\a"),
            Err(Error::UnexpectedChar { ch: 'a', index: 4 })
        );
    }

    #[test]
    fn test_malformed_question_constructs() {
        assert_eq!(parse_from_str("(?"), Err(Error::UnexpectedEnd { index: 2 }));
        assert_eq!(
            parse_from_str("(?a)"),
            Err(Error::UnexpectedChar { ch: 'a', index: 2 })
        );
        assert_eq!(
            parse_from_str("(a)(?1a"),
            Err(Error::UnexpectedChar { ch: 'a', index: 6 })
        );
        assert_eq!(parse_from_str("a?"), Err(Error::UnexpectedChar { ch: '?', index: 1 }));
        assert_eq!(parse_from_str("1"), Err(Error::UnexpectedChar { ch: '1', index: 0 }));
    }

    #[test]
    fn test_group_limit() {
        assert!(parse_from_str("(a)(a)(a)(a)(a)(a)(a)(a)(a)").is_ok());
        assert_eq!(
            parse_from_str("((((((((((a)a)a)a)a)a)a)a)a)a)"),
            Err(Error::TooManyGroups { index: 9 })
        );
        assert!(parse_from_str("(?:(a)(a)(a)(a)(a)(a)(a)(a)(a))").is_ok());
    }
}
