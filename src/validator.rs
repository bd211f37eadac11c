use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::thread::{self, Scope};

use crate::ast::{NodeId, NodeKind, Tree};
use crate::error::Error;

/// Which rule decides whether a string back-reference is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceRule {
    /// Every path through alternations and repetitions must have matched the
    /// target group before reaching the reference.
    #[default]
    PathSensitive,
    /// The target group may not sit inside any alternation or repetition, and
    /// the reference may not sit inside its own target. Accepts a subset of
    /// what `PathSensitive` accepts.
    Structural,
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Upper bound on forked paths before giving up with `Error::PathLimit`.
    pub max_paths: usize,
    /// Upper bound on concurrently running worker threads.
    pub max_workers: usize,
    pub rule: ReferenceRule,
}

pub const DEFAULT_MAX_PATHS: usize = 100_000;

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_paths: DEFAULT_MAX_PATHS,
            max_workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            rule: ReferenceRule::default(),
        }
    }
}

/// Set of capturing groups (1..=9) that have matched on the current path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupSet(u16);

impl GroupSet {
    pub fn insert(&mut self, group: u8) {
        self.0 |= 1 << group;
    }

    pub fn contains(self, group: u8) -> bool {
        self.0 & (1 << group) != 0
    }
}

#[derive(Debug, Clone)]
enum Step {
    Visit(NodeId),
    /// Marks a capturing group as matched once its body has been walked.
    Capture(u8),
    /// Back at a `Repeat` after one iteration; `entry` is the set the
    /// iteration started with.
    Reenter { repeat: NodeId, entry: GroupSet },
}

/// One execution path: the groups matched so far and the work still to do,
/// as a stack (next step on top).
#[derive(Debug, Clone)]
struct Path {
    initialized: GroupSet,
    pending: Vec<Step>,
}

impl Path {
    fn start(root: NodeId) -> Self {
        Self {
            initialized: GroupSet::default(),
            pending: vec![Step::Visit(root)],
        }
    }

    fn push_children(&mut self, children: &[NodeId]) {
        self.pending
            .extend(children.iter().rev().map(|id| Step::Visit(*id)));
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Checks every string back-reference in `tree` under the configured rule.
    pub fn validate(&self, tree: &Tree) -> Result<(), Error> {
        match self.config.rule {
            ReferenceRule::PathSensitive => self.explore(tree),
            ReferenceRule::Structural => check_structural(tree),
        }
    }

    fn explore(&self, tree: &Tree) -> Result<(), Error> {
        let has_references = tree
            .node_ids()
            .any(|id| matches!(tree.kind(id), NodeKind::StringRef(_)));
        if !has_references {
            return Ok(());
        }

        let exploration = Exploration {
            tree,
            relevant: relevant_nodes(tree),
            max_paths: self.config.max_paths,
            max_workers: self.config.max_workers.max(1),
            paths: AtomicUsize::new(0),
            live: AtomicUsize::new(1),
            exhausted: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            violation: OnceLock::new(),
        };

        thread::scope(|scope| exploration.run(scope, Path::start(tree.root())));

        if let Some(err) = exploration.violation.into_inner() {
            return Err(err);
        }
        if exploration.exhausted.into_inner() {
            return Err(Error::PathLimit {
                limit: exploration.max_paths,
            });
        }
        Ok(())
    }
}

/// Marks every node whose subtree holds a capturing group or a string
/// back-reference. Anything else cannot change or read the initialized set.
fn relevant_nodes(tree: &Tree) -> Vec<bool> {
    let mut relevant = vec![false; tree.len()];
    for id in tree.node_ids() {
        let marks = matches!(
            tree.kind(id),
            NodeKind::StringRef(_) | NodeKind::Group { number: Some(_), .. }
        );
        if !marks || relevant[id.index()] {
            continue;
        }
        relevant[id.index()] = true;
        // A marked node always has marked ancestors, so stop at the first one.
        for ancestor in tree.ancestors(id) {
            if relevant[ancestor.index()] {
                break;
            }
            relevant[ancestor.index()] = true;
        }
    }
    relevant
}

/// State shared by every worker of one validation run.
struct Exploration<'t> {
    tree: &'t Tree,
    relevant: Vec<bool>,
    max_paths: usize,
    max_workers: usize,
    paths: AtomicUsize,
    live: AtomicUsize,
    /// Set once a fork was dropped for lack of budget.
    exhausted: AtomicBool,
    cancelled: AtomicBool,
    violation: OnceLock<Error>,
}

impl<'t> Exploration<'t> {
    /// Drives `path` and every fork that is not handed to a new worker.
    fn run<'s, 'e>(&'s self, scope: &'s Scope<'s, 'e>, path: Path) {
        let mut queue = vec![path];
        let mut forks = Vec::new();

        while let Some(mut path) = queue.pop() {
            while let Some(step) = path.pending.pop() {
                if self.cancelled.load(Ordering::Relaxed) {
                    return;
                }
                if let Err(err) = self.step(&mut path, step, &mut forks) {
                    self.fail(err);
                    return;
                }
                for forked in forks.drain(..) {
                    self.dispatch(scope, forked, &mut queue);
                }
            }
        }
    }

    /// Hands a fork to a new worker or to the local queue. Past `max_paths`
    /// the fork is dropped, but paths already started still run to the end,
    /// so a violation on any of them takes precedence over the path limit.
    fn dispatch<'s, 'e>(
        &'s self,
        scope: &'s Scope<'s, 'e>,
        forked: Path,
        queue: &mut Vec<Path>,
    ) {
        if self.paths.fetch_add(1, Ordering::Relaxed) >= self.max_paths {
            self.exhausted.store(true, Ordering::Relaxed);
            return;
        }

        if self.reserve_worker() {
            scope.spawn(move || {
                self.run(scope, forked);
                self.live.fetch_sub(1, Ordering::AcqRel);
            });
        } else {
            queue.push(forked);
        }
    }

    fn reserve_worker(&self) -> bool {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.max_workers).then_some(live + 1)
            })
            .is_ok()
    }

    fn fail(&self, err: Error) {
        // First violation wins.
        let _ = self.violation.set(err);
        self.cancelled.store(true, Ordering::Relaxed);
    }

    fn step(&self, path: &mut Path, step: Step, forks: &mut Vec<Path>) -> Result<(), Error> {
        let id = match step {
            Step::Visit(id) => id,
            Step::Capture(group) => {
                path.initialized.insert(group);
                return Ok(());
            }
            Step::Reenter { repeat, entry } => {
                // Another iteration from an unchanged set repeats checks
                // already made, so only the exit remains.
                if path.initialized != entry {
                    self.fork_repeat(path, repeat, forks);
                }
                return Ok(());
            }
        };

        if !self.relevant[id.index()] {
            return Ok(());
        }

        let node = self.tree.node(id);
        match &node.kind {
            NodeKind::Literal(_) | NodeKind::GroupRef(_) => {}
            NodeKind::Sequence(children) | NodeKind::Branch(children) => {
                path.push_children(children);
            }
            NodeKind::Group { number, children } => {
                if let Some(group) = number {
                    path.pending.push(Step::Capture(*group));
                }
                path.push_children(children);
            }
            NodeKind::StringRef(group) => {
                if !path.initialized.contains(*group) {
                    return Err(Error::Uninitialized {
                        group: *group,
                        index: node.position,
                    });
                }
            }
            NodeKind::Alternative(branches) => {
                if let Some((first, rest)) = branches.split_first() {
                    for branch in rest {
                        let mut forked = path.clone();
                        forked.pending.push(Step::Visit(*branch));
                        forks.push(forked);
                    }
                    path.pending.push(Step::Visit(*first));
                }
            }
            NodeKind::Repeat(_) => self.fork_repeat(path, id, forks),
        }
        Ok(())
    }

    /// Splits `path` at a `Repeat`: the fork skips the loop, `path` itself
    /// runs the body once and comes back to the loop.
    fn fork_repeat(&self, path: &mut Path, repeat: NodeId, forks: &mut Vec<Path>) {
        let NodeKind::Repeat(child) = self.tree.kind(repeat) else {
            return;
        };
        forks.push(path.clone());
        path.pending.push(Step::Reenter {
            repeat,
            entry: path.initialized,
        });
        path.pending.push(Step::Visit(*child));
    }
}

fn check_structural(tree: &Tree) -> Result<(), Error> {
    for id in tree.node_ids() {
        let NodeKind::StringRef(group) = tree.kind(id) else {
            continue;
        };
        let uninitialized = Error::Uninitialized {
            group: *group,
            index: tree.node(id).position,
        };
        let Some(target) = tree.group(*group) else {
            return Err(uninitialized);
        };
        let conditional = tree.ancestors(target).any(|ancestor| {
            matches!(
                tree.kind(ancestor),
                NodeKind::Alternative(_) | NodeKind::Repeat(_)
            )
        });
        if conditional || tree.is_descendant_of(id, target) {
            return Err(uninitialized);
        }
    }
    Ok(())
}
