use std::cmp::Ordering;

use tracing::debug;

use super::merge_order;
use crate::error::StreamError;
use crate::series::SeriesItem;
use crate::SeriesStream;

/// A leaf slot: a live input stream, or the ∞ sentinel once the stream is
/// exhausted (also used for parity padding). Comparing against ∞ is a tag
/// check, never a dereference.
enum Leaf<S> {
    Live(S),
    Exhausted,
}

impl<S: SeriesStream> Leaf<S> {
    fn item(&self) -> Option<&SeriesItem> {
        match self {
            Leaf::Live(stream) => Some(stream.current()),
            Leaf::Exhausted => None,
        }
    }
}

/// Back-reference of an aux node: the child its winner was promoted from.
/// Bottom-level nodes point at a leaf, upper nodes at an aux slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Leaf(usize),
    Aux(usize),
}

/// One inner node of the loser tree: the leaf owning the currently winning
/// stream plus the back-reference used to walk the winner chain on pop.
#[derive(Debug, Clone, Copy)]
struct AuxNode {
    winner_leaf: usize,
    origin: Origin,
}

/// Loser-tree k-way merge over series streams.
///
/// `leaves` holds the input streams; `aux` holds every inner level in one
/// flat vector, bottom level first, with `None` standing for ∞ (subtree
/// exhausted) or a slot vacated by [`pop`](Self::pop). The last aux slot is
/// the overall winner. An odd number of inputs is padded with one ∞ leaf so
/// pairs always line up; a single input degenerates to a bare leaf with no
/// aux nodes at all.
///
/// The driving cycle is `pop` (emit the winner, vacate its chain) followed
/// by `fix` (advance the changed leaf, rewrite one slot per level back to
/// the root). Each pop therefore costs ⌈log₂ k⌉ comparisons instead of the
/// heap's two-children-per-level sift-down.
pub struct TournamentTree<S: SeriesStream> {
    leaves: Vec<Leaf<S>>,
    aux: Vec<Option<AuxNode>>,
    /// Aux slots per level, bottom level first. Empty for a single leaf.
    level_sizes: Vec<usize>,
    /// Leaf whose value changed during the most recent pop.
    last_changed_leaf: usize,
    /// Set by `pop`, cleared by `fix`. `fix` without a preceding pop is a
    /// programming-model violation.
    pending_fix: bool,
    first_error: Option<StreamError>,
}

impl<S: SeriesStream> TournamentTree<S> {
    pub fn new(streams: Vec<S>) -> Result<Self, StreamError> {
        if streams.is_empty() {
            return Err(StreamError::EmptyInput);
        }

        let inputs = streams.len();
        let mut first_error = None;
        let mut leaves: Vec<Leaf<S>> = Vec::with_capacity(inputs + 1);

        for mut stream in streams {
            if stream.advance() {
                leaves.push(Leaf::Live(stream));
            } else {
                if first_error.is_none() {
                    if let Some(err) = stream.error() {
                        first_error = Some(err.clone());
                    }
                }
                leaves.push(Leaf::Exhausted);
            }
        }

        // Parity padding so bottom-level pairs always line up.
        if leaves.len() > 1 && leaves.len() % 2 == 1 {
            leaves.push(Leaf::Exhausted);
        }

        let level_sizes = level_sizes(leaves.len());
        let aux = vec![None; level_sizes.iter().sum()];

        let mut tree = Self {
            leaves,
            aux,
            level_sizes,
            last_changed_leaf: 0,
            pending_fix: false,
            first_error,
        };
        tree.build();

        debug!(inputs, aux = tree.aux.len(), "built tournament merger");

        Ok(tree)
    }

    /// Number of inner nodes across all levels.
    pub fn aux_len(&self) -> usize {
        self.aux.len()
    }

    /// Streams that still have items to contribute.
    pub fn live_inputs(&self) -> usize {
        self.leaves
            .iter()
            .filter(|l| matches!(l, Leaf::Live(_)))
            .count()
    }

    pub fn error(&self) -> Option<&StreamError> {
        self.first_error.as_ref()
    }

    /// The current global minimum, or `None` when every leaf is ∞ (or the
    /// root was vacated by a pop that has not been fixed yet).
    pub fn winner(&self) -> Option<&SeriesItem> {
        if self.aux.is_empty() {
            if self.pending_fix {
                return None;
            }
            return self.leaves[0].item();
        }
        self.aux[self.aux.len() - 1].map(|n| self.leaf_item(n.winner_leaf))
    }

    /// Emit the current minimum and vacate its winner chain, recording which
    /// leaf must be re-advanced by the next [`fix`](Self::fix). Returns
    /// `None` once the tree is terminal; terminal pops are idempotent.
    pub fn pop(&mut self) -> Option<&SeriesItem> {
        if self.aux.is_empty() {
            if self.pending_fix || self.leaves[0].item().is_none() {
                return None;
            }
            self.last_changed_leaf = 0;
            self.pending_fix = true;
            return self.leaves[0].item();
        }

        let root = self.aux.len() - 1;
        let mut node = self.aux[root].take()?;

        loop {
            match node.origin {
                Origin::Aux(child) => {
                    node = self.aux[child].take().expect("winner chain broken");
                }
                Origin::Leaf(leaf) => {
                    debug_assert_eq!(leaf, node.winner_leaf);
                    self.last_changed_leaf = leaf;
                    self.pending_fix = true;
                    return Some(self.leaf_item(leaf));
                }
            }
        }
    }

    /// Re-establish the tree order after a pop: advance the leaf that was
    /// emitted (marking it ∞ when exhausted) and rewrite exactly one aux
    /// slot per level from that leaf up to the root.
    ///
    /// Panics when called without a preceding successful pop.
    pub fn fix(&mut self) {
        assert!(self.pending_fix, "fix() called before pop()");
        self.pending_fix = false;

        let changed = self.last_changed_leaf;
        self.advance_leaf(changed);

        if self.aux.is_empty() {
            return;
        }

        // Bottom level: replay the pair containing the changed leaf.
        let pair_left = changed & !1;
        debug_assert!(self.aux[changed / 2].is_none());
        let node = self.play_leaves(pair_left, pair_left + 1);
        self.aux[changed / 2] = node;

        // One slot per upper level, walking toward the root.
        let mut pos = changed / 2;
        let mut level_start = 0;
        for lvl in 1..self.level_sizes.len() {
            let child_size = self.level_sizes[lvl - 1];
            let next_start = level_start + child_size;

            let left_pos = pos & !1;
            let right_pos = left_pos + 1;
            let left = level_start + left_pos;
            let right = (right_pos < child_size).then(|| level_start + right_pos);

            let slot = next_start + pos / 2;
            debug_assert!(self.aux[slot].is_none());
            let node = self.play_aux(left, right);
            self.aux[slot] = node;

            pos /= 2;
            level_start = next_start;
        }

        #[cfg(debug_assertions)]
        self.check_invariants();
    }

    /// Human-readable dump of the winner and every aux level.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "tournament: {} leaves, {} aux nodes\n",
            self.leaves.len(),
            self.aux.len()
        ));
        match self.winner() {
            Some(item) => out.push_str(&format!("winner: {}\n", item.labels())),
            None => out.push_str("winner: <terminal>\n"),
        }

        let mut level_start = 0;
        for (lvl, &size) in self.level_sizes.iter().enumerate() {
            out.push_str(&format!("level {}:", lvl));
            for slot in level_start..level_start + size {
                match self.aux[slot] {
                    Some(n) => out.push_str(&format!(
                        " [{} <- leaf {}]",
                        self.leaf_item(n.winner_leaf).labels(),
                        n.winner_leaf
                    )),
                    None => out.push_str(" [-]"),
                }
            }
            out.push('\n');
            level_start += size;
        }
        out
    }

    fn build(&mut self) {
        if self.aux.is_empty() {
            return;
        }

        for slot in 0..self.level_sizes[0] {
            let node = self.play_leaves(2 * slot, 2 * slot + 1);
            self.aux[slot] = node;
        }

        let mut level_start = 0;
        for lvl in 1..self.level_sizes.len() {
            let child_size = self.level_sizes[lvl - 1];
            let next_start = level_start + child_size;
            for slot in 0..self.level_sizes[lvl] {
                let left = level_start + 2 * slot;
                let right_pos = 2 * slot + 1;
                let right = (right_pos < child_size).then(|| level_start + right_pos);
                let node = self.play_aux(left, right);
                self.aux[next_start + slot] = node;
            }
            level_start = next_start;
        }
    }

    /// Play a bottom-level match between two adjacent leaves. ∞ loses to
    /// any live leaf; the left contender wins ties; two ∞ leaves produce ∞.
    fn play_leaves(&self, left: usize, right: usize) -> Option<AuxNode> {
        let promote = |leaf: usize| AuxNode {
            winner_leaf: leaf,
            origin: Origin::Leaf(leaf),
        };
        match (self.leaves[left].item(), self.leaves[right].item()) {
            (None, None) => None,
            (Some(_), None) => Some(promote(left)),
            (None, Some(_)) => Some(promote(right)),
            (Some(l), Some(r)) => {
                if merge_order(l, r) == Ordering::Greater {
                    Some(promote(right))
                } else {
                    Some(promote(left))
                }
            }
        }
    }

    /// Play a match between two aux slots of the same level. A missing
    /// right sibling (odd level end) lets the left node advance unopposed.
    fn play_aux(&self, left: usize, right: Option<usize>) -> Option<AuxNode> {
        let promote = |idx: usize| {
            self.aux[idx].map(|n| AuxNode {
                winner_leaf: n.winner_leaf,
                origin: Origin::Aux(idx),
            })
        };
        let Some(right) = right else {
            return promote(left);
        };
        match (self.aux[left], self.aux[right]) {
            (None, None) => None,
            (Some(_), None) => promote(left),
            (None, Some(_)) => promote(right),
            (Some(l), Some(r)) => {
                let l_item = self.leaf_item(l.winner_leaf);
                let r_item = self.leaf_item(r.winner_leaf);
                if merge_order(l_item, r_item) == Ordering::Greater {
                    promote(right)
                } else {
                    promote(left)
                }
            }
        }
    }

    fn leaf_item(&self, leaf: usize) -> &SeriesItem {
        self.leaves[leaf]
            .item()
            .expect("aux node references an exhausted leaf")
    }

    fn advance_leaf(&mut self, idx: usize) {
        let exhausted = match &mut self.leaves[idx] {
            Leaf::Live(stream) => {
                if stream.advance() {
                    false
                } else {
                    if self.first_error.is_none() {
                        if let Some(err) = stream.error() {
                            debug!(error = %err, "child stream failed, merge is terminal");
                            self.first_error = Some(err.clone());
                        }
                    }
                    true
                }
            }
            Leaf::Exhausted => false,
        };
        if exhausted {
            self.leaves[idx] = Leaf::Exhausted;
        }
    }

    /// Structural check run after every fix in debug builds: each aux node
    /// must hold the smaller of its two children (∞ greatest, winner taken
    /// from a real child), and the root's winner chain must reach exactly
    /// one live leaf agreeing with the root — unless every leaf is ∞.
    #[cfg(debug_assertions)]
    fn check_invariants(&self) {
        if self.aux.is_empty() {
            return;
        }

        for slot in 0..self.level_sizes[0] {
            let (l, r) = (2 * slot, 2 * slot + 1);
            match self.aux[slot] {
                None => {
                    assert!(self.leaves[l].item().is_none() && self.leaves[r].item().is_none());
                }
                Some(n) => {
                    assert!(n.origin == Origin::Leaf(l) || n.origin == Origin::Leaf(r));
                    assert_eq!(Origin::Leaf(n.winner_leaf), n.origin);
                    let item = self.leaf_item(n.winner_leaf);
                    for leaf in [l, r] {
                        if let Some(other) = self.leaves[leaf].item() {
                            assert_ne!(merge_order(item, other), Ordering::Greater);
                        }
                    }
                }
            }
        }

        let mut level_start = 0;
        for lvl in 1..self.level_sizes.len() {
            let child_size = self.level_sizes[lvl - 1];
            let next_start = level_start + child_size;
            for slot in 0..self.level_sizes[lvl] {
                let li = level_start + 2 * slot;
                let right_pos = 2 * slot + 1;
                let ri = (right_pos < child_size).then(|| level_start + right_pos);
                let children = [Some(li), ri];

                match self.aux[next_start + slot] {
                    None => {
                        for child in children.into_iter().flatten() {
                            assert!(self.aux[child].is_none());
                        }
                    }
                    Some(n) => {
                        let Origin::Aux(from) = n.origin else {
                            panic!("upper aux node with a leaf back-reference");
                        };
                        assert!(children.contains(&Some(from)));
                        let winner = self.aux[from].expect("back-reference to a vacated slot");
                        assert_eq!(winner.winner_leaf, n.winner_leaf);
                        let item = self.leaf_item(n.winner_leaf);
                        for child in children.into_iter().flatten() {
                            if let Some(other) = self.aux[child] {
                                let other_item = self.leaf_item(other.winner_leaf);
                                assert_ne!(merge_order(item, other_item), Ordering::Greater);
                            }
                        }
                    }
                }
            }
            level_start = next_start;
        }

        match self.aux[self.aux.len() - 1] {
            Some(root) => {
                let mut node = root;
                loop {
                    match node.origin {
                        Origin::Aux(child) => {
                            let child = self.aux[child].expect("winner chain broken");
                            assert_eq!(child.winner_leaf, root.winner_leaf);
                            node = child;
                        }
                        Origin::Leaf(leaf) => {
                            assert_eq!(leaf, root.winner_leaf);
                            assert!(matches!(self.leaves[leaf], Leaf::Live(_)));
                            break;
                        }
                    }
                }
            }
            None => {
                assert!(
                    self.leaves.iter().all(|l| matches!(l, Leaf::Exhausted)),
                    "empty root with live leaves"
                );
            }
        }
    }
}

/// Aux slots per level for `n` leaves (n even, or 1 for the degenerate
/// tree): ⌈n/2⌉, then repeatedly ⌈·/2⌉ down to the single root slot.
fn level_sizes(n: usize) -> Vec<usize> {
    if n <= 1 {
        return Vec::new();
    }
    let mut sizes = Vec::new();
    let mut level = n / 2;
    loop {
        sizes.push(level);
        if level == 1 {
            break;
        }
        level = level.div_ceil(2);
    }
    sizes
}

/// [`SeriesStream`] adapter over [`TournamentTree`]: each `advance` pops the
/// winner, clones it out, and immediately fixes the tree.
pub struct TournamentMerger<S: SeriesStream> {
    tree: TournamentTree<S>,
    current: Option<SeriesItem>,
}

impl<S: SeriesStream> TournamentMerger<S> {
    pub fn new(streams: Vec<S>) -> Result<Self, StreamError> {
        Ok(Self {
            tree: TournamentTree::new(streams)?,
            current: None,
        })
    }

    pub fn live_inputs(&self) -> usize {
        self.tree.live_inputs()
    }
}

impl<S: SeriesStream> SeriesStream for TournamentMerger<S> {
    fn advance(&mut self) -> bool {
        if self.tree.error().is_some() {
            return false;
        }
        let item = match self.tree.pop() {
            Some(item) => item.clone(),
            None => return false,
        };
        self.current = Some(item);
        self.tree.fix();
        true
    }

    fn current(&self) -> &SeriesItem {
        self.current
            .as_ref()
            .expect("current() called before advance()")
    }

    fn error(&self) -> Option<&StreamError> {
        self.tree.error()
    }
}
