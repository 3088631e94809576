use std::{
    borrow::Borrow,
    cmp::{self, Ord, Ordering},
    marker, mem,
    ptr::NonNull,
};

use rand::Rng;

use crate::depth::Depth;
use crate::error::Error;

type NodePtr<K, V> = NonNull<Node<K, V>>;

type Link<K, V> = Option<NodePtr<K, V>>;

/// Avl manage a single instance of in-memory index using a
/// size-augmented [avl] tree, with structural split and join.
///
/// Every mutating call keeps the tree height-balanced within one and the
/// cached subtree sizes consistent, and reports the number of re-balance
/// operations (promotions, demotions, rotations) it had to perform.
///
/// [avl]: https://en.wikipedia.org/wiki/AVL_tree
pub struct Avl<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    name: String,
    root: Link<K, V>,
    n_count: usize, // number of entries in the tree.
    min: Link<K, V>,
    max: Link<K, V>,
}

/// Different ways to construct a new Avl instance.
impl<K, V> Avl<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Create an empty instance of Avl, identified by `name`.
    /// Applications can choose unique names.
    pub fn new<S>(name: S) -> Avl<K, V>
    where
        S: AsRef<str>,
    {
        Avl {
            name: name.as_ref().to_string(),
            root: None,
            n_count: 0,
            min: None,
            max: None,
        }
    }

    /// Create a new instance of Avl tree and load it with entries
    /// from `iter`. Note that iterator should return (key, value) tuples,
    /// where key must be ``unique``.
    pub fn load_from<S, I>(name: S, iter: I) -> Result<Avl<K, V>, Error<K>>
    where
        S: AsRef<str>,
        I: Iterator<Item = (K, V)>,
    {
        let mut index = Avl::new(name);
        for (key, value) in iter {
            index.insert(key, value)?;
        }
        Ok(index)
    }

    // build a tree around a detached subtree, extremes are left for the
    // caller to refresh once the tree reaches its final shape.
    fn from_subtree(name: &str, root: Link<K, V>) -> Avl<K, V> {
        let mut index = Avl::new(name);
        if let Some(mut node) = root {
            unsafe {
                node.as_mut().parent = None;
                index.n_count = node.as_ref().size;
            }
            index.root = Some(node);
        }
        index
    }
}

/// Maintenance API.
impl<K, V> Avl<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Identify this instance. Applications can choose unique names while
    /// creating Avl instances.
    #[inline]
    pub fn id(&self) -> String {
        self.name.clone()
    }

    /// Return number of entries in this instance.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_count
    }

    /// Check whether this index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_count == 0
    }

    /// Return quickly with basic statisics, only entries() method is valid
    /// with this statisics.
    pub fn stats(&self) -> Stats {
        Stats::new(self.n_count, mem::size_of::<Node<K, V>>())
    }

    /// Validate the AVL tree with following rules:
    ///
    /// * Make sure keys are in sorted order.
    /// * Left and right subtree heights differ by at most one, and every
    ///   cached height equals ``1 + max(left, right)``.
    /// * Every cached subtree size equals ``size(left) + size(right) + 1``,
    ///   and the index entry-count tallies with the tree.
    /// * Every child's parent back-reference points at its parent, and the
    ///   cached min/max entries are the true extremes.
    ///
    /// Additionally return full statistics on the tree. Refer to [`Stats`]
    /// for more information.
    pub fn validate(&self) -> Result<Stats, Error<K>> {
        let mut stats = Stats::new(self.n_count, mem::size_of::<Node<K, V>>());
        stats.set_depths(Depth::new());
        let (height, count) = Self::validate_tree(self.root, None, 0, &mut stats)?;
        if count != self.n_count {
            let msg = format!("entries: {} tree: {}", self.n_count, count);
            return Err(Error::SizeMismatch(msg));
        }
        if self.min != Self::extreme(self.root, Direction::Left) {
            return Err(Error::CacheMismatch("min entry is stale".to_string()));
        }
        if self.max != Self::extreme(self.root, Direction::Right) {
            return Err(Error::CacheMismatch("max entry is stale".to_string()));
        }
        stats.set_height(height);
        Ok(stats)
    }
}

/// Write operations on Avl instance.
impl<K, V> Avl<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Create a new {key, value} entry in the index and return the number
    /// of re-balance operations needed to restore the AVL invariants, a
    /// promotion counting 1, a single rotation 2 and a double rotation 5.
    /// If key is already present return [`Error::DuplicateKey`] carrying
    /// the key back, without touching the index.
    pub fn insert(&mut self, key: K, value: V) -> Result<usize, Error<K>> {
        let mut parent = match self.root {
            Some(root) => root,
            None => {
                let node = Node::create(key, value);
                self.install_root(node);
                return Ok(0);
            }
        };
        loop {
            let next = unsafe {
                match key.cmp(&parent.as_ref().key) {
                    Ordering::Less => parent.as_ref().left,
                    Ordering::Greater => parent.as_ref().right,
                    Ordering::Equal => return Err(Error::DuplicateKey(key)),
                }
            };
            match next {
                Some(node) => parent = node,
                None => break,
            }
        }
        let node = Node::create(key, value);
        Ok(self.attach(node, parent))
    }

    /// Delete key from this instance and return the number of re-balance
    /// operations needed to restore the AVL invariants, a demotion counting
    /// 1, a single rotation 3 and a double rotation 6. If key is not
    /// present return [`Error::KeyNotFound`], without touching the index.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<usize, Error<K>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = match self.find(key) {
            Some(node) => node,
            None => return Err(Error::KeyNotFound),
        };
        // trees of one or two entries rooted at the key are relinked
        // directly, no re-balancing can be needed.
        if self.root == Some(node) && self.n_count == 1 {
            self.root = None;
            self.n_count = 0;
            self.refresh_extremes();
            unsafe { Node::destroy(node) };
            return Ok(0);
        }
        if self.root == Some(node) && self.n_count == 2 {
            unsafe {
                let mut child = match node.as_ref().left {
                    Some(child) => child,
                    None => node.as_ref().right.unwrap(),
                };
                child.as_mut().parent = None;
                self.root = Some(child);
            }
            self.n_count = 1;
            self.refresh_extremes();
            unsafe { Node::destroy(node) };
            return Ok(0);
        }

        let two_children = unsafe {
            let nref = node.as_ref();
            nref.left.is_some() && nref.right.is_some()
        };
        let start = if two_children {
            self.lift_successor(node)
        } else {
            unsafe {
                let child = node.as_ref().left.or(node.as_ref().right);
                // node cannot be the root here, a root with less than two
                // real children caps the tree at two entries.
                let parent = node.as_ref().parent.unwrap();
                Self::replace_child(parent, node, child);
                if let Some(mut child) = child {
                    child.as_mut().parent = Some(parent);
                }
                Self::adjust_sizes(Some(parent), false);
                Some(parent)
            }
        };
        let count = self.rebalance_delete(start);
        self.n_count -= 1;
        self.refresh_extremes();
        unsafe { Node::destroy(node) };
        Ok(count)
    }

    /// Split this index into two around `key`, consuming it. All entries
    /// with keys less than `key` land in the first returned index, all
    /// entries with keys greater than `key` in the second; the pivot entry
    /// itself is discarded.
    ///
    /// The decomposition walks from the pivot to the root, absorbing each
    /// ancestor's other subtree through [`Avl::join`], which keeps the
    /// whole operation within O(log n) joins.
    ///
    /// *Precondition*: `key` is present in the index. Calling split with an
    /// absent key is a contract violation and panics.
    pub fn split<Q>(mut self, key: &Q) -> (Avl<K, V>, Avl<K, V>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = match self.find(key) {
            Some(node) => node,
            None => panic!("split: key not present in {}, call the programmer", self.name),
        };
        unsafe {
            let lt_name = format!("{}-lt", self.name);
            let gt_name = format!("{}-gt", self.name);
            let mut lesser = Self::from_subtree(&lt_name, node.as_ref().left);
            let mut greater = Self::from_subtree(&gt_name, node.as_ref().right);

            let mut parent = node.as_ref().parent;
            while let Some(ancestor) = parent {
                // joins relink the ancestor, pick up the chain first.
                let next = ancestor.as_ref().parent;
                if ancestor.as_ref().key < node.as_ref().key {
                    let sub = Self::from_subtree(&lt_name, ancestor.as_ref().left);
                    lesser.join_with(ancestor, sub);
                } else {
                    let sub = Self::from_subtree(&gt_name, ancestor.as_ref().right);
                    greater.join_with(ancestor, sub);
                }
                parent = next;
            }
            lesser.refresh_extremes();
            greater.refresh_extremes();
            Node::destroy(node);

            self.root = None;
            self.n_count = 0;
            self.min = None;
            self.max = None;
            (lesser, greater)
        }
    }

    /// Join `other` and the pivot entry {key, value} into this index,
    /// consuming `other`. Returns the cost of the operation,
    /// ``|height(self) - height(other)| + 1``.
    ///
    /// Either index may be empty, in which case the pivot is simply
    /// inserted into the non-empty one.
    ///
    /// *Precondition*: all keys on one side of the pivot must be less than
    /// `key` and all keys on the other side greater, that is either
    /// ``keys(self) < key < keys(other)`` or the reverse. Overlapping key
    /// ranges are a contract violation; they are asserted in debug builds
    /// and leave the index undefined otherwise.
    pub fn join(&mut self, key: K, value: V, other: Avl<K, V>) -> usize {
        debug_assert!(
            self.disjoint_around(&key, &other),
            "join: key ranges overlap around the pivot, call the programmer"
        );
        let pivot = Node::create(key, value);
        self.join_with(pivot, other)
    }
}

/// Read operations on Avl instance.
impl<K, V> Avl<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Get the value for key.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.find(key)?;
        Some(unsafe { node.as_ref().value.clone() })
    }

    /// Return the value of the entry with the smallest key, `None` if
    /// the index is empty. The extreme is cached, making this O(1).
    pub fn min(&self) -> Option<V> {
        let node = self.min?;
        Some(unsafe { node.as_ref().value.clone() })
    }

    /// Return the value of the entry with the largest key, `None` if
    /// the index is empty. The extreme is cached, making this O(1).
    pub fn max(&self) -> Option<V> {
        let node = self.max?;
        Some(unsafe { node.as_ref().value.clone() })
    }

    /// Return the full entry with the smallest key, `None` if empty.
    pub fn min_entry(&self) -> Option<(K, V)> {
        let node = self.min?;
        let nref = unsafe { node.as_ref() };
        Some((nref.key.clone(), nref.value.clone()))
    }

    /// Return the full entry with the largest key, `None` if empty.
    pub fn max_entry(&self) -> Option<(K, V)> {
        let node = self.max?;
        let nref = unsafe { node.as_ref() };
        Some((nref.key.clone(), nref.value.clone()))
    }

    /// Return the entry with exactly `rank` entries before it in key
    /// order, `None` when rank falls beyond the index. Subtree sizes make
    /// this O(log n).
    pub fn select(&self, rank: usize) -> Option<(K, V)> {
        let mut rank = rank;
        let mut curr = self.root;
        while let Some(node) = curr {
            let nref = unsafe { node.as_ref() };
            let lsize = size(nref.left);
            if rank < lsize {
                curr = nref.left;
            } else if rank == lsize {
                return Some((nref.key.clone(), nref.value.clone()));
            } else {
                rank -= lsize + 1;
                curr = nref.right;
            }
        }
        None
    }

    /// Return the number of entries with keys less than `key`, `None`
    /// when key is not present. Inverse of [`Avl::select`].
    pub fn rank<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut acc = 0;
        let mut curr = self.root;
        while let Some(node) = curr {
            let nref = unsafe { node.as_ref() };
            match nref.key.borrow().cmp(key) {
                Ordering::Greater => curr = nref.left,
                Ordering::Equal => return Some(acc + size(nref.left)),
                Ordering::Less => {
                    acc += size(nref.left) + 1;
                    curr = nref.right;
                }
            }
        }
        None
    }

    /// Return a uniformly random entry from this index, `None` if empty.
    pub fn random<R: Rng>(&self, rng: &mut R) -> Option<(K, V)> {
        if self.n_count == 0 {
            return None;
        }
        self.select(rng.gen_range(0, self.n_count))
    }

    /// Return an iterator over all entries in this instance, in
    /// ascending key order.
    pub fn iter(&self) -> Iter<K, V> {
        Iter {
            next: Self::extreme(self.root, Direction::Left),
            _tree: marker::PhantomData,
        }
    }

    /// Return an iterator over all keys, ascending.
    pub fn keys(&self) -> Keys<K, V> {
        Keys { iter: self.iter() }
    }

    /// Return an iterator over all values, ordered by their keys.
    pub fn values(&self) -> Values<K, V> {
        Values { iter: self.iter() }
    }

    /// Return the root node, `None` if the index is empty. Along with
    /// [`Node`]'s accessors this exposes read-only structural navigation.
    pub fn root_node(&self) -> Option<&Node<K, V>> {
        let node = self.root?;
        Some(unsafe { &*node.as_ptr() })
    }
}

impl<K, V> Avl<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    fn find<Q>(&self, key: &Q) -> Link<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut curr = self.root;
        while let Some(node) = curr {
            let nref = unsafe { node.as_ref() };
            curr = match nref.key.borrow().cmp(key) {
                Ordering::Less => nref.right,
                Ordering::Greater => nref.left,
                Ordering::Equal => return Some(node),
            };
        }
        None
    }

    fn install_root(&mut self, mut node: NodePtr<K, V>) {
        unsafe { node.as_mut().parent = None };
        self.root = Some(node);
        self.min = Some(node);
        self.max = Some(node);
        self.n_count = 1;
    }

    // link a fresh node below `parent` and restore the invariants,
    // returning the number of re-balance operations.
    fn attach(&mut self, mut node: NodePtr<K, V>, mut parent: NodePtr<K, V>) -> usize {
        unsafe {
            let was_leaf = parent.as_ref().height == 0;
            node.as_mut().parent = Some(parent);
            if node.as_ref().key < parent.as_ref().key {
                parent.as_mut().left = Some(node);
            } else {
                parent.as_mut().right = Some(node);
            }
            let is_new_min = match self.min {
                Some(min) => node.as_ref().key < min.as_ref().key,
                None => true,
            };
            if is_new_min {
                self.min = Some(node);
            }
            let is_new_max = match self.max {
                Some(max) => node.as_ref().key > max.as_ref().key,
                None => true,
            };
            if is_new_max {
                self.max = Some(node);
            }
            self.n_count += 1;
            Self::adjust_sizes(Some(parent), true);
            if was_leaf {
                // only growing under a former leaf can raise heights.
                self.rebalance_insert(parent)
            } else {
                0
            }
        }
    }

    // relink the in-order successor into the victim's position, detaching
    // the victim. Returns the node the re-balancing walk starts from: the
    // successor's former parent, or the successor itself when it was the
    // victim's immediate right child.
    fn lift_successor(&mut self, node: NodePtr<K, V>) -> Link<K, V> {
        unsafe {
            let mut succ = node.as_ref().right.unwrap();
            while let Some(left) = succ.as_ref().left {
                succ = left;
            }
            let succ_parent = succ.as_ref().parent.unwrap();
            let succ_right = succ.as_ref().right;

            // every node from the vacated slot to the root loses one entry.
            Self::adjust_sizes(Some(succ_parent), false);

            let start = if succ_parent == node {
                Some(succ)
            } else {
                Self::replace_child(succ_parent, succ, succ_right);
                if let Some(mut right) = succ_right {
                    right.as_mut().parent = Some(succ_parent);
                }
                let mut right = node.as_ref().right.unwrap();
                right.as_mut().parent = Some(succ);
                succ.as_mut().right = Some(right);
                Some(succ_parent)
            };

            let mut left = node.as_ref().left.unwrap();
            left.as_mut().parent = Some(succ);
            succ.as_mut().left = Some(left);
            succ.as_mut().height = node.as_ref().height;
            succ.as_mut().size = node.as_ref().size;
            match node.as_ref().parent {
                Some(parent) => {
                    Self::replace_child(parent, node, Some(succ));
                    succ.as_mut().parent = Some(parent);
                }
                None => {
                    succ.as_mut().parent = None;
                    self.root = Some(succ);
                }
            }
            start
        }
    }

    // splice a detached pivot node and `other` into this tree. Shared by
    // join and split; extremes of intermediate trees may be stale, the
    // public entry points refresh them.
    fn join_with(&mut self, mut pivot: NodePtr<K, V>, mut other: Avl<K, V>) -> usize {
        let cost = ((height(self.root) - height(other.root)).abs() + 1) as usize;
        unsafe {
            pivot.as_mut().parent = None;
            pivot.as_mut().left = None;
            pivot.as_mut().right = None;
            pivot.as_mut().height = 0;
            pivot.as_mut().size = 1;

            if self.root.is_none() {
                self.adopt(&mut other);
            }
            if other.root.is_none() {
                self.insert_node(pivot);
                return cost;
            }

            // both sides are real from here on.
            let this_root = self.root.unwrap();
            let that_root = other.root.unwrap();
            if this_root.as_ref().height == that_root.as_ref().height {
                let (mut lo, mut hi) = if pivot.as_ref().key < that_root.as_ref().key {
                    (this_root, that_root)
                } else {
                    (that_root, this_root)
                };
                lo.as_mut().parent = Some(pivot);
                hi.as_mut().parent = Some(pivot);
                pivot.as_mut().left = Some(lo);
                pivot.as_mut().right = Some(hi);
                pivot.as_mut().height = lo.as_ref().height + 1;
                pivot.as_mut().size = lo.as_ref().size + hi.as_ref().size + 1;
                self.root = Some(pivot);
                self.n_count = pivot.as_ref().size;
                other.root = None;
                other.n_count = 0;
                other.min = None;
                other.max = None;
                self.refresh_extremes();
                return cost;
            }

            let (tall, short) = if this_root.as_ref().height > that_root.as_ref().height {
                (this_root, that_root)
            } else {
                (that_root, this_root)
            };
            // flank of the taller tree adjacent to the pivot's key range.
            let side = if pivot.as_ref().key < tall.as_ref().key {
                Direction::Left
            } else {
                Direction::Right
            };
            let short_height = short.as_ref().height;
            // the flank can run out before reaching the shorter height, a
            // one-child node leaves a None link there; the pivot then takes
            // the empty link as its inner child.
            let mut splice = tall;
            let mut spot = Self::child(tall, side);
            while height(spot) > short_height {
                splice = spot.unwrap();
                spot = Self::child(splice, side);
            }

            let mut short = short;
            short.as_mut().parent = Some(pivot);
            if let Some(mut spot) = spot {
                spot.as_mut().parent = Some(pivot);
            }
            Self::set_child(pivot, side, Some(short));
            Self::set_child(pivot, side.flip(), spot);
            pivot.as_mut().height = cmp::max(short_height, height(spot)) + 1;
            pivot.as_mut().size = short.as_ref().size + size(spot) + 1;
            pivot.as_mut().parent = Some(splice);
            Self::set_child(splice, side, Some(pivot));

            self.root = Some(tall);
            other.root = None;
            other.n_count = 0;
            other.min = None;
            other.max = None;

            // recompute subtree sizes from the splice point to the root.
            let mut up = Some(splice);
            while let Some(node) = up {
                Self::update_size(node);
                up = node.as_ref().parent;
            }

            self.rebalance_join(splice);
            self.n_count = self.root.unwrap().as_ref().size;
            self.refresh_extremes();
        }
        cost
    }

    // move other's nodes wholesale into this (empty) tree.
    fn adopt(&mut self, other: &mut Avl<K, V>) {
        self.root = other.root.take();
        self.min = other.min.take();
        self.max = other.max.take();
        self.n_count = other.n_count;
        other.n_count = 0;
    }

    // descend and attach a detached node, insert()'s tail for a node that
    // already exists. Keys are disjoint by the join contract.
    fn insert_node(&mut self, node: NodePtr<K, V>) {
        let mut parent = match self.root {
            Some(root) => root,
            None => {
                self.install_root(node);
                return;
            }
        };
        loop {
            let next = unsafe {
                match node.as_ref().key.cmp(&parent.as_ref().key) {
                    Ordering::Less => parent.as_ref().left,
                    Ordering::Greater => parent.as_ref().right,
                    Ordering::Equal => {
                        panic!("join: duplicate key across trees, call the programmer")
                    }
                }
            };
            match next {
                Some(next) => parent = next,
                None => break,
            }
        }
        self.attach(node, parent);
    }

    fn disjoint_around(&self, key: &K, other: &Avl<K, V>) -> bool {
        unsafe {
            let below = match self.max {
                Some(max) => max.as_ref().key < *key,
                None => true,
            };
            let above = match other.min {
                Some(min) => *key < min.as_ref().key,
                None => true,
            };
            if below && above {
                return true;
            }
            let below = match other.max {
                Some(max) => max.as_ref().key < *key,
                None => true,
            };
            let above = match self.min {
                Some(min) => *key < min.as_ref().key,
                None => true,
            };
            below && above
        }
    }

    fn refresh_extremes(&mut self) {
        self.min = Self::extreme(self.root, Direction::Left);
        self.max = Self::extreme(self.root, Direction::Right);
    }

    fn extreme(root: Link<K, V>, side: Direction) -> Link<K, V> {
        let mut curr = root?;
        loop {
            let next = unsafe {
                match side {
                    Direction::Left => curr.as_ref().left,
                    Direction::Right => curr.as_ref().right,
                }
            };
            match next {
                Some(node) => curr = node,
                None => return Some(curr),
            }
        }
    }

    fn validate_tree(
        node: Link<K, V>,
        parent: Link<K, V>,
        depth: usize,
        stats: &mut Stats,
    ) -> Result<(i32, usize), Error<K>> {
        let node = match node {
            Some(node) => node,
            None => {
                if let Some(depths) = stats.depths.as_mut() {
                    depths.sample(depth);
                }
                return Ok((-1, 0));
            }
        };
        unsafe {
            let nref = node.as_ref();
            if nref.parent != parent {
                let msg = format!("broken back-reference at depth {}", depth);
                return Err(Error::ParentMismatch(msg));
            }
            let (lh, ln) = Self::validate_tree(nref.left, Some(node), depth + 1, stats)?;
            let (rh, rn) = Self::validate_tree(nref.right, Some(node), depth + 1, stats)?;
            if (lh - rh).abs() > 1 {
                let msg = format!("left: {} right: {}", lh, rh);
                return Err(Error::UnbalancedHeights(msg));
            }
            let height = 1 + cmp::max(lh, rh);
            if nref.height != height {
                let msg = format!("cached: {} actual: {}", nref.height, height);
                return Err(Error::HeightMismatch(msg));
            }
            let count = ln + rn + 1;
            if nref.size != count {
                let msg = format!("cached: {} actual: {}", nref.size, count);
                return Err(Error::SizeMismatch(msg));
            }
            if let Some(left) = nref.left {
                if left.as_ref().key.ge(&nref.key) {
                    let (lkey, pkey) = (left.as_ref().key.clone(), nref.key.clone());
                    return Err(Error::SortError(lkey, pkey));
                }
            }
            if let Some(right) = nref.right {
                if right.as_ref().key.le(&nref.key) {
                    let (rkey, pkey) = (right.as_ref().key.clone(), nref.key.clone());
                    return Err(Error::SortError(rkey, pkey));
                }
            }
            Ok((height, count))
        }
    }

    //--------- rotation and re-balancing routines ----------------

    //              gran                 gran
    //               |                    |
    //             parent                 x
    //              /  \      right      / \
    //             x    c    ------>    a  parent
    //            / \                       /  \
    //           a   b                     b    c
    //
    // pivot `x` upward over its former parent. Pure relinking, heights
    // and sizes of the two moved nodes are fixed up by the caller.
    fn rotate(&mut self, mut x: NodePtr<K, V>, dir: Direction) {
        unsafe {
            let mut parent = match x.as_ref().parent {
                Some(parent) => parent,
                None => panic!("rotate: pivoting the root, call the programmer"),
            };
            let gran = parent.as_ref().parent;
            let displaced = match dir {
                Direction::Left => x.as_ref().left,
                Direction::Right => x.as_ref().right,
            };

            if self.root == Some(parent) {
                self.root = Some(x);
            }
            x.as_mut().parent = gran;
            if let Some(mut gran) = gran {
                if gran.as_ref().left == Some(parent) {
                    gran.as_mut().left = Some(x);
                } else {
                    gran.as_mut().right = Some(x);
                }
            }
            match dir {
                Direction::Left => x.as_mut().left = Some(parent),
                Direction::Right => x.as_mut().right = Some(parent),
            }
            parent.as_mut().parent = Some(x);
            match dir {
                Direction::Left => parent.as_mut().right = displaced,
                Direction::Right => parent.as_mut().left = displaced,
            }
            if let Some(mut displaced) = displaced {
                displaced.as_mut().parent = Some(parent);
            }
        }
    }

    // bottom-up walk after growing under a former leaf. Classify each
    // violating ancestor by its rank differences: (0,1)/(1,0) promote and
    // keep climbing, (0,2)/(2,0) rotate and stop, the rotation restores
    // the subtree to its pre-insert height.
    fn rebalance_insert(&mut self, start: NodePtr<K, V>) -> usize {
        let mut count = 0;
        let mut curr = Some(start);
        while let Some(mut z) = curr {
            unsafe {
                let (ld, rd) = Self::rank_diffs(z);
                if balanced(ld, rd) {
                    break;
                }
                if (ld - rd).abs() == 1 {
                    z.as_mut().height += 1;
                    count += 1;
                    curr = z.as_ref().parent;
                    continue;
                }
                let side = if ld == 0 { Direction::Left } else { Direction::Right };
                let mut child = Self::child(z, side).unwrap();
                if child.as_ref().height - height(Self::child(child, side)) == 1 {
                    self.rotate(child, side.flip());
                    z.as_mut().height -= 1;
                    Self::update_size(z);
                    Self::update_size(child);
                    count += 2;
                } else {
                    let mut grand = Self::child(child, side.flip()).unwrap();
                    self.rotate(grand, side);
                    self.rotate(grand, side.flip());
                    z.as_mut().height -= 1;
                    child.as_mut().height -= 1;
                    grand.as_mut().height += 1;
                    Self::update_size(child);
                    Self::update_size(z);
                    Self::update_size(grand);
                    count += 5;
                }
                break;
            }
        }
        count
    }

    // bottom-up walk from the parent of a vacated slot. Rank differences
    // of (2,2) demote and keep climbing; (1,3)/(3,1) rotate around the
    // taller child: a perfectly balanced child restores the subtree
    // height outright and the walk stops, otherwise the subtree shrinks
    // and the walk continues above the fix point.
    fn rebalance_delete(&mut self, start: Link<K, V>) -> usize {
        let mut count = 0;
        let mut curr = start;
        while let Some(mut z) = curr {
            unsafe {
                let (ld, rd) = Self::rank_diffs(z);
                if balanced(ld, rd) {
                    break;
                }
                if ld == 2 && rd == 2 {
                    z.as_mut().height -= 1;
                    count += 1;
                    curr = z.as_ref().parent;
                    continue;
                }
                let side = if ld == 1 { Direction::Left } else { Direction::Right };
                let mut taller = Self::child(z, side).unwrap();
                let (tld, trd) = Self::rank_diffs(taller);
                if tld == trd {
                    self.rotate(taller, side.flip());
                    z.as_mut().height -= 1;
                    taller.as_mut().height += 1;
                    Self::update_size(z);
                    Self::update_size(taller);
                    count += 3;
                    break;
                } else if taller.as_ref().height - height(Self::child(taller, side.flip())) == 2 {
                    self.rotate(taller, side.flip());
                    z.as_mut().height -= 2;
                    Self::update_size(z);
                    Self::update_size(taller);
                    count += 3;
                    curr = taller.as_ref().parent;
                } else {
                    let mut grand = Self::child(taller, side.flip()).unwrap();
                    self.rotate(grand, side);
                    self.rotate(grand, side.flip());
                    z.as_mut().height -= 2;
                    taller.as_mut().height -= 1;
                    grand.as_mut().height = taller.as_ref().height + 1;
                    Self::update_size(z);
                    Self::update_size(taller);
                    Self::update_size(grand);
                    count += 6;
                    curr = grand.as_ref().parent;
                }
            }
        }
        count
    }

    // bottom-up walk after splicing a pivot at an internal point. Unlike
    // insert the walk cannot stop at the first rotation, and the lifted
    // child may come out with equal rank differences, a case plain insert
    // never produces.
    fn rebalance_join(&mut self, start: NodePtr<K, V>) {
        let mut curr = Some(start);
        while let Some(z) = curr {
            unsafe {
                let (ld, rd) = Self::rank_diffs(z);
                if ld != 0 && rd != 0 {
                    break;
                }
                let next = z.as_ref().parent;
                self.rebalance_join_step(z);
                curr = next;
            }
        }
    }

    fn rebalance_join_step(&mut self, mut z: NodePtr<K, V>) {
        unsafe {
            let (ld, rd) = Self::rank_diffs(z);
            if (ld - rd).abs() == 1 {
                z.as_mut().height += 1;
                return;
            }
            let side = if ld == 0 { Direction::Left } else { Direction::Right };
            let mut child = Self::child(z, side).unwrap();
            let (cld, crd) = Self::rank_diffs(child);
            if cld == crd {
                self.rotate(child, side.flip());
                Self::update_size(z);
                Self::update_size(child);
                child.as_mut().height += 1;
            } else if child.as_ref().height - height(Self::child(child, side)) == 1 {
                self.rotate(child, side.flip());
                z.as_mut().height -= 1;
                Self::update_size(z);
                Self::update_size(child);
            } else {
                let mut grand = Self::child(child, side.flip()).unwrap();
                self.rotate(grand, side);
                self.rotate(grand, side.flip());
                z.as_mut().height -= 1;
                child.as_mut().height -= 1;
                grand.as_mut().height += 1;
                Self::update_size(child);
                Self::update_size(z);
                Self::update_size(grand);
            }
        }
    }

    //--------- link plumbing ----------------

    fn child(node: NodePtr<K, V>, side: Direction) -> Link<K, V> {
        unsafe {
            match side {
                Direction::Left => node.as_ref().left,
                Direction::Right => node.as_ref().right,
            }
        }
    }

    fn set_child(mut node: NodePtr<K, V>, side: Direction, child: Link<K, V>) {
        unsafe {
            match side {
                Direction::Left => node.as_mut().left = child,
                Direction::Right => node.as_mut().right = child,
            }
        }
    }

    // swap out whichever child slot of `parent` holds `old`.
    fn replace_child(mut parent: NodePtr<K, V>, old: NodePtr<K, V>, new: Link<K, V>) {
        unsafe {
            if parent.as_ref().left == Some(old) {
                parent.as_mut().left = new;
            } else {
                parent.as_mut().right = new;
            }
        }
    }

    fn update_size(mut node: NodePtr<K, V>) {
        unsafe {
            let nref = node.as_ref();
            let total = size(nref.left) + size(nref.right) + 1;
            node.as_mut().size = total;
        }
    }

    // propagate a one-entry size delta from `from` up to the root.
    fn adjust_sizes(from: Link<K, V>, grow: bool) {
        let mut curr = from;
        while let Some(mut node) = curr {
            unsafe {
                if grow {
                    node.as_mut().size += 1;
                } else {
                    node.as_mut().size -= 1;
                }
                curr = node.as_ref().parent;
            }
        }
    }

    fn rank_diffs(node: NodePtr<K, V>) -> (i32, i32) {
        unsafe {
            let nref = node.as_ref();
            (nref.height - height(nref.left), nref.height - height(nref.right))
        }
    }
}

impl<K, V> Drop for Avl<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    fn drop(&mut self) {
        // post-order release without an auxiliary stack, the parent
        // back-references carry the walk.
        let mut curr = self.root.take();
        while let Some(node) = curr {
            unsafe {
                if let Some(left) = node.as_ref().left {
                    curr = Some(left);
                } else if let Some(right) = node.as_ref().right {
                    curr = Some(right);
                } else {
                    let parent = node.as_ref().parent;
                    if let Some(parent) = parent {
                        Self::replace_child(parent, node, None);
                    }
                    Node::destroy(node);
                    curr = parent;
                }
            }
        }
    }
}

fn height<K, V>(node: Link<K, V>) -> i32
where
    K: Clone + Ord,
    V: Clone,
{
    match node {
        Some(node) => unsafe { node.as_ref().height },
        None => -1,
    }
}

fn size<K, V>(node: Link<K, V>) -> usize
where
    K: Clone + Ord,
    V: Clone,
{
    match node {
        Some(node) => unsafe { node.as_ref().size },
        None => 0,
    }
}

// a node is AVL-balanced when its rank differences are 1/1, 1/2 or 2/1.
fn balanced(ld: i32, rd: i32) -> bool {
    matches!((ld, rd), (1, 1) | (1, 2) | (2, 1))
}

#[derive(Clone, Copy)]
enum Direction {
    Left,
    Right,
}

impl Direction {
    fn flip(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Node corresponds to a single entry in Avl instance.
pub struct Node<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    key: K,
    value: V,
    height: i32,  // rank above the empty-subtree level, leaf = 0.
    size: usize,  // number of entries in the subtree, including self.
    left: Link<K, V>,
    right: Link<K, V>,
    parent: Link<K, V>, // non-owning back-reference, upward walks only.
}

// Primary operations on a single node.
impl<K, V> Node<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    // CREATE operation, the node starts detached.
    fn create(key: K, value: V) -> NodePtr<K, V> {
        let node = Box::new(Node {
            key,
            value,
            height: 0,
            size: 1,
            left: None,
            right: None,
            parent: None,
        });
        unsafe { NonNull::new_unchecked(Box::into_raw(node)) }
    }

    // release the node, the caller must have unlinked it.
    unsafe fn destroy(node: NodePtr<K, V>) {
        drop(Box::from_raw(node.as_ptr()));
    }

    /// Return a reference to this node's key.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Return a reference to this node's value.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Return this node's height, a leaf measures 0.
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Return the number of entries under and including this node.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Return this node's left child.
    pub fn left_node(&self) -> Option<&Node<K, V>> {
        let node = self.left?;
        Some(unsafe { &*node.as_ptr() })
    }

    /// Return this node's right child.
    pub fn right_node(&self) -> Option<&Node<K, V>> {
        let node = self.right?;
        Some(unsafe { &*node.as_ptr() })
    }

    /// Return this node's parent, `None` at the root.
    pub fn parent_node(&self) -> Option<&Node<K, V>> {
        let node = self.parent?;
        Some(unsafe { &*node.as_ptr() })
    }
}

pub struct Iter<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    next: Link<K, V>,
    _tree: marker::PhantomData<&'a Avl<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        let nref = unsafe { node.as_ref() };
        self.next = successor(node);
        Some((nref.key.clone(), nref.value.clone()))
    }
}

pub struct Keys<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    iter: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(key, _)| key)
    }
}

pub struct Values<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    iter: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(_, value)| value)
    }
}

// in-order successor: leftmost of the right subtree, else the first
// ancestor reached from a left child.
fn successor<K, V>(node: NodePtr<K, V>) -> Link<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    unsafe {
        if let Some(right) = node.as_ref().right {
            let mut curr = right;
            while let Some(left) = curr.as_ref().left {
                curr = left;
            }
            return Some(curr);
        }
        let mut child = node;
        let mut parent = node.as_ref().parent;
        while let Some(p) = parent {
            if p.as_ref().right != Some(child) {
                break;
            }
            child = p;
            parent = p.as_ref().parent;
        }
        parent
    }
}

/// Statistics on [`Avl`] tree. Serves two purpose:
///
/// * To get partial but quick statistics via [`Avl::stats`] method.
/// * To get full statisics via [`Avl::validate`] method.
#[derive(Default, Debug)]
pub struct Stats {
    entries: usize, // number of entries in the tree.
    node_size: usize,
    height: Option<i32>,
    depths: Option<Depth>,
}

impl Stats {
    fn new(entries: usize, node_size: usize) -> Stats {
        Stats {
            entries,
            node_size,
            height: None,
            depths: None,
        }
    }

    #[inline]
    fn set_height(&mut self, height: i32) {
        self.height = Some(height)
    }

    #[inline]
    fn set_depths(&mut self, depths: Depth) {
        self.depths = Some(depths)
    }

    /// Return number entries in [`Avl`] instance.
    #[inline]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Return node-size, including over-head for `Avl<K, V>`. Although
    /// the node overhead is constant, the node size varies based on
    /// key and value types.
    #[inline]
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Return the height of the tree, -1 for an empty tree. Only valid
    /// with statistics from [`Avl::validate`].
    #[inline]
    pub fn height(&self) -> Option<i32> {
        self.height
    }

    /// Return [`Depth`] statistics.
    pub fn depths(&self) -> Option<Depth> {
        match self.depths.as_ref() {
            Some(depths) if depths.samples() > 0 => Some(depths.clone()),
            _ => None,
        }
    }
}
