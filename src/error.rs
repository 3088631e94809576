/// Error enumerates over all possible errors that this package
/// shall return.
#[derive(Debug, PartialEq)]
pub enum Error<K>
where
    K: Clone + Ord,
{
    /// Returned by insert() API when key is already present. Carries the
    /// rejected key back to the caller, the index is left unchanged.
    DuplicateKey(K),
    /// Returned by delete() API when key is not present. The index is
    /// left unchanged.
    KeyNotFound,
    /// Fatal case, breaking the AVL balance rule. The String component
    /// of this variant can be used for debugging.
    UnbalancedHeights(String),
    /// Fatal case, a node's cached height disagrees with its subtrees.
    HeightMismatch(String),
    /// Fatal case, a node's cached subtree-size disagrees with its
    /// subtrees, or the index entry-count disagrees with the tree.
    SizeMismatch(String),
    /// Fatal case, index entries are not in sort-order.
    SortError(K, K),
    /// Fatal case, a child's parent back-reference does not point at
    /// its actual parent.
    ParentMismatch(String),
    /// Fatal case, cached min/max entry is not the true extreme.
    CacheMismatch(String),
}
