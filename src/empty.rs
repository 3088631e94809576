/// Can be used while indexing keys without values, like ``Avl<K, Empty>``.
#[derive(Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord)]
pub struct Empty {}
