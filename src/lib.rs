mod avl;
mod depth;
mod empty;
mod error;

pub use crate::avl::{Avl, Iter, Keys, Node, Stats, Values};
pub use crate::depth::Depth;
pub use crate::empty::Empty;
pub use crate::error::Error;

#[cfg(test)]
mod avl_test;
