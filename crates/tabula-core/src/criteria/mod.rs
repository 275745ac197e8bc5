//! Criteria model
//!
//! Plain data describing a query: what to join, what to filter on, how to
//! sort and page. Compilation lives in `crate::compiler`.

pub mod predicate;
pub mod predicates;
pub mod root;

pub use predicate::{Comparison, ComparisonOp, Predicate};
pub use predicates::{Predicates, Sort, SortDirection};
pub use root::{Join, JoinMode, Root, DEFAULT_ROOT_ALIAS};
