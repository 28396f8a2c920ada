pub mod paginate;
pub mod params;
pub mod predicate;
pub mod sort;

pub use paginate::{PageWindow, total_pages};
pub use params::{ParamStack, SqlParam};
pub use predicate::{Predicate, PredicateSet};
pub use sort::{SortDir, SortSpec};
