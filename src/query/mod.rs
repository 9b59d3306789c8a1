pub mod fuzzy;
pub mod iter;
pub mod wildcard;

pub use fuzzy::{bounded_distance, within_distance};
pub use iter::{NodeMatch, PostingIter, PostingSet};
pub use wildcard::{WildcardError, WildcardPattern};
