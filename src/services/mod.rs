pub mod dataset;
pub mod evaluation;
pub mod loader;
pub mod presenter;
pub mod source;
pub mod svd;
pub mod top_n;

pub use loader::Loader;
pub use source::{RecommendationSource, SnapshotSource, SvdSource};
pub use top_n::compute_recommendations;
