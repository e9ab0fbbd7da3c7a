pub mod aggregate;
pub mod by_sample;
pub mod common;
pub mod data;
pub mod de;
pub mod grouping;
pub mod method_meta;
pub mod methods;
pub mod permutation;
pub mod resource;
pub mod scorer;
pub mod simulate;
pub mod stats;
pub mod table;

pub use by_sample::{by_sample, Verbosity};
pub use data::{ExprData, MatrixSource, ObsColumn};
pub use method_meta::{MethodMeta, MethodRegistry};
pub use resource::{LrPair, Resource};
pub use scorer::{InteractionScorer, LrPolicy, ScoreArgs};
pub use table::{LrRow, LrTable};
