pub mod error;
pub mod expr;
pub mod filter_where;
pub mod matcher;
pub mod types;

pub use error::FilterError;
pub use expr::FilterExpr;
pub use filter_where::{SegmentWhere, SqlParam};
pub use types::*;
