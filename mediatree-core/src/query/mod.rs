//! Item queries: construction, capability analysis, predicate evaluation,
//! sorting and paging, and the planner that picks an execution path.

pub mod builder;
pub mod capability;
pub mod context;
pub mod filtering;
pub mod paging;
pub mod planner;
pub mod request;
pub mod sorting;
pub mod types;

pub use builder::ItemQueryBuilder;
pub use capability::{PostFilterReason, collapse_box_sets, requires_post_filtering};
pub use context::EvaluationContext;
pub use planner::{ExecutionPath, QueryPlan, QueryPlanner};
pub use request::{ItemsRequest, ParsedItemsRequest};
pub use types::{ItemQuery, QueryError, SortSpec};
