/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs/enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

pub mod models;
pub mod pagination;
pub mod requests;
pub mod responses;

pub use models::*;
pub use pagination::{Pagination, QueryMap, QueryParam, apply_all, count, newer_than, older_than};
pub use requests::*;
pub use responses::*;
