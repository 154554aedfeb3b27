//! Declarative query-backed endpoints: validate input, bind parameters,
//! run a query or stored procedure, shape the rows.

pub mod adapter;
pub mod catalog;
pub mod descriptor;
pub mod shape;
pub mod validate;

pub use adapter::run_endpoint;
pub use catalog::catalog;
pub use descriptor::{EndpointDescriptor, Method, QueryTarget, Shape};
pub use shape::shape_rows;
pub use validate::{validate, Check, FieldKind, FieldRule, ValidationError};
