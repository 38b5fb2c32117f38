pub mod error;
pub mod types;
pub mod value;

pub use error::{MigrationError, PlanIntegrityError, Result};
pub use types::{Column, Row, Schema};
pub use value::{DataType, Value};
