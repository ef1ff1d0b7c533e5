pub mod error;
pub mod value;

pub use error::{ReconError, Result, StoreError, StoreResult};
pub use value::{Row, Value};
