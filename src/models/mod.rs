pub mod enums;
pub mod ids;
pub mod patient;
pub mod disease;
pub mod report;
pub mod upload;
pub mod user;

pub use enums::*;
pub use ids::*;
pub use patient::*;
pub use disease::*;
pub use report::*;
pub use upload::*;
pub use user::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },
}
