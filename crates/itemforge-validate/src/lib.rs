pub mod message;
mod validator;

pub use validator::{ValidationLevel, ValidationResult, ValidationSettings, Validator};
