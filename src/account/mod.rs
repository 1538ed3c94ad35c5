//! Account Store
//!
//! Read/create access to account rows. Balance mutation is owned by the
//! transfer engine and never happens here.

pub mod error;
pub mod models;
pub mod service;

// Re-export commonly used types
pub use error::AccountError;
pub use models::{Account, AccountId};
pub use service::AccountService;
