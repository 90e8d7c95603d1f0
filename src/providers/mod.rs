pub mod agro_api;
pub mod error;

pub use agro_api::{AgroApiClient, AuthResponse};
pub use error::ApiError;
