pub mod error;
pub mod relay;
pub mod services;
pub mod traits;
