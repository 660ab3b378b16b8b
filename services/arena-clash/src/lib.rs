//! Arena Clash - esports tournament backend
//!
//! Players join paid tournaments from a wallet that is topped up through the
//! ZapUPI gateway. Every balance change is a guarded, all-or-nothing store
//! transaction.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod instructions;
pub mod state;

pub use api::{api_router, webhook_router, AppState, DocStore};
pub use config::{ConfigError, GatewayConfig, ServiceConfig};
pub use error::ArenaError;
pub use gateway::{PaymentGateway, ZapUpiClient};
