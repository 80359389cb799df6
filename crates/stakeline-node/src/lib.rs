//! # Stakeline Node
//!
//! HTTP surface of the reward ledger.
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | POST | `/api/save-wallet/` | bootstrap wallet |
//! | GET | `/api/user-stats/:address/` | account stats |
//! | GET | `/api/staking/list/:address/` | list positions |
//! | POST | `/api/staking/process/` | process stake |
//! | POST | `/api/staking/unlock/:id/` | unlock position |
//! | GET | `/api/rewards/:address/` | reward history |
//! | GET | `/health`, `/metrics` | liveness, Prometheus |

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;

pub use api::{router, AppState};
pub use config::NodeConfig;
pub use error::ApiError;
pub use metrics::Metrics;
pub use server::{build, serve};
