pub mod auth;
pub mod care_team;
pub mod catalog;
pub mod drug_lookup;
pub mod history;
pub mod interactions;
pub mod middleware;
pub mod rest;
pub mod router;
pub mod state;

// Re-export what the binaries need to build and serve the application.
pub use middleware::require_auth;
pub use router::app_router;
pub use state::{AppState, Ports};
