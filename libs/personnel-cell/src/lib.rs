pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use router::personnel_routes;
pub use state::AppState;
