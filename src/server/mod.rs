// Submodules
pub mod handlers;
pub mod routes;
pub mod runtime;
mod state;
pub mod upload;

pub use routes::create_router;
pub use state::AppState;
