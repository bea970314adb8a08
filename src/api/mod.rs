mod handlers;
pub mod response;
mod routes;
pub mod wire;

pub use routes::create_router;
