pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the WebSocket handler for the binary that builds the router.
pub use ws_handler::ws_handler;
