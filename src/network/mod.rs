pub mod transport;

pub use transport::Transport;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws";
