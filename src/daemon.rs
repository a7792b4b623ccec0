pub mod bridge;
pub mod coordinator;
pub mod events;
pub mod feed;
pub mod scheduler;
pub mod server;
pub mod transport;
