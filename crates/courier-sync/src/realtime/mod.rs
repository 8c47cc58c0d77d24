//! Realtime notifications over Socket.IO.

pub mod channel;
pub mod protocol;
pub mod transport;

pub use channel::{NotificationChannel, RoomScope};
pub use protocol::NotificationEvent;
pub use transport::ConnectionState;
