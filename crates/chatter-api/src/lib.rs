pub mod cache;
pub mod chat;
pub mod error;
pub mod extract;
pub mod room;
pub mod state;

pub use error::ChatError;
pub use room::ChatRoom;
pub use state::{AppState, AppStateInner};
