use std::sync::Arc;

use crate::room::ChatRoom;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub room: ChatRoom,
}
