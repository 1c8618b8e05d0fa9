use crate::room_manager::RoomManagerHandle;

#[derive(Clone)]
pub struct AppState {
    pub room_manager: RoomManagerHandle,
}
