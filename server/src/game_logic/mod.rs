pub mod effects;
pub mod error;
pub mod map;
pub mod messages;
pub mod player;
pub mod registry;
pub mod room;
pub mod rules;
pub mod utils;
pub mod voting;
pub mod win;

pub use effects::Effect;
pub use messages::ServerToClientMessage;
pub use registry::{RoomRegistry, RoomSummary};
