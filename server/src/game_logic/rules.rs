use std::time::Duration;

pub const KILL_COOLDOWN: Duration = Duration::from_secs(20);
pub const VOTING_WINDOW: Duration = Duration::from_secs(30);
/// How long clients get to show the voting result before live updates resume.
pub const RESUME_DELAY: Duration = Duration::from_secs(5);

pub const TASKS_PER_CREWMATE: usize = 3;
pub const PROXIMITY_RADIUS: f32 = 50.0;
pub const PLAYER_RADIUS: f32 = 20.0;

pub const ROOM_CAPACITY: usize = 10;
pub const MIN_PLAYERS_TO_START: usize = 4;
pub const IMPOSTOR_DIVISOR: usize = 4;

pub const MAX_NAME_CHARS: usize = 20;
pub const MAX_CHAT_CHARS: usize = 200;
pub const MAX_CHAT_LOG: usize = 100;

/// Handed out in order to players joining a room, skipping colours already taken.
pub const PLAYER_COLORS: [&str; 6] = [
    "#3498db", "#e74c3c", "#f39c12", "#9b59b6", "#1abc9c", "#34495e",
];

pub const ROOM_CODE_MIN: u32 = 100_000;
pub const ROOM_CODE_MAX: u32 = 999_999;

pub fn impostor_count(player_count: usize) -> usize {
    (player_count / IMPOSTOR_DIVISOR).max(1)
}
