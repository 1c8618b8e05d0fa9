use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GameError {
    #[error("Room {0} not found")]
    RoomNotFound(String),
    #[error("Room is full")]
    RoomFull,
    #[error("Game already in progress")]
    GameInProgress,
    #[error("Need at least {required} players to start (currently {present})")]
    InsufficientPlayers { required: usize, present: usize },
    #[error("Only the host can start the game")]
    NotHost,
    #[error("You are already in a room")]
    AlreadyInRoom,
    #[error("Player name must not be empty")]
    InvalidName,
    #[error("Kill on cooldown ({remaining_secs}s remaining)")]
    KillOnCooldown { remaining_secs: u64 },
    #[error("No free room codes available")]
    RoomCodesExhausted,
    /// Wrong phase, dead actor, wrong role, out of range. Never shown to clients.
    #[error("Action rejected: {0}")]
    Precondition(&'static str),
}

impl GameError {
    /// Whether the requesting client is told about the failure.
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, GameError::Precondition(_))
    }
}

pub type GameResult<T> = std::result::Result<T, GameError>;
