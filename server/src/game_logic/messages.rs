use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::map::{Rect, Zone};
use super::player::{AssignedTask, Role};
use super::room::{Body, MeetingReason, Phase};
use super::voting::VoteChoice;
use super::win::Team;

/// Actions sent from a game client (WebSocket) to the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "messageType", content = "payload", rename_all = "camelCase")]
pub enum ClientToServerMessage {
    /// Payload is the host's display name.
    CreateRoom(String),
    JoinRoom {
        code: String,
        #[serde(alias = "playerName")]
        name: String,
    },
    StartGame,
    Move {
        x: f32,
        y: f32,
    },
    /// Index into the sender's own task list.
    CompleteTask(usize),
    Kill(Uuid),
    ReportBody,
    EmergencyMeeting,
    Vote(VoteChoice),
    ChatMessage {
        text: String,
    },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: Uuid,
    pub name: String,
    pub color: &'static str,
    pub is_host: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlayerRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub color: &'static str,
    pub x: f32,
    pub y: f32,
    pub alive: bool,
    pub is_host: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub phase: Phase,
    pub players: Vec<PlayerSnapshot>,
    pub bodies: Vec<Body>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EjectedPlayer {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

/// Events sent from the server to one client or to every member of a room.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(
    tag = "messageType",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerToClientMessage {
    /// First frame on every socket, carrying the connection's own identity.
    Connected { id: Uuid },
    RoomCreated { code: String, is_host: bool },
    RoomJoined { code: String, is_host: bool },
    PlayersUpdate { players: Vec<RosterEntry> },
    GameStarted {
        role: Role,
        tasks: Vec<AssignedTask>,
        map_walls: &'static [Rect],
        map_rooms: &'static [Zone],
    },
    GameState(GameSnapshot),
    PlayerMoved { id: Uuid, x: f32, y: f32 },
    PlayerKilled { victim_id: Uuid, body: Body },
    TaskCompleted {
        player_id: Uuid,
        task_index: usize,
        total_tasks: usize,
        completed_tasks: usize,
    },
    MeetingCalled {
        caller: String,
        reason: MeetingReason,
        alive_players: Vec<PlayerRef>,
        voting_time_ms: u64,
    },
    VoteUpdate { voter_name: String },
    VotingComplete {
        ejected: Option<EjectedPlayer>,
        tie: bool,
        votes: HashMap<Uuid, VoteChoice>,
    },
    ChatUpdate {
        sender: String,
        message: String,
        timestamp: i64,
    },
    GameEnded { winner: Team },
    Error(String),
}

impl ServerToClientMessage {
    pub fn to_ws_text(&self) -> Result<axum::extract::ws::Message, serde_json::Error> {
        serde_json::to_string(self)
            .map(|json_string| axum::extract::ws::Message::Text(json_string.into()))
    }
}

pub fn client_message_from_ws_text(text: &str) -> Result<ClientToServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}
