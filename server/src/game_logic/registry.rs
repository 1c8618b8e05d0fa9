use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

use super::effects::Effect;
use super::error::{GameError, GameResult};
use super::map::{GameMap, SHIP};
use super::messages::{ClientToServerMessage, ServerToClientMessage};
use super::room::{Phase, Room};
use super::rules::ROOM_CAPACITY;
use super::utils::{generate_unique_room_code, is_valid_room_code, sanitize_name};

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub code: String,
    pub phase: Phase,
    pub player_count: usize,
    pub capacity: usize,
}

/// Every live room, keyed by code. Rooms are dropped as soon as their last
/// player leaves.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    map: &'static GameMap,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(&SHIP)
    }
}

impl RoomRegistry {
    pub fn new(map: &'static GameMap) -> Self {
        Self {
            rooms: HashMap::new(),
            map,
        }
    }

    #[cfg(test)]
    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_summary(&self, code: &str) -> Option<RoomSummary> {
        self.rooms.get(code).map(|room| RoomSummary {
            code: room.code.clone(),
            phase: room.phase,
            player_count: room.len(),
            capacity: ROOM_CAPACITY,
        })
    }

    pub fn members(&self, code: &str) -> Vec<Uuid> {
        self.rooms
            .get(code)
            .map(Room::member_ids)
            .unwrap_or_default()
    }

    /// Sweeps all rooms. Room counts are small, so there is no reverse index.
    pub fn find_room_by_player(&self, connection_id: &Uuid) -> Option<&Room> {
        self.rooms.values().find(|room| room.contains(connection_id))
    }

    fn room_code_of(&self, connection_id: &Uuid) -> Option<String> {
        self.find_room_by_player(connection_id)
            .map(|room| room.code.clone())
    }

    pub fn create_room<R: Rng + ?Sized>(
        &mut self,
        connection_id: Uuid,
        host_name: &str,
        rng: &mut R,
    ) -> GameResult<Vec<Effect>> {
        if self.find_room_by_player(&connection_id).is_some() {
            return Err(GameError::AlreadyInRoom);
        }
        let name = sanitize_name(host_name).ok_or(GameError::InvalidName)?;
        let code =
            generate_unique_room_code(rng, &self.rooms).ok_or(GameError::RoomCodesExhausted)?;

        let room = Room::new(code.clone(), connection_id, name, self.map);
        let roster = room.roster_broadcast();
        self.rooms.insert(code.clone(), room);

        tracing::info!(
            room.code = %code,
            host.id = %connection_id,
            rooms.active = self.room_count(),
            "Room created"
        );

        Ok(vec![
            Effect::send(
                connection_id,
                ServerToClientMessage::RoomCreated {
                    code,
                    is_host: true,
                },
            ),
            roster,
        ])
    }

    pub fn join_room(
        &mut self,
        connection_id: Uuid,
        code: &str,
        player_name: &str,
    ) -> GameResult<Vec<Effect>> {
        if self.find_room_by_player(&connection_id).is_some() {
            return Err(GameError::AlreadyInRoom);
        }
        let name = sanitize_name(player_name).ok_or(GameError::InvalidName)?;
        let code = code.trim();
        let room = is_valid_room_code(code)
            .then(|| self.rooms.get_mut(code))
            .flatten()
            .ok_or_else(|| GameError::RoomNotFound(code.to_string()))?;

        room.add_player(connection_id, name)?;

        tracing::info!(
            room.code = %room.code,
            connection.id = %connection_id,
            players = room.len(),
            "Player joined room"
        );

        Ok(vec![
            Effect::send(
                connection_id,
                ServerToClientMessage::RoomJoined {
                    code: room.code.clone(),
                    is_host: room.host == connection_id,
                },
            ),
            room.roster_broadcast(),
        ])
    }

    /// Drops a connection from whatever room it sits in, tearing the room
    /// down if that leaves it empty.
    pub fn remove_player(&mut self, connection_id: Uuid) -> Vec<Effect> {
        let Some(code) = self.room_code_of(&connection_id) else {
            return Vec::new();
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return Vec::new();
        };

        let effects = room.remove_player(connection_id);
        tracing::info!(
            room.code = %code,
            connection.id = %connection_id,
            players = room.len(),
            "Player left room"
        );

        if room.is_empty() {
            self.rooms.remove(&code);
            tracing::info!(
                room.code = %code,
                rooms.active = self.room_count(),
                "Room destroyed"
            );
        }
        effects
    }

    /// Applies one client action. The acting room is looked up fresh on every call.
    pub fn handle_action<R: Rng + ?Sized>(
        &mut self,
        connection_id: Uuid,
        action: ClientToServerMessage,
        now: Instant,
        rng: &mut R,
    ) -> GameResult<Vec<Effect>> {
        match action {
            ClientToServerMessage::CreateRoom(name) => self.create_room(connection_id, &name, rng),
            ClientToServerMessage::JoinRoom { code, name } => {
                self.join_room(connection_id, &code, &name)
            }
            action => {
                let code = self
                    .room_code_of(&connection_id)
                    .ok_or(GameError::Precondition("not in a room"))?;
                let room = self
                    .rooms
                    .get_mut(&code)
                    .ok_or(GameError::Precondition("not in a room"))?;

                match action {
                    ClientToServerMessage::StartGame => room.start_game(connection_id, rng),
                    ClientToServerMessage::Move { x, y } => room.move_player(connection_id, x, y),
                    ClientToServerMessage::CompleteTask(index) => {
                        room.complete_task(connection_id, index)
                    }
                    ClientToServerMessage::Kill(target) => room.kill(connection_id, target, now),
                    ClientToServerMessage::ReportBody => room.report_body(connection_id),
                    ClientToServerMessage::EmergencyMeeting => {
                        room.emergency_meeting(connection_id)
                    }
                    ClientToServerMessage::Vote(choice) => room.cast_vote(connection_id, choice),
                    ClientToServerMessage::ChatMessage { text } => {
                        room.post_chat(connection_id, &text)
                    }
                    ClientToServerMessage::CreateRoom(_)
                    | ClientToServerMessage::JoinRoom { .. } => Err(GameError::AlreadyInRoom),
                }
            }
        }
    }

    pub fn handle_meeting_timeout(&mut self, code: &str, meeting: u64) -> Vec<Effect> {
        let Some(room) = self.rooms.get_mut(code) else {
            return Vec::new();
        };
        match room.meeting_timed_out(meeting) {
            Ok(effects) => effects,
            Err(e) => {
                tracing::debug!(room.code = %code, meeting, error = %e, "Ignoring meeting timeout");
                Vec::new()
            }
        }
    }

    pub fn handle_resume(&mut self, code: &str, meeting: u64) -> Vec<Effect> {
        self.rooms
            .get_mut(code)
            .map(|room| room.resume(meeting))
            .unwrap_or_default()
    }

    /// Full snapshots for every room that is not holding on a vote result.
    pub fn tick_snapshots(&self) -> Vec<Effect> {
        self.rooms
            .values()
            .filter(|room| !room.is_holding_result())
            .map(Room::state_broadcast)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_logic::player::Role;
    use crate::game_logic::voting::VoteChoice;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup() -> (RoomRegistry, StdRng) {
        (RoomRegistry::default(), StdRng::seed_from_u64(99))
    }

    fn created_code(effects: &[Effect]) -> String {
        effects
            .iter()
            .find_map(|effect| match effect {
                Effect::Send {
                    message: ServerToClientMessage::RoomCreated { code, .. },
                    ..
                } => Some(code.clone()),
                _ => None,
            })
            .unwrap()
    }

    fn seated(count: usize) -> (RoomRegistry, StdRng, String, Vec<Uuid>) {
        let (mut registry, mut rng) = setup();
        let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        let effects = registry.create_room(ids[0], "host", &mut rng).unwrap();
        let code = created_code(&effects);
        for (i, id) in ids.iter().enumerate().skip(1) {
            registry.join_room(*id, &code, &format!("p{}", i)).unwrap();
        }
        (registry, rng, code, ids)
    }

    fn act(
        registry: &mut RoomRegistry,
        rng: &mut StdRng,
        id: Uuid,
        action: ClientToServerMessage,
    ) -> GameResult<Vec<Effect>> {
        registry.handle_action(id, action, Instant::now(), rng)
    }

    #[test]
    fn test_create_room_seats_host() {
        let (mut registry, mut rng) = setup();
        let host = Uuid::new_v4();
        let effects = registry.create_room(host, "  Ada ", &mut rng).unwrap();
        let code = created_code(&effects);

        assert!(is_valid_room_code(&code));
        let room = registry.room(&code).unwrap();
        assert_eq!(room.host, host);
        assert_eq!(room.phase, Phase::Lobby);
        assert_eq!(room.players()[0].name, "Ada");
        assert!(matches!(
            &effects[1],
            Effect::Broadcast { message: ServerToClientMessage::PlayersUpdate { players }, .. }
                if players.len() == 1 && players[0].is_host
        ));
    }

    #[test]
    fn test_create_and_join_reject_bad_requests() {
        let (mut registry, mut rng, code, ids) = seated(2);
        assert_eq!(
            registry.create_room(ids[1], "again", &mut rng),
            Err(GameError::AlreadyInRoom)
        );
        assert_eq!(
            registry.join_room(ids[1], &code, "again"),
            Err(GameError::AlreadyInRoom)
        );

        let stranger = Uuid::new_v4();
        assert_eq!(
            registry.join_room(stranger, &code, "   "),
            Err(GameError::InvalidName)
        );
        assert_eq!(
            registry.create_room(stranger, "", &mut rng),
            Err(GameError::InvalidName)
        );
        assert_eq!(
            registry.join_room(stranger, "000000", "x"),
            Err(GameError::RoomNotFound("000000".to_string()))
        );
        assert_eq!(
            registry.join_room(stranger, "abc", "x"),
            Err(GameError::RoomNotFound("abc".to_string()))
        );
        assert_eq!(registry.room(&code).unwrap().len(), 2);
    }

    #[test]
    fn test_join_broadcasts_roster() {
        let (mut registry, _rng, code, _ids) = seated(3);
        let newcomer = Uuid::new_v4();
        let effects = registry.join_room(newcomer, &code, "Grace").unwrap();
        assert_eq!(
            effects[0],
            Effect::send(
                newcomer,
                ServerToClientMessage::RoomJoined {
                    code: code.clone(),
                    is_host: false
                }
            )
        );
        assert!(matches!(
            &effects[1],
            Effect::Broadcast { room, message: ServerToClientMessage::PlayersUpdate { players } }
                if *room == code && players.len() == 4
        ));
    }

    #[test]
    fn test_find_room_by_player_sweeps_all_rooms() {
        let (mut registry, mut rng) = setup();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let code_a = created_code(&registry.create_room(a, "a", &mut rng).unwrap());
        let code_b = created_code(&registry.create_room(b, "b", &mut rng).unwrap());
        assert_ne!(code_a, code_b);
        assert_eq!(registry.find_room_by_player(&b).unwrap().code, code_b);
        assert!(registry.find_room_by_player(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_last_player_leaving_destroys_room() {
        let (mut registry, _rng, code, ids) = seated(2);
        registry.remove_player(ids[0]);
        assert_eq!(registry.room(&code).unwrap().host, ids[1]);
        registry.remove_player(ids[1]);
        assert!(registry.room(&code).is_none());
        assert_eq!(registry.room_count(), 0);
        assert!(registry.remove_player(ids[1]).is_empty());
    }

    #[test]
    fn test_actions_outside_a_room_fail_closed() {
        let (mut registry, mut rng) = setup();
        let result = act(
            &mut registry,
            &mut rng,
            Uuid::new_v4(),
            ClientToServerMessage::Move { x: 1.0, y: 1.0 },
        );
        assert!(matches!(result, Err(GameError::Precondition(_))));
    }

    #[test]
    fn test_dispatch_drives_a_round_to_a_meeting() {
        let (mut registry, mut rng, code, ids) = seated(4);
        assert_eq!(
            act(&mut registry, &mut rng, ids[1], ClientToServerMessage::StartGame),
            Err(GameError::NotHost)
        );
        act(&mut registry, &mut rng, ids[0], ClientToServerMessage::StartGame).unwrap();
        assert_eq!(registry.room(&code).unwrap().phase, Phase::Playing);

        let caller = ids[2];
        act(
            &mut registry,
            &mut rng,
            caller,
            ClientToServerMessage::EmergencyMeeting,
        )
        .unwrap();
        let room = registry.room(&code).unwrap();
        assert_eq!(room.phase, Phase::Meeting);
        let meeting = room.current_meeting().unwrap();

        act(
            &mut registry,
            &mut rng,
            caller,
            ClientToServerMessage::Vote(VoteChoice::Skip),
        )
        .unwrap();
        act(
            &mut registry,
            &mut rng,
            caller,
            ClientToServerMessage::ChatMessage {
                text: "skip it".to_string(),
            },
        )
        .unwrap();

        let effects = registry.handle_meeting_timeout(&code, meeting);
        assert!(effects.iter().any(|e| matches!(e, Effect::ScheduleResume { .. })));
        assert_eq!(registry.room(&code).unwrap().phase, Phase::Playing);
        assert!(registry.handle_meeting_timeout(&code, meeting).is_empty());
    }

    #[test]
    fn test_ticks_pause_until_resume() {
        let (mut registry, mut rng, code, ids) = seated(4);
        act(&mut registry, &mut rng, ids[0], ClientToServerMessage::StartGame).unwrap();
        assert_eq!(registry.tick_snapshots().len(), 1);

        act(
            &mut registry,
            &mut rng,
            ids[1],
            ClientToServerMessage::EmergencyMeeting,
        )
        .unwrap();
        for id in &ids {
            act(
                &mut registry,
                &mut rng,
                *id,
                ClientToServerMessage::Vote(VoteChoice::Skip),
            )
            .unwrap();
        }
        assert!(registry.room(&code).unwrap().is_holding_result());
        assert!(registry.tick_snapshots().is_empty());

        assert!(registry.handle_resume(&code, 0).is_empty());
        assert!(registry.tick_snapshots().is_empty());

        let effects = registry.handle_resume(&code, 1);
        assert!(matches!(
            &effects[0],
            Effect::Broadcast { message: ServerToClientMessage::GameState(_), .. }
        ));
        assert_eq!(registry.tick_snapshots().len(), 1);
    }

    #[test]
    fn test_impostor_disconnect_ends_round() {
        let (mut registry, mut rng, code, ids) = seated(4);
        act(&mut registry, &mut rng, ids[0], ClientToServerMessage::StartGame).unwrap();
        let impostor = registry
            .room(&code)
            .unwrap()
            .players()
            .iter()
            .find(|p| p.role == Role::Impostor)
            .map(|p| p.id)
            .unwrap();

        let effects = registry.remove_player(impostor);
        assert_eq!(registry.room(&code).unwrap().phase, Phase::Ended);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Broadcast { message: ServerToClientMessage::GameEnded { .. }, .. }
        )));

        let summary = registry.room_summary(&code).unwrap();
        assert_eq!(summary.player_count, 3);
        assert_eq!(summary.phase, Phase::Ended);
        assert_eq!(summary.capacity, ROOM_CAPACITY);
    }
}
