use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

use super::effects::Effect;
use super::error::{GameError, GameResult};
use super::map::{GameMap, Position};
use super::messages::{
    EjectedPlayer, GameSnapshot, PlayerRef, PlayerSnapshot, RosterEntry, ServerToClientMessage,
};
use super::player::{AssignedTask, Player, Role};
use super::rules::{
    KILL_COOLDOWN, MAX_CHAT_LOG, MIN_PLAYERS_TO_START, PLAYER_COLORS, PLAYER_RADIUS,
    PROXIMITY_RADIUS, RESUME_DELAY, ROOM_CAPACITY, TASKS_PER_CREWMATE, VOTING_WINDOW,
    impostor_count,
};
use super::utils::sanitize_chat;
use super::voting::{self, VoteChoice, VoteOutcome};
use super::win::{self, Team};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Playing,
    Meeting,
    Ended,
}

impl Phase {
    pub fn in_round(&self) -> bool {
        matches!(self, Phase::Playing | Phase::Meeting)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MeetingReason {
    Body,
    Emergency,
}

/// Where a player was killed. Lives until the next meeting resolves.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Body {
    pub name: String,
    #[serde(flatten)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub sender: String,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
struct Meeting {
    number: u64,
    caller: String,
}

#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub host: Uuid,
    pub phase: Phase,
    pub map: &'static GameMap,
    players: Vec<Player>,
    bodies: Vec<Body>,
    meeting: Option<Meeting>,
    meetings_held: u64,
    votes: HashMap<Uuid, VoteChoice>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    last_kill: HashMap<Uuid, Instant>,
    chat: Vec<ChatEntry>,
    /// Meeting whose result is on screen, until its deferred state push.
    resume_pending: Option<u64>,
}

impl Room {
    pub fn new(code: String, host_id: Uuid, host_name: String, map: &'static GameMap) -> Self {
        let host = Player::new(
            host_id,
            host_name,
            PLAYER_COLORS[0],
            map.spawn_point(0, ROOM_CAPACITY),
        );
        Self {
            code,
            host: host_id,
            phase: Phase::Lobby,
            map,
            players: vec![host],
            bodies: Vec::new(),
            meeting: None,
            meetings_held: 0,
            votes: HashMap::new(),
            total_tasks: 0,
            completed_tasks: 0,
            last_kill: HashMap::new(),
            chat: Vec::new(),
            resume_pending: None,
        }
    }

    pub fn player(&self, id: &Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *id)
    }

    fn player_mut(&mut self, id: &Uuid) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == *id)
    }

    #[cfg(test)]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.player(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn member_ids(&self) -> Vec<Uuid> {
        self.players.iter().map(|p| p.id).collect()
    }

    #[cfg(test)]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    #[cfg(test)]
    pub fn chat_log(&self) -> &[ChatEntry] {
        &self.chat
    }

    #[cfg(test)]
    pub fn current_meeting(&self) -> Option<u64> {
        self.meeting.as_ref().map(|m| m.number)
    }

    #[cfg(test)]
    pub fn meeting_caller(&self) -> Option<&str> {
        self.meeting.as_ref().map(|m| m.caller.as_str())
    }

    #[cfg(test)]
    pub fn vote_of(&self, voter: &Uuid) -> Option<VoteChoice> {
        self.votes.get(voter).copied()
    }

    /// Periodic snapshots are held back while a vote result is displayed.
    pub fn is_holding_result(&self) -> bool {
        self.resume_pending.is_some()
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.players
            .iter()
            .map(|p| RosterEntry {
                id: p.id,
                name: p.name.clone(),
                color: p.color,
                is_host: p.id == self.host,
            })
            .collect()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            phase: self.phase,
            players: self
                .players
                .iter()
                .map(|p| PlayerSnapshot {
                    id: p.id,
                    name: p.name.clone(),
                    color: p.color,
                    x: p.position.x,
                    y: p.position.y,
                    alive: p.alive,
                    is_host: p.id == self.host,
                })
                .collect(),
            bodies: self.bodies.clone(),
            total_tasks: self.total_tasks,
            completed_tasks: self.completed_tasks,
        }
    }

    pub fn roster_broadcast(&self) -> Effect {
        Effect::broadcast(
            &self.code,
            ServerToClientMessage::PlayersUpdate {
                players: self.roster(),
            },
        )
    }

    pub fn state_broadcast(&self) -> Effect {
        Effect::broadcast(&self.code, ServerToClientMessage::GameState(self.snapshot()))
    }

    pub fn add_player(&mut self, id: Uuid, name: String) -> GameResult<()> {
        if self.phase != Phase::Lobby {
            return Err(GameError::GameInProgress);
        }
        if self.players.len() >= ROOM_CAPACITY {
            return Err(GameError::RoomFull);
        }
        let spawn = self.map.spawn_point(self.players.len(), ROOM_CAPACITY);
        let color = self.free_color();
        self.players.push(Player::new(id, name, color, spawn));
        Ok(())
    }

    /// First palette colour nobody in the room is wearing. Once the palette
    /// runs out colours repeat by seat.
    fn free_color(&self) -> &'static str {
        PLAYER_COLORS
            .iter()
            .copied()
            .find(|color| self.players.iter().all(|p| p.color != *color))
            .unwrap_or(PLAYER_COLORS[self.players.len() % PLAYER_COLORS.len()])
    }

    pub fn start_game<R: Rng + ?Sized>(
        &mut self,
        requester: Uuid,
        rng: &mut R,
    ) -> GameResult<Vec<Effect>> {
        if requester != self.host {
            return Err(GameError::NotHost);
        }
        if self.phase.in_round() {
            return Err(GameError::GameInProgress);
        }
        if self.players.len() < MIN_PLAYERS_TO_START {
            return Err(GameError::InsufficientPlayers {
                required: MIN_PLAYERS_TO_START,
                present: self.players.len(),
            });
        }

        let player_count = self.players.len();
        let impostors = impostor_count(player_count);
        let tasks_each = TASKS_PER_CREWMATE.min(self.map.tasks.len());

        let mut order: Vec<usize> = (0..player_count).collect();
        order.shuffle(rng);

        let mut total_tasks = 0;
        for (rank, index) in order.into_iter().enumerate() {
            let (role, tasks) = if rank < impostors {
                (Role::Impostor, Vec::new())
            } else {
                let tasks: Vec<AssignedTask> = self
                    .map
                    .tasks
                    .choose_multiple(rng, tasks_each)
                    .map(AssignedTask::from)
                    .collect();
                (Role::Crewmate, tasks)
            };
            total_tasks += tasks.len();
            let spawn = self.map.spawn_point(index, player_count);
            self.players[index].assign_round(role, tasks, spawn);
        }

        self.phase = Phase::Playing;
        self.bodies.clear();
        self.votes.clear();
        self.chat.clear();
        self.last_kill.clear();
        self.meeting = None;
        self.resume_pending = None;
        self.total_tasks = total_tasks;
        self.completed_tasks = 0;

        tracing::info!(
            room.code = %self.code,
            players = player_count,
            impostors,
            total_tasks,
            "Round started"
        );

        let mut effects: Vec<Effect> = self
            .players
            .iter()
            .map(|p| {
                Effect::send(
                    p.id,
                    ServerToClientMessage::GameStarted {
                        role: p.role,
                        tasks: p.tasks.clone(),
                        map_walls: self.map.walls,
                        map_rooms: self.map.zones,
                    },
                )
            })
            .collect();
        effects.push(self.state_broadcast());
        Ok(effects)
    }

    fn alive_actor(&self, id: &Uuid, phase: Phase) -> GameResult<&Player> {
        if self.phase != phase {
            return Err(GameError::Precondition("wrong phase"));
        }
        let player = self
            .player(id)
            .ok_or(GameError::Precondition("unknown player"))?;
        if !player.alive {
            return Err(GameError::Precondition("player is dead"));
        }
        Ok(player)
    }

    pub fn move_player(&mut self, id: Uuid, x: f32, y: f32) -> GameResult<Vec<Effect>> {
        self.alive_actor(&id, Phase::Playing)?;
        if !x.is_finite() || !y.is_finite() {
            return Err(GameError::Precondition("non-finite position"));
        }
        let target = self.map.clamp(Position::new(x, y), PLAYER_RADIUS);
        if self.map.collides(&target, PLAYER_RADIUS) {
            return Err(GameError::Precondition("blocked by wall"));
        }

        if let Some(player) = self.player_mut(&id) {
            player.position = target;
        }
        Ok(vec![Effect::broadcast(
            &self.code,
            ServerToClientMessage::PlayerMoved {
                id,
                x: target.x,
                y: target.y,
            },
        )])
    }

    pub fn complete_task(&mut self, id: Uuid, task_index: usize) -> GameResult<Vec<Effect>> {
        let player = self.alive_actor(&id, Phase::Playing)?;
        if !player.is_crewmate() {
            return Err(GameError::Precondition("only crewmates do tasks"));
        }
        let task = player
            .tasks
            .get(task_index)
            .ok_or(GameError::Precondition("no such task"))?;
        if player.completed[task_index] {
            return Err(GameError::Precondition("task already completed"));
        }
        if !player.position.is_within(&task.position(), PROXIMITY_RADIUS) {
            return Err(GameError::Precondition("too far from task"));
        }

        if let Some(player) = self.player_mut(&id) {
            player.completed[task_index] = true;
        }
        self.completed_tasks += 1;

        let mut effects = vec![Effect::broadcast(
            &self.code,
            ServerToClientMessage::TaskCompleted {
                player_id: id,
                task_index,
                total_tasks: self.total_tasks,
                completed_tasks: self.completed_tasks,
            },
        )];
        effects.extend(self.check_winner());
        Ok(effects)
    }

    pub fn kill(
        &mut self,
        killer_id: Uuid,
        target_id: Uuid,
        now: Instant,
    ) -> GameResult<Vec<Effect>> {
        let killer = self.alive_actor(&killer_id, Phase::Playing)?;
        if !killer.is_impostor() {
            return Err(GameError::Precondition("only impostors kill"));
        }
        if killer_id == target_id {
            return Err(GameError::Precondition("cannot target self"));
        }
        let target = self
            .player(&target_id)
            .ok_or(GameError::Precondition("unknown target"))?;
        if !target.alive || target.is_impostor() {
            return Err(GameError::Precondition("invalid target"));
        }
        if let Some(last) = self.last_kill.get(&killer_id) {
            let ready_at = *last + KILL_COOLDOWN;
            if now < ready_at {
                let remaining = ready_at.duration_since(now);
                return Err(GameError::KillOnCooldown {
                    remaining_secs: remaining.as_secs_f32().ceil() as u64,
                });
            }
        }
        if !killer.position.is_within(&target.position, PROXIMITY_RADIUS) {
            return Err(GameError::Precondition("target out of range"));
        }

        let body = Body {
            name: target.name.clone(),
            position: target.position,
        };
        if let Some(target) = self.player_mut(&target_id) {
            target.alive = false;
        }
        self.bodies.push(body.clone());
        self.last_kill.insert(killer_id, now);

        tracing::debug!(
            room.code = %self.code,
            victim.id = %target_id,
            zone = self.map.zone_at(&body.position).unwrap_or("corridor"),
            "Player killed"
        );

        let mut effects = vec![Effect::broadcast(
            &self.code,
            ServerToClientMessage::PlayerKilled {
                victim_id: target_id,
                body,
            },
        )];
        effects.extend(self.check_winner());
        Ok(effects)
    }

    pub fn report_body(&mut self, reporter: Uuid) -> GameResult<Vec<Effect>> {
        let player = self.alive_actor(&reporter, Phase::Playing)?;
        let near_body = self
            .bodies
            .iter()
            .any(|body| player.position.is_within(&body.position, PROXIMITY_RADIUS));
        if !near_body {
            return Err(GameError::Precondition("no body in range"));
        }
        Ok(self.start_meeting(reporter, MeetingReason::Body))
    }

    pub fn emergency_meeting(&mut self, caller: Uuid) -> GameResult<Vec<Effect>> {
        self.alive_actor(&caller, Phase::Playing)?;
        Ok(self.start_meeting(caller, MeetingReason::Emergency))
    }

    fn start_meeting(&mut self, caller: Uuid, reason: MeetingReason) -> Vec<Effect> {
        let caller_name = self
            .player(&caller)
            .map(|p| p.name.clone())
            .unwrap_or_default();

        self.meetings_held += 1;
        let number = self.meetings_held;
        self.meeting = Some(Meeting {
            number,
            caller: caller_name.clone(),
        });
        self.phase = Phase::Meeting;
        self.votes.clear();
        self.chat.clear();

        tracing::info!(
            room.code = %self.code,
            meeting = number,
            reason = ?reason,
            caller = %caller_name,
            "Meeting called"
        );

        let alive_players = self
            .players
            .iter()
            .filter(|p| p.alive)
            .map(|p| PlayerRef {
                id: p.id,
                name: p.name.clone(),
            })
            .collect();

        vec![
            Effect::broadcast(
                &self.code,
                ServerToClientMessage::MeetingCalled {
                    caller: caller_name,
                    reason,
                    alive_players,
                    voting_time_ms: VOTING_WINDOW.as_millis() as u64,
                },
            ),
            Effect::ScheduleMeetingTimeout {
                room: self.code.clone(),
                meeting: number,
                after: VOTING_WINDOW,
            },
        ]
    }

    pub fn cast_vote(&mut self, voter: Uuid, choice: VoteChoice) -> GameResult<Vec<Effect>> {
        let voter_name = self.alive_actor(&voter, Phase::Meeting)?.name.clone();
        if let VoteChoice::Player(target) = choice {
            match self.player(&target) {
                Some(p) if p.alive => {}
                _ => return Err(GameError::Precondition("invalid vote target")),
            }
        }
        self.votes.insert(voter, choice);

        let mut effects = vec![Effect::broadcast(
            &self.code,
            ServerToClientMessage::VoteUpdate { voter_name },
        )];
        if self.all_alive_voted() {
            effects.push(Effect::CancelMeetingTimeout {
                room: self.code.clone(),
            });
            effects.extend(self.process_votes());
        }
        Ok(effects)
    }

    fn all_alive_voted(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.alive)
            .all(|p| self.votes.contains_key(&p.id))
    }

    /// Auto-resolve path for the voting deadline. Timers belonging to an
    /// earlier meeting are ignored.
    pub fn meeting_timed_out(&mut self, meeting: u64) -> GameResult<Vec<Effect>> {
        let current = self.meeting.as_ref().map(|m| m.number);
        if self.phase != Phase::Meeting || current != Some(meeting) {
            return Err(GameError::Precondition("stale meeting timeout"));
        }
        tracing::info!(room.code = %self.code, meeting, "Voting window elapsed");
        Ok(self.process_votes())
    }

    /// Tallies the ballots of players still present and applies the result.
    pub fn process_votes(&mut self) -> Vec<Effect> {
        let ballots: HashMap<Uuid, VoteChoice> = self
            .votes
            .iter()
            .filter(|(voter, _)| self.player(voter).is_some_and(|p| p.alive))
            .filter(|(_, choice)| match choice {
                VoteChoice::Skip => true,
                VoteChoice::Player(target) => self.contains(target),
            })
            .map(|(voter, choice)| (*voter, *choice))
            .collect();

        let outcome = voting::tally(ballots.values());
        let ejected = match outcome {
            VoteOutcome::Ejected(id) => self.player_mut(&id).map(|p| {
                p.alive = false;
                EjectedPlayer {
                    id: p.id,
                    name: p.name.clone(),
                    role: p.role,
                }
            }),
            VoteOutcome::Tie | VoteOutcome::NoEjection => None,
        };

        let (meeting, caller) = self
            .meeting
            .take()
            .map(|m| (m.number, m.caller))
            .unwrap_or((self.meetings_held, String::new()));

        tracing::info!(
            room.code = %self.code,
            meeting,
            caller = %caller,
            outcome = ?outcome,
            ballots = ballots.len(),
            "Meeting resolved"
        );

        self.phase = Phase::Playing;
        self.bodies.clear();
        self.votes.clear();
        self.chat.clear();
        self.resume_pending = Some(meeting);

        let mut effects = vec![
            Effect::broadcast(
                &self.code,
                ServerToClientMessage::VotingComplete {
                    ejected,
                    tie: outcome == VoteOutcome::Tie,
                    votes: ballots,
                },
            ),
            Effect::ScheduleResume {
                room: self.code.clone(),
                meeting,
                after: RESUME_DELAY,
            },
        ];
        effects.extend(self.check_winner());
        effects
    }

    /// Deferred push after a vote result has been on screen. A resume left
    /// over from an earlier meeting does nothing.
    pub fn resume(&mut self, meeting: u64) -> Vec<Effect> {
        if self.resume_pending != Some(meeting) {
            tracing::debug!(room.code = %self.code, meeting, "Ignoring stale resume");
            return Vec::new();
        }
        self.resume_pending = None;
        vec![self.state_broadcast()]
    }

    pub fn post_chat(&mut self, sender: Uuid, text: &str) -> GameResult<Vec<Effect>> {
        let sender_name = self.alive_actor(&sender, Phase::Meeting)?.name.clone();
        let message = sanitize_chat(text).ok_or(GameError::Precondition("empty chat message"))?;
        let entry = ChatEntry {
            sender: sender_name,
            message,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        self.chat.push(entry.clone());
        if self.chat.len() > MAX_CHAT_LOG {
            self.chat.remove(0);
        }

        Ok(vec![Effect::broadcast(
            &self.code,
            ServerToClientMessage::ChatUpdate {
                sender: entry.sender,
                message: entry.message,
                timestamp: entry.timestamp,
            },
        )])
    }

    /// Drops a departed connection. The caller destroys the room once it is empty.
    pub fn remove_player(&mut self, id: Uuid) -> Vec<Effect> {
        let Some(index) = self.players.iter().position(|p| p.id == id) else {
            return Vec::new();
        };
        let departed = self.players.remove(index);
        self.votes.remove(&id);
        self.last_kill.remove(&id);

        if self.phase.in_round() && departed.is_crewmate() {
            self.total_tasks = self.total_tasks.saturating_sub(departed.outstanding_tasks());
        }

        let mut effects = Vec::new();
        if self.players.is_empty() {
            if self.meeting.take().is_some() {
                effects.push(Effect::CancelMeetingTimeout {
                    room: self.code.clone(),
                });
            }
            return effects;
        }

        if self.host == id {
            self.host = self.players[0].id;
            tracing::info!(room.code = %self.code, host.id = %self.host, "Host reassigned");
        }
        effects.push(self.roster_broadcast());

        if self.phase.in_round() {
            effects.extend(self.check_winner());
            if self.phase == Phase::Meeting && self.all_alive_voted() {
                effects.push(Effect::CancelMeetingTimeout {
                    room: self.code.clone(),
                });
                effects.extend(self.process_votes());
            }
        }
        effects
    }

    pub fn winner(&self) -> Option<Team> {
        win::evaluate(&self.players, self.completed_tasks, self.total_tasks)
    }

    /// Ends the round if either side has won.
    pub fn check_winner(&mut self) -> Vec<Effect> {
        if !self.phase.in_round() {
            return Vec::new();
        }
        let Some(winner) = self.winner() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if self.meeting.take().is_some() {
            effects.push(Effect::CancelMeetingTimeout {
                room: self.code.clone(),
            });
        }
        self.phase = Phase::Ended;
        self.votes.clear();

        tracing::info!(room.code = %self.code, winner = ?winner, "Round ended");

        effects.push(Effect::broadcast(
            &self.code,
            ServerToClientMessage::GameEnded { winner },
        ));
        effects.push(self.state_broadcast());
        effects
    }
}
