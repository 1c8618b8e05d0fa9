use axum::extract::ws;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::game_logic::messages::client_message_from_ws_text;
use crate::game_logic::{Effect, RoomRegistry, RoomSummary, ServerToClientMessage};

#[derive(Debug)]
pub enum RoomManagerMessage {
    ClientConnected {
        connection_id: Uuid,
        client_tx: mpsc::Sender<ws::Message>,
    },
    ClientEvent {
        connection_id: Uuid,
        raw_payload: String,
    },
    ClientDisconnected {
        connection_id: Uuid,
    },
    MeetingTimeout {
        room_code: String,
        meeting: u64,
    },
    ResumeBroadcast {
        room_code: String,
        meeting: u64,
    },
    GetRoomSummary {
        code: String,
        respond_to: oneshot::Sender<Option<RoomSummary>>,
    },
}

struct MeetingTimer {
    meeting: u64,
    handle: JoinHandle<()>,
}

/// Owns every room. All client actions, disconnects and timer expiries are
/// applied here one at a time.
pub struct RoomManagerActor {
    receiver: mpsc::Receiver<RoomManagerMessage>,
    self_sender: mpsc::Sender<RoomManagerMessage>,
    registry: RoomRegistry,
    clients: HashMap<Uuid, mpsc::Sender<ws::Message>>,
    meeting_timers: HashMap<String, MeetingTimer>,
    rng: StdRng,
    tick_period: Duration,
}

impl RoomManagerActor {
    fn new(
        receiver: mpsc::Receiver<RoomManagerMessage>,
        self_sender: mpsc::Sender<RoomManagerMessage>,
        tick_rate_hz: u32,
    ) -> Self {
        RoomManagerActor {
            receiver,
            self_sender,
            registry: RoomRegistry::default(),
            clients: HashMap::new(),
            meeting_timers: HashMap::new(),
            rng: StdRng::from_entropy(),
            tick_period: Duration::from_secs_f64(1.0 / f64::from(tick_rate_hz.max(1))),
        }
    }

    #[tracing::instrument(skip(self, msg), fields(
        msg_type = %std::any::type_name_of_val(&msg)
    ))]
    fn handle_message(&mut self, msg: RoomManagerMessage) {
        match msg {
            RoomManagerMessage::ClientConnected {
                connection_id,
                client_tx,
            } => {
                tracing::debug!(connection.id = %connection_id, "Client connected");
                self.clients.insert(connection_id, client_tx);
                self.send_to(
                    connection_id,
                    &ServerToClientMessage::Connected { id: connection_id },
                );
            }
            RoomManagerMessage::ClientEvent {
                connection_id,
                raw_payload,
            } => {
                tracing::trace!(
                    connection.id = %connection_id,
                    event.raw = %raw_payload,
                    "Raw event from client"
                );
                self.handle_client_event(connection_id, &raw_payload);
            }
            RoomManagerMessage::ClientDisconnected { connection_id } => {
                self.clients.remove(&connection_id);
                let effects = self.registry.remove_player(connection_id);
                tracing::debug!(
                    connection.id = %connection_id,
                    clients.connected = self.clients.len(),
                    "Client disconnected"
                );
                self.execute(effects);
            }
            RoomManagerMessage::MeetingTimeout { room_code, meeting } => {
                if self
                    .meeting_timers
                    .get(&room_code)
                    .is_some_and(|timer| timer.meeting == meeting)
                {
                    self.meeting_timers.remove(&room_code);
                }
                let effects = self.registry.handle_meeting_timeout(&room_code, meeting);
                self.execute(effects);
            }
            RoomManagerMessage::ResumeBroadcast { room_code, meeting } => {
                let effects = self.registry.handle_resume(&room_code, meeting);
                self.execute(effects);
            }
            RoomManagerMessage::GetRoomSummary { code, respond_to } => {
                let _ = respond_to.send(self.registry.room_summary(&code));
            }
        }
    }

    fn handle_client_event(&mut self, connection_id: Uuid, raw_payload: &str) {
        let action = match client_message_from_ws_text(raw_payload) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(
                    connection.id = %connection_id,
                    error = %e,
                    event.raw = %raw_payload,
                    "Failed to deserialize event from client"
                );
                self.send_to(
                    connection_id,
                    &ServerToClientMessage::Error(format!("Invalid message format: {}", e)),
                );
                return;
            }
        };

        tracing::debug!(
            connection.id = %connection_id,
            event.type = ?action,
            "Processing event from client"
        );

        match self
            .registry
            .handle_action(connection_id, action, Instant::now(), &mut self.rng)
        {
            Ok(effects) => self.execute(effects),
            Err(e) if e.is_surfaced() => {
                tracing::info!(connection.id = %connection_id, error = %e, "Action refused");
                self.send_to(connection_id, &ServerToClientMessage::Error(e.to_string()));
            }
            Err(e) => {
                tracing::debug!(connection.id = %connection_id, error = %e, "Action ignored");
            }
        }
    }

    fn tick(&mut self) {
        let effects = self.registry.tick_snapshots();
        self.execute(effects);
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, message } => self.send_to(to, &message),
                Effect::Broadcast { room, message } => self.broadcast(&room, &message),
                Effect::ScheduleMeetingTimeout {
                    room,
                    meeting,
                    after,
                } => {
                    let sender = self.self_sender.clone();
                    let room_code = room.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        if sender
                            .send(RoomManagerMessage::MeetingTimeout { room_code, meeting })
                            .await
                            .is_err()
                        {
                            tracing::warn!("Failed to deliver meeting timeout");
                        }
                    });
                    if let Some(previous) = self
                        .meeting_timers
                        .insert(room, MeetingTimer { meeting, handle })
                    {
                        previous.handle.abort();
                    }
                }
                Effect::CancelMeetingTimeout { room } => {
                    if let Some(timer) = self.meeting_timers.remove(&room) {
                        timer.handle.abort();
                        tracing::debug!(
                            room.code = %room,
                            meeting = timer.meeting,
                            "Meeting timer cancelled"
                        );
                    }
                }
                Effect::ScheduleResume {
                    room,
                    meeting,
                    after,
                } => {
                    let sender = self.self_sender.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let message = RoomManagerMessage::ResumeBroadcast {
                            room_code: room,
                            meeting,
                        };
                        if sender.send(message).await.is_err()
                        {
                            tracing::warn!("Failed to deliver resume broadcast");
                        }
                    });
                }
            }
        }
    }

    fn send_to(&self, connection_id: Uuid, message: &ServerToClientMessage) {
        match message.to_ws_text() {
            Ok(ws_msg) => self.push(connection_id, ws_msg),
            Err(e) => tracing::error!(error = %e, "Failed to serialize message"),
        }
    }

    fn broadcast(&self, room_code: &str, message: &ServerToClientMessage) {
        let ws_msg = match message.to_ws_text() {
            Ok(ws_msg) => ws_msg,
            Err(e) => {
                tracing::error!(
                    room.code = %room_code,
                    error = %e,
                    "Failed to serialize broadcast"
                );
                return;
            }
        };
        for member in self.registry.members(room_code) {
            self.push(member, ws_msg.clone());
        }
    }

    /// Never waits on a client; a full queue loses the frame.
    fn push(&self, connection_id: Uuid, ws_msg: ws::Message) {
        let Some(client_tx) = self.clients.get(&connection_id) else {
            return;
        };
        match client_tx.try_send(ws_msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection.id = %connection_id, "Client queue full, dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection.id = %connection_id, "Client channel closed");
            }
        }
    }
}

#[tracing::instrument(skip(actor))]
pub async fn run_room_manager_actor(mut actor: RoomManagerActor) {
    tracing::info!(
        tick.period_ms = actor.tick_period.as_millis() as u64,
        "RoomManager actor started"
    );
    let mut ticker = tokio::time::interval(actor.tick_period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            maybe_msg = actor.receiver.recv() => {
                match maybe_msg {
                    Some(msg) => actor.handle_message(msg),
                    None => break,
                }
            }
            _ = ticker.tick() => actor.tick(),
        }
    }

    for (_, timer) in actor.meeting_timers.drain() {
        timer.handle.abort();
    }
    tracing::info!("RoomManager actor stopped");
}

#[derive(Clone, Debug)]
pub struct RoomManagerHandle {
    sender: mpsc::Sender<RoomManagerMessage>,
}

impl RoomManagerHandle {
    pub fn spawn(buffer_size: usize, tick_rate_hz: u32) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = RoomManagerActor::new(receiver, sender.clone(), tick_rate_hz);
        tokio::spawn(run_room_manager_actor(actor));
        Self { sender }
    }

    pub async fn client_connected(
        &self,
        connection_id: Uuid,
        client_tx: mpsc::Sender<ws::Message>,
    ) {
        if self
            .sender
            .send(RoomManagerMessage::ClientConnected {
                connection_id,
                client_tx,
            })
            .await
            .is_err()
        {
            tracing::error!(connection.id = %connection_id, "Failed to send ClientConnected");
        }
    }

    pub async fn forward_client_event(
        &self,
        connection_id: Uuid,
        raw_payload: String,
    ) -> Result<(), String> {
        self.sender
            .send(RoomManagerMessage::ClientEvent {
                connection_id,
                raw_payload,
            })
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    pub async fn client_disconnected(&self, connection_id: Uuid) {
        if self
            .sender
            .send(RoomManagerMessage::ClientDisconnected { connection_id })
            .await
            .is_err()
        {
            tracing::error!(connection.id = %connection_id, "Failed to send ClientDisconnected");
        }
    }

    pub async fn room_summary(&self, code: String) -> Option<RoomSummary> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomManagerMessage::GetRoomSummary {
                code,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_logic::room::Phase;
    use serde_json::{Value, json};

    struct TestClient {
        id: Uuid,
        rx: mpsc::Receiver<ws::Message>,
    }

    impl TestClient {
        async fn connect(handle: &RoomManagerHandle) -> Self {
            let (tx, rx) = mpsc::channel(64);
            let id = Uuid::new_v4();
            handle.client_connected(id, tx).await;
            let mut client = Self { id, rx };
            let connected = client.expect("connected").await;
            assert_eq!(connected["payload"]["id"], id.to_string());
            client
        }

        /// Skips frames of other types, such as periodic snapshots.
        async fn expect(&mut self, message_type: &str) -> Value {
            let wait = Duration::from_secs(2);
            loop {
                let frame = tokio::time::timeout(wait, self.rx.recv())
                    .await
                    .unwrap_or_else(|_| panic!("timed out waiting for {}", message_type))
                    .expect("channel closed");
                let ws::Message::Text(text) = frame else {
                    continue;
                };
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if value["messageType"] == message_type {
                    return value;
                }
            }
        }

        async fn send(&self, handle: &RoomManagerHandle, value: Value) {
            handle
                .forward_client_event(self.id, value.to_string())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_and_join_over_the_actor() {
        let handle = RoomManagerHandle::spawn(32, 30);
        let mut host = TestClient::connect(&handle).await;
        let mut guest = TestClient::connect(&handle).await;

        host.send(&handle, json!({"messageType": "createRoom", "payload": "Ada"}))
            .await;
        let created = host.expect("roomCreated").await;
        assert_eq!(created["payload"]["isHost"], true);
        let code = created["payload"]["code"].as_str().unwrap().to_string();

        guest
            .send(
                &handle,
                json!({"messageType": "joinRoom", "payload": {"code": code, "name": "Grace"}}),
            )
            .await;
        let joined = guest.expect("roomJoined").await;
        assert_eq!(joined["payload"]["isHost"], false);

        let roster = host.expect("playersUpdate").await;
        let roster = if roster["payload"]["players"].as_array().unwrap().len() == 1 {
            host.expect("playersUpdate").await
        } else {
            roster
        };
        assert_eq!(roster["payload"]["players"].as_array().unwrap().len(), 2);

        let summary = handle.room_summary(code.clone()).await.unwrap();
        assert_eq!(summary.player_count, 2);
        assert_eq!(summary.phase, Phase::Lobby);
    }

    #[tokio::test]
    async fn test_refusals_are_reported_to_sender() {
        let handle = RoomManagerHandle::spawn(32, 30);
        let mut host = TestClient::connect(&handle).await;

        host.send(&handle, json!({"messageType": "createRoom", "payload": "Ada"}))
            .await;
        host.expect("roomCreated").await;

        host.send(&handle, json!({"messageType": "startGame"})).await;
        let error = host.expect("error").await;
        assert!(
            error["payload"]
                .as_str()
                .unwrap()
                .contains("at least 4 players")
        );

        handle
            .forward_client_event(host.id, "not json".to_string())
            .await
            .unwrap();
        let error = host.expect("error").await;
        assert!(
            error["payload"]
                .as_str()
                .unwrap()
                .starts_with("Invalid message format")
        );

        let mut stranger = TestClient::connect(&handle).await;
        stranger
            .send(
                &handle,
                json!({"messageType": "joinRoom", "payload": {"code": "000000", "name": "x"}}),
            )
            .await;
        let error = stranger.expect("error").await;
        assert_eq!(error["payload"], "Room 000000 not found");
    }

    #[tokio::test]
    async fn test_last_disconnect_tears_room_down() {
        let handle = RoomManagerHandle::spawn(32, 30);
        let mut host = TestClient::connect(&handle).await;
        host.send(&handle, json!({"messageType": "createRoom", "payload": "Ada"}))
            .await;
        let code = host.expect("roomCreated").await["payload"]["code"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(handle.room_summary(code.clone()).await.is_some());

        handle.client_disconnected(host.id).await;
        assert!(handle.room_summary(code).await.is_none());
    }

    #[tokio::test]
    async fn test_round_start_sends_private_roles() {
        let handle = RoomManagerHandle::spawn(64, 30);
        let mut clients = Vec::new();
        for _ in 0..4 {
            clients.push(TestClient::connect(&handle).await);
        }

        clients[0]
            .send(&handle, json!({"messageType": "createRoom", "payload": "host"}))
            .await;
        let code = clients[0].expect("roomCreated").await["payload"]["code"]
            .as_str()
            .unwrap()
            .to_string();
        for (i, client) in clients.iter_mut().enumerate().skip(1) {
            client
                .send(
                    &handle,
                    json!({
                        "messageType": "joinRoom",
                        "payload": {"code": code, "name": format!("p{}", i)}
                    }),
                )
                .await;
            client.expect("roomJoined").await;
        }

        clients[0]
            .send(&handle, json!({"messageType": "startGame"}))
            .await;

        let mut impostors = 0;
        for client in clients.iter_mut() {
            let started = client.expect("gameStarted").await;
            let tasks = started["payload"]["tasks"].as_array().unwrap().len();
            match started["payload"]["role"].as_str().unwrap() {
                "impostor" => {
                    impostors += 1;
                    assert_eq!(tasks, 0);
                }
                "crewmate" => assert_eq!(tasks, 3),
                other => panic!("unexpected role {}", other),
            }
            assert_eq!(started["payload"]["mapRooms"].as_array().unwrap().len(), 8);
        }
        assert_eq!(impostors, 1);

        let state = clients[1].expect("gameState").await;
        assert_eq!(state["payload"]["totalTasks"], 9);
    }
}
