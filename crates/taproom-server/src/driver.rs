//! Request dispatcher.
//!
//! Ties together the session store (auth), connection registry (broadcast
//! routing), lifecycle guards, and the repository. The driver is sans-IO:
//! the runtime feeds it [`ServerEvent`]s and executes the returned
//! [`ServerAction`]s, so the whole dispatch path is testable without
//! sockets.
//!
//! Domain refusals (bad credentials, wrong role, lifecycle conflicts) become
//! error response frames and the connection survives; only structurally
//! invalid frames terminate a connection, and that enforcement lives in the
//! runtime read loop.

use taproom_core::{
    credentials::{self, CredentialHasher},
    env::Environment,
    error::DomainError,
    lifecycle,
    session::{self, SessionStore},
    types::{ProgressSnapshot, Room, RoomQuestion},
};
use taproom_proto::{
    Frame, FrameHeader, MsgType, Payload, status,
    payloads::{
        Ack, ErrorPayload,
        auth::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, Role},
        room::{
            AddQuestionRequest, AddQuestionResponse, AvailableRoomEntry, CreateRoomRequest,
            CreateRoomResponse, DeleteQuestionRequest, GetAvailableRoomsResponse,
            GetQuestionsResponse, GetRoomsResponse, GetStudentRoomsResponse, JoinRoomRequest,
            JoinRoomResponse, RoomRef, RoomState, RoomStatusPush, RoomSummary, StudentRoomEntry,
        },
        test::{
            AutoSaveRequest, ResultRow, StartRoomTestResponse, SubmitRoomTestRequest,
            SubmitRoomTestResponse, TestConfigPush, TestQuestionsPush, TestResultPush,
            TestSubmitRequest,
        },
    },
};

use crate::{
    registry::{ConnectionRegistry, SessionInfo},
    server_error::ServerError,
    storage::{NewRoom, NewTestResult, NewUser, Repository, RepositoryError},
};

/// Attempts at generating a unique room code before giving up.
const ROOM_CODE_RETRIES: usize = 8;

/// A pre-loaded global question set for the legacy test flow.
///
/// When configured, students receive a `TestConfig` push after login and may
/// run the room-less test via `TestStartReq`/`TestSubmit`.
#[derive(Debug, Clone)]
pub struct GlobalTest {
    /// Test duration in minutes
    pub duration_minutes: u32,
    /// Question set; `room_id` is unused here and left at 0
    pub questions: Vec<RoomQuestion>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Session lifetime in seconds
    pub session_ttl_secs: u64,
    /// Global question set for the legacy test flow, if any
    pub global_test: Option<GlobalTest>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            session_ttl_secs: session::DEFAULT_TTL_SECS,
            global_test: None,
        }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (tests or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: u64,
    },

    /// A frame was received from a connection
    FrameReceived {
        /// Connection that sent the frame
        session_id: u64,
        /// The received frame
        frame: Frame,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Periodic tick for session expiry sweeping
    Tick,
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code.
#[derive(Debug, Clone)]
pub enum ServerAction {
    /// Send a frame to a specific session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Frame to send
        frame: Frame,
    },

    /// Broadcast a frame to all sessions subscribed to a room
    BroadcastToRoom {
        /// Target room ID
        room_id: i64,
        /// Frame to broadcast
        frame: Frame,
        /// Optional session to exclude from the broadcast
        exclude_session: Option<u64>,
    },

    /// Close a connection
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Outcome of one request handler: the reply payload plus any follow-up
/// actions (pushes, broadcasts) to emit after the reply.
type HandlerResult = Result<(Payload, Vec<ServerAction>), DomainError>;

/// Action-based server driver.
///
/// Orchestrates authentication, room operations, and response routing.
pub struct ServerDriver<E, R, H>
where
    E: Environment,
    R: Repository,
    H: CredentialHasher,
{
    /// Live connection registry (session → user/rooms)
    pub(crate) registry: ConnectionRegistry,
    /// Issued login tokens
    sessions: SessionStore,
    /// Persistence collaborator
    repo: R,
    /// Password hashing collaborator
    hasher: H,
    /// Environment (time, RNG)
    env: E,
    /// Server configuration
    config: ServerConfig,
}

impl<E, R, H> ServerDriver<E, R, H>
where
    E: Environment,
    R: Repository,
    H: CredentialHasher,
{
    /// Create a new server driver.
    pub fn new(env: E, repo: R, hasher: H, config: ServerConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            sessions: SessionStore::new(config.session_ttl_secs),
            repo,
            hasher,
            env,
            config,
        }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, ServerError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                self.handle_connection_accepted(session_id)
            },
            ServerEvent::FrameReceived { session_id, frame } => {
                self.handle_frame_received(session_id, &frame)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                self.handle_connection_closed(session_id, &reason)
            },
            ServerEvent::Tick => self.handle_tick(),
        }
    }

    /// Handle a new connection being accepted.
    fn handle_connection_accepted(
        &mut self,
        session_id: u64,
    ) -> Result<Vec<ServerAction>, ServerError> {
        if self.registry.session_count() >= self.config.max_connections {
            return Ok(vec![ServerAction::CloseConnection {
                session_id,
                reason: "max connections exceeded".to_string(),
            }]);
        }

        let now = self.env.wall_clock_secs();
        self.registry.register_session(session_id, SessionInfo::new(now));

        Ok(vec![ServerAction::Log {
            level: LogLevel::Debug,
            message: format!("connection accepted, session_id={session_id}"),
        }])
    }

    /// Handle a connection being closed.
    fn handle_connection_closed(
        &mut self,
        session_id: u64,
        reason: &str,
    ) -> Result<Vec<ServerAction>, ServerError> {
        let mut actions = Vec::new();

        if let Some((_info, rooms)) = self.registry.unregister_session(session_id) {
            actions.push(ServerAction::Log {
                level: LogLevel::Info,
                message: format!(
                    "connection {session_id} closed: {reason}, was in {} rooms",
                    rooms.len()
                ),
            });
        }

        Ok(actions)
    }

    /// Handle periodic tick: sweep expired login sessions.
    fn handle_tick(&mut self) -> Result<Vec<ServerAction>, ServerError> {
        let now = self.env.wall_clock_secs();
        let swept = self.sessions.sweep_expired(now);

        if swept == 0 {
            return Ok(Vec::new());
        }

        Ok(vec![ServerAction::Log {
            level: LogLevel::Debug,
            message: format!("swept {swept} expired sessions"),
        }])
    }

    /// Handle a frame received from a connection.
    fn handle_frame_received(
        &mut self,
        session_id: u64,
        frame: &Frame,
    ) -> Result<Vec<ServerAction>, ServerError> {
        if !self.registry.has_session(session_id) {
            return Err(ServerError::SessionNotFound(session_id));
        }

        let now = self.env.wall_clock_secs();
        self.registry.touch(session_id, now);

        let payload = match Payload::from_frame(frame) {
            Ok(payload) => payload,
            Err(e) => {
                // Structurally framed but undecodable: answer, keep the
                // connection.
                let error = ErrorPayload::invalid_json(e.to_string());
                let mut actions = self.send_payload(session_id, frame, Payload::Error(error));
                actions.push(ServerAction::Log {
                    level: LogLevel::Warn,
                    message: format!("undecodable payload from session {session_id}: {e}"),
                });
                return Ok(actions);
            },
        };

        // Heartbeat refreshes activity and is never answered.
        if matches!(payload, Payload::Heartbeat) {
            return Ok(Vec::new());
        }

        let result: HandlerResult = match payload {
            // Pre-auth requests
            Payload::RegisterReq(req) => self.handle_register(&req),
            Payload::LoginReq(req) => self.handle_login(session_id, &req),

            // Session management
            Payload::LogoutReq => self.handle_logout(frame),

            // Teacher operations
            Payload::CreateRoomReq(req) => {
                self.authenticate(frame).and_then(|s| self.handle_create_room(&s, &req))
            },
            Payload::AddQuestionReq(req) => {
                self.authenticate(frame).and_then(|s| self.handle_add_question(&s, &req))
            },
            Payload::GetQuestionsReq(req) => {
                self.authenticate(frame).and_then(|s| self.handle_get_questions(&s, req))
            },
            Payload::DeleteQuestionReq(req) => {
                self.authenticate(frame).and_then(|s| self.handle_delete_question(&s, req))
            },
            Payload::StartRoomReq(req) => {
                self.authenticate(frame).and_then(|s| self.handle_start_room(&s, req))
            },
            Payload::EndRoomReq(req) => {
                self.authenticate(frame).and_then(|s| self.handle_end_room(&s, req))
            },
            Payload::GetRoomsReq => {
                self.authenticate(frame).and_then(|s| self.handle_get_rooms(&s))
            },
            Payload::TeacherDataReq => {
                self.authenticate(frame).and_then(|s| self.handle_teacher_data(&s))
            },

            // Student operations
            Payload::JoinRoomReq(req) => self
                .authenticate(frame)
                .and_then(|s| self.handle_join_room(session_id, &s, &req)),
            Payload::GetStudentRoomsReq => {
                self.authenticate(frame).and_then(|s| self.handle_get_student_rooms(&s))
            },
            Payload::GetAvailableRoomsReq => {
                self.authenticate(frame).and_then(|s| self.handle_get_available_rooms(&s))
            },
            Payload::StartRoomTestReq(req) => self
                .authenticate(frame)
                .and_then(|s| self.handle_start_room_test(session_id, &s, req)),
            Payload::SubmitRoomTestReq(req) => {
                self.authenticate(frame).and_then(|s| self.handle_submit_room_test(&s, &req))
            },
            Payload::AutoSaveReq(req) => {
                self.authenticate(frame).and_then(|s| self.handle_auto_save(&s, &req))
            },

            // Legacy global test flow
            Payload::TestStartReq => {
                self.authenticate(frame).and_then(|s| self.handle_test_start(&s))
            },
            Payload::TestSubmit(req) => {
                self.authenticate(frame).and_then(|s| self.handle_test_submit(&s, &req))
            },

            // Server-to-client message types are never valid requests.
            Payload::RegisterRes(_)
            | Payload::LoginRes(_)
            | Payload::LogoutRes(_)
            | Payload::TestConfig(_)
            | Payload::TestStartRes(_)
            | Payload::TestQuestions(_)
            | Payload::TestResult(_)
            | Payload::TeacherDataRes(_)
            | Payload::CreateRoomRes(_)
            | Payload::JoinRoomRes(_)
            | Payload::StartRoomRes(_)
            | Payload::EndRoomRes(_)
            | Payload::GetRoomsRes(_)
            | Payload::RoomStatus(_)
            | Payload::AddQuestionRes(_)
            | Payload::GetQuestionsRes(_)
            | Payload::DeleteQuestionRes(_)
            | Payload::GetStudentRoomsRes(_)
            | Payload::GetAvailableRoomsRes(_)
            | Payload::StartRoomTestRes(_)
            | Payload::SubmitRoomTestRes(_)
            | Payload::AutoSaveRes(_)
            | Payload::Error(_) => {
                Err(DomainError::Validation("unexpected message type".to_string()))
            },

            // Handled above
            Payload::Heartbeat => unreachable!("heartbeat handled before dispatch"),
        };

        match result {
            Ok((reply, mut extra)) => {
                let mut actions = self.send_payload(session_id, frame, reply);
                actions.append(&mut extra);
                Ok(actions)
            },
            Err(e) => {
                let error = ErrorPayload { code: e.status_code(), message: e.to_string() };
                let mut actions = self.send_payload(session_id, frame, Payload::Error(error));
                actions.push(ServerAction::Log {
                    level: LogLevel::Warn,
                    message: format!("request from session {session_id} refused: {e}"),
                });
                Ok(actions)
            },
        }
    }

    // -- auth plumbing --

    /// Resolve the frame's session token to a login session.
    fn authenticate(&mut self, frame: &Frame) -> Result<session::Session, DomainError> {
        let token = frame.header.session_token().ok_or(DomainError::Unauthorized)?;
        let now = self.env.wall_clock_secs();

        match self.sessions.validate(token, now) {
            Ok(found) => Ok(found.clone()),
            Err(session::SessionError::Unknown) => Err(DomainError::Unauthorized),
            Err(session::SessionError::Expired) => Err(DomainError::SessionExpired),
        }
    }

    fn require_role(session: &session::Session, required: Role) -> Result<(), DomainError> {
        if session.role == required {
            Ok(())
        } else {
            Err(DomainError::WrongRole { required })
        }
    }

    /// Look up a room and check the session owns it.
    fn owned_room(
        &self,
        session: &session::Session,
        room_id: i64,
    ) -> Result<Room, DomainError> {
        let room = self
            .repo
            .room_by_id(room_id)
            .map_err(repo_err)?
            .ok_or(DomainError::RoomNotFound)?;

        if room.teacher_id != session.user_id {
            return Err(DomainError::Forbidden("not the room owner".to_string()));
        }
        Ok(room)
    }

    // -- response plumbing --

    /// Build the response header: echoes the request's message id for
    /// correlation, stamps the current time.
    fn response_header(&self, request: &Frame, msg_type: MsgType) -> FrameHeader {
        let mut header = FrameHeader::new(msg_type);
        header.set_message_id(request.header.message_id());
        header.set_timestamp(self.env.wall_clock_secs());
        header
    }

    /// Encode a reply to a request and address it to the session.
    fn send_payload(
        &self,
        session_id: u64,
        request: &Frame,
        payload: Payload,
    ) -> Vec<ServerAction> {
        let header = self.response_header(request, payload.msg_type());
        match payload.into_frame(header) {
            Ok(frame) => vec![ServerAction::SendToSession { session_id, frame }],
            Err(e) => vec![ServerAction::Log {
                level: LogLevel::Error,
                message: format!("failed to encode response for session {session_id}: {e}"),
            }],
        }
    }

    /// Encode a server-initiated push (fresh message id, no request to echo).
    fn push_frame(&self, payload: Payload) -> Result<Frame, taproom_proto::ProtocolError> {
        let mut header = FrameHeader::new(payload.msg_type());
        header.set_message_id(self.env.random_u128());
        header.set_timestamp(self.env.wall_clock_secs());
        payload.into_frame(header)
    }

    /// Push a payload to one session, logging instead of failing on encode
    /// errors.
    fn push_to_session(&self, session_id: u64, payload: Payload) -> ServerAction {
        match self.push_frame(payload) {
            Ok(frame) => ServerAction::SendToSession { session_id, frame },
            Err(e) => ServerAction::Log {
                level: LogLevel::Error,
                message: format!("failed to encode push for session {session_id}: {e}"),
            },
        }
    }

    /// Broadcast a room status change to the room's connected participants.
    fn broadcast_room_status(&self, room_id: i64, status: RoomState, note: &str) -> ServerAction {
        let push = Payload::RoomStatus(RoomStatusPush {
            room_id,
            status,
            message: note.to_string(),
        });
        match self.push_frame(push) {
            Ok(frame) => ServerAction::BroadcastToRoom { room_id, frame, exclude_session: None },
            Err(e) => ServerAction::Log {
                level: LogLevel::Error,
                message: format!("failed to encode room status push for room {room_id}: {e}"),
            },
        }
    }

    // -- auth handlers --

    fn handle_register(&mut self, req: &RegisterRequest) -> HandlerResult {
        credentials::validate_username(&req.username)?;
        credentials::validate_password(&req.password)?;
        credentials::validate_full_name(&req.full_name)?;
        credentials::validate_email(req.email.as_deref())?;

        let password_hash = self.hasher.hash(&req.password)?;
        let user = self
            .repo
            .create_user(NewUser {
                username: req.username.clone(),
                password_hash,
                role: req.role,
                full_name: req.full_name.clone(),
                email: req.email.clone(),
                created_at: self.env.wall_clock_secs(),
            })
            .map_err(repo_err)?;

        let reply = Payload::RegisterRes(RegisterResponse {
            code: status::SUCCESS,
            message: "registration successful".to_string(),
            user_id: Some(user.id),
        });

        let log = ServerAction::Log {
            level: LogLevel::Info,
            message: format!("user {} registered as {}", user.username, user.role),
        };
        Ok((reply, vec![log]))
    }

    fn handle_login(&mut self, session_id: u64, req: &LoginRequest) -> HandlerResult {
        let user = self
            .repo
            .user_by_username(&req.username)
            .map_err(repo_err)?
            .ok_or(DomainError::InvalidCredentials)?;

        if !self.hasher.verify(&req.password, &user.password_hash) {
            return Err(DomainError::InvalidCredentials);
        }

        let mut token_bytes = [0u8; session::TOKEN_BYTES];
        self.env.random_bytes(&mut token_bytes);
        let token = session::token_from_bytes(&token_bytes);

        let now = self.env.wall_clock_secs();
        let login = self.sessions.create(&user, token, now);
        self.registry.authenticate_session(session_id, user.id, user.role);

        let reply = Payload::LoginRes(LoginResponse {
            code: status::SUCCESS,
            message: "login successful".to_string(),
            token: Some(login.token),
            role: Some(user.role),
            full_name: Some(user.full_name.clone()),
            user_id: Some(user.id),
        });

        let mut extra = vec![ServerAction::Log {
            level: LogLevel::Info,
            message: format!("user {} logged in on session {session_id}", user.username),
        }];

        // Legacy flow: students learn about the global test right after
        // login.
        if user.role == Role::Student {
            if let Some(global) = &self.config.global_test {
                let num_questions = u32::try_from(global.questions.len()).unwrap_or(u32::MAX);
                extra.push(self.push_to_session(
                    session_id,
                    Payload::TestConfig(TestConfigPush {
                        duration_minutes: global.duration_minutes,
                        num_questions,
                    }),
                ));
            }
        }

        Ok((reply, extra))
    }

    fn handle_logout(&mut self, frame: &Frame) -> HandlerResult {
        let session = self.authenticate(frame)?;
        self.sessions.destroy(&session.token);

        Ok((Payload::LogoutRes(Ack::ok("logged out")), vec![]))
    }

    // -- teacher handlers --

    fn handle_create_room(
        &mut self,
        session: &session::Session,
        req: &CreateRoomRequest,
    ) -> HandlerResult {
        Self::require_role(session, Role::Teacher)?;
        lifecycle::validate_room_config(&req.room_name, req.num_questions, req.duration_minutes)?;

        let now = self.env.wall_clock_secs();

        for _ in 0..ROOM_CODE_RETRIES {
            let room_code = lifecycle::generate_room_code(&self.env);
            match self.repo.create_room(NewRoom {
                room_name: req.room_name.clone(),
                room_code,
                teacher_id: session.user_id,
                num_questions: req.num_questions,
                duration_minutes: req.duration_minutes,
                created_at: now,
            }) {
                Ok(room) => {
                    let reply = Payload::CreateRoomRes(CreateRoomResponse {
                        code: status::SUCCESS,
                        message: "room created".to_string(),
                        room_id: Some(room.id),
                        room_code: Some(room.room_code.clone()),
                    });
                    let log = ServerAction::Log {
                        level: LogLevel::Info,
                        message: format!(
                            "room {} ({}) created by user {}",
                            room.id, room.room_code, session.user_id
                        ),
                    };
                    return Ok((reply, vec![log]));
                },
                Err(RepositoryError::RoomCodeTaken(_)) => {}, // regenerate and retry
                Err(e) => return Err(repo_err(e)),
            }
        }

        Err(DomainError::Internal("could not allocate a unique room code".to_string()))
    }

    fn handle_add_question(
        &mut self,
        session: &session::Session,
        req: &AddQuestionRequest,
    ) -> HandlerResult {
        Self::require_role(session, Role::Teacher)?;
        let room = self.owned_room(session, req.room_id)?;

        let count = self.repo.question_count(room.id).map_err(repo_err)?;
        lifecycle::add_question_guard(&room, count)?;
        lifecycle::validate_question(&req.question_text, &req.options, req.correct_answer)?;

        let question = self
            .repo
            .add_question(
                room.id,
                req.question_text.clone(),
                req.options.clone(),
                req.correct_answer,
                count,
            )
            .map_err(repo_err)?;

        let reply = Payload::AddQuestionRes(AddQuestionResponse {
            code: status::SUCCESS,
            message: "question added".to_string(),
            question_id: Some(question.id),
        });
        Ok((reply, vec![]))
    }

    fn handle_get_questions(&mut self, session: &session::Session, req: RoomRef) -> HandlerResult {
        Self::require_role(session, Role::Teacher)?;
        let room = self.owned_room(session, req.room_id)?;

        let questions = self.repo.questions_for_room(room.id).map_err(repo_err)?;
        let reply = Payload::GetQuestionsRes(GetQuestionsResponse {
            code: status::SUCCESS,
            message: "questions listed".to_string(),
            questions: questions.iter().map(RoomQuestion::to_record).collect(),
        });
        Ok((reply, vec![]))
    }

    fn handle_delete_question(
        &mut self,
        session: &session::Session,
        req: DeleteQuestionRequest,
    ) -> HandlerResult {
        Self::require_role(session, Role::Teacher)?;
        let room = self.owned_room(session, req.room_id)?;

        if !self.repo.delete_question(room.id, req.question_id).map_err(repo_err)? {
            return Err(DomainError::QuestionNotFound);
        }

        Ok((Payload::DeleteQuestionRes(Ack::ok("question deleted")), vec![]))
    }

    fn handle_start_room(&mut self, session: &session::Session, req: RoomRef) -> HandlerResult {
        Self::require_role(session, Role::Teacher)?;
        let room = self.owned_room(session, req.room_id)?;

        let count = self.repo.question_count(room.id).map_err(repo_err)?;
        lifecycle::start_guard(&room, count)?;

        let now = self.env.wall_clock_secs();
        let moved = self
            .repo
            .update_room_status(room.id, RoomState::Waiting, RoomState::Active, now)
            .map_err(repo_err)?;

        if !moved {
            // Lost a race: report against the state the room is in now.
            let state = self
                .repo
                .room_by_id(room.id)
                .map_err(repo_err)?
                .map_or(RoomState::Ended, |r| r.status);
            return Err(DomainError::InvalidTransition { state, operation: "start" });
        }

        let extra = vec![
            self.broadcast_room_status(room.id, RoomState::Active, "test started"),
            ServerAction::Log {
                level: LogLevel::Info,
                message: format!("room {} started by user {}", room.id, session.user_id),
            },
        ];
        Ok((Payload::StartRoomRes(Ack::ok("room started")), extra))
    }

    fn handle_end_room(&mut self, session: &session::Session, req: RoomRef) -> HandlerResult {
        Self::require_role(session, Role::Teacher)?;
        let room = self.owned_room(session, req.room_id)?;

        let now = self.env.wall_clock_secs();
        lifecycle::end_guard(&room, now)?;

        let moved = self
            .repo
            .update_room_status(room.id, RoomState::Active, RoomState::Ended, now)
            .map_err(repo_err)?;

        if !moved {
            let state = self
                .repo
                .room_by_id(room.id)
                .map_err(repo_err)?
                .map_or(RoomState::Ended, |r| r.status);
            return Err(DomainError::InvalidTransition { state, operation: "end" });
        }

        let extra = vec![
            self.broadcast_room_status(room.id, RoomState::Ended, "test ended"),
            ServerAction::Log {
                level: LogLevel::Info,
                message: format!("room {} ended by user {}", room.id, session.user_id),
            },
        ];
        Ok((Payload::EndRoomRes(Ack::ok("room ended")), extra))
    }

    fn handle_get_rooms(&mut self, session: &session::Session) -> HandlerResult {
        Self::require_role(session, Role::Teacher)?;

        let rooms = self.repo.rooms_by_teacher(session.user_id).map_err(repo_err)?;
        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            summaries.push(RoomSummary {
                room_id: room.id,
                room_name: room.room_name.clone(),
                room_code: room.room_code.clone(),
                status: room.status,
                num_questions: room.num_questions,
                duration_minutes: room.duration_minutes,
                question_count: self.repo.question_count(room.id).map_err(repo_err)?,
                participant_count: self.repo.participant_count(room.id).map_err(repo_err)?,
            });
        }

        let reply = Payload::GetRoomsRes(GetRoomsResponse {
            code: status::SUCCESS,
            message: "rooms listed".to_string(),
            rooms: summaries,
        });
        Ok((reply, vec![]))
    }

    fn handle_teacher_data(&mut self, session: &session::Session) -> HandlerResult {
        Self::require_role(session, Role::Teacher)?;

        let stats = self.repo.statistics().map_err(repo_err)?;
        let results = self.repo.all_results().map_err(repo_err)?;

        let mut rows = Vec::with_capacity(results.len());
        for result in results {
            let student_name = self
                .repo
                .user_by_id(result.student_id)
                .map_err(repo_err)?
                .map_or_else(|| "unknown".to_string(), |u| u.full_name);
            rows.push(ResultRow {
                student_name,
                score: result.score,
                total_questions: result.total_questions,
                percentage: lifecycle::percentage(result.score, result.total_questions),
                test_date: result.test_date,
            });
        }

        let reply = Payload::TeacherDataRes(taproom_proto::payloads::test::TeacherDataResponse {
            code: status::SUCCESS,
            message: "dashboard data".to_string(),
            stats,
            results: rows,
        });
        Ok((reply, vec![]))
    }

    // -- student handlers --

    fn handle_join_room(
        &mut self,
        session_id: u64,
        session: &session::Session,
        req: &JoinRoomRequest,
    ) -> HandlerResult {
        Self::require_role(session, Role::Student)?;

        let code = req.room_code.trim().to_uppercase();
        let room = self
            .repo
            .room_by_code(&code)
            .map_err(repo_err)?
            .ok_or(DomainError::RoomNotFound)?;

        lifecycle::join_guard(&room)?;

        let now = self.env.wall_clock_secs();
        let (_participant, already_joined) =
            self.repo.upsert_participant(room.id, session.user_id, now).map_err(repo_err)?;

        // Subscribe this connection for RoomStatus pushes.
        self.registry.subscribe(session_id, room.id);

        let reply = Payload::JoinRoomRes(JoinRoomResponse {
            code: status::SUCCESS,
            message: if already_joined {
                "already joined".to_string()
            } else {
                "joined".to_string()
            },
            room_id: Some(room.id),
            room_name: Some(room.room_name.clone()),
            room_status: Some(room.status),
            already_joined,
        });
        Ok((reply, vec![]))
    }

    fn handle_get_student_rooms(&mut self, session: &session::Session) -> HandlerResult {
        Self::require_role(session, Role::Student)?;

        let rows = self.repo.rooms_for_student(session.user_id).map_err(repo_err)?;
        let rooms = rows
            .into_iter()
            .map(|(room, participant)| StudentRoomEntry {
                room_id: room.id,
                room_name: room.room_name,
                room_code: room.room_code,
                status: room.status,
                participant_status: participant.status,
                duration_minutes: room.duration_minutes,
            })
            .collect();

        let reply = Payload::GetStudentRoomsRes(GetStudentRoomsResponse {
            code: status::SUCCESS,
            message: "joined rooms listed".to_string(),
            rooms,
        });
        Ok((reply, vec![]))
    }

    fn handle_get_available_rooms(&mut self, session: &session::Session) -> HandlerResult {
        Self::require_role(session, Role::Student)?;

        let rooms = self
            .repo
            .available_rooms(session.user_id)
            .map_err(repo_err)?
            .into_iter()
            .map(|room| AvailableRoomEntry {
                room_id: room.id,
                room_name: room.room_name,
                room_code: room.room_code,
                status: room.status,
                num_questions: room.num_questions,
                duration_minutes: room.duration_minutes,
            })
            .collect();

        let reply = Payload::GetAvailableRoomsRes(GetAvailableRoomsResponse {
            code: status::SUCCESS,
            message: "available rooms listed".to_string(),
            rooms,
        });
        Ok((reply, vec![]))
    }

    fn handle_start_room_test(
        &mut self,
        session_id: u64,
        session: &session::Session,
        req: RoomRef,
    ) -> HandlerResult {
        Self::require_role(session, Role::Student)?;

        let room = self
            .repo
            .room_by_id(req.room_id)
            .map_err(repo_err)?
            .ok_or(DomainError::RoomNotFound)?;
        let participant = self
            .repo
            .participant(room.id, session.user_id)
            .map_err(repo_err)?
            .ok_or(DomainError::NotParticipant)?;

        lifecycle::enter_guard(&room, &participant)?;

        self.repo
            .update_participant_status(
                room.id,
                session.user_id,
                taproom_proto::payloads::room::ParticipantState::Testing,
            )
            .map_err(repo_err)?;

        // Re-subscribe: a reconnect lands here without a fresh join.
        self.registry.subscribe(session_id, room.id);

        let questions = self.repo.questions_for_room(room.id).map_err(repo_err)?;
        let snapshot = self.repo.load_progress(room.id, session.user_id).map_err(repo_err)?;
        let answers = lifecycle::reconcile_resume(snapshot.as_ref(), &questions);

        let reply = Payload::StartRoomTestRes(StartRoomTestResponse {
            code: status::SUCCESS,
            message: "test started".to_string(),
            duration_minutes: room.duration_minutes,
            questions: questions.iter().map(RoomQuestion::to_view).collect(),
            answers,
        });
        Ok((reply, vec![]))
    }

    fn handle_submit_room_test(
        &mut self,
        session: &session::Session,
        req: &SubmitRoomTestRequest,
    ) -> HandlerResult {
        Self::require_role(session, Role::Student)?;

        let room = self
            .repo
            .room_by_id(req.room_id)
            .map_err(repo_err)?
            .ok_or(DomainError::RoomNotFound)?;
        let participant = self
            .repo
            .participant(room.id, session.user_id)
            .map_err(repo_err)?
            .ok_or(DomainError::NotParticipant)?;

        lifecycle::submit_guard(&room, &participant)?;

        let questions = self.repo.questions_for_room(room.id).map_err(repo_err)?;
        let score = lifecycle::score(&req.answers, &questions);
        let total = u32::try_from(questions.len()).unwrap_or(u32::MAX);
        let percentage = lifecycle::percentage(score, total);

        let now = self.env.wall_clock_secs();
        let result = self
            .repo
            .save_test_result(NewTestResult {
                student_id: session.user_id,
                score,
                total_questions: total,
                answers: req.answers.clone(),
                test_date: now,
                duration_seconds: None,
            })
            .map_err(repo_err)?;

        self.repo.link_test_result(room.id, session.user_id, result.id).map_err(repo_err)?;
        self.repo
            .update_participant_status(
                room.id,
                session.user_id,
                taproom_proto::payloads::room::ParticipantState::Submitted,
            )
            .map_err(repo_err)?;

        // Final snapshot so the cache agrees with the recorded result.
        self.repo
            .upsert_progress(ProgressSnapshot {
                room_id: room.id,
                student_id: session.user_id,
                answers: req.answers.clone(),
                saved_at: now,
                is_final: true,
            })
            .map_err(repo_err)?;

        let reply = Payload::SubmitRoomTestRes(SubmitRoomTestResponse {
            code: status::SUCCESS,
            message: "test submitted".to_string(),
            score: Some(score),
            total: Some(total),
            percentage: Some(percentage),
        });

        let log = ServerAction::Log {
            level: LogLevel::Info,
            message: format!(
                "user {} submitted room {}: {score}/{total}",
                session.user_id, room.id
            ),
        };
        Ok((reply, vec![log]))
    }

    fn handle_auto_save(
        &mut self,
        session: &session::Session,
        req: &AutoSaveRequest,
    ) -> HandlerResult {
        Self::require_role(session, Role::Student)?;

        let room = self
            .repo
            .room_by_id(req.room_id)
            .map_err(repo_err)?
            .ok_or(DomainError::RoomNotFound)?;
        let participant = self
            .repo
            .participant(room.id, session.user_id)
            .map_err(repo_err)?
            .ok_or(DomainError::NotParticipant)?;

        if participant.status == taproom_proto::payloads::room::ParticipantState::Submitted {
            return Err(DomainError::AlreadySubmitted);
        }

        // Best effort: a failed save is logged and acknowledged, never fatal.
        let mut extra = Vec::new();
        let snapshot = ProgressSnapshot {
            room_id: room.id,
            student_id: session.user_id,
            answers: req.answers.clone(),
            saved_at: self.env.wall_clock_secs(),
            is_final: req.is_final,
        };
        if let Err(e) = self.repo.upsert_progress(snapshot) {
            extra.push(ServerAction::Log {
                level: LogLevel::Warn,
                message: format!(
                    "auto-save failed for user {} in room {}: {e}",
                    session.user_id, room.id
                ),
            });
        }

        Ok((Payload::AutoSaveRes(Ack::ok("progress saved")), extra))
    }

    // -- legacy global test flow --

    fn handle_test_start(&mut self, session: &session::Session) -> HandlerResult {
        Self::require_role(session, Role::Student)?;

        let global = self
            .config
            .global_test
            .as_ref()
            .ok_or_else(|| DomainError::Validation("no global test configured".to_string()))?;

        let questions = global.questions.iter().map(RoomQuestion::to_view).collect();

        // Find the student's live sessions to receive the questions push;
        // the reply itself is a plain acknowledgement.
        let push = Payload::TestQuestions(TestQuestionsPush { questions });
        let pushes: Vec<ServerAction> = self
            .registry
            .sessions_for_user(session.user_id)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|sid| self.push_to_session(sid, push.clone()))
            .collect();

        Ok((Payload::TestStartRes(Ack::ok("test started")), pushes))
    }

    fn handle_test_submit(
        &mut self,
        session: &session::Session,
        req: &TestSubmitRequest,
    ) -> HandlerResult {
        Self::require_role(session, Role::Student)?;

        let global = self
            .config
            .global_test
            .as_ref()
            .ok_or_else(|| DomainError::Validation("no global test configured".to_string()))?;

        let score = lifecycle::score(&req.answers, &global.questions);
        let total = u32::try_from(global.questions.len()).unwrap_or(u32::MAX);
        let percentage = lifecycle::percentage(score, total);

        self.repo
            .save_test_result(NewTestResult {
                student_id: session.user_id,
                score,
                total_questions: total,
                answers: req.answers.clone(),
                test_date: self.env.wall_clock_secs(),
                duration_seconds: req.duration_seconds,
            })
            .map_err(repo_err)?;

        let reply = Payload::TestResult(TestResultPush { score, total, percentage });
        Ok((reply, vec![]))
    }

    // -- introspection for the runtime and tests --

    /// All sessions subscribed to a room.
    pub fn sessions_in_room(&self, room_id: i64) -> impl Iterator<Item = u64> + '_ {
        self.registry.sessions_in_room(room_id)
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Number of live login sessions.
    #[must_use]
    pub fn login_count(&self) -> usize {
        self.sessions.len()
    }

    /// Repository handle.
    pub fn repo(&self) -> &R {
        &self.repo
    }
}

impl<E, R, H> std::fmt::Debug for ServerDriver<E, R, H>
where
    E: Environment,
    R: Repository,
    H: CredentialHasher,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("connection_count", &self.registry.session_count())
            .field("login_count", &self.sessions.len())
            .finish()
    }
}

fn repo_err(e: RepositoryError) -> DomainError {
    match e {
        RepositoryError::UsernameTaken(username) => DomainError::UsernameTaken(username),
        other => DomainError::Internal(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{
        sync::{Arc, Mutex},
        time::{Duration, Instant},
    };

    use taproom_core::{credentials::CredentialHasher, env::Environment, error::DomainError};

    /// Deterministic environment: scripted wall clock, counting RNG.
    #[derive(Clone)]
    pub struct TestEnv {
        clock: Arc<Mutex<u64>>,
        rng_state: Arc<Mutex<u8>>,
    }

    impl TestEnv {
        pub fn new(start_secs: u64) -> Self {
            Self {
                clock: Arc::new(Mutex::new(start_secs)),
                rng_state: Arc::new(Mutex::new(0)),
            }
        }

        pub fn advance(&self, secs: u64) {
            *self.clock.lock().unwrap() += secs;
        }
    }

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn wall_clock_secs(&self) -> u64 {
            *self.clock.lock().unwrap()
        }

        async fn sleep(&self, _duration: Duration) {}

        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut state = self.rng_state.lock().unwrap();
            for slot in buffer.iter_mut() {
                *state = state.wrapping_add(1);
                *slot = *state;
            }
        }
    }

    /// Cheap deterministic hasher so tests skip Argon2 work.
    #[derive(Clone, Copy)]
    pub struct PlainHasher;

    impl CredentialHasher for PlainHasher {
        fn hash(&self, password: &str) -> Result<String, DomainError> {
            Ok(format!("plain:{password}"))
        }

        fn verify(&self, password: &str, hash: &str) -> bool {
            hash == format!("plain:{password}")
        }
    }
}
