//! Typed request/response client.
//!
//! Wraps the raw frame transport with one method per protocol operation.
//! Replies are correlated by message id; frames that arrive with a different
//! id (server pushes such as `RoomStatus`) are buffered and drained through
//! [`Client::next_push`].

use std::{collections::VecDeque, time::Duration};

use taproom_proto::{
    FrameHeader, Payload,
    payloads::{
        Ack,
        auth::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, Role},
        room::{
            AddQuestionRequest, AddQuestionResponse, CreateRoomRequest, CreateRoomResponse,
            DeleteQuestionRequest, GetAvailableRoomsResponse, GetQuestionsResponse,
            GetRoomsResponse, GetStudentRoomsResponse, JoinRoomRequest, JoinRoomResponse,
            RoomRef,
        },
        test::{
            AnswerEntry, AutoSaveRequest, StartRoomTestResponse, SubmitRoomTestRequest,
            SubmitRoomTestResponse, TeacherDataResponse,
        },
    },
};
use thiserror::Error;

use crate::transport::{self, ConnectedClient, TransportError};

/// How long to wait for a reply before giving up.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame encode/decode failure.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with an error payload.
    #[error("server error {code}: {message}")]
    Server {
        /// Wire status code
        code: u16,
        /// Human-readable refusal
        message: String,
    },

    /// The server answered with a payload of the wrong type.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The connection was closed.
    #[error("connection closed")]
    Closed,

    /// No reply arrived within the request timeout.
    #[error("request timed out")]
    Timeout,
}

/// Extract the expected reply variant or report what arrived instead.
macro_rules! expect {
    ($reply:expr, $variant:ident) => {
        match $reply {
            Payload::$variant(inner) => Ok(inner),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    };
}

/// A connected, typed protocol client.
///
/// Holds the session token after a successful [`Client::login`] and attaches
/// it to every subsequent request.
pub struct Client {
    conn: ConnectedClient,
    token: Option<String>,
    next_message_id: u128,
    pending_pushes: VecDeque<Payload>,
}

impl Client {
    /// Connect to a server.
    pub async fn connect(server_addr: &str) -> Result<Self, ClientError> {
        let conn = transport::connect(server_addr).await?;
        Ok(Self { conn, token: None, next_message_id: 1, pending_pushes: VecDeque::new() })
    }

    /// The session token from the last successful login, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Send a request and wait for the reply with the matching message id.
    ///
    /// Pushes that arrive in the meantime are buffered for
    /// [`Client::next_push`].
    pub async fn request(&mut self, payload: Payload) -> Result<Payload, ClientError> {
        let message_id = self.next_message_id;
        self.next_message_id += 1;

        let mut header = FrameHeader::new(payload.msg_type());
        header.set_message_id(message_id);
        if let Some(token) = &self.token {
            header.set_session_token(token);
        }
        let frame =
            payload.into_frame(header).map_err(|e| ClientError::Protocol(e.to_string()))?;

        self.conn.to_server.send(frame).await.map_err(|_| ClientError::Closed)?;

        loop {
            let frame = tokio::time::timeout(REQUEST_TIMEOUT, self.conn.from_server.recv())
                .await
                .map_err(|_| ClientError::Timeout)?
                .ok_or(ClientError::Closed)?;

            let reply =
                Payload::from_frame(&frame).map_err(|e| ClientError::Protocol(e.to_string()))?;

            if frame.header.message_id() == message_id {
                if let Payload::Error(e) = reply {
                    return Err(ClientError::Server { code: e.code, message: e.message });
                }
                return Ok(reply);
            }

            self.pending_pushes.push_back(reply);
        }
    }

    /// Next server push, waiting if none is buffered.
    ///
    /// Only call this while no request is in flight.
    pub async fn next_push(&mut self) -> Result<Payload, ClientError> {
        if let Some(push) = self.pending_pushes.pop_front() {
            return Ok(push);
        }

        let frame = tokio::time::timeout(REQUEST_TIMEOUT, self.conn.from_server.recv())
            .await
            .map_err(|_| ClientError::Timeout)?
            .ok_or(ClientError::Closed)?;

        Payload::from_frame(&frame).map_err(|e| ClientError::Protocol(e.to_string()))
    }

    /// Next buffered push, without waiting.
    pub fn try_push(&mut self) -> Option<Payload> {
        self.pending_pushes.pop_front()
    }

    /// Fire-and-forget keepalive.
    pub async fn heartbeat(&mut self) -> Result<(), ClientError> {
        let mut header = FrameHeader::new(Payload::Heartbeat.msg_type());
        header.set_message_id(self.next_message_id);
        self.next_message_id += 1;
        if let Some(token) = &self.token {
            header.set_session_token(token);
        }
        let frame = Payload::Heartbeat
            .into_frame(header)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        self.conn.to_server.send(frame).await.map_err(|_| ClientError::Closed)
    }

    // -- account --

    /// Register a new account.
    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        role: Role,
        full_name: &str,
        email: Option<&str>,
    ) -> Result<RegisterResponse, ClientError> {
        let reply = self
            .request(Payload::RegisterReq(RegisterRequest {
                username: username.to_string(),
                password: password.to_string(),
                role,
                full_name: full_name.to_string(),
                email: email.map(str::to_string),
            }))
            .await?;
        expect!(reply, RegisterRes)
    }

    /// Log in and store the session token for subsequent requests.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse, ClientError> {
        let reply = self
            .request(Payload::LoginReq(LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            }))
            .await?;
        let res: LoginResponse = expect!(reply, LoginRes)?;
        self.token.clone_from(&res.token);
        Ok(res)
    }

    /// Log out and drop the stored token.
    pub async fn logout(&mut self) -> Result<Ack, ClientError> {
        let reply = self.request(Payload::LogoutReq).await?;
        self.token = None;
        expect!(reply, LogoutRes)
    }

    // -- teacher operations --

    /// Create a room.
    pub async fn create_room(
        &mut self,
        room_name: &str,
        num_questions: u32,
        duration_minutes: u32,
    ) -> Result<CreateRoomResponse, ClientError> {
        let reply = self
            .request(Payload::CreateRoomReq(CreateRoomRequest {
                room_name: room_name.to_string(),
                num_questions,
                duration_minutes,
            }))
            .await?;
        expect!(reply, CreateRoomRes)
    }

    /// Add a question to a waiting room.
    pub async fn add_question(
        &mut self,
        room_id: i64,
        question_text: &str,
        options: [String; 4],
        correct_answer: u8,
    ) -> Result<AddQuestionResponse, ClientError> {
        let reply = self
            .request(Payload::AddQuestionReq(AddQuestionRequest {
                room_id,
                question_text: question_text.to_string(),
                options,
                correct_answer,
            }))
            .await?;
        expect!(reply, AddQuestionRes)
    }

    /// List a room's questions, answers included. Owner only.
    pub async fn get_questions(
        &mut self,
        room_id: i64,
    ) -> Result<GetQuestionsResponse, ClientError> {
        let reply = self.request(Payload::GetQuestionsReq(RoomRef { room_id })).await?;
        expect!(reply, GetQuestionsRes)
    }

    /// Delete a question from a room.
    pub async fn delete_question(
        &mut self,
        room_id: i64,
        question_id: i64,
    ) -> Result<Ack, ClientError> {
        let reply = self
            .request(Payload::DeleteQuestionReq(DeleteQuestionRequest { room_id, question_id }))
            .await?;
        expect!(reply, DeleteQuestionRes)
    }

    /// Start a room's test.
    pub async fn start_room(&mut self, room_id: i64) -> Result<Ack, ClientError> {
        let reply = self.request(Payload::StartRoomReq(RoomRef { room_id })).await?;
        expect!(reply, StartRoomRes)
    }

    /// End a room's test.
    pub async fn end_room(&mut self, room_id: i64) -> Result<Ack, ClientError> {
        let reply = self.request(Payload::EndRoomReq(RoomRef { room_id })).await?;
        expect!(reply, EndRoomRes)
    }

    /// List the rooms this teacher owns.
    pub async fn get_rooms(&mut self) -> Result<GetRoomsResponse, ClientError> {
        let reply = self.request(Payload::GetRoomsReq).await?;
        expect!(reply, GetRoomsRes)
    }

    /// Dashboard statistics and the full result table.
    pub async fn teacher_data(&mut self) -> Result<TeacherDataResponse, ClientError> {
        let reply = self.request(Payload::TeacherDataReq).await?;
        expect!(reply, TeacherDataRes)
    }

    // -- student operations --

    /// Join a room by its code.
    pub async fn join_room(&mut self, room_code: &str) -> Result<JoinRoomResponse, ClientError> {
        let reply = self
            .request(Payload::JoinRoomReq(JoinRoomRequest { room_code: room_code.to_string() }))
            .await?;
        expect!(reply, JoinRoomRes)
    }

    /// List rooms this student has joined.
    pub async fn get_student_rooms(&mut self) -> Result<GetStudentRoomsResponse, ClientError> {
        let reply = self.request(Payload::GetStudentRoomsReq).await?;
        expect!(reply, GetStudentRoomsRes)
    }

    /// List joinable rooms this student has not joined yet.
    pub async fn get_available_rooms(
        &mut self,
    ) -> Result<GetAvailableRoomsResponse, ClientError> {
        let reply = self.request(Payload::GetAvailableRoomsReq).await?;
        expect!(reply, GetAvailableRoomsRes)
    }

    /// Begin (or resume) the test in an active room.
    pub async fn start_room_test(
        &mut self,
        room_id: i64,
    ) -> Result<StartRoomTestResponse, ClientError> {
        let reply = self.request(Payload::StartRoomTestReq(RoomRef { room_id })).await?;
        expect!(reply, StartRoomTestRes)
    }

    /// Submit final answers for a room's test.
    pub async fn submit_room_test(
        &mut self,
        room_id: i64,
        answers: Vec<AnswerEntry>,
    ) -> Result<SubmitRoomTestResponse, ClientError> {
        let reply = self
            .request(Payload::SubmitRoomTestReq(SubmitRoomTestRequest { room_id, answers }))
            .await?;
        expect!(reply, SubmitRoomTestRes)
    }

    /// Save in-progress answers.
    pub async fn auto_save(
        &mut self,
        room_id: i64,
        answers: Vec<AnswerEntry>,
        is_final: bool,
    ) -> Result<Ack, ClientError> {
        let reply = self
            .request(Payload::AutoSaveReq(AutoSaveRequest { room_id, answers, is_final }))
            .await?;
        expect!(reply, AutoSaveRes)
    }
}
