//! Full room lifecycle exercised through the driver.
//!
//! Drives a teacher and a student through create, populate, start, take,
//! auto-save, resume, submit, and end, asserting wire status codes and
//! broadcast actions along the way. No sockets involved; events in, actions
//! out.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use taproom_core::{credentials::CredentialHasher, env::Environment, error::DomainError};
use taproom_proto::{
    Frame, FrameHeader, Payload, status,
    payloads::{
        auth::{LoginRequest, RegisterRequest, Role},
        room::{
            AddQuestionRequest, CreateRoomRequest, JoinRoomRequest, RoomRef, RoomState,
        },
        test::{AnswerEntry, AutoSaveRequest, SubmitRoomTestRequest},
    },
};
use taproom_server::{
    DriverConfig, MemoryRepository, ServerAction, ServerDriver, ServerEvent,
};

/// Environment with a manually advanced wall clock and a counting RNG.
#[derive(Clone)]
struct ManualClock {
    secs: Arc<Mutex<u64>>,
    rng: Arc<Mutex<u8>>,
}

impl ManualClock {
    fn new(start: u64) -> Self {
        Self { secs: Arc::new(Mutex::new(start)), rng: Arc::new(Mutex::new(0)) }
    }

    fn advance(&self, secs: u64) {
        *self.secs.lock().unwrap() += secs;
    }
}

impl Environment for ManualClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_clock_secs(&self) -> u64 {
        *self.secs.lock().unwrap()
    }

    async fn sleep(&self, _duration: Duration) {}

    fn random_bytes(&self, buffer: &mut [u8]) {
        let mut state = self.rng.lock().unwrap();
        for slot in buffer.iter_mut() {
            *state = state.wrapping_add(1);
            *slot = *state;
        }
    }
}

/// Deterministic stand-in hasher; Argon2 has its own tests.
#[derive(Clone, Copy)]
struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        hash == format!("plain:{password}")
    }
}

type Driver = ServerDriver<ManualClock, MemoryRepository, PlainHasher>;

const TEACHER_SESSION: u64 = 1;
const STUDENT_SESSION: u64 = 2;

struct Harness {
    driver: Driver,
    env: ManualClock,
}

impl Harness {
    fn new() -> Self {
        let env = ManualClock::new(100_000);
        let driver = ServerDriver::new(
            env.clone(),
            MemoryRepository::new(),
            PlainHasher,
            DriverConfig::default(),
        );
        Self { driver, env }
    }

    fn connect(&mut self, session_id: u64) {
        self.driver.process_event(ServerEvent::ConnectionAccepted { session_id }).unwrap();
    }

    fn request(payload: Payload, token: Option<&str>) -> Frame {
        let mut header = FrameHeader::new(payload.msg_type());
        header.set_message_id(u128::from(payload.msg_type().to_u16()));
        if let Some(token) = token {
            header.set_session_token(token);
        }
        payload.into_frame(header).unwrap()
    }

    /// Send a request and return every resulting action.
    fn send(&mut self, session_id: u64, payload: Payload, token: Option<&str>) -> Vec<ServerAction> {
        self.driver
            .process_event(ServerEvent::FrameReceived {
                session_id,
                frame: Self::request(payload, token),
            })
            .unwrap()
    }

    /// Send a request and return the decoded reply payload.
    fn ask(&mut self, session_id: u64, payload: Payload, token: Option<&str>) -> Payload {
        let actions = self.send(session_id, payload, token);
        let frame = actions
            .iter()
            .find_map(|a| match a {
                ServerAction::SendToSession { session_id: sid, frame } if *sid == session_id => {
                    Some(frame.clone())
                },
                _ => None,
            })
            .expect("expected a reply frame");
        Payload::from_frame(&frame).unwrap()
    }

    fn signup(&mut self, session_id: u64, username: &str, role: Role) -> String {
        self.connect(session_id);

        let reply = self.ask(
            session_id,
            Payload::RegisterReq(RegisterRequest {
                username: username.to_string(),
                password: "hunter22".to_string(),
                role,
                full_name: format!("{username} full"),
                email: Some(format!("{username}@example.com")),
            }),
            None,
        );
        assert!(matches!(reply, Payload::RegisterRes(ref r) if r.code == status::SUCCESS));

        match self.ask(
            session_id,
            Payload::LoginReq(LoginRequest {
                username: username.to_string(),
                password: "hunter22".to_string(),
            }),
            None,
        ) {
            Payload::LoginRes(res) => {
                assert_eq!(res.code, status::SUCCESS);
                res.token.expect("login should issue a token")
            },
            other => panic!("expected LoginRes, got {other:?}"),
        }
    }
}

fn error_code(payload: &Payload) -> u16 {
    match payload {
        Payload::Error(e) => e.code,
        other => panic!("expected Error, got {other:?}"),
    }
}

#[test]
fn full_room_lifecycle() {
    let mut h = Harness::new();
    let teacher = h.signup(TEACHER_SESSION, "teach1", Role::Teacher);
    let student = h.signup(STUDENT_SESSION, "student1", Role::Student);

    // Create a two-question, five-minute room.
    let (room_id, room_code) = match h.ask(
        TEACHER_SESSION,
        Payload::CreateRoomReq(CreateRoomRequest {
            room_name: "Midterm".to_string(),
            num_questions: 2,
            duration_minutes: 5,
        }),
        Some(&teacher),
    ) {
        Payload::CreateRoomRes(res) => {
            assert_eq!(res.code, status::SUCCESS);
            (res.room_id.unwrap(), res.room_code.unwrap())
        },
        other => panic!("expected CreateRoomRes, got {other:?}"),
    };
    assert_eq!(room_code.len(), 6);

    // Starting before the question set is complete is refused.
    let reply = h.ask(
        TEACHER_SESSION,
        Payload::StartRoomReq(RoomRef { room_id }),
        Some(&teacher),
    );
    assert_eq!(error_code(&reply), status::CONFLICT);

    let mut question_ids = Vec::new();
    for (text, correct) in [("2 + 2 = ?", 1u8), ("3 * 3 = ?", 2u8)] {
        match h.ask(
            TEACHER_SESSION,
            Payload::AddQuestionReq(AddQuestionRequest {
                room_id,
                question_text: text.to_string(),
                options: ["3".into(), "4".into(), "9".into(), "12".into()],
                correct_answer: correct,
            }),
            Some(&teacher),
        ) {
            Payload::AddQuestionRes(res) => {
                assert_eq!(res.code, status::SUCCESS);
                question_ids.push(res.question_id.unwrap());
            },
            other => panic!("expected AddQuestionRes, got {other:?}"),
        }
    }

    // Student joins by code while the room is waiting; joining twice is
    // idempotent and flagged.
    let reply = h.ask(
        STUDENT_SESSION,
        Payload::JoinRoomReq(JoinRoomRequest { room_code: room_code.clone() }),
        Some(&student),
    );
    match reply {
        Payload::JoinRoomRes(res) => {
            assert_eq!(res.code, status::SUCCESS);
            assert!(!res.already_joined);
            assert_eq!(res.room_status, Some(RoomState::Waiting));
        },
        other => panic!("expected JoinRoomRes, got {other:?}"),
    }
    let reply = h.ask(
        STUDENT_SESSION,
        Payload::JoinRoomReq(JoinRoomRequest { room_code: room_code.to_lowercase() }),
        Some(&student),
    );
    assert!(matches!(reply, Payload::JoinRoomRes(ref r) if r.already_joined));

    // Entering the test before the room starts is refused.
    let reply = h.ask(
        STUDENT_SESSION,
        Payload::StartRoomTestReq(RoomRef { room_id }),
        Some(&student),
    );
    assert_eq!(error_code(&reply), status::CONFLICT);

    // Start the room; the joined student's connection gets the broadcast.
    let actions = h.send(
        TEACHER_SESSION,
        Payload::StartRoomReq(RoomRef { room_id }),
        Some(&teacher),
    );
    let broadcast = actions
        .iter()
        .find_map(|a| match a {
            ServerAction::BroadcastToRoom { room_id: rid, frame, .. } if *rid == room_id => {
                Some(Payload::from_frame(frame).unwrap())
            },
            _ => None,
        })
        .expect("start should broadcast a room status push");
    assert!(matches!(broadcast, Payload::RoomStatus(ref p) if p.status == RoomState::Active));

    // Student enters: fresh attempt, everything unanswered.
    let reply = h.ask(
        STUDENT_SESSION,
        Payload::StartRoomTestReq(RoomRef { room_id }),
        Some(&student),
    );
    match reply {
        Payload::StartRoomTestRes(res) => {
            assert_eq!(res.code, status::SUCCESS);
            assert_eq!(res.duration_minutes, 5);
            assert_eq!(res.questions.len(), 2);
            assert!(res.answers.iter().all(|a| a.selected.is_none()));
        },
        other => panic!("expected StartRoomTestRes, got {other:?}"),
    }

    // Auto-save one answer, then simulate a disconnect and reconnect.
    let reply = h.ask(
        STUDENT_SESSION,
        Payload::AutoSaveReq(AutoSaveRequest {
            room_id,
            answers: vec![AnswerEntry { question_id: question_ids[0], selected: 1 }],
            is_final: false,
        }),
        Some(&student),
    );
    assert!(matches!(reply, Payload::AutoSaveRes(ref a) if a.code == status::SUCCESS));

    h.driver
        .process_event(ServerEvent::ConnectionClosed {
            session_id: STUDENT_SESSION,
            reason: "network drop".to_string(),
        })
        .unwrap();
    let reconnected = 3;
    h.connect(reconnected);

    // Resume restores the saved answer; token survives the reconnect.
    let reply = h.ask(
        reconnected,
        Payload::StartRoomTestReq(RoomRef { room_id }),
        Some(&student),
    );
    match reply {
        Payload::StartRoomTestRes(res) => {
            assert_eq!(res.answers[0].selected, Some(1));
            assert_eq!(res.answers[1].selected, None);
        },
        other => panic!("expected StartRoomTestRes, got {other:?}"),
    }

    // Submit: one right, one wrong.
    let reply = h.ask(
        reconnected,
        Payload::SubmitRoomTestReq(SubmitRoomTestRequest {
            room_id,
            answers: vec![
                AnswerEntry { question_id: question_ids[0], selected: 1 },
                AnswerEntry { question_id: question_ids[1], selected: 0 },
            ],
        }),
        Some(&student),
    );
    match reply {
        Payload::SubmitRoomTestRes(res) => {
            assert_eq!(res.code, status::SUCCESS);
            assert_eq!(res.score, Some(1));
            assert_eq!(res.total, Some(2));
            assert!((res.percentage.unwrap() - 50.0).abs() < f64::EPSILON);
        },
        other => panic!("expected SubmitRoomTestRes, got {other:?}"),
    }

    // Resubmission and post-submit saves are conflicts.
    let reply = h.ask(
        reconnected,
        Payload::SubmitRoomTestReq(SubmitRoomTestRequest { room_id, answers: vec![] }),
        Some(&student),
    );
    assert_eq!(error_code(&reply), status::CONFLICT);

    let reply = h.ask(
        reconnected,
        Payload::AutoSaveReq(AutoSaveRequest { room_id, answers: vec![], is_final: false }),
        Some(&student),
    );
    assert_eq!(error_code(&reply), status::CONFLICT);

    // Ending early is refused with the remaining time.
    h.env.advance(60);
    let reply =
        h.ask(TEACHER_SESSION, Payload::EndRoomReq(RoomRef { room_id }), Some(&teacher));
    match reply {
        Payload::Error(e) => {
            assert_eq!(e.code, status::CONFLICT);
            assert!(e.message.contains('4'), "4 minutes left, got: {}", e.message);
        },
        other => panic!("expected Error, got {other:?}"),
    }

    // After the full duration the room ends and broadcasts.
    h.env.advance(4 * 60);
    let actions =
        h.send(TEACHER_SESSION, Payload::EndRoomReq(RoomRef { room_id }), Some(&teacher));
    let reply = actions
        .iter()
        .find_map(|a| match a {
            ServerAction::SendToSession { session_id: sid, frame }
                if *sid == TEACHER_SESSION =>
            {
                Some(Payload::from_frame(frame).unwrap())
            },
            _ => None,
        })
        .unwrap();
    assert!(matches!(reply, Payload::EndRoomRes(ref a) if a.code == status::SUCCESS));
    assert!(actions.iter().any(|a| matches!(
        a,
        ServerAction::BroadcastToRoom { room_id: rid, .. } if *rid == room_id
    )));

    // Ended rooms accept no new joins.
    let late = h.signup(4, "student2", Role::Student);
    let reply = h.ask(
        4,
        Payload::JoinRoomReq(JoinRoomRequest { room_code }),
        Some(&late),
    );
    assert_eq!(error_code(&reply), status::CONFLICT);

    // Teacher dashboard reflects the one attempt.
    match h.ask(TEACHER_SESSION, Payload::TeacherDataReq, Some(&teacher)) {
        Payload::TeacherDataRes(res) => {
            assert_eq!(res.stats.total_attempts, 1);
            assert_eq!(res.results.len(), 1);
            assert_eq!(res.results[0].score, 1);
            assert!((res.results[0].percentage - 50.0).abs() < f64::EPSILON);
        },
        other => panic!("expected TeacherDataRes, got {other:?}"),
    }
}

#[test]
fn room_ownership_is_enforced() {
    let mut h = Harness::new();
    let owner = h.signup(1, "teach1", Role::Teacher);
    let rival = h.signup(2, "teach2", Role::Teacher);

    let room_id = match h.ask(
        1,
        Payload::CreateRoomReq(CreateRoomRequest {
            room_name: "Quiz".to_string(),
            num_questions: 1,
            duration_minutes: 5,
        }),
        Some(&owner),
    ) {
        Payload::CreateRoomRes(res) => res.room_id.unwrap(),
        other => panic!("expected CreateRoomRes, got {other:?}"),
    };

    let reply = h.ask(
        2,
        Payload::AddQuestionReq(AddQuestionRequest {
            room_id,
            question_text: "whose room?".to_string(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: 0,
        }),
        Some(&rival),
    );
    assert_eq!(error_code(&reply), status::FORBIDDEN);

    let reply = h.ask(2, Payload::StartRoomReq(RoomRef { room_id }), Some(&rival));
    assert_eq!(error_code(&reply), status::FORBIDDEN);

    let reply = h.ask(2, Payload::GetQuestionsReq(RoomRef { room_id }), Some(&rival));
    assert_eq!(error_code(&reply), status::FORBIDDEN);
}

#[test]
fn non_participant_cannot_enter_or_submit() {
    let mut h = Harness::new();
    let teacher = h.signup(1, "teach1", Role::Teacher);
    let outsider = h.signup(2, "student1", Role::Student);

    let room_id = match h.ask(
        1,
        Payload::CreateRoomReq(CreateRoomRequest {
            room_name: "Quiz".to_string(),
            num_questions: 1,
            duration_minutes: 5,
        }),
        Some(&teacher),
    ) {
        Payload::CreateRoomRes(res) => res.room_id.unwrap(),
        other => panic!("expected CreateRoomRes, got {other:?}"),
    };
    h.ask(
        1,
        Payload::AddQuestionReq(AddQuestionRequest {
            room_id,
            question_text: "q".to_string(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: 0,
        }),
        Some(&teacher),
    );
    h.ask(1, Payload::StartRoomReq(RoomRef { room_id }), Some(&teacher));

    let reply =
        h.ask(2, Payload::StartRoomTestReq(RoomRef { room_id }), Some(&outsider));
    assert_eq!(error_code(&reply), status::FORBIDDEN);

    let reply = h.ask(
        2,
        Payload::SubmitRoomTestReq(SubmitRoomTestRequest { room_id, answers: vec![] }),
        Some(&outsider),
    );
    assert_eq!(error_code(&reply), status::FORBIDDEN);
}

#[test]
fn question_listing_and_deletion() {
    let mut h = Harness::new();
    let teacher = h.signup(1, "teach1", Role::Teacher);

    let room_id = match h.ask(
        1,
        Payload::CreateRoomReq(CreateRoomRequest {
            room_name: "Quiz".to_string(),
            num_questions: 3,
            duration_minutes: 5,
        }),
        Some(&teacher),
    ) {
        Payload::CreateRoomRes(res) => res.room_id.unwrap(),
        other => panic!("expected CreateRoomRes, got {other:?}"),
    };

    let mut ids = Vec::new();
    for text in ["first", "second"] {
        match h.ask(
            1,
            Payload::AddQuestionReq(AddQuestionRequest {
                room_id,
                question_text: text.to_string(),
                options: ["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer: 0,
            }),
            Some(&teacher),
        ) {
            Payload::AddQuestionRes(res) => ids.push(res.question_id.unwrap()),
            other => panic!("expected AddQuestionRes, got {other:?}"),
        }
    }

    match h.ask(1, Payload::GetQuestionsReq(RoomRef { room_id }), Some(&teacher)) {
        Payload::GetQuestionsRes(res) => {
            assert_eq!(res.questions.len(), 2);
            assert_eq!(res.questions[0].question_text, "first");
            // The authoritative list carries the correct answers; only
            // owners ever see it.
            assert_eq!(res.questions[0].correct_answer, 0);
        },
        other => panic!("expected GetQuestionsRes, got {other:?}"),
    }

    let reply = h.ask(
        1,
        Payload::DeleteQuestionReq(taproom_proto::payloads::room::DeleteQuestionRequest {
            room_id,
            question_id: ids[0],
        }),
        Some(&teacher),
    );
    assert!(matches!(reply, Payload::DeleteQuestionRes(ref a) if a.code == status::SUCCESS));

    // Deleting it again reports it missing.
    let reply = h.ask(
        1,
        Payload::DeleteQuestionReq(taproom_proto::payloads::room::DeleteQuestionRequest {
            room_id,
            question_id: ids[0],
        }),
        Some(&teacher),
    );
    assert_eq!(error_code(&reply), status::BAD_REQUEST);

    match h.ask(1, Payload::GetQuestionsReq(RoomRef { room_id }), Some(&teacher)) {
        Payload::GetQuestionsRes(res) => {
            assert_eq!(res.questions.len(), 1);
            assert_eq!(res.questions[0].question_text, "second");
        },
        other => panic!("expected GetQuestionsRes, got {other:?}"),
    }
}

#[test]
fn room_listings_track_participation() {
    let mut h = Harness::new();
    let teacher = h.signup(1, "teach1", Role::Teacher);
    let student = h.signup(2, "student1", Role::Student);

    let mut codes = Vec::new();
    for name in ["Alpha", "Beta"] {
        match h.ask(
            1,
            Payload::CreateRoomReq(CreateRoomRequest {
                room_name: name.to_string(),
                num_questions: 1,
                duration_minutes: 5,
            }),
            Some(&teacher),
        ) {
            Payload::CreateRoomRes(res) => codes.push(res.room_code.unwrap()),
            other => panic!("expected CreateRoomRes, got {other:?}"),
        }
    }

    // Everything is available before joining.
    match h.ask(2, Payload::GetAvailableRoomsReq, Some(&student)) {
        Payload::GetAvailableRoomsRes(res) => assert_eq!(res.rooms.len(), 2),
        other => panic!("expected GetAvailableRoomsRes, got {other:?}"),
    }

    h.ask(
        2,
        Payload::JoinRoomReq(JoinRoomRequest { room_code: codes[0].clone() }),
        Some(&student),
    );

    // Joined rooms move from available to the student's own list.
    match h.ask(2, Payload::GetAvailableRoomsReq, Some(&student)) {
        Payload::GetAvailableRoomsRes(res) => {
            assert_eq!(res.rooms.len(), 1);
            assert_eq!(res.rooms[0].room_name, "Beta");
        },
        other => panic!("expected GetAvailableRoomsRes, got {other:?}"),
    }
    match h.ask(2, Payload::GetStudentRoomsReq, Some(&student)) {
        Payload::GetStudentRoomsRes(res) => {
            assert_eq!(res.rooms.len(), 1);
            assert_eq!(res.rooms[0].room_name, "Alpha");
        },
        other => panic!("expected GetStudentRoomsRes, got {other:?}"),
    }

    // Teacher's overview counts the participant.
    match h.ask(1, Payload::GetRoomsReq, Some(&teacher)) {
        Payload::GetRoomsRes(res) => {
            assert_eq!(res.rooms.len(), 2);
            let alpha = res.rooms.iter().find(|r| r.room_name == "Alpha").unwrap();
            assert_eq!(alpha.participant_count, 1);
        },
        other => panic!("expected GetRoomsRes, got {other:?}"),
    }
}
