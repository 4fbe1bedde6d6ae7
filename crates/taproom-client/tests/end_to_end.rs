//! End-to-end test over real TCP.
//!
//! Boots the production server on an ephemeral port and drives a teacher
//! and a student through the full room flow with two typed clients,
//! including the `RoomStatus` push delivery.

use taproom_client::{Client, ClientError};
use taproom_proto::{
    Payload, status,
    payloads::{
        auth::Role,
        room::RoomState,
        test::AnswerEntry,
    },
};
use taproom_server::{Server, ServerRuntimeConfig};

async fn spawn_server() -> std::net::SocketAddr {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let server = Server::bind(config).await.expect("bind failed");
    let addr = server.local_addr().expect("no local addr");

    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            eprintln!("server exited: {e}");
        }
    });

    addr
}

#[tokio::test]
async fn full_flow_over_tcp() {
    let addr = spawn_server().await;

    let mut teacher = Client::connect(&addr.to_string()).await.unwrap();
    let mut student = Client::connect(&addr.to_string()).await.unwrap();

    // Accounts. Registration alone issues no token.
    teacher
        .register("teach1", "secret99", Role::Teacher, "Grace Hopper", None)
        .await
        .unwrap();
    student
        .register("student1", "secret99", Role::Student, "Alan Kay", Some("ak@example.com"))
        .await
        .unwrap();
    assert!(teacher.token().is_none());

    let login = teacher.login("teach1", "secret99").await.unwrap();
    assert_eq!(login.role, Some(Role::Teacher));
    assert!(teacher.token().is_some());
    student.login("student1", "secret99").await.unwrap();

    // Wrong password is refused with the credential status code.
    let mut impostor = Client::connect(&addr.to_string()).await.unwrap();
    match impostor.login("teach1", "wrong-pass").await {
        Err(ClientError::Server { code, .. }) => assert_eq!(code, status::INVALID_CREDENTIALS),
        other => panic!("expected credential refusal, got {other:?}"),
    }

    // Room setup.
    let room = teacher.create_room("Midterm", 1, 5).await.unwrap();
    let room_id = room.room_id.unwrap();
    let room_code = room.room_code.unwrap();

    let question = teacher
        .add_question(
            room_id,
            "2 + 2 = ?",
            ["3".into(), "4".into(), "5".into(), "22".into()],
            1,
        )
        .await
        .unwrap();
    let question_id = question.question_id.unwrap();

    // Student joins before the start so the push reaches them.
    let join = student.join_room(&room_code).await.unwrap();
    assert!(!join.already_joined);
    assert_eq!(join.room_status, Some(RoomState::Waiting));

    teacher.start_room(room_id).await.unwrap();

    match student.next_push().await.unwrap() {
        Payload::RoomStatus(push) => {
            assert_eq!(push.room_id, room_id);
            assert_eq!(push.status, RoomState::Active);
        },
        other => panic!("expected RoomStatus push, got {other:?}"),
    }

    // Take the test with an auto-save along the way.
    let test = student.start_room_test(room_id).await.unwrap();
    assert_eq!(test.questions.len(), 1);
    assert!(test.answers[0].selected.is_none());

    student
        .auto_save(room_id, vec![AnswerEntry { question_id, selected: 1 }], false)
        .await
        .unwrap();

    // Resume reflects the saved answer.
    let resumed = student.start_room_test(room_id).await.unwrap();
    assert_eq!(resumed.answers[0].selected, Some(1));

    let result = student
        .submit_room_test(room_id, vec![AnswerEntry { question_id, selected: 1 }])
        .await
        .unwrap();
    assert_eq!(result.score, Some(1));
    assert_eq!(result.total, Some(1));
    assert!((result.percentage.unwrap() - 100.0).abs() < f64::EPSILON);

    // Resubmission conflicts.
    match student.submit_room_test(room_id, vec![]).await {
        Err(ClientError::Server { code, .. }) => assert_eq!(code, status::CONFLICT),
        other => panic!("expected conflict, got {other:?}"),
    }

    // The five-minute floor has not elapsed.
    match teacher.end_room(room_id).await {
        Err(ClientError::Server { code, message }) => {
            assert_eq!(code, status::CONFLICT);
            assert!(message.contains("minute"), "got: {message}");
        },
        other => panic!("expected conflict, got {other:?}"),
    }

    // Dashboard sees the attempt.
    let data = teacher.teacher_data().await.unwrap();
    assert_eq!(data.stats.total_attempts, 1);
    assert_eq!(data.results[0].student_name, "Alan Kay");

    // Logout invalidates the token server-side.
    student.logout().await.unwrap();
}

#[tokio::test]
async fn requests_without_login_are_unauthorized() {
    let addr = spawn_server().await;
    let mut client = Client::connect(&addr.to_string()).await.unwrap();

    match client.get_rooms().await {
        Err(ClientError::Server { code, .. }) => assert_eq!(code, status::UNAUTHORIZED),
        other => panic!("expected unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn heartbeat_keeps_connection_open() {
    let addr = spawn_server().await;
    let mut client = Client::connect(&addr.to_string()).await.unwrap();

    client.heartbeat().await.unwrap();

    // The connection still serves requests afterwards.
    client
        .register("student1", "secret99", Role::Student, "Test User", None)
        .await
        .unwrap();
    let login = client.login("student1", "secret99").await.unwrap();
    assert_eq!(login.code, status::SUCCESS);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let addr = spawn_server().await;
    let mut client = Client::connect(&addr.to_string()).await.unwrap();

    client.register("bob42", "secret99", Role::Student, "Bob", None).await.unwrap();
    match client.register("bob42", "other-pass", Role::Teacher, "Bobby", None).await {
        Err(ClientError::Server { code, .. }) => assert_eq!(code, status::USERNAME_EXISTS),
        other => panic!("expected username conflict, got {other:?}"),
    }
}
