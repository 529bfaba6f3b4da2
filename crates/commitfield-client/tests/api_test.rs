//! REST backend against a mock server.

#![allow(clippy::unwrap_used)]

use commitfield_client::{
    ApiError, ClientConfig, Identity,
    api::{ChatApi, ChatBackend, RoomTab},
};
use commitfield_core::MessageId;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

fn api(server: &MockServer) -> ChatApi {
    let config = ClientConfig { api_base_url: server.uri(), ..ClientConfig::default() };
    let identity = Identity { session: Some("abc".into()), ..Identity::new(7, "kim") };
    ChatApi::new(&config, &identity).unwrap()
}

#[tokio::test]
async fn room_list_sends_paging_and_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/room/part"))
        .and(query_param("page", "2"))
        .and(query_param("size", "10"))
        .and(header("cookie", "JSESSIONID=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"id": 3, "title": "study", "currentUserCount": 2, "userCountMax": 10}]
        })))
        .mount(&server)
        .await;

    let rooms = api(&server).rooms(RoomTab::Joined, 2, 10).await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].title, "study");
}

#[tokio::test]
async fn chat_not_found_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/msg/7"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "errorCode": "CHAT_NOT_FOUND",
            "message": "no messages"
        })))
        .mount(&server)
        .await;

    let page = api(&server).messages(7, None).await.unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn older_page_passes_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/msg/7"))
        .and(query_param("lastId", "41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"chatMsgId": 40, "userId": 2, "nickname": "lee", "message": "hi",
                      "sendAt": "2024-05-01T09:00:00"}]
        })))
        .mount(&server)
        .await;

    let page = api(&server).messages(7, Some(MessageId::server("41"))).await.unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn wrong_password_maps_to_user_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/room/join/5"))
        .and(body_json(json!({"password": "nope"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "errorCode": "ROOM_PASSWORD_MISMATCH",
            "message": "password mismatch"
        })))
        .mount(&server)
        .await;

    let err = api(&server).join_room(5, Some("nope".into())).await.unwrap_err();
    assert_eq!(err.code(), Some("ROOM_PASSWORD_MISMATCH"));
    assert_eq!(err.user_message(), "비밀번호가 일치하지 않습니다.");
}

#[tokio::test]
async fn domain_code_in_ok_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/room/join/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errorCode": "ROOM_USER_FULL"
        })))
        .mount(&server)
        .await;

    let err = api(&server).join_room(5, None).await.unwrap_err();
    assert_eq!(err.user_message(), "채팅방 인원이 가득 찼습니다.");
}

#[tokio::test]
async fn expired_session_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/chat/room/out/5"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = api(&server).leave_room(5).await.unwrap_err();
    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn server_failure_on_history_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/msg/9"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = api(&server).messages(9, None).await.unwrap_err();
    assert_eq!(err, ApiError::Server { status: 500, message: String::new() });
}

#[tokio::test]
async fn notification_server_failure_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(api(&server).notifications().await.unwrap().is_empty());
}

#[tokio::test]
async fn send_message_posts_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/msg/42"))
        .and(body_json(json!({"message": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let echoed = api(&server).send_message(42, "hello".into()).await.unwrap();
    assert!(echoed.is_none());
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let config = ClientConfig {
        api_base_url: "http://127.0.0.1:9".into(),
        ..ClientConfig::default()
    };
    let api = ChatApi::new(&config, &Identity::new(1, "a")).unwrap();

    let err = api.participants(1).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[tokio::test]
async fn profile_is_read_without_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/info"))
        .and(header("cookie", "JSESSIONID=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "username": "whale22",
            "avatarUrl": "https://avatars.example/whale22.png",
            "seasonCommitCount": 40,
            "petExp": 149,
            "petGrow": "EGG",
            "tier": "SPROUT",
            "lastCommitted": "2024-05-01T10:00:00"
        })))
        .mount(&server)
        .await;

    let info = api(&server).user_info().await.unwrap();
    assert_eq!(info.username, "whale22");
    assert_eq!(info.pet_exp, 149);
    assert_eq!(info.pet_grow.max_exp(), 150);
}

#[tokio::test]
async fn commit_count_and_pets_are_bare_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/commit-count/whale22"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(17)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/pets/getall"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"grow": "EGG", "type": 0},
            {"grow": "GROWN", "type": 3}
        ])))
        .mount(&server)
        .await;

    let api = api(&server);
    assert_eq!(api.commit_count("whale22").await.unwrap(), 17);

    let pets = api.pets().await.unwrap();
    assert_eq!(pets.len(), 2);
    assert_eq!(pets[1].kind, 3);
}

#[tokio::test]
async fn logout_posts_with_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/logout"))
        .and(header("cookie", "JSESSIONID=abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    api(&server).logout().await.unwrap();
}

#[tokio::test]
async fn expired_session_on_profile_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/info"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert_eq!(api(&server).user_info().await.unwrap_err(), ApiError::Unauthorized);
}
