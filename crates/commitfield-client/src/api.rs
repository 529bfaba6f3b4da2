//! REST backend.
//!
//! [`ChatBackend`] is the seam the runtime talks to; [`ChatApi`] implements it
//! over `reqwest`. Chat responses are wrapped in an [`ApiEnvelope`]; the
//! profile, pet and commit-count endpoints under `/api` return bare JSON.
//! Failures are normalized into [`ApiError`] by [`classify`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use commitfield_core::MessageId;
use commitfield_proto::{
    ChatWire, NotificationWire, RoomId,
    payloads::{
        rest::{ApiEnvelope, JoinRoomRequest, ParticipantDto, RoomDto, SendMessageRequest},
        stats::{PetDto, UserInfoDto},
    },
};
use reqwest::{
    Method, RequestBuilder, StatusCode,
    header::COOKIE,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;

use crate::{
    config::{ClientConfig, Identity},
    error::{ApiError, ConfigError},
};

/// Error code the backend returns for a room without messages.
pub const CHAT_NOT_FOUND: &str = "CHAT_NOT_FOUND";

/// Room list selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoomTab {
    /// Every room.
    All,
    /// Rooms the current user created.
    Created,
    /// Rooms the current user joined.
    Joined,
}

impl RoomTab {
    /// Every tab, in display order.
    pub const ALL: [RoomTab; 3] = [RoomTab::All, RoomTab::Created, RoomTab::Joined];

    /// Listing path for the tab.
    pub fn path(self) -> &'static str {
        match self {
            Self::All => "/chat/room",
            Self::Created => "/chat/room/creator",
            Self::Joined => "/chat/room/part",
        }
    }
}

/// Room creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    /// Trimmed title.
    pub title: String,
    /// Maximum members.
    pub user_count_max: u32,
    /// Password for a private room.
    pub password: Option<String>,
    /// Image file uploaded with the room.
    pub image: Option<PathBuf>,
}

/// Chat backend operations.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One page of a room list.
    async fn rooms(&self, tab: RoomTab, page: u32, size: u32) -> Result<Vec<RoomDto>, ApiError>;

    /// Create a room. Returns the room when the backend echoes it.
    async fn create_room(&self, room: NewRoom) -> Result<Option<RoomDto>, ApiError>;

    /// Join a room, with a password for private rooms.
    async fn join_room(&self, room_id: RoomId, password: Option<String>) -> Result<(), ApiError>;

    /// Leave a room.
    async fn leave_room(&self, room_id: RoomId) -> Result<(), ApiError>;

    /// Delete a room. Creator only.
    async fn delete_room(&self, room_id: RoomId) -> Result<(), ApiError>;

    /// One page of history, oldest first. `last_id` selects messages older
    /// than that id; `None` returns the newest page.
    ///
    /// A room without messages resolves with an empty page.
    async fn messages(
        &self,
        room_id: RoomId,
        last_id: Option<MessageId>,
    ) -> Result<Vec<ChatWire>, ApiError>;

    /// Send a message over REST. Returns the stored message when echoed.
    async fn send_message(
        &self,
        room_id: RoomId,
        body: String,
    ) -> Result<Option<ChatWire>, ApiError>;

    /// Members of a room.
    async fn participants(&self, room_id: RoomId) -> Result<Vec<ParticipantDto>, ApiError>;

    /// Stored notifications. Server failures resolve with an empty list.
    async fn notifications(&self) -> Result<Vec<NotificationWire>, ApiError>;

    /// Profile and season statistics of the signed-in user.
    async fn user_info(&self) -> Result<UserInfoDto, ApiError>;

    /// Commits counted for `username`.
    async fn commit_count(&self, username: &str) -> Result<u64, ApiError>;

    /// Every user's pet.
    async fn pets(&self) -> Result<Vec<PetDto>, ApiError>;

    /// End the session.
    async fn logout(&self) -> Result<(), ApiError>;
}

/// Normalize a failed response.
///
/// - 401 is [`ApiError::Unauthorized`]
/// - any `errorCode` is [`ApiError::Domain`]
/// - 400 is [`ApiError::BadRequest`] with the server text
/// - everything else is [`ApiError::Server`]
pub fn classify(status: u16, envelope: Option<ApiEnvelope<serde_json::Value>>) -> ApiError {
    let (code, message) = match envelope {
        Some(env) => (env.error_code, env.message.unwrap_or_default()),
        None => (None, String::new()),
    };

    match (status, code) {
        (401, _) => ApiError::Unauthorized,
        (_, Some(code)) => ApiError::Domain { code, message },
        (400, None) => ApiError::BadRequest { message },
        (status, None) => ApiError::Server { status, message },
    }
}

fn is_empty_history(err: &ApiError) -> bool {
    err.code() == Some(CHAT_NOT_FOUND) || err.status() == Some(404)
}

/// `reqwest` implementation of [`ChatBackend`].
#[derive(Debug, Clone)]
pub struct ChatApi {
    http: reqwest::Client,
    base: String,
    cookie: Option<String>,
}

impl ChatApi {
    /// Client for the configured base URL, authenticated as `identity`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidUrl` or `UnsupportedScheme` for a bad base URL
    /// - `ConfigError::HttpClient` if the HTTP client cannot be built
    pub fn new(config: &ClientConfig, identity: &Identity) -> Result<Self, ConfigError> {
        let base = config.api_url()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base: base.as_str().trim_end_matches('/').to_owned(),
            cookie: identity.cookie_header(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.http.request(method, format!("{}{path}", self.base));
        match &self.cookie {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    /// Body of a successful response. `None` when empty.
    async fn fetch(&self, request: RequestBuilder) -> Result<Option<Vec<u8>>, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        let url = response.url().path().to_owned();
        let bytes = response.bytes().await.map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            let envelope = serde_json::from_slice(&bytes).ok();
            let err = classify(status.as_u16(), envelope);
            tracing::debug!(%url, status = status.as_u16(), error = %err, "request failed");
            return Err(err);
        }

        if bytes.is_empty() || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(bytes.to_vec()))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let Some(bytes) = self.fetch(request).await? else {
            return Ok(None);
        };

        let envelope: ApiEnvelope<T> =
            serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))?;

        if !envelope.success
            && let Some(code) = envelope.error_code
        {
            let message = envelope.message.unwrap_or_default();
            return Err(ApiError::Domain { code, message });
        }

        Ok(envelope.data)
    }

    /// Like `execute` for endpoints that answer without an envelope.
    async fn execute_bare<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        match self.fetch(request).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| ApiError::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    async fn image_part(path: &Path) -> Result<Part, ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Transport(format!("cannot read {}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map_or_else(|| "image".to_owned(), |n| n.to_string_lossy().into_owned());

        Ok(Part::bytes(bytes).file_name(name))
    }
}

#[async_trait]
impl ChatBackend for ChatApi {
    async fn rooms(&self, tab: RoomTab, page: u32, size: u32) -> Result<Vec<RoomDto>, ApiError> {
        let request =
            self.request(Method::GET, tab.path()).query(&[("page", page), ("size", size)]);
        Ok(self.execute(request).await?.unwrap_or_default())
    }

    async fn create_room(&self, room: NewRoom) -> Result<Option<RoomDto>, ApiError> {
        let mut form = Form::new()
            .text("title", room.title)
            .text("userCountMax", room.user_count_max.to_string());
        if let Some(password) = room.password {
            form = form.text("password", password);
        }
        if let Some(path) = &room.image {
            form = form.part("file", Self::image_part(path).await?);
        }

        let request = self.request(Method::POST, "/chat/room").multipart(form);
        let data: Option<serde_json::Value> = self.execute(request).await?;
        Ok(data.and_then(|v| serde_json::from_value(v).ok()))
    }

    async fn join_room(&self, room_id: RoomId, password: Option<String>) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, &format!("/chat/room/join/{room_id}"))
            .json(&JoinRoomRequest { password });
        self.execute::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn leave_room(&self, room_id: RoomId) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &format!("/chat/room/out/{room_id}"));
        self.execute::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn delete_room(&self, room_id: RoomId) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &format!("/chat/room/delete/{room_id}"));
        self.execute::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn messages(
        &self,
        room_id: RoomId,
        last_id: Option<MessageId>,
    ) -> Result<Vec<ChatWire>, ApiError> {
        let mut request = self.request(Method::GET, &format!("/chat/msg/{room_id}"));
        if let Some(last_id) = &last_id {
            request = request.query(&[("lastId", last_id.as_str())]);
        }

        match self.execute(request).await {
            Ok(page) => Ok(page.unwrap_or_default()),
            Err(e) if is_empty_history(&e) => {
                tracing::debug!(room_id, "no stored messages");
                Ok(Vec::new())
            },
            Err(e) => Err(e),
        }
    }

    async fn send_message(
        &self,
        room_id: RoomId,
        body: String,
    ) -> Result<Option<ChatWire>, ApiError> {
        let request = self
            .request(Method::POST, &format!("/chat/msg/{room_id}"))
            .json(&SendMessageRequest { message: body });
        let data: Option<serde_json::Value> = self.execute(request).await?;
        Ok(data.and_then(|v| serde_json::from_value(v).ok()))
    }

    async fn participants(&self, room_id: RoomId) -> Result<Vec<ParticipantDto>, ApiError> {
        let request = self.request(Method::GET, &format!("/chat/room/users/{room_id}"));
        Ok(self.execute(request).await?.unwrap_or_default())
    }

    async fn notifications(&self) -> Result<Vec<NotificationWire>, ApiError> {
        match self.execute(self.request(Method::GET, "/api/notifications")).await {
            Ok(list) => Ok(list.unwrap_or_default()),
            Err(ApiError::Server { status, .. }) if status >= 500 => {
                tracing::warn!(status, "notification listing failed");
                Ok(Vec::new())
            },
            Err(e) => Err(e),
        }
    }

    async fn user_info(&self) -> Result<UserInfoDto, ApiError> {
        self.execute_bare(self.request(Method::GET, "/api/user/info"))
            .await?
            .ok_or_else(|| ApiError::Decode("empty profile".to_owned()))
    }

    async fn commit_count(&self, username: &str) -> Result<u64, ApiError> {
        let request = self.request(Method::GET, &format!("/api/commit-count/{username}"));
        Ok(self.execute_bare(request).await?.unwrap_or_default())
    }

    async fn pets(&self) -> Result<Vec<PetDto>, ApiError> {
        let request = self.request(Method::GET, "/api/pets/getall");
        Ok(self.execute_bare(request).await?.unwrap_or_default())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.fetch(self.request(Method::POST, "/api/logout")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(code: Option<&str>, message: &str) -> Option<ApiEnvelope<serde_json::Value>> {
        Some(ApiEnvelope {
            success: false,
            message: Some(message.to_owned()),
            error_code: code.map(str::to_owned),
            data: None,
        })
    }

    #[test]
    fn unauthorized_wins_over_code() {
        assert_eq!(classify(401, envelope(Some("X"), "")), ApiError::Unauthorized);
    }

    #[test]
    fn code_becomes_domain_error() {
        let err = classify(400, envelope(Some("ROOM_USER_FULL"), "full"));
        assert_eq!(err.user_message(), "채팅방 인원이 가득 찼습니다.");
    }

    #[test]
    fn bad_request_keeps_server_text() {
        let err = classify(400, envelope(None, "제목은 2자 이상"));
        assert_eq!(err, ApiError::BadRequest { message: "제목은 2자 이상".into() });
    }

    #[test]
    fn unknown_body_is_server_error() {
        assert_eq!(classify(502, None), ApiError::Server { status: 502, message: String::new() });
    }

    #[test]
    fn not_found_history_is_empty() {
        assert!(is_empty_history(&classify(404, None)));
        assert!(is_empty_history(&classify(400, envelope(Some(CHAT_NOT_FOUND), ""))));
        assert!(!is_empty_history(&classify(500, None)));
    }

    #[test]
    fn tab_paths() {
        assert_eq!(RoomTab::Created.path(), "/chat/room/creator");
        assert_eq!(RoomTab::Joined.path(), "/chat/room/part");
    }
}
