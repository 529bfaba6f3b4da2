//! Room list view-model: tabs, paging and the join flow.

use commitfield_client::{ApiError, api::RoomTab};
use commitfield_core::RoomId;
use commitfield_proto::payloads::rest::RoomDto;

use crate::AppAction;

/// Shown when a room list cannot be loaded.
pub const ROOMS_FAILED: &str = "채팅방 목록을 불러오는데 실패했습니다.";

/// Shown when a join fails for an unmapped reason.
pub const JOIN_FAILED: &str = "채팅방 참여에 실패했습니다.";

/// Prompt error for an empty password.
pub const PASSWORD_REQUIRED: &str = "비밀번호를 입력해주세요.";

/// Backend asks for a password.
pub const NEED_TO_PASSWORD: &str = "NEED_TO_PASSWORD";

/// Backend rejected the password.
pub const ROOM_PASSWORD_MISMATCH: &str = "ROOM_PASSWORD_MISMATCH";

/// Load state of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
    /// Page requested.
    Loading,
    /// Page shown.
    Ready,
    /// Page failed.
    Error(String),
}

/// Open password prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPrompt {
    /// Room being joined.
    pub room_id: RoomId,
    /// Error shown under the input.
    pub error: Option<String>,
}

/// Room list state.
#[derive(Debug, Clone)]
pub struct RoomListView {
    tab: RoomTab,
    page: u32,
    rooms: Vec<RoomDto>,
    state: ListState,
    prompt: Option<PasswordPrompt>,
    joining: Option<RoomId>,
}

impl Default for RoomListView {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomListView {
    /// First page of every room.
    pub fn new() -> Self {
        Self {
            tab: RoomTab::All,
            page: 0,
            rooms: Vec::new(),
            state: ListState::Loading,
            prompt: None,
            joining: None,
        }
    }

    /// Request the current page.
    pub fn load(&mut self) -> Vec<AppAction> {
        self.state = ListState::Loading;
        vec![AppAction::LoadRooms { tab: self.tab, page: self.page }, AppAction::Render]
    }

    /// Switch tab, back to the first page.
    pub fn show_tab(&mut self, tab: RoomTab) -> Vec<AppAction> {
        self.tab = tab;
        self.page = 0;
        self.load()
    }

    /// Next page. Ignored past an empty page.
    pub fn next_page(&mut self) -> Vec<AppAction> {
        if self.rooms.is_empty() {
            return vec![];
        }
        self.page += 1;
        self.load()
    }

    /// Previous page.
    pub fn prev_page(&mut self) -> Vec<AppAction> {
        if self.page == 0 {
            return vec![];
        }
        self.page -= 1;
        self.load()
    }

    /// Apply a fetched page. Pages for another tab or page are discarded.
    pub fn rooms_loaded(&mut self, tab: RoomTab, page: u32, rooms: Vec<RoomDto>) -> Vec<AppAction> {
        if tab != self.tab || page != self.page {
            return vec![];
        }
        self.rooms = rooms;
        self.state = ListState::Ready;
        vec![AppAction::Render]
    }

    /// Apply a failed fetch.
    pub fn rooms_failed(&mut self, tab: RoomTab, error: &ApiError) -> Vec<AppAction> {
        if tab != self.tab {
            return vec![];
        }
        tracing::warn!(?tab, error = %error, "room list failed");

        self.rooms.clear();
        self.state = ListState::Error(match error {
            ApiError::Unauthorized => error.user_message(),
            _ => ROOMS_FAILED.to_owned(),
        });
        vec![AppAction::Render]
    }

    /// Start joining a room listed under every room. The runtime skips the
    /// join call when the user is already a member.
    pub fn begin_join(&mut self, room_id: RoomId) -> Vec<AppAction> {
        if self.joining.is_some() {
            return vec![];
        }
        self.joining = Some(room_id);
        vec![AppAction::JoinRoom { room_id, password: None, check_membership: true }]
    }

    /// Password submitted from the prompt.
    pub fn submit_password(&mut self, password: &str) -> Vec<AppAction> {
        let Some(prompt) = &mut self.prompt else {
            return vec![];
        };
        if password.trim().is_empty() {
            prompt.error = Some(PASSWORD_REQUIRED.to_owned());
            return vec![AppAction::Render];
        }
        if self.joining.is_some() {
            return vec![];
        }

        let room_id = prompt.room_id;
        self.joining = Some(room_id);
        vec![AppAction::JoinRoom {
            room_id,
            password: Some(password.to_owned()),
            check_membership: false,
        }]
    }

    /// Close the prompt.
    pub fn cancel_password(&mut self) -> Vec<AppAction> {
        self.prompt = None;
        vec![AppAction::Render]
    }

    /// Join finished.
    pub fn joined(&mut self, room_id: RoomId) {
        if self.joining == Some(room_id) {
            self.joining = None;
        }
        self.prompt = None;
    }

    /// Join rejected.
    ///
    /// A password request opens the prompt; a rejected password keeps it open
    /// with the error; anything else is an alert.
    pub fn join_failed(&mut self, room_id: RoomId, error: &ApiError) -> Vec<AppAction> {
        self.joining = None;
        tracing::debug!(room_id, error = %error, "join failed");

        match error.code() {
            Some(NEED_TO_PASSWORD) => {
                self.prompt = Some(PasswordPrompt { room_id, error: None });
                return vec![AppAction::Render];
            },
            Some(ROOM_PASSWORD_MISMATCH) => {
                self.prompt = Some(PasswordPrompt { room_id, error: Some(error.user_message()) });
                return vec![AppAction::Render];
            },
            _ => {},
        }

        if let Some(prompt) = &mut self.prompt
            && prompt.room_id == room_id
        {
            prompt.error = Some(error.user_message());
            return vec![AppAction::Render];
        }

        let text = match error {
            ApiError::Domain { .. } | ApiError::Unauthorized => error.user_message(),
            _ => JOIN_FAILED.to_owned(),
        };
        vec![AppAction::Alert(text), AppAction::Render]
    }

    /// Listed room by id.
    pub fn room(&self, room_id: RoomId) -> Option<&RoomDto> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    /// Selected tab.
    pub fn tab(&self) -> RoomTab {
        self.tab
    }

    /// Zero-based page.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Rooms on the page.
    pub fn rooms(&self) -> &[RoomDto] {
        &self.rooms
    }

    /// Load state.
    pub fn state(&self) -> &ListState {
        &self.state
    }

    /// Open password prompt.
    pub fn prompt(&self) -> Option<&PasswordPrompt> {
        self.prompt.as_ref()
    }

    /// Room whose join is in flight.
    pub fn joining(&self) -> Option<RoomId> {
        self.joining
    }
}
