//! Chat room view-model.
//!
//! One [`ChatRoomView`] per open room. It owns the room's [`MessageList`] and
//! turns history pages, live messages and user intents into
//! [`AppAction`]s.
//!
//! # States
//!
//! ```text
//! Loading ──page──> Ready ──scroll to top──> LoadingOlder ──page──> Ready
//!    │
//!    └──failure, nothing cached──> Error
//! ```
//!
//! A cached copy shown before the network answers moves the view to `Ready`
//! early; the network page is then reconciled into it.

use commitfield_client::ApiError;
use commitfield_core::{
    ChatMessage, MessageId, RoomId, UserId,
    error::BodyError,
    message::{MAX_BODY_CHARS, validate_body},
    timeline::{InsertOutcome, MessageList},
};

use crate::{AppAction, Scroll};

/// Distance from the bottom, in driver units, still treated as "at bottom".
pub const BOTTOM_THRESHOLD: u32 = 3;

/// Confirmation text before leaving.
pub const CONFIRM_LEAVE: &str = "채팅방을 나가시겠습니까?";

/// Confirmation text before deleting.
pub const CONFIRM_DELETE: &str = "채팅방을 정말 삭제하시겠습니까? 모든 채팅 내용이 삭제됩니다.";

/// Alert after a failed leave.
pub const LEAVE_FAILED: &str = "채팅방을 나가는데 실패했습니다.";

/// Alert after a failed delete.
pub const DELETE_FAILED: &str = "채팅방 삭제에 실패했습니다.";

/// Inline error when history cannot be loaded.
pub const HISTORY_FAILED: &str = "메시지를 불러오는데 실패했습니다.";

/// Alert for an over-long message.
pub const BODY_TOO_LONG: &str = "메시지는 300자까지 입력할 수 있습니다.";

/// Alert when a non-creator tries to delete.
pub const DELETE_NOT_ALLOWED: &str = "채팅방을 만든 사용자만 삭제할 수 있습니다.";

/// Load state of the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Newest page requested, nothing to show yet.
    Loading,
    /// Messages shown.
    Ready,
    /// Older page requested.
    LoadingOlder,
    /// Initial load failed and nothing was cached.
    Error(String),
}

/// Room lifecycle command guarded by confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomCommand {
    /// Leave the room.
    Leave,
    /// Delete the room.
    Delete,
}

/// Per-room view state.
#[derive(Debug, Clone)]
pub struct ChatRoomView {
    room_id: RoomId,
    title: String,
    me: UserId,
    is_creator: bool,
    messages: MessageList,
    state: LoadState,
    latest_request: u64,
    older_request: Option<u64>,
    exhausted: bool,
    from_bottom: u32,
    confirming: Option<RoomCommand>,
    in_flight: Option<RoomCommand>,
}

impl ChatRoomView {
    /// Open a room. `request` identifies the initial history fetch.
    pub fn open(
        room_id: RoomId,
        title: impl Into<String>,
        me: UserId,
        request: u64,
    ) -> (Self, Vec<AppAction>) {
        let view = Self {
            room_id,
            title: title.into(),
            me,
            is_creator: false,
            messages: MessageList::new(),
            state: LoadState::Loading,
            latest_request: request,
            older_request: None,
            exhausted: false,
            from_bottom: 0,
            confirming: None,
            in_flight: None,
        };

        let actions = vec![
            AppAction::LoadCache { room_id },
            AppAction::Subscribe { room_id },
            AppAction::FetchHistory { room_id, request, cursor: None },
            AppAction::CheckCreator { room_id },
            AppAction::Render,
        ];
        (view, actions)
    }

    /// Show cached messages while the newest page is in flight.
    pub fn cache_loaded(&mut self, cached: Vec<ChatMessage>) -> Vec<AppAction> {
        if self.state != LoadState::Loading || cached.is_empty() {
            return vec![];
        }

        tracing::debug!(room_id = self.room_id, count = cached.len(), "showing cached messages");
        self.messages = MessageList::from_messages(cached);
        self.state = LoadState::Ready;
        vec![AppAction::Scroll(Scroll::ToBottom), AppAction::Render]
    }

    /// Apply a history page. Pages for superseded requests are discarded.
    ///
    /// A newest page scrolls to the bottom on first load, when the viewport
    /// is near the bottom, or when it confirms one of the user's own sends.
    pub fn history_loaded(&mut self, request: u64, page: Vec<ChatMessage>) -> Vec<AppAction> {
        let page: Vec<_> = page.into_iter().filter(|m| m.room_id == self.room_id).collect();

        if request == self.latest_request {
            let first_load = self.state == LoadState::Loading;
            let pending_before = self.own_placeholders();
            self.messages.reconcile(page);
            let own_confirmed = self.own_placeholders() < pending_before;
            if self.state != LoadState::LoadingOlder {
                self.state = LoadState::Ready;
            }

            let mut actions = vec![self.save()];
            if first_load || own_confirmed || self.is_near_bottom() {
                actions.push(AppAction::Scroll(Scroll::ToBottom));
            }
            actions.push(AppAction::Render);
            return actions;
        }

        if self.older_request == Some(request) {
            self.older_request = None;
            self.state = LoadState::Ready;
            if page.is_empty() {
                self.exhausted = true;
                return vec![AppAction::Render];
            }

            let added = self.messages.prepend_older(page);
            return vec![
                self.save(),
                AppAction::Scroll(Scroll::RestoreAnchor { added }),
                AppAction::Render,
            ];
        }

        tracing::debug!(room_id = self.room_id, request, "discarding stale history page");
        vec![]
    }

    /// Apply a failed history fetch.
    pub fn history_failed(&mut self, request: u64, error: &ApiError) -> Vec<AppAction> {
        if self.older_request == Some(request) {
            tracing::warn!(room_id = self.room_id, error = %error, "older page failed");
            self.older_request = None;
            self.state = LoadState::Ready;
            return vec![AppAction::Render];
        }

        if request != self.latest_request {
            return vec![];
        }

        tracing::warn!(room_id = self.room_id, error = %error, "history fetch failed");
        if self.messages.is_empty() {
            let message = match error {
                ApiError::Unauthorized | ApiError::Domain { .. } => error.user_message(),
                _ => HISTORY_FAILED.to_owned(),
            };
            self.state = LoadState::Error(message);
        } else if self.state == LoadState::Loading {
            self.state = LoadState::Ready;
        }
        vec![AppAction::Render]
    }

    /// Refetch the newest page, reconciling it into the list.
    pub fn refresh(&mut self, request: u64) -> Vec<AppAction> {
        self.latest_request = request;
        vec![AppAction::FetchHistory { room_id: self.room_id, request, cursor: None }]
    }

    /// Viewport reached the top: request the page before the oldest message.
    pub fn scrolled_to_top(&mut self, request: u64) -> Vec<AppAction> {
        if self.state != LoadState::Ready || self.exhausted {
            return vec![];
        }
        let Some(cursor) = self.messages.oldest_server_id().cloned() else {
            return vec![];
        };

        self.older_request = Some(request);
        self.state = LoadState::LoadingOlder;
        vec![
            AppAction::FetchHistory { room_id: self.room_id, request, cursor: Some(cursor) },
            AppAction::Render,
        ]
    }

    /// Record the viewport position.
    pub fn scrolled(&mut self, from_bottom: u32) {
        self.from_bottom = from_bottom;
    }

    /// Live message from the service.
    ///
    /// Messages for other rooms are ignored. Scrolls to the new message only
    /// when the viewport is near the bottom or the message is the user's own.
    pub fn message_received(&mut self, msg: ChatMessage) -> Vec<AppAction> {
        if msg.room_id != self.room_id {
            tracing::trace!(room_id = msg.room_id, "ignoring message for another room");
            return vec![];
        }

        let own = msg.sender_id == self.me;
        match self.messages.insert(msg) {
            InsertOutcome::Duplicate => return vec![],
            InsertOutcome::Confirmed { placeholder } => {
                tracing::debug!(room_id = self.room_id, %placeholder, "placeholder confirmed");
            },
            InsertOutcome::Appended => {},
        }

        let mut actions = vec![self.save()];
        if own || self.is_near_bottom() {
            actions.push(AppAction::Scroll(Scroll::ToBottom));
        }
        actions.push(AppAction::Render);
        actions
    }

    /// Validate a composed body and hand it to the service.
    pub fn compose(&self, body: &str) -> Vec<AppAction> {
        match validate_body(body) {
            Ok(body) => vec![AppAction::SendChat { room_id: self.room_id, body }],
            Err(BodyError::Empty) => vec![],
            Err(BodyError::TooLong { len }) => {
                tracing::debug!(len, max = MAX_BODY_CHARS, "message too long");
                vec![AppAction::Alert(BODY_TOO_LONG.to_owned())]
            },
        }
    }

    /// Show the optimistic copy of a sent message.
    pub fn optimistic(&mut self, msg: ChatMessage) -> Vec<AppAction> {
        if msg.room_id != self.room_id {
            return vec![];
        }
        self.messages.push_optimistic(msg);
        vec![AppAction::Scroll(Scroll::ToBottom), AppAction::Render]
    }

    /// A send was lost.
    pub fn send_failed(&mut self, local_id: &MessageId) -> Vec<AppAction> {
        if self.messages.mark_failed(local_id) { vec![AppAction::Render] } else { vec![] }
    }

    /// REST fallback succeeded.
    ///
    /// With the stored message in hand the placeholder is confirmed now;
    /// otherwise the newest page is refetched to confirm it.
    pub fn rest_sent(&mut self, message: Option<ChatMessage>, request: u64) -> Vec<AppAction> {
        match message {
            Some(msg) => self.message_received(msg),
            None => self.refresh(request),
        }
    }

    /// Ask to leave. Ignored while a command is in flight.
    pub fn request_leave(&mut self) -> Vec<AppAction> {
        if self.in_flight.is_some() {
            return vec![];
        }
        self.confirming = Some(RoomCommand::Leave);
        vec![AppAction::Confirm(CONFIRM_LEAVE.to_owned())]
    }

    /// Ask to delete. Creator only; ignored while a command is in flight.
    pub fn request_delete(&mut self) -> Vec<AppAction> {
        if self.in_flight.is_some() {
            return vec![];
        }
        if !self.is_creator {
            return vec![AppAction::Alert(DELETE_NOT_ALLOWED.to_owned())];
        }
        self.confirming = Some(RoomCommand::Delete);
        vec![AppAction::Confirm(CONFIRM_DELETE.to_owned())]
    }

    /// Confirmation accepted: issue the pending command.
    pub fn confirm(&mut self) -> Vec<AppAction> {
        let Some(command) = self.confirming.take() else {
            return vec![];
        };
        if self.in_flight.is_some() {
            return vec![];
        }

        self.in_flight = Some(command);
        let room_id = self.room_id;
        let action = match command {
            RoomCommand::Leave => AppAction::LeaveRoom { room_id },
            RoomCommand::Delete => AppAction::DeleteRoom { room_id },
        };
        vec![action, AppAction::Render]
    }

    /// Confirmation declined.
    pub fn cancel(&mut self) -> Vec<AppAction> {
        self.confirming = None;
        vec![AppAction::Render]
    }

    /// Leave or delete finished. Returns the follow-up actions; the caller
    /// closes the view.
    pub fn command_done(&mut self, command: RoomCommand) -> Vec<AppAction> {
        self.in_flight = None;
        let room_id = self.room_id;
        match command {
            RoomCommand::Leave => vec![AppAction::Unsubscribe { room_id }],
            RoomCommand::Delete => {
                vec![AppAction::Unsubscribe { room_id }, AppAction::PurgeCache { room_id }]
            },
        }
    }

    /// Leave or delete failed: alert and re-enable the action.
    pub fn command_failed(&mut self, command: RoomCommand, error: &ApiError) -> Vec<AppAction> {
        self.in_flight = None;
        tracing::warn!(room_id = self.room_id, ?command, error = %error, "room command failed");

        let fallback = match command {
            RoomCommand::Leave => LEAVE_FAILED,
            RoomCommand::Delete => DELETE_FAILED,
        };
        let text = match error {
            ApiError::Domain { .. } | ApiError::BadRequest { .. } | ApiError::Unauthorized => {
                error.user_message()
            },
            _ => fallback.to_owned(),
        };
        vec![AppAction::Alert(text), AppAction::Render]
    }

    /// Record whether the current user created the room.
    pub fn set_creator(&mut self, is_creator: bool) {
        self.is_creator = is_creator;
    }

    fn save(&self) -> AppAction {
        AppAction::SaveCache { room_id: self.room_id, messages: self.messages.as_slice().to_vec() }
    }

    fn is_near_bottom(&self) -> bool {
        self.from_bottom <= BOTTOM_THRESHOLD
    }

    fn own_placeholders(&self) -> usize {
        self.messages
            .as_slice()
            .iter()
            .filter(|m| m.sender_id == self.me && m.id.is_placeholder())
            .count()
    }

    /// Room id.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Room title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Whether the current user created the room.
    pub fn is_creator(&self) -> bool {
        self.is_creator
    }

    /// Load state.
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> &MessageList {
        &self.messages
    }

    /// Whether the oldest page has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Command awaiting confirmation.
    pub fn confirming(&self) -> Option<RoomCommand> {
        self.confirming
    }

    /// Command awaiting the server.
    pub fn in_flight(&self) -> Option<RoomCommand> {
        self.in_flight
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use commitfield_core::DeliveryState;

    use super::*;

    const ME: UserId = 7;

    fn server_msg(id: u64, room_id: RoomId, sender: UserId, body: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId::server(id.to_string()),
            room_id,
            sender_id: sender,
            sender_name: "lee".into(),
            avatar_url: None,
            body: body.into(),
            sent_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
            delivery: DeliveryState::Confirmed,
        }
    }

    fn ready_view() -> ChatRoomView {
        let (mut view, _) = ChatRoomView::open(42, "study", ME, 1);
        let page = vec![server_msg(10, 42, 2, "a"), server_msg(11, 42, 2, "b")];
        let _ = view.history_loaded(1, page);
        view
    }

    #[test]
    fn open_requests_cache_subscription_and_history() {
        let (view, actions) = ChatRoomView::open(42, "study", ME, 1);

        assert_eq!(view.state(), &LoadState::Loading);
        assert!(matches!(actions.as_slice(), [
            AppAction::LoadCache { room_id: 42 },
            AppAction::Subscribe { room_id: 42 },
            AppAction::FetchHistory { room_id: 42, request: 1, cursor: None },
            AppAction::CheckCreator { room_id: 42 },
            AppAction::Render,
        ]));
    }

    #[test]
    fn cache_shows_before_network_then_reconciles() {
        let (mut view, _) = ChatRoomView::open(42, "study", ME, 1);
        let _ = view.cache_loaded(vec![server_msg(10, 42, 2, "cached")]);
        assert_eq!(view.state(), &LoadState::Ready);
        assert_eq!(view.messages().len(), 1);

        let page = vec![server_msg(10, 42, 2, "cached"), server_msg(11, 42, 2, "new")];
        let _ = view.history_loaded(1, page);
        assert_eq!(view.messages().len(), 2);
        assert!(view.messages().has_unique_server_ids());
    }

    #[test]
    fn failure_without_cache_is_error() {
        let (mut view, _) = ChatRoomView::open(42, "study", ME, 1);
        let _ = view.history_failed(1, &ApiError::Server { status: 500, message: String::new() });

        assert_eq!(view.state(), &LoadState::Error(HISTORY_FAILED.to_owned()));
    }

    #[test]
    fn failure_with_cache_stays_ready() {
        let (mut view, _) = ChatRoomView::open(42, "study", ME, 1);
        let _ = view.cache_loaded(vec![server_msg(10, 42, 2, "cached")]);
        let _ = view.history_failed(1, &ApiError::Transport("timeout".into()));

        assert_eq!(view.state(), &LoadState::Ready);
    }

    #[test]
    fn stale_page_is_discarded() {
        let (mut view, _) = ChatRoomView::open(42, "study", ME, 5);
        let actions = view.history_loaded(4, vec![server_msg(1, 42, 2, "old request")]);

        assert!(actions.is_empty());
        assert!(view.messages().is_empty());
    }

    #[test]
    fn scroll_to_top_pages_with_oldest_id() {
        let mut view = ready_view();
        let actions = view.scrolled_to_top(2);

        assert_eq!(view.state(), &LoadState::LoadingOlder);
        assert!(matches!(&actions[0],
            AppAction::FetchHistory { request: 2, cursor: Some(c), .. } if c.as_str() == "10"));

        // Second trigger while loading is ignored
        assert!(view.scrolled_to_top(3).is_empty());

        let older = vec![server_msg(8, 42, 2, "x"), server_msg(9, 42, 2, "y")];
        let actions = view.history_loaded(2, older);
        assert!(actions.contains(&AppAction::Scroll(Scroll::RestoreAnchor { added: 2 })));
        assert_eq!(view.messages().as_slice()[0].body, "x");
        assert_eq!(view.state(), &LoadState::Ready);
    }

    #[test]
    fn empty_older_page_stops_paging() {
        let mut view = ready_view();
        let _ = view.scrolled_to_top(2);
        let _ = view.history_loaded(2, vec![]);

        assert!(view.is_exhausted());
        assert!(view.scrolled_to_top(3).is_empty());
    }

    #[test]
    fn other_room_messages_are_ignored() {
        let mut view = ready_view();
        assert!(view.message_received(server_msg(20, 43, 2, "elsewhere")).is_empty());
        assert!(!view.message_received(server_msg(21, 42, 2, "here")).is_empty());
        assert_eq!(view.messages().len(), 3);
    }

    #[test]
    fn autoscroll_only_near_bottom_or_own() {
        let mut view = ready_view();
        view.scrolled(50);

        let actions = view.message_received(server_msg(20, 42, 2, "from other"));
        assert!(!actions.contains(&AppAction::Scroll(Scroll::ToBottom)));

        let actions = view.message_received(server_msg(21, 42, ME, "mine"));
        assert!(actions.contains(&AppAction::Scroll(Scroll::ToBottom)));

        view.scrolled(BOTTOM_THRESHOLD);
        let actions = view.message_received(server_msg(22, 42, 2, "near bottom"));
        assert!(actions.contains(&AppAction::Scroll(Scroll::ToBottom)));
    }

    #[test]
    fn refreshed_page_keeps_scroll_position_when_reading_history() {
        let mut view = ready_view();
        view.scrolled(50);

        let _ = view.refresh(2);
        let page = vec![server_msg(10, 42, 2, "a"), server_msg(12, 42, 2, "c")];
        let actions = view.history_loaded(2, page);
        assert!(!actions.contains(&AppAction::Scroll(Scroll::ToBottom)));

        view.scrolled(0);
        let _ = view.refresh(3);
        let actions = view.history_loaded(3, vec![]);
        assert!(actions.contains(&AppAction::Scroll(Scroll::ToBottom)));
    }

    #[test]
    fn refreshed_page_confirming_own_send_scrolls() {
        let mut view = ready_view();
        let at = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let sent = ChatMessage::optimistic(MessageId::local(1), 42, ME, "kim", "hello", at);
        let _ = view.optimistic(sent);
        view.scrolled(50);

        let _ = view.refresh(2);
        let page = vec![server_msg(11, 42, 2, "b"), server_msg(130, 42, ME, "hello")];
        let actions = view.history_loaded(2, page);

        assert!(actions.contains(&AppAction::Scroll(Scroll::ToBottom)));
    }

    #[test]
    fn first_page_scrolls_to_bottom() {
        let (mut view, _) = ChatRoomView::open(42, "study", ME, 1);
        view.scrolled(50);
        let actions = view.history_loaded(1, vec![server_msg(10, 42, 2, "a")]);
        assert!(actions.contains(&AppAction::Scroll(Scroll::ToBottom)));
    }

    #[test]
    fn echo_replaces_placeholder() {
        let mut view = ready_view();
        let at = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let sent = ChatMessage::optimistic(MessageId::local(1), 42, ME, "kim", "hello", at);
        let _ = view.optimistic(sent);
        let _ = view.message_received(server_msg(30, 42, ME, "hello"));

        let last = view.messages().last().unwrap();
        assert_eq!(last.id.as_str(), "30");
        assert_eq!(view.messages().len(), 3);
    }

    #[test]
    fn compose_validates_body() {
        let view = ready_view();
        assert!(view.compose("   ").is_empty());
        assert_eq!(view.compose(&"a".repeat(301)), vec![AppAction::Alert(BODY_TOO_LONG.into())]);
        let expected = AppAction::SendChat { room_id: 42, body: "hi".into() };
        assert_eq!(view.compose(" hi "), vec![expected]);
    }

    #[test]
    fn leave_needs_confirmation_and_guards_double_submit() {
        let mut view = ready_view();
        assert!(view.confirm().is_empty());

        let _ = view.request_leave();
        let actions = view.confirm();
        assert_eq!(actions[0], AppAction::LeaveRoom { room_id: 42 });

        assert!(view.request_leave().is_empty());
        assert!(view.confirm().is_empty());

        let actions = view.command_failed(RoomCommand::Leave, &ApiError::Transport("x".into()));
        assert_eq!(actions[0], AppAction::Alert(LEAVE_FAILED.into()));
        assert!(view.in_flight().is_none());
        assert!(!view.request_leave().is_empty());
    }

    #[test]
    fn delete_is_creator_only() {
        let mut view = ready_view();
        assert_eq!(view.request_delete(), vec![AppAction::Alert(DELETE_NOT_ALLOWED.into())]);

        view.set_creator(true);
        assert_eq!(view.request_delete(), vec![AppAction::Confirm(CONFIRM_DELETE.into())]);
        let _ = view.cancel();
        assert!(view.confirm().is_empty());
    }

    #[test]
    fn delete_purges_local_cache() {
        let mut view = ready_view();
        view.set_creator(true);
        let _ = view.request_delete();
        let _ = view.confirm();

        let actions = view.command_done(RoomCommand::Delete);
        assert!(actions.contains(&AppAction::PurgeCache { room_id: 42 }));
    }

    #[test]
    fn failed_send_marks_placeholder() {
        let mut view = ready_view();
        let at = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let id = MessageId::local(1);
        let _ = view.optimistic(ChatMessage::optimistic(id.clone(), 42, ME, "kim", "hello", at));

        assert!(!view.send_failed(&id).is_empty());
        assert_eq!(view.messages().last().unwrap().delivery, DeliveryState::Failed);
    }
}
