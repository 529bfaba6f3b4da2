//! Application state machine.
//!
//! [`App`] routes [`AppEvent`]s to the room list or the open room and returns
//! [`AppAction`]s for the runtime. It owns no I/O and no clock.
//!
//! # Responsibilities
//!
//! - Switches between the room list and one open room
//! - Issues request ids so late history pages for a closed room or a
//!   superseded request are discarded
//! - Tracks connection status, service notices and notifications
//! - Turns REST fallback requests from the service into actions
//! - Keeps the profile current from the commit channel
//! - Ends the session when the backend rejects it; afterwards only `Quit`
//!   is handled

use std::collections::VecDeque;

use chrono::FixedOffset;
use commitfield_client::{ServiceEvent, api::RoomTab};
use commitfield_core::{ConnectionState, RoomId, UserId, connection::ConnectionStatus};
use commitfield_proto::{NotificationWire, payloads::rest::ParticipantDto};

use crate::{
    AppAction, AppEvent, ChatRoomView, ProfileView, RoomListView,
    grouping::{DateGroup, group_by_date},
    profile::ProfileState,
    room_view::RoomCommand,
};

/// Notices kept for display.
pub const MAX_NOTICES: usize = 20;

/// Backend code for a join the user already made.
pub const ALREADY_JOIN_ROOM: &str = "ALREADY_JOIN_ROOM";

/// Status after a room is created.
pub const ROOM_CREATED: &str = "채팅방이 성공적으로 생성되었습니다.";

/// Alert when room creation fails for an unmapped reason.
pub const CREATE_FAILED: &str = "채팅방 생성에 실패했습니다.";

/// Shown once the backend rejects the session.
pub const SESSION_EXPIRED: &str = "세션이 만료되었습니다. 다시 로그인해주세요.";

/// Shown after a logout.
pub const LOGGED_OUT: &str = "로그아웃되었습니다. 다시 로그인해주세요.";

/// Screen shown next to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    /// Room list or the open room.
    #[default]
    Chat,
    /// Profile and pet.
    Profile,
    /// Every user's pet.
    Pets,
}

/// Whether the backend still accepts the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Signed in.
    #[default]
    Active,
    /// Rejected with 401.
    Expired,
    /// Ended by the user.
    LoggedOut,
}

/// Application state machine.
#[derive(Debug, Clone)]
pub struct App {
    me: UserId,
    offset: FixedOffset,
    connection: ConnectionStatus,
    rooms: RoomListView,
    room: Option<ChatRoomView>,
    creating: bool,
    notices: VecDeque<String>,
    notifications: Vec<NotificationWire>,
    participants: Vec<ParticipantDto>,
    status_message: Option<String>,
    next_request: u64,
    profile: ProfileView,
    panel: Panel,
    session: SessionState,
}

impl App {
    /// App for user `me`, grouping dates in `offset`.
    pub fn new(me: UserId, offset: FixedOffset) -> Self {
        Self {
            me,
            offset,
            connection: ConnectionStatus {
                state: ConnectionState::Disconnected,
                reconnect_pending: false,
                exhausted: false,
            },
            rooms: RoomListView::new(),
            room: None,
            creating: false,
            notices: VecDeque::new(),
            notifications: Vec::new(),
            participants: Vec::new(),
            status_message: None,
            next_request: 0,
            profile: ProfileView::new(),
            panel: Panel::Chat,
            session: SessionState::Active,
        }
    }

    /// Initial actions: connect, then load the profile, notifications and
    /// the first room list page.
    pub fn start(&mut self) -> Vec<AppAction> {
        let mut actions =
            vec![AppAction::Connect, AppAction::FetchProfile, AppAction::LoadNotifications];
        actions.extend(self.rooms.load());
        actions
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        if self.session != SessionState::Active {
            return match event {
                AppEvent::Quit => vec![AppAction::Quit],
                _ => vec![],
            };
        }

        match event {
            AppEvent::Tick => vec![],
            AppEvent::ShowTab(tab) => self.rooms.show_tab(tab),
            AppEvent::NextPage => self.rooms.next_page(),
            AppEvent::PrevPage => self.rooms.prev_page(),
            AppEvent::RefreshRooms => self.rooms.load(),
            AppEvent::SelectRoom(room_id) => {
                if self.rooms.tab() == RoomTab::All {
                    self.rooms.begin_join(room_id)
                } else {
                    self.open_room(room_id)
                }
            },
            AppEvent::SubmitPassword(password) => self.rooms.submit_password(&password),
            AppEvent::CancelPassword => self.rooms.cancel_password(),
            AppEvent::CreateRoom(input) => {
                if self.creating {
                    return vec![];
                }
                match input.validate() {
                    Ok(room) => {
                        self.creating = true;
                        vec![AppAction::CreateRoom(room), AppAction::Render]
                    },
                    Err(errors) => vec![AppAction::Alert(errors.messages().join("\n"))],
                }
            },
            AppEvent::Compose(body) => self.with_room(|room| room.compose(&body)),
            AppEvent::ScrolledToTop => {
                let request = self.issue_request();
                self.with_room(|room| room.scrolled_to_top(request))
            },
            AppEvent::Scrolled { from_bottom } => {
                if let Some(room) = &mut self.room {
                    room.scrolled(from_bottom);
                }
                vec![]
            },
            AppEvent::RequestLeave => self.with_room(ChatRoomView::request_leave),
            AppEvent::RequestDelete => self.with_room(ChatRoomView::request_delete),
            AppEvent::Confirm => self.with_room(ChatRoomView::confirm),
            AppEvent::Cancel => self.with_room(ChatRoomView::cancel),
            AppEvent::ShowParticipants => match &self.room {
                Some(room) => vec![AppAction::LoadParticipants { room_id: room.room_id() }],
                None => vec![],
            },
            AppEvent::Back => {
                if self.panel == Panel::Chat {
                    return self.close_room();
                }
                self.panel = Panel::Chat;
                vec![AppAction::Render]
            },
            AppEvent::Reconnect => vec![AppAction::Connect],
            AppEvent::Quit => vec![AppAction::Quit],
            AppEvent::ShowProfile => {
                self.panel = Panel::Profile;
                match self.profile.state() {
                    ProfileState::Error(_) => vec![AppAction::FetchProfile, AppAction::Render],
                    _ => vec![AppAction::Render],
                }
            },
            AppEvent::ShowPets => {
                self.panel = Panel::Pets;
                vec![AppAction::FetchPets, AppAction::Render]
            },
            AppEvent::LookupCommits(username) => {
                let username = username.trim();
                if username.is_empty() {
                    return vec![];
                }
                vec![AppAction::FetchCommitCount { username: username.to_owned() }]
            },
            AppEvent::Logout => vec![AppAction::Logout],

            AppEvent::RoomsLoaded { tab, page, rooms } => self.rooms.rooms_loaded(tab, page, rooms),
            AppEvent::RoomsFailed { tab, error } => self.rooms.rooms_failed(tab, &error),
            AppEvent::Joined { room_id } => {
                self.rooms.joined(room_id);
                self.open_room(room_id)
            },
            AppEvent::JoinFailed { room_id, error } => {
                if error.code() == Some(ALREADY_JOIN_ROOM) {
                    self.rooms.joined(room_id);
                    return self.open_room(room_id);
                }
                self.rooms.join_failed(room_id, &error)
            },
            AppEvent::RoomCreated { room } => {
                self.creating = false;
                self.status_message = Some(ROOM_CREATED.to_owned());
                match room {
                    Some(room) => self.open_room(room.id),
                    None => self.rooms.show_tab(RoomTab::Created),
                }
            },
            AppEvent::CreateFailed { error } => {
                self.creating = false;
                let text = match error.code() {
                    Some(_) => error.user_message(),
                    None => CREATE_FAILED.to_owned(),
                };
                vec![AppAction::Alert(text), AppAction::Render]
            },
            AppEvent::CreatorChecked { room_id, is_creator } => {
                self.with_open_room(room_id, |room| {
                    room.set_creator(is_creator);
                    vec![AppAction::Render]
                })
            },
            AppEvent::CacheLoaded { room_id, messages } => {
                self.with_open_room(room_id, |room| room.cache_loaded(messages))
            },
            AppEvent::HistoryLoaded { room_id, request, page } => {
                self.with_open_room(room_id, |room| room.history_loaded(request, page))
            },
            AppEvent::HistoryFailed { room_id, request, error } => {
                self.with_open_room(room_id, |room| room.history_failed(request, &error))
            },
            AppEvent::Optimistic(msg) => {
                self.with_open_room(msg.room_id, |room| room.optimistic(msg))
            },
            AppEvent::RestSent { room_id, local_id, message } => {
                tracing::debug!(room_id, %local_id, "sent over rest");
                let request = self.issue_request();
                self.with_open_room(room_id, |room| room.rest_sent(message, request))
            },
            AppEvent::SendFailed { room_id, local_id } => {
                self.with_open_room(room_id, |room| room.send_failed(&local_id))
            },
            AppEvent::LeaveDone { room_id } => self.room_closed(room_id, RoomCommand::Leave),
            AppEvent::DeleteDone { room_id } => self.room_closed(room_id, RoomCommand::Delete),
            AppEvent::LeaveFailed { room_id, error } => self.with_open_room(room_id, |room| {
                room.command_failed(RoomCommand::Leave, &error)
            }),
            AppEvent::DeleteFailed { room_id, error } => self.with_open_room(room_id, |room| {
                room.command_failed(RoomCommand::Delete, &error)
            }),
            AppEvent::ParticipantsLoaded { room_id, participants } => {
                if self.room.as_ref().is_some_and(|r| r.room_id() == room_id) {
                    self.participants = participants;
                }
                vec![AppAction::Render]
            },
            AppEvent::NotificationsLoaded(list) => {
                self.notifications = list;
                vec![AppAction::Render]
            },
            AppEvent::ProfileLoaded(info) => self.profile.loaded(info),
            AppEvent::ProfileFailed { error } => self.profile.failed(&error),
            AppEvent::PetsLoaded(pets) => self.profile.pets_loaded(pets),
            AppEvent::CommitCountLoaded { username, count } => {
                self.profile.lookup_loaded(username, count)
            },
            AppEvent::LoggedOut => self.end_session(SessionState::LoggedOut),
            AppEvent::SessionExpired => self.end_session(SessionState::Expired),
            AppEvent::RoomsChanged => {
                if self.room.is_none() {
                    self.rooms.load()
                } else {
                    vec![]
                }
            },
            AppEvent::Service(event) => self.handle_service(event),
            AppEvent::Error { message } => {
                self.status_message = Some(message);
                vec![AppAction::Render]
            },
        }
    }

    fn handle_service(&mut self, event: ServiceEvent) -> Vec<AppAction> {
        match event {
            ServiceEvent::Connection(status) => {
                self.connection = status;
                vec![AppAction::Render]
            },
            ServiceEvent::Message(msg) => self.with_open_room(msg.room_id, |room| {
                room.message_received(msg)
            }),
            ServiceEvent::Notification(notification) => {
                self.status_message = Some(notification.message.clone());
                self.notifications.push(notification);
                vec![AppAction::Render]
            },
            ServiceEvent::System(text) | ServiceEvent::ServerError(text) => {
                self.push_notice(text);
                vec![AppAction::Render]
            },
            ServiceEvent::Queued { local_id } => {
                tracing::debug!(%local_id, "message queued until reconnect");
                vec![]
            },
            ServiceEvent::DeliveryFailed { room_id, local_id } => {
                self.with_open_room(room_id, |room| room.send_failed(&local_id))
            },
            ServiceEvent::FallbackToRest { room_id, local_id, body } => {
                vec![AppAction::SendViaRest { room_id, local_id, body }]
            },
            ServiceEvent::CommitCount(update) => self.profile.commit_update(update.count),
        }
    }

    fn end_session(&mut self, session: SessionState) -> Vec<AppAction> {
        tracing::info!(?session, "session ended");
        self.session = session;
        self.status_message = Some(match session {
            SessionState::LoggedOut => LOGGED_OUT.to_owned(),
            SessionState::Active | SessionState::Expired => SESSION_EXPIRED.to_owned(),
        });

        let mut actions = Vec::new();
        if let Some(room) = self.room.take() {
            actions.push(AppAction::Unsubscribe { room_id: room.room_id() });
        }
        actions.extend([AppAction::LoginRequired, AppAction::Render]);
        actions
    }

    fn open_room(&mut self, room_id: RoomId) -> Vec<AppAction> {
        let mut actions = Vec::new();
        if let Some(previous) = self.room.take()
            && previous.room_id() != room_id
        {
            actions.push(AppAction::Unsubscribe { room_id: previous.room_id() });
        }

        let title = self
            .rooms
            .room(room_id)
            .map_or_else(|| format!("채팅방 {room_id}"), |r| r.title.clone());
        let request = self.issue_request();
        let (view, open) = ChatRoomView::open(room_id, title, self.me, request);

        tracing::info!(room_id, "opening room");
        self.room = Some(view);
        self.participants.clear();
        actions.extend(open);
        actions
    }

    fn close_room(&mut self) -> Vec<AppAction> {
        let Some(room) = self.room.take() else {
            return vec![];
        };

        let mut actions = vec![AppAction::Unsubscribe { room_id: room.room_id() }];
        actions.extend(self.rooms.load());
        actions
    }

    fn room_closed(&mut self, room_id: RoomId, command: RoomCommand) -> Vec<AppAction> {
        let Some(mut room) = self.room.take_if(|r| r.room_id() == room_id) else {
            return vec![AppAction::Unsubscribe { room_id }];
        };

        let mut actions = room.command_done(command);
        actions.extend(self.rooms.load());
        actions
    }

    fn with_room(&mut self, f: impl FnOnce(&mut ChatRoomView) -> Vec<AppAction>) -> Vec<AppAction> {
        self.room.as_mut().map(f).unwrap_or_default()
    }

    fn with_open_room(
        &mut self,
        room_id: RoomId,
        f: impl FnOnce(&mut ChatRoomView) -> Vec<AppAction>,
    ) -> Vec<AppAction> {
        match &mut self.room {
            Some(room) if room.room_id() == room_id => f(room),
            _ => vec![],
        }
    }

    fn issue_request(&mut self) -> u64 {
        self.next_request += 1;
        self.next_request
    }

    fn push_notice(&mut self, text: String) {
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.status_message = Some(text.clone());
        self.notices.push_back(text);
    }

    /// Set a status message to display to the user.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Current user.
    pub fn me(&self) -> UserId {
        self.me
    }

    /// Connection status.
    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Room list.
    pub fn rooms(&self) -> &RoomListView {
        &self.rooms
    }

    /// Open room. `None` while the list is shown.
    pub fn room(&self) -> Option<&ChatRoomView> {
        self.room.as_ref()
    }

    /// Messages of the open room grouped by date.
    pub fn grouped_messages(&self) -> Vec<DateGroup<'_>> {
        match &self.room {
            Some(room) => group_by_date(room.messages().as_slice(), self.offset),
            None => Vec::new(),
        }
    }

    /// Members of the open room, after `ShowParticipants`.
    pub fn participants(&self) -> &[ParticipantDto] {
        &self.participants
    }

    /// Known notifications.
    pub fn notifications(&self) -> &[NotificationWire] {
        &self.notifications
    }

    /// Recent service notices, oldest first.
    pub fn notices(&self) -> impl Iterator<Item = &str> {
        self.notices.iter().map(String::as_str)
    }

    /// Whether a create request is in flight.
    pub fn is_creating(&self) -> bool {
        self.creating
    }

    /// Profile, pet listing and commit lookups.
    pub fn profile(&self) -> &ProfileView {
        &self.profile
    }

    /// Screen shown.
    pub fn panel(&self) -> Panel {
        self.panel
    }

    /// Session state.
    pub fn session(&self) -> SessionState {
        self.session
    }

    /// Transient status message. `None` if no message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use commitfield_client::ApiError;
    use commitfield_core::{ChatMessage, DeliveryState, MessageId};
    use commitfield_proto::{
        CommitCountWire,
        payloads::{
            rest::RoomDto,
            stats::{PetGrow, UserInfoDto},
        },
    };

    use super::*;
    use crate::{CreateRoomInput, room_view::LoadState};

    fn app() -> App {
        App::new(7, FixedOffset::east_opt(9 * 3600).unwrap())
    }

    fn msg(id: u64, room_id: RoomId) -> ChatMessage {
        ChatMessage {
            id: MessageId::server(id.to_string()),
            room_id,
            sender_id: 2,
            sender_name: "lee".into(),
            avatar_url: None,
            body: format!("m{id}"),
            sent_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
            delivery: DeliveryState::Confirmed,
        }
    }

    fn open(app: &mut App, room_id: RoomId) -> u64 {
        let actions = app.handle(AppEvent::Joined { room_id });
        actions
            .iter()
            .find_map(|a| match a {
                AppAction::FetchHistory { request, .. } => Some(*request),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn start_connects_and_loads_rooms() {
        let actions = app().start();
        assert_eq!(actions[0], AppAction::Connect);
        assert!(actions.contains(&AppAction::LoadRooms { tab: RoomTab::All, page: 0 }));
    }

    #[test]
    fn invalid_form_issues_no_request() {
        let mut app = app();
        let input = CreateRoomInput { user_count_max: "10".into(), ..Default::default() };

        let actions = app.handle(AppEvent::CreateRoom(input));
        assert_eq!(actions, vec![AppAction::Alert("채팅방 제목을 입력해주세요.".into())]);
        assert!(!app.is_creating());
    }

    #[test]
    fn create_is_guarded_while_in_flight() {
        let mut app = app();
        let input = CreateRoomInput {
            title: "study".into(),
            user_count_max: "10".into(),
            ..Default::default()
        };

        let first = app.handle(AppEvent::CreateRoom(input.clone()));
        assert!(matches!(first[0], AppAction::CreateRoom(_)));
        assert!(app.handle(AppEvent::CreateRoom(input)).is_empty());

        let _ = app.handle(AppEvent::CreateFailed { error: ApiError::Transport("x".into()) });
        assert!(!app.is_creating());
    }

    #[test]
    fn select_from_other_tabs_opens_directly() {
        let mut app = app();
        let _ = app.handle(AppEvent::ShowTab(RoomTab::Joined));
        let actions = app.handle(AppEvent::SelectRoom(3));

        assert!(actions.contains(&AppAction::Subscribe { room_id: 3 }));
        assert_eq!(app.room().map(ChatRoomView::room_id), Some(3));
    }

    #[test]
    fn select_from_all_checks_membership() {
        let mut app = app();
        let actions = app.handle(AppEvent::SelectRoom(3));

        assert_eq!(actions, vec![AppAction::JoinRoom {
            room_id: 3,
            password: None,
            check_membership: true,
        }]);
        assert!(app.room().is_none());
    }

    #[test]
    fn already_joined_opens_room() {
        let mut app = app();
        let _ = app.handle(AppEvent::SelectRoom(3));
        let error = ApiError::Domain { code: ALREADY_JOIN_ROOM.into(), message: String::new() };
        let _ = app.handle(AppEvent::JoinFailed { room_id: 3, error });

        assert_eq!(app.room().map(ChatRoomView::room_id), Some(3));
    }

    #[test]
    fn history_for_closed_room_is_discarded() {
        let mut app = app();
        let first = open(&mut app, 42);
        let _ = app.handle(AppEvent::Back);
        let _ = open(&mut app, 43);

        let actions = app.handle(AppEvent::HistoryLoaded {
            room_id: 42,
            request: first,
            page: vec![msg(1, 42)],
        });
        assert!(actions.is_empty());
        assert!(app.room().unwrap().messages().is_empty());
    }

    #[test]
    fn reopening_same_room_discards_first_request() {
        let mut app = app();
        let first = open(&mut app, 42);
        let _ = app.handle(AppEvent::Back);
        let second = open(&mut app, 42);
        assert_ne!(first, second);

        assert!(app
            .handle(AppEvent::HistoryLoaded { room_id: 42, request: first, page: vec![msg(1, 42)] })
            .is_empty());
        let _ = app.handle(AppEvent::HistoryLoaded {
            room_id: 42,
            request: second,
            page: vec![msg(2, 42)],
        });
        assert_eq!(app.room().unwrap().state(), &LoadState::Ready);
    }

    #[test]
    fn only_active_room_messages_are_shown() {
        let mut app = app();
        let request = open(&mut app, 42);
        let _ = app.handle(AppEvent::HistoryLoaded { room_id: 42, request, page: vec![] });

        let _ = app.handle(AppEvent::Service(ServiceEvent::Message(msg(1, 42))));
        let _ = app.handle(AppEvent::Service(ServiceEvent::Message(msg(2, 43))));

        let room = app.room().unwrap();
        assert_eq!(room.messages().len(), 1);
        assert_eq!(room.messages().as_slice()[0].room_id, 42);
    }

    #[test]
    fn fallback_becomes_rest_send() {
        let mut app = app();
        let local_id = MessageId::local(5);
        let actions = app.handle(AppEvent::Service(ServiceEvent::FallbackToRest {
            room_id: 42,
            local_id: local_id.clone(),
            body: "hello".into(),
        }));

        let expected = AppAction::SendViaRest { room_id: 42, local_id, body: "hello".into() };
        assert_eq!(actions, vec![expected]);
    }

    #[test]
    fn leave_closes_room_and_unsubscribes() {
        let mut app = app();
        let _ = open(&mut app, 42);
        let _ = app.handle(AppEvent::RequestLeave);
        let _ = app.handle(AppEvent::Confirm);

        let actions = app.handle(AppEvent::LeaveDone { room_id: 42 });
        assert_eq!(actions[0], AppAction::Unsubscribe { room_id: 42 });
        assert!(app.room().is_none());
    }

    #[test]
    fn notices_are_capped() {
        let mut app = app();
        for i in 0..(MAX_NOTICES + 5) {
            let _ = app.handle(AppEvent::Service(ServiceEvent::System(format!("n{i}"))));
        }

        assert_eq!(app.notices().count(), MAX_NOTICES);
        assert_eq!(app.notices().next(), Some("n5"));
    }

    #[test]
    fn created_room_opens() {
        let mut app = app();
        let room = RoomDto {
            id: 9,
            title: "new".into(),
            current_user_count: 1,
            max_user_count: 10,
            is_private: false,
            image_url: None,
        };
        let _ = app.handle(AppEvent::RoomCreated { room: Some(room) });

        assert_eq!(app.room().map(ChatRoomView::room_id), Some(9));
        assert_eq!(app.status_message(), Some(ROOM_CREATED));
    }

    #[test]
    fn start_loads_profile() {
        assert!(app().start().contains(&AppAction::FetchProfile));
    }

    #[test]
    fn profile_follows_commit_channel_and_counts_pushes() {
        let mut app = app();
        let info = UserInfoDto {
            username: "whale22".into(),
            avatar_url: None,
            season_commit_count: 40,
            pet_exp: 149,
            pet_grow: PetGrow::Egg,
            tier: "SPROUT".into(),
            last_committed: None,
        };
        let actions = app.handle(AppEvent::ProfileLoaded(info));
        assert!(actions.contains(&AppAction::WatchCommits { username: "whale22".into() }));

        let update = CommitCountWire { username: "whale22".into(), count: 2 };
        let _ = app.handle(AppEvent::Service(ServiceEvent::CommitCount(update)));

        let stats = app.profile().info().unwrap();
        assert_eq!(stats.season_commit_count, 42);
        assert_eq!(stats.pet_exp, 150);
        assert_eq!(app.profile().last_update(), 2);
    }

    #[test]
    fn back_from_profile_keeps_room_open() {
        let mut app = app();
        let _ = open(&mut app, 42);
        let _ = app.handle(AppEvent::ShowProfile);
        assert_eq!(app.panel(), Panel::Profile);

        assert_eq!(app.handle(AppEvent::Back), vec![AppAction::Render]);
        assert_eq!(app.panel(), Panel::Chat);
        assert_eq!(app.room().map(ChatRoomView::room_id), Some(42));
    }

    #[test]
    fn lookup_trims_and_ignores_blank_names() {
        let mut app = app();
        assert!(app.handle(AppEvent::LookupCommits("  ".into())).is_empty());
        assert_eq!(app.handle(AppEvent::LookupCommits(" whale22 ".into())), vec![
            AppAction::FetchCommitCount { username: "whale22".into() }
        ]);
    }

    #[test]
    fn expired_session_closes_room_and_requires_login() {
        let mut app = app();
        let _ = open(&mut app, 42);

        let actions = app.handle(AppEvent::SessionExpired);
        assert_eq!(actions, vec![
            AppAction::Unsubscribe { room_id: 42 },
            AppAction::LoginRequired,
            AppAction::Render,
        ]);
        assert_eq!(app.session(), SessionState::Expired);
        assert_eq!(app.status_message(), Some(SESSION_EXPIRED));
        assert!(app.room().is_none());

        assert!(app.handle(AppEvent::RefreshRooms).is_empty());
        assert!(app.handle(AppEvent::SessionExpired).is_empty());
        assert_eq!(app.handle(AppEvent::Quit), vec![AppAction::Quit]);
    }

    #[test]
    fn logout_goes_through_backend_first() {
        let mut app = app();
        assert_eq!(app.handle(AppEvent::Logout), vec![AppAction::Logout]);
        assert_eq!(app.session(), SessionState::Active);

        let actions = app.handle(AppEvent::LoggedOut);
        assert!(actions.contains(&AppAction::LoginRequired));
        assert_eq!(app.session(), SessionState::LoggedOut);
    }

    #[test]
    fn unauthorized_failures_are_recognized() {
        let expired = AppEvent::RoomsFailed { tab: RoomTab::All, error: ApiError::Unauthorized };
        let other = AppEvent::RoomsFailed {
            tab: RoomTab::All,
            error: ApiError::Transport("down".into()),
        };
        assert!(expired.is_unauthorized());
        assert!(!other.is_unauthorized());
        assert!(!AppEvent::Tick.is_unauthorized());
    }
}
