//! Application input events.
//!
//! Events come from three places:
//! - The user, through the driver
//! - Completed runtime work (REST calls, cache reads)
//! - The chat service

use commitfield_client::{ApiError, ServiceEvent, api::RoomTab};
use commitfield_core::{ChatMessage, MessageId, RoomId};
use commitfield_proto::{
    NotificationWire,
    payloads::{
        rest::{ParticipantDto, RoomDto},
        stats::{PetDto, UserInfoDto},
    },
};

use crate::CreateRoomInput;

/// Events processed by the App state machine.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Periodic tick.
    Tick,

    /// Switch the room list tab.
    ShowTab(RoomTab),

    /// Next room list page.
    NextPage,

    /// Previous room list page.
    PrevPage,

    /// Reload the current room list page.
    RefreshRooms,

    /// Enter a room from the list.
    SelectRoom(RoomId),

    /// Password typed into the prompt.
    SubmitPassword(String),

    /// Prompt dismissed.
    CancelPassword,

    /// Create form submitted.
    CreateRoom(CreateRoomInput),

    /// Message composed in the open room.
    Compose(String),

    /// Viewport reached the oldest loaded message.
    ScrolledToTop,

    /// Viewport moved.
    Scrolled {
        /// Distance from the newest message, in driver units.
        from_bottom: u32,
    },

    /// Leave the open room (asks for confirmation).
    RequestLeave,

    /// Delete the open room (asks for confirmation).
    RequestDelete,

    /// Pending confirmation accepted.
    Confirm,

    /// Pending confirmation declined.
    Cancel,

    /// Show members of the open room.
    ShowParticipants,

    /// Return to the room list.
    Back,

    /// Reconnect after reconnection gave up.
    Reconnect,

    /// Show the profile and pet.
    ShowProfile,

    /// Show every user's pet.
    ShowPets,

    /// Look up the commit count of a user.
    LookupCommits(String),

    /// End the session.
    Logout,

    /// Quit.
    Quit,

    /// Room list page fetched.
    RoomsLoaded {
        /// Tab of the page.
        tab: RoomTab,
        /// Page number.
        page: u32,
        /// Rooms on the page.
        rooms: Vec<RoomDto>,
    },

    /// Room list fetch failed.
    RoomsFailed {
        /// Tab of the page.
        tab: RoomTab,
        /// Failure.
        error: ApiError,
    },

    /// User is a member of the room.
    Joined {
        /// Joined room.
        room_id: RoomId,
    },

    /// Join rejected.
    JoinFailed {
        /// Target room.
        room_id: RoomId,
        /// Failure.
        error: ApiError,
    },

    /// Room created.
    RoomCreated {
        /// Created room, when the backend returned it.
        room: Option<RoomDto>,
    },

    /// Room creation rejected.
    CreateFailed {
        /// Failure.
        error: ApiError,
    },

    /// Creator check finished.
    CreatorChecked {
        /// Checked room.
        room_id: RoomId,
        /// Whether the current user created it.
        is_creator: bool,
    },

    /// Local cache read.
    CacheLoaded {
        /// Cached room.
        room_id: RoomId,
        /// Cached messages, oldest first.
        messages: Vec<ChatMessage>,
    },

    /// History page fetched.
    HistoryLoaded {
        /// Room of the page.
        room_id: RoomId,
        /// Request id from `FetchHistory`.
        request: u64,
        /// Messages, oldest first.
        page: Vec<ChatMessage>,
    },

    /// History fetch failed.
    HistoryFailed {
        /// Room of the request.
        room_id: RoomId,
        /// Request id from `FetchHistory`.
        request: u64,
        /// Failure.
        error: ApiError,
    },

    /// Optimistic message accepted by the chat service.
    Optimistic(ChatMessage),

    /// REST fallback send succeeded.
    RestSent {
        /// Target room.
        room_id: RoomId,
        /// Placeholder id.
        local_id: MessageId,
        /// Stored message, when the backend echoed it.
        message: Option<ChatMessage>,
    },

    /// A send was lost: REST fallback failed or the queue dropped it.
    SendFailed {
        /// Target room.
        room_id: RoomId,
        /// Placeholder id.
        local_id: MessageId,
    },

    /// Room left.
    LeaveDone {
        /// Left room.
        room_id: RoomId,
    },

    /// Leave rejected.
    LeaveFailed {
        /// Target room.
        room_id: RoomId,
        /// Failure.
        error: ApiError,
    },

    /// Room deleted.
    DeleteDone {
        /// Deleted room.
        room_id: RoomId,
    },

    /// Delete rejected.
    DeleteFailed {
        /// Target room.
        room_id: RoomId,
        /// Failure.
        error: ApiError,
    },

    /// Room members fetched.
    ParticipantsLoaded {
        /// Room.
        room_id: RoomId,
        /// Members.
        participants: Vec<ParticipantDto>,
    },

    /// Stored notifications fetched.
    NotificationsLoaded(Vec<NotificationWire>),

    /// Profile fetched.
    ProfileLoaded(UserInfoDto),

    /// Profile fetch failed.
    ProfileFailed {
        /// Failure.
        error: ApiError,
    },

    /// Pet listing fetched.
    PetsLoaded(Vec<PetDto>),

    /// Commit count lookup answered.
    CommitCountLoaded {
        /// Looked-up user.
        username: String,
        /// Counted commits.
        count: u64,
    },

    /// Logout accepted by the backend.
    LoggedOut,

    /// The backend rejected the session.
    SessionExpired,

    /// Another process changed room membership.
    RoomsChanged,

    /// Event from the chat service.
    Service(ServiceEvent),

    /// Error occurred.
    Error {
        /// Error description.
        message: String,
    },
}

impl AppEvent {
    /// Whether this is a failure caused by a rejected session.
    pub fn is_unauthorized(&self) -> bool {
        let error = match self {
            Self::RoomsFailed { error, .. }
            | Self::JoinFailed { error, .. }
            | Self::CreateFailed { error }
            | Self::HistoryFailed { error, .. }
            | Self::LeaveFailed { error, .. }
            | Self::DeleteFailed { error, .. }
            | Self::ProfileFailed { error } => error,
            _ => return false,
        };
        *error == ApiError::Unauthorized
    }
}
