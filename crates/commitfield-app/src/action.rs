//! Application side-effects and intents.
//!
//! [`AppAction`] is what the [`crate::App`] state machine asks the runtime to
//! do. Results come back as [`crate::AppEvent`]s.

use commitfield_client::api::{NewRoom, RoomTab};
use commitfield_core::{ChatMessage, MessageId, RoomId};

/// Scroll instruction for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    /// Show the newest message.
    ToBottom,
    /// Older messages were prepended. Keep the previously visible message in
    /// place by shifting the viewport down by `added` entries.
    RestoreAnchor {
        /// Entries inserted above the viewport.
        added: usize,
    },
}

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Connect the chat service.
    Connect,

    /// Fetch one page of a room list.
    LoadRooms {
        /// Tab to load.
        tab: RoomTab,
        /// Zero-based page.
        page: u32,
    },

    /// Join a room, then report `Joined` or `JoinFailed`.
    JoinRoom {
        /// Target room.
        room_id: RoomId,
        /// Password for a private room.
        password: Option<String>,
        /// Skip the join call when the user is already a member.
        check_membership: bool,
    },

    /// Create a room.
    CreateRoom(NewRoom),

    /// Find out whether the current user created the room.
    CheckCreator {
        /// Target room.
        room_id: RoomId,
    },

    /// Follow a room's live messages.
    Subscribe {
        /// Target room.
        room_id: RoomId,
    },

    /// Stop following a room.
    Unsubscribe {
        /// Target room.
        room_id: RoomId,
    },

    /// Read the local message cache.
    LoadCache {
        /// Target room.
        room_id: RoomId,
    },

    /// Replace the local message cache.
    SaveCache {
        /// Target room.
        room_id: RoomId,
        /// Current message list.
        messages: Vec<ChatMessage>,
    },

    /// Delete the local message cache.
    PurgeCache {
        /// Target room.
        room_id: RoomId,
    },

    /// Fetch one page of history.
    FetchHistory {
        /// Target room.
        room_id: RoomId,
        /// Request id echoed in the result.
        request: u64,
        /// Oldest loaded message id. `None` fetches the newest page.
        cursor: Option<MessageId>,
    },

    /// Send through the chat service.
    SendChat {
        /// Target room.
        room_id: RoomId,
        /// Validated body.
        body: String,
    },

    /// Send over REST because the socket path is unavailable.
    SendViaRest {
        /// Target room.
        room_id: RoomId,
        /// Placeholder to confirm or fail.
        local_id: MessageId,
        /// Message body.
        body: String,
    },

    /// Leave a room.
    LeaveRoom {
        /// Target room.
        room_id: RoomId,
    },

    /// Delete a room.
    DeleteRoom {
        /// Target room.
        room_id: RoomId,
    },

    /// Fetch room members.
    LoadParticipants {
        /// Target room.
        room_id: RoomId,
    },

    /// Fetch stored notifications.
    LoadNotifications,

    /// Fetch the user's profile.
    FetchProfile,

    /// Fetch every user's pet.
    FetchPets,

    /// Fetch the commit count of a user.
    FetchCommitCount {
        /// GitHub login.
        username: String,
    },

    /// Follow a user's commit channel.
    WatchCommits {
        /// GitHub login.
        username: String,
    },

    /// End the session on the backend.
    Logout,

    /// The session is over. Drop the live connection and ask the user to
    /// sign in again.
    LoginRequired,

    /// Move the viewport.
    Scroll(Scroll),

    /// Show a blocking alert.
    Alert(String),

    /// Ask for confirmation. The answer arrives as `Confirm` or `Cancel`.
    Confirm(String),
}
