//! Line commands.
//!
//! Lines starting with `/` are commands. Anything else is a chat message for
//! the open room; a leading `//` sends a message that starts with `/`.

use std::path::PathBuf;

use commitfield_app::{AppEvent, CreateRoomInput};
use commitfield_client::api::RoomTab;
use commitfield_core::RoomId;

/// Command reference printed by `/help`.
pub const HELP: &str = "\
/rooms [all|joined|created]  채팅방 목록
/next, /prev, /refresh       목록 페이지 이동, 새로고침
/open <id>                   채팅방 입장
/password <비밀번호>         비공개 채팅방 비밀번호 입력
/create <인원> <제목> [@이미지]
/private <인원> <비밀번호> <제목> [@이미지]
/older                       이전 메시지 불러오기
/who                         참여자 목록
/leave, /delete              채팅방 나가기, 삭제
/yes, /no                    확인, 취소
/back                        목록으로
/profile                     내 프로필과 펫
/pets                        전체 펫 목록
/commits <사용자>            커밋 수 조회
/logout                      로그아웃
/reconnect                   실시간 연결 다시 시도
/quit                        종료";

/// Feedback for a message typed outside a room.
pub const NO_OPEN_ROOM: &str = "열린 채팅방이 없습니다.";

/// What the current screen accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputContext {
    /// A room is open.
    pub room_open: bool,
    /// The password prompt is open.
    pub prompt_open: bool,
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show a room list tab.
    Rooms(RoomTab),
    /// Next list page.
    NextPage,
    /// Previous list page.
    PrevPage,
    /// Reload the list.
    Refresh,
    /// Open or join a room.
    Open(RoomId),
    /// Answer the password prompt.
    Password(String),
    /// Create a room.
    Create(CreateRoomInput),
    /// Load older messages.
    Older,
    /// Show room members.
    Who,
    /// Leave the open room.
    Leave,
    /// Delete the open room.
    Delete,
    /// Accept the pending confirmation.
    Yes,
    /// Decline the pending confirmation or close the prompt.
    No,
    /// Back to the room list.
    Back,
    /// Show the profile.
    Profile,
    /// Show every user's pet.
    Pets,
    /// Look up a user's commit count.
    Commits(String),
    /// End the session.
    Logout,
    /// Retry the live connection.
    Reconnect,
    /// Exit.
    Quit,
    /// Print the command reference.
    Help,
    /// Chat message.
    Message(String),
    /// Unrecognized command.
    Unknown {
        /// Command name as typed.
        input: String,
    },
    /// Known command with unusable arguments.
    InvalidArgs {
        /// Command name.
        command: &'static str,
        /// What was wrong.
        error: String,
    },
}

/// Parse one line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(escaped) = line.strip_prefix("//") {
        return Some(Command::Message(format!("/{escaped}")));
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Message(line.to_owned()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "rooms" | "r" => match args {
            "" | "all" => Command::Rooms(RoomTab::All),
            "joined" => Command::Rooms(RoomTab::Joined),
            "created" => Command::Rooms(RoomTab::Created),
            other => invalid("rooms", format!("unknown tab {other:?}")),
        },
        "next" => Command::NextPage,
        "prev" => Command::PrevPage,
        "refresh" => Command::Refresh,
        "open" | "join" => match args.parse::<RoomId>() {
            Ok(room_id) => Command::Open(room_id),
            Err(_) => invalid("open", "expected a room id".into()),
        },
        "password" | "pw" if !args.is_empty() => Command::Password(args.to_owned()),
        "password" | "pw" => invalid("password", "expected a password".into()),
        "create" => create(args, false),
        "private" => create(args, true),
        "older" => Command::Older,
        "who" => Command::Who,
        "leave" => Command::Leave,
        "delete" => Command::Delete,
        "yes" | "y" => Command::Yes,
        "no" | "n" => Command::No,
        "back" => Command::Back,
        "profile" | "me" => Command::Profile,
        "pets" => Command::Pets,
        "commits" if !args.is_empty() => Command::Commits(args.to_owned()),
        "commits" => invalid("commits", "expected a username".into()),
        "logout" => Command::Logout,
        "reconnect" => Command::Reconnect,
        "quit" | "q" => Command::Quit,
        "help" | "h" => Command::Help,
        _ => Command::Unknown { input: name.to_owned() },
    };
    Some(command)
}

fn invalid(command: &'static str, error: String) -> Command {
    Command::InvalidArgs { command, error }
}

fn create(args: &str, private: bool) -> Command {
    let command = if private { "private" } else { "create" };
    let mut words = args.split_whitespace();

    let Some(user_count_max) = words.next() else {
        return invalid(command, "expected a member limit".into());
    };
    let password = if private {
        match words.next() {
            Some(password) => Some(password.to_owned()),
            None => return invalid(command, "expected a password".into()),
        }
    } else {
        None
    };

    let mut title = Vec::new();
    let mut image = None;
    for word in words {
        match word.strip_prefix('@') {
            Some(path) if !path.is_empty() => image = Some(PathBuf::from(path)),
            _ => title.push(word),
        }
    }

    Command::Create(CreateRoomInput {
        title: title.join(" "),
        user_count_max: user_count_max.to_owned(),
        password,
        image,
    })
}

impl Command {
    /// Event for the app. `None` for commands the driver answers itself.
    pub fn into_event(self, context: InputContext) -> Option<AppEvent> {
        let event = match self {
            Self::Rooms(tab) => AppEvent::ShowTab(tab),
            Self::NextPage => AppEvent::NextPage,
            Self::PrevPage => AppEvent::PrevPage,
            Self::Refresh => AppEvent::RefreshRooms,
            Self::Open(room_id) => AppEvent::SelectRoom(room_id),
            Self::Password(password) => AppEvent::SubmitPassword(password),
            Self::Create(input) => AppEvent::CreateRoom(input),
            Self::Older => AppEvent::ScrolledToTop,
            Self::Who => AppEvent::ShowParticipants,
            Self::Leave => AppEvent::RequestLeave,
            Self::Delete => AppEvent::RequestDelete,
            Self::Yes => AppEvent::Confirm,
            Self::No if context.prompt_open => AppEvent::CancelPassword,
            Self::No => AppEvent::Cancel,
            Self::Back => AppEvent::Back,
            Self::Profile => AppEvent::ShowProfile,
            Self::Pets => AppEvent::ShowPets,
            Self::Commits(username) => AppEvent::LookupCommits(username),
            Self::Logout => AppEvent::Logout,
            Self::Reconnect => AppEvent::Reconnect,
            Self::Quit => AppEvent::Quit,
            Self::Help => return None,
            Self::Message(body) if context.room_open => AppEvent::Compose(body),
            Self::Message(_) => AppEvent::Error { message: NO_OPEN_ROOM.to_owned() },
            Self::Unknown { input } => {
                AppEvent::Error { message: format!("Unknown command: /{input}") }
            },
            Self::InvalidArgs { command, error } => {
                AppEvent::Error { message: format!("/{command}: {error}") }
            },
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse("  안녕하세요 "), Some(Command::Message("안녕하세요".into())));
        assert_eq!(parse("//shrug"), Some(Command::Message("/shrug".into())));
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn room_commands() {
        assert_eq!(parse("/rooms joined"), Some(Command::Rooms(RoomTab::Joined)));
        assert_eq!(parse("/r"), Some(Command::Rooms(RoomTab::All)));
        assert_eq!(parse("/open 42"), Some(Command::Open(42)));
        assert!(matches!(
            parse("/open forty"),
            Some(Command::InvalidArgs { command: "open", .. })
        ));
        assert_eq!(parse("/frobnicate"), Some(Command::Unknown { input: "frobnicate".into() }));
    }

    #[test]
    fn create_collects_title_and_image() {
        let expected = CreateRoomInput {
            title: "rust study".into(),
            user_count_max: "10".into(),
            password: None,
            image: Some(PathBuf::from("cover.png")),
        };
        assert_eq!(parse("/create 10 rust study @cover.png"), Some(Command::Create(expected)));
    }

    #[test]
    fn private_room_needs_password() {
        assert!(matches!(parse("/private 10"), Some(Command::InvalidArgs { .. })));

        let parsed = parse("/private 5 s3cret night owls");
        let expected = CreateRoomInput {
            title: "night owls".into(),
            user_count_max: "5".into(),
            password: Some("s3cret".into()),
            image: None,
        };
        assert_eq!(parsed, Some(Command::Create(expected)));
    }

    #[test]
    fn no_closes_prompt_before_cancelling() {
        let prompt = InputContext { room_open: false, prompt_open: true };
        assert!(matches!(Command::No.into_event(prompt), Some(AppEvent::CancelPassword)));
        assert!(matches!(
            Command::No.into_event(InputContext::default()),
            Some(AppEvent::Cancel)
        ));
    }

    #[test]
    fn message_outside_room_is_reported() {
        let event = Command::Message("hi".into()).into_event(InputContext::default());
        assert!(matches!(event, Some(AppEvent::Error { message }) if message == NO_OPEN_ROOM));

        let open = InputContext { room_open: true, prompt_open: false };
        let event = Command::Message("hi".into()).into_event(open);
        assert!(matches!(event, Some(AppEvent::Compose(body)) if body == "hi"));
        assert!(Command::Help.into_event(open).is_none());
    }

    #[test]
    fn profile_commands() {
        assert_eq!(parse("/me"), Some(Command::Profile));
        assert_eq!(parse("/commits whale22"), Some(Command::Commits("whale22".into())));
        assert!(matches!(parse("/commits"), Some(Command::InvalidArgs { command: "commits", .. })));

        let event = Command::Commits("whale22".into()).into_event(InputContext::default());
        assert!(matches!(event, Some(AppEvent::LookupCommits(name)) if name == "whale22"));
        assert!(matches!(
            Command::Logout.into_event(InputContext::default()),
            Some(AppEvent::Logout)
        ));
    }
}
