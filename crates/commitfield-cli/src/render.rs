//! Plain-text rendering of the app state.

use chrono::FixedOffset;
use commitfield_app::{
    App, Panel, SessionState,
    profile::ProfileState,
    room_list::{ListState, PasswordPrompt},
    room_view::LoadState,
};
use commitfield_client::api::RoomTab;
use commitfield_core::{ChatMessage, ConnectionState, DeliveryState, connection::ConnectionStatus};

/// Width of the pet experience bar.
const EXP_BAR_WIDTH: usize = 20;

/// Text for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    /// Room list or transcript of the open room.
    pub lines: Vec<String>,
    /// Connection line.
    pub connection: &'static str,
    /// Status line.
    pub status: Option<String>,
}

/// Render `app`, showing times in `offset`.
pub fn screen(app: &App, offset: FixedOffset) -> Screen {
    let lines = match (app.session(), app.panel(), app.room()) {
        (SessionState::Expired | SessionState::LoggedOut, ..) => Vec::new(),
        (_, Panel::Profile, _) => profile_lines(app),
        (_, Panel::Pets, _) => pet_lines(app),
        (_, Panel::Chat, Some(_)) => room_lines(app, offset),
        (_, Panel::Chat, None) => list_lines(app),
    };

    Screen {
        lines,
        connection: connection_label(app.connection()),
        status: app.status_message().map(str::to_owned),
    }
}

/// Connection line for `status`.
pub fn connection_label(status: ConnectionStatus) -> &'static str {
    match status.state {
        ConnectionState::Connected => "실시간 연결됨",
        ConnectionState::Connecting => "연결 중...",
        ConnectionState::Disconnected if status.exhausted => {
            "실시간 연결에 실패했습니다. 메시지는 REST로 전송됩니다. (/reconnect)"
        },
        ConnectionState::Disconnected if status.reconnect_pending => "연결이 끊겨 다시 연결하는 중...",
        ConnectionState::Disconnected => "연결 끊김",
    }
}

fn tab_label(tab: RoomTab) -> &'static str {
    match tab {
        RoomTab::All => "전체 채팅방",
        RoomTab::Joined => "참여중인 채팅방",
        RoomTab::Created => "내가 만든 채팅방",
    }
}

fn list_lines(app: &App) -> Vec<String> {
    let rooms = app.rooms();
    let mut lines = vec![format!("[{}] {}페이지", tab_label(rooms.tab()), rooms.page() + 1)];

    match rooms.state() {
        ListState::Loading => lines.push("  불러오는 중...".to_owned()),
        ListState::Error(message) => lines.push(format!("  {message}")),
        ListState::Ready if rooms.rooms().is_empty() => {
            lines.push("  채팅방이 없습니다.".to_owned());
        },
        ListState::Ready => {
            for room in rooms.rooms() {
                let lock = if room.is_private { " 비공개" } else { "" };
                lines.push(format!(
                    "  #{} {} ({}/{}){lock}",
                    room.id, room.title, room.current_user_count, room.max_user_count
                ));
            }
        },
    }

    if let Some(PasswordPrompt { room_id, error }) = rooms.prompt() {
        lines.push(format!("#{room_id} 비밀번호를 입력하세요: /password <비밀번호>, 취소는 /no"));
        if let Some(error) = error {
            lines.push(format!("  ! {error}"));
        }
    }
    lines
}

fn room_lines(app: &App, offset: FixedOffset) -> Vec<String> {
    let Some(room) = app.room() else {
        return Vec::new();
    };

    let owner = if room.is_creator() { " (방장)" } else { "" };
    let mut lines = vec![format!("[{}] #{}{owner}", room.title(), room.room_id())];

    match room.state() {
        LoadState::Loading => lines.push("  메시지를 불러오는 중...".to_owned()),
        LoadState::Error(message) => lines.push(format!("  {message}")),
        LoadState::LoadingOlder => lines.push("  이전 메시지를 불러오는 중...".to_owned()),
        LoadState::Ready => {},
    }

    for group in app.grouped_messages() {
        lines.push(format!("── {} ──", group.label()));
        lines.extend(group.messages.into_iter().map(|m| message_line(m, offset)));
    }

    let participants = app.participants();
    if !participants.is_empty() {
        let names: Vec<_> = participants.iter().map(|p| p.nickname.as_str()).collect();
        lines.push(format!("참여자 {}명: {}", names.len(), names.join(", ")));
    }
    lines
}

/// Emoji for a season tier name.
pub fn tier_emoji(tier: &str) -> &'static str {
    match tier {
        "SEED" => "🌱",
        "SPROUT" => "🌿",
        "FLOWER" => "🌺",
        "FRUIT" => "🍎",
        "TREE" => "🌳",
        _ => "❔",
    }
}

fn exp_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) * EXP_BAR_WIDTH / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(EXP_BAR_WIDTH - filled))
}

fn profile_lines(app: &App) -> Vec<String> {
    let profile = app.profile();
    let mut lines = vec!["[프로필]".to_owned()];

    let info = match (profile.state(), profile.info()) {
        (_, Some(info)) => info,
        (ProfileState::Error(message), None) => {
            lines.push(format!("  {message}"));
            return lines;
        },
        (ProfileState::Loading | ProfileState::Ready, None) => {
            lines.push("  불러오는 중...".to_owned());
            return lines;
        },
    };

    lines.push(format!("  {} {} {}", info.username, tier_emoji(&info.tier), info.tier));
    lines.push(format!("  이번 시즌 커밋 {}개", info.season_commit_count));
    if profile.last_update() > 0 {
        lines.push(format!("  방금 +{} 커밋", profile.last_update()));
    }
    let max = info.pet_grow.max_exp();
    lines.push(format!(
        "  펫 {} {} {} / {}",
        info.pet_grow.as_str(),
        exp_bar(profile.progress()),
        info.pet_exp,
        max
    ));
    if let Some(last) = &info.last_committed {
        lines.push(format!("  마지막 커밋 {last}"));
    }
    if let Some(lookup) = profile.lookup() {
        lines.push(format!("  {}님의 커밋 {}개", lookup.username, lookup.count));
    }
    lines
}

fn pet_lines(app: &App) -> Vec<String> {
    let pets = app.profile().pets();
    let mut lines = vec![format!("[펫 목록] {}마리", pets.len())];
    lines.extend(pets.iter().map(|pet| format!("  {} #{}", pet.grow.as_str(), pet.kind)));
    lines
}

fn message_line(msg: &ChatMessage, offset: FixedOffset) -> String {
    let time = msg.sent_at.with_timezone(&offset).format("%H:%M");
    let failed = if msg.delivery == DeliveryState::Failed { " (전송 실패)" } else { "" };
    format!("[{time}] {}: {}{failed}", msg.sender_name, msg.body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use commitfield_app::{AppAction, AppEvent, SESSION_EXPIRED};
    use commitfield_client::ServiceEvent;
    use commitfield_core::MessageId;
    use commitfield_proto::{
        CommitCountWire,
        payloads::{
            rest::RoomDto,
            stats::{PetGrow, UserInfoDto},
        },
    };

    use super::*;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn room(id: u64, title: &str, is_private: bool) -> RoomDto {
        RoomDto {
            id,
            title: title.into(),
            current_user_count: 2,
            max_user_count: 10,
            is_private,
            image_url: None,
        }
    }

    fn message(id: u64, sender: &str, body: &str, hour: u32) -> ChatMessage {
        ChatMessage {
            id: MessageId::server(id.to_string()),
            room_id: 42,
            sender_id: 2,
            sender_name: sender.into(),
            avatar_url: None,
            body: body.into(),
            sent_at: Utc.with_ymd_and_hms(2024, 5, 1, hour, 30, 0).unwrap(),
            delivery: DeliveryState::Confirmed,
        }
    }

    #[test]
    fn room_list_with_prompt() {
        let mut app = App::new(1, kst());
        let _ = app.start();
        let rooms = vec![room(3, "rust study", false), room(4, "night owls", true)];
        let _ = app.handle(AppEvent::RoomsLoaded { tab: RoomTab::All, page: 0, rooms });
        let _ = app.handle(AppEvent::SelectRoom(4));
        let error = commitfield_client::ApiError::Domain {
            code: "NEED_TO_PASSWORD".into(),
            message: String::new(),
        };
        let _ = app.handle(AppEvent::JoinFailed { room_id: 4, error });

        let screen = screen(&app, kst());
        insta::assert_snapshot!(screen.lines.join("\n"), @r"
        [전체 채팅방] 1페이지
          #3 rust study (2/10)
          #4 night owls (2/10) 비공개
        #4 비밀번호를 입력하세요: /password <비밀번호>, 취소는 /no
        ");
        assert_eq!(screen.connection, "연결 끊김");
    }

    #[test]
    fn open_room_transcript() {
        let mut app = App::new(1, kst());
        let actions = app.handle(AppEvent::Joined { room_id: 42 });
        let request = actions
            .iter()
            .find_map(|a| match a {
                AppAction::FetchHistory { request, .. } => Some(*request),
                _ => None,
            })
            .unwrap();

        let page = vec![
            message(1, "lee", "hello", 1),
            message(2, "lee", "good night", 14),
            message(3, "kim", "are you there?", 16),
        ];
        let _ = app.handle(AppEvent::HistoryLoaded { room_id: 42, request, page });

        insta::assert_snapshot!(screen(&app, kst()).lines.join("\n"), @r"
        [채팅방 42] #42
        ── 2024년 5월 1일 ──
        [10:30] lee: hello
        [23:30] lee: good night
        ── 2024년 5월 2일 ──
        [01:30] kim: are you there?
        ");
    }

    #[test]
    fn failed_message_is_marked() {
        let mut msg = message(3, "kim", "are you there?", 16);
        msg.delivery = DeliveryState::Failed;
        assert_eq!(message_line(&msg, kst()), "[01:30] kim: are you there? (전송 실패)");
    }

    #[test]
    fn exhausted_connection_mentions_reconnect() {
        let status = ConnectionStatus {
            state: ConnectionState::Disconnected,
            reconnect_pending: false,
            exhausted: true,
        };
        assert!(connection_label(status).ends_with("(/reconnect)"));
    }

    fn whale(exp: u64) -> UserInfoDto {
        UserInfoDto {
            username: "whale22".into(),
            avatar_url: None,
            season_commit_count: 40,
            pet_exp: exp,
            pet_grow: PetGrow::Egg,
            tier: "SPROUT".into(),
            last_committed: None,
        }
    }

    #[test]
    fn profile_with_pet_progress() {
        let mut app = App::new(1, kst());
        let _ = app.handle(AppEvent::ProfileLoaded(whale(70)));
        let update = CommitCountWire { username: "whale22".into(), count: 5 };
        let _ = app.handle(AppEvent::Service(ServiceEvent::CommitCount(update)));
        let _ = app.handle(AppEvent::LookupCommits("lee".into()));
        let _ = app.handle(AppEvent::CommitCountLoaded { username: "lee".into(), count: 12 });
        let _ = app.handle(AppEvent::ShowProfile);

        insta::assert_snapshot!(screen(&app, kst()).lines.join("\n"), @r"
        [프로필]
          whale22 🌿 SPROUT
          이번 시즌 커밋 45개
          방금 +5 커밋
          펫 EGG [##########----------] 75 / 150
          lee님의 커밋 12개
        ");
    }

    #[test]
    fn ended_session_shows_only_status() {
        let mut app = App::new(1, kst());
        let _ = app.handle(AppEvent::SessionExpired);

        let screen = screen(&app, kst());
        assert!(screen.lines.is_empty());
        assert_eq!(screen.status.as_deref(), Some(SESSION_EXPIRED));
    }

    #[test]
    fn unknown_tier_has_fallback_emoji() {
        assert_eq!(tier_emoji("TREE"), "🌳");
        assert_eq!(tier_emoji("MOSS"), "❔");
    }
}
