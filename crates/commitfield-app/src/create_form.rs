//! Room creation form.
//!
//! Validation runs before any request is issued. Lengths count characters,
//! not bytes.

use std::path::PathBuf;

use commitfield_client::api::NewRoom;

/// Title length bounds, after trimming.
pub const TITLE_CHARS: std::ops::RangeInclusive<usize> = 2..=20;

/// Member count bounds.
pub const USER_COUNT: std::ops::RangeInclusive<u32> = 2..=100;

/// Password length bounds.
pub const PASSWORD_CHARS: std::ops::RangeInclusive<usize> = 4..=20;

/// Raw form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRoomInput {
    /// Title as typed.
    pub title: String,
    /// Member limit as typed.
    pub user_count_max: String,
    /// Password as typed. Blank means a public room.
    pub password: Option<String>,
    /// Image file to upload.
    pub image: Option<PathBuf>,
}

/// Per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    /// Title problem.
    pub title: Option<&'static str>,
    /// Member limit problem.
    pub user_count_max: Option<&'static str>,
    /// Password problem.
    pub password: Option<&'static str>,
}

impl FormErrors {
    /// Whether every field passed.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.user_count_max.is_none() && self.password.is_none()
    }

    /// Messages in field order.
    pub fn messages(&self) -> Vec<&'static str> {
        [self.title, self.user_count_max, self.password].into_iter().flatten().collect()
    }
}

impl CreateRoomInput {
    /// Validate into a creation request.
    ///
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(&self) -> Result<NewRoom, FormErrors> {
        let title = self.title.trim();
        let title_len = title.chars().count();
        let mut errors = FormErrors::default();

        errors.title = if title.is_empty() {
            Some("채팅방 제목을 입력해주세요.")
        } else if title_len < *TITLE_CHARS.start() {
            Some("채팅방 제목은 최소 2자 이상이어야 합니다.")
        } else if title_len > *TITLE_CHARS.end() {
            Some("채팅방 제목은 최대 20자까지 가능합니다.")
        } else {
            None
        };

        let count = self.user_count_max.trim().parse::<u32>().ok();
        errors.user_count_max = match count {
            None => Some("최대 인원 수를 입력해주세요."),
            Some(n) if n < *USER_COUNT.start() => Some("최대 인원 수는 최소 2명 이상이어야 합니다."),
            Some(n) if n > *USER_COUNT.end() => Some("최대 인원 수는 100명까지 가능합니다."),
            Some(_) => None,
        };

        let password = self.password.as_deref().filter(|p| !p.trim().is_empty());
        if let Some(p) = password
            && !PASSWORD_CHARS.contains(&p.chars().count())
        {
            errors.password = Some("비밀번호는 4자 이상 20자 이하로 입력해주세요.");
        }

        match (errors.is_empty(), count) {
            (true, Some(user_count_max)) => Ok(NewRoom {
                title: title.to_owned(),
                user_count_max,
                password: password.map(str::to_owned),
                image: self.image.clone(),
            }),
            _ => Err(errors),
        }
    }
}
