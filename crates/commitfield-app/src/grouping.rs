//! Date grouping for display.

use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};
use commitfield_core::ChatMessage;

/// Messages sent on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup<'a> {
    /// Date in the display offset.
    pub date: NaiveDate,
    /// Messages of that date, in list order.
    pub messages: Vec<&'a ChatMessage>,
}

impl DateGroup<'_> {
    /// Header text, for example `2024년 5월 1일`.
    pub fn label(&self) -> String {
        self.date.format("%Y년 %-m월 %-d일").to_string()
    }
}

/// Group messages by calendar date in `offset`, dates ascending.
///
/// Order within a group follows `messages`.
pub fn group_by_date(messages: &[ChatMessage], offset: FixedOffset) -> Vec<DateGroup<'_>> {
    let mut groups: BTreeMap<NaiveDate, Vec<&ChatMessage>> = BTreeMap::new();
    for msg in messages {
        let date = msg.sent_at.with_timezone(&offset).date_naive();
        groups.entry(date).or_default().push(msg);
    }

    groups.into_iter().map(|(date, messages)| DateGroup { date, messages }).collect()
}
