//! Short-lived room list cache.
//!
//! Room lists are fetched per tab and page. Entries stay valid for a fixed
//! window and are dropped wholesale whenever membership may have changed.

use std::{collections::HashMap, ops::Sub, time::Duration};

use commitfield_proto::payloads::rest::RoomDto;

use crate::api::RoomTab;

/// Room lists keyed by tab and page.
#[derive(Debug, Clone)]
pub struct RoomListCache<I> {
    ttl: Duration,
    entries: HashMap<(RoomTab, u32), (I, Vec<RoomDto>)>,
}

impl<I> RoomListCache<I>
where
    I: Copy + Sub<Output = Duration>,
{
    /// Cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    /// Cached page, if still valid at `now`.
    pub fn get(&self, tab: RoomTab, page: u32, now: I) -> Option<&[RoomDto]> {
        let (stored_at, rooms) = self.entries.get(&(tab, page))?;
        (now - *stored_at < self.ttl).then_some(rooms.as_slice())
    }

    /// Store a page fetched at `now`.
    pub fn put(&mut self, tab: RoomTab, page: u32, rooms: Vec<RoomDto>, now: I) {
        self.entries.insert((tab, page), (now, rooms));
    }

    /// Drop every entry.
    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(entries = self.entries.len(), "room list cache invalidated");
        }
        self.entries.clear();
    }

    /// Number of stored pages, valid or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn room(id: u64) -> RoomDto {
        RoomDto {
            id,
            title: format!("room {id}"),
            current_user_count: 1,
            max_user_count: 10,
            is_private: false,
            image_url: None,
        }
    }

    #[test]
    fn entry_expires_after_ttl() {
        let t0 = Instant::now();
        let mut cache = RoomListCache::new(Duration::from_secs(10));
        cache.put(RoomTab::All, 0, vec![room(1)], t0);

        let fresh = cache.get(RoomTab::All, 0, t0 + Duration::from_secs(9));
        assert_eq!(fresh.map(<[_]>::len), Some(1));
        assert!(cache.get(RoomTab::All, 0, t0 + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn tabs_and_pages_are_separate() {
        let t0 = Instant::now();
        let mut cache = RoomListCache::new(Duration::from_secs(10));
        cache.put(RoomTab::Joined, 0, vec![room(1)], t0);

        assert!(cache.get(RoomTab::All, 0, t0).is_none());
        assert!(cache.get(RoomTab::Joined, 1, t0).is_none());
        assert!(cache.get(RoomTab::Joined, 0, t0).is_some());
    }

    #[test]
    fn invalidate_drops_everything() {
        let t0 = Instant::now();
        let mut cache = RoomListCache::new(Duration::from_secs(10));
        cache.put(RoomTab::All, 0, vec![room(1)], t0);
        cache.put(RoomTab::Created, 0, vec![], t0);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
