use crate::locale::percent_encode;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

// room views are public; everything else is scoped to the session's user so
// one user's cached view can never answer another's request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Rooms(String),
    RoomDetail(String),
    RoomAvailability(String),
    Bookings { user: String, query: String },
    BookingDetail { user: String, id: String },
    StayRecords { user: String, query: String },
    StayRecordDetail { user: String, id: String },
    StayStats { user: String },
    Users { user: String, query: String },
}

// every mutation names the keys it makes stale
#[derive(Debug, Clone)]
pub enum Mutation {
    Room(Option<String>),
    Booking(String),
    StayRecord(Option<String>),
    User,
}

fn affected(mutation: &Mutation, key: &CacheKey) -> bool {
    match mutation {
        Mutation::Room(id) => match key {
            CacheKey::Rooms(_) | CacheKey::RoomAvailability(_) => true,
            CacheKey::RoomDetail(detail) => id.as_deref() == Some(detail.as_str()),
            _ => false,
        },
        // booking transitions make both the list and the detail view stale,
        // and availability is derived from bookings upstream
        Mutation::Booking(id) => match key {
            CacheKey::Bookings { .. } | CacheKey::RoomAvailability(_) => true,
            CacheKey::BookingDetail { id: detail, .. } => detail == id,
            _ => false,
        },
        Mutation::StayRecord(id) => match key {
            CacheKey::StayRecords { .. } | CacheKey::StayStats { .. } => true,
            CacheKey::StayRecordDetail { id: detail, .. } => id.as_deref() == Some(detail.as_str()),
            _ => false,
        },
        Mutation::User => matches!(key, CacheKey::Users { .. }),
    }
}

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    value: Value,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<RwLock<HashMap<CacheKey, Entry>>>,
    max_age: Duration,
}

impl CacheStore {
    pub fn new(max_age: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            max_age,
        }
    }

    // stale entries count as misses; they are overwritten on the next put
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let map = self.inner.read().ok()?;
        let entry = map.get(key)?;
        if entry.stored_at.elapsed() > self.max_age {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn put(&self, key: CacheKey, value: Value) {
        let Ok(mut map) = self.inner.write() else {
            return;
        };
        map.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    pub fn invalidate(&self, mutation: &Mutation) {
        let Ok(mut map) = self.inner.write() else {
            return;
        };
        map.retain(|key, _| !affected(mutation, key));
    }
}

// canonical query-string form shared by cache keys and outgoing requests;
// values are encoded so user input can never smuggle extra parameters
pub fn query_string(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("{name}={}", percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_get_roundtrip() {
        let cache = CacheStore::new(Duration::from_secs(60));
        let key = CacheKey::RoomDetail("r1".to_string());

        assert_eq!(cache.get(&key), None);
        cache.put(key.clone(), json!({"id": "r1"}));
        assert_eq!(cache.get(&key), Some(json!({"id": "r1"})));
    }

    #[test]
    fn test_stale_entry_is_a_miss() {
        let cache = CacheStore::new(Duration::ZERO);
        let key = CacheKey::StayStats {
            user: "u1".to_string(),
        };
        cache.put(key.clone(), json!(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&key), None);
    }

    fn booking_key(user: &str, id: &str) -> CacheKey {
        CacheKey::BookingDetail {
            user: user.to_string(),
            id: id.to_string(),
        }
    }

    #[test]
    fn test_booking_mutation_invalidates_list_detail_and_availability() {
        let cache = CacheStore::new(Duration::from_secs(60));
        let list = CacheKey::Bookings {
            user: "u1".to_string(),
            query: "page=1".to_string(),
        };
        cache.put(list.clone(), json!([]));
        cache.put(booking_key("u1", "b1"), json!({}));
        cache.put(booking_key("u2", "b1"), json!({}));
        cache.put(booking_key("u1", "b2"), json!({}));
        cache.put(CacheKey::RoomAvailability("".into()), json!([]));
        cache.put(CacheKey::RoomDetail("r1".into()), json!({}));

        cache.invalidate(&Mutation::Booking("b1".to_string()));

        assert_eq!(cache.get(&list), None);
        assert_eq!(cache.get(&booking_key("u1", "b1")), None);
        assert_eq!(cache.get(&booking_key("u2", "b1")), None);
        assert!(cache.get(&booking_key("u1", "b2")).is_some());
        assert_eq!(cache.get(&CacheKey::RoomAvailability("".into())), None);
        assert!(cache.get(&CacheKey::RoomDetail("r1".into())).is_some());
    }

    #[test]
    fn test_room_create_invalidates_lists_only() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache.put(CacheKey::Rooms("".into()), json!([]));
        cache.put(CacheKey::RoomDetail("r1".into()), json!({}));

        cache.invalidate(&Mutation::Room(None));

        assert_eq!(cache.get(&CacheKey::Rooms("".into())), None);
        assert!(cache.get(&CacheKey::RoomDetail("r1".into())).is_some());
    }

    #[test]
    fn test_query_string_skips_empty() {
        let qs = query_string(&[
            ("status", "available".to_string()),
            ("type", String::new()),
            ("page", "2".to_string()),
        ]);
        assert_eq!(qs, "status=available&page=2");
    }

    #[test]
    fn test_query_string_encodes_values() {
        let qs = query_string(&[("status", "a&page=9 9".to_string())]);
        assert_eq!(qs, "status=a%26page%3D9%209");
    }
}
