use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::lock;
use crate::aprs::{AprsData, Point};
use crate::ax25::{Address, Frame};

pub const RECENT_CAPACITY: usize = 10;

/// A decoded frame plus its receipt time.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub data: AprsData,
    pub frame: Frame,
    pub received: DateTime<Utc>,
}

impl Record {
    pub fn new(frame: Frame, data: AprsData) -> Self {
        Self {
            data,
            frame,
            received: Utc::now(),
        }
    }

    pub fn source(&self) -> &Address {
        &self.frame.source
    }
}

/// Fixed-capacity buffer that keeps the most recent `capacity` items.
#[derive(Debug)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be at least 1");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_back();
        }
        self.items.push_front(item);
    }

    /// Newest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// State shared between the inbound processor and readers. Every piece has
/// its own lock and no accessor blocks on I/O.
#[derive(Debug)]
pub struct Store {
    recent: Mutex<RingBuffer<Record>>,
    position: Mutex<Option<Point>>,
    last_seen: Mutex<HashMap<Address, Record>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::with_capacity(RECENT_CAPACITY)
    }
}

impl Store {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            recent: Mutex::new(RingBuffer::new(capacity)),
            position: Mutex::new(None),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, record: Record) {
        lock(&self.recent).push(record);
    }

    /// Recent records, newest first.
    pub fn snapshot(&self) -> Vec<Record> {
        lock(&self.recent).to_vec()
    }

    pub fn set_position(&self, point: Point) {
        *lock(&self.position) = Some(point);
    }

    pub fn position(&self) -> Option<Point> {
        *lock(&self.position)
    }

    pub fn set_last_seen(&self, station: Address, record: Record) {
        lock(&self.last_seen).insert(station, record);
    }

    pub fn last_seen(&self, station: &Address) -> Option<Record> {
        lock(&self.last_seen).get(station).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_keeps_last_n_newest_first() {
        for capacity in 1..=12 {
            let mut ring = RingBuffer::new(capacity);
            for i in 0..=capacity {
                ring.push(i);
            }
            let expected: Vec<usize> = (1..=capacity).rev().collect();
            assert_eq!(ring.to_vec(), expected, "capacity {}", capacity);
            assert_eq!(ring.len(), capacity);
        }
    }

    #[test]
    fn ring_under_capacity() {
        let mut ring = RingBuffer::new(10);
        assert!(ring.is_empty());
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.to_vec(), vec!["b", "a"]);
    }

    #[test]
    fn last_seen_is_per_station() {
        let store = Store::default();
        let frame = |src: &str, body: &str| Frame {
            source: src.parse().unwrap(),
            dest: "APRS".parse().unwrap(),
            path: vec![],
            body: body.to_string(),
        };
        let a: Address = "KF7FVH-1".parse().unwrap();
        let b: Address = "A7COG-2".parse().unwrap();

        store.set_last_seen(a.clone(), Record::new(frame("KF7FVH-1", "one"), AprsData::default()));
        store.set_last_seen(a.clone(), Record::new(frame("KF7FVH-1", "two"), AprsData::default()));

        assert_eq!(store.last_seen(&a).unwrap().frame.body, "two");
        assert!(store.last_seen(&b).is_none());
    }

    #[test]
    fn position_cell_starts_unset() {
        let store = Store::default();
        assert_eq!(store.position(), None);
        let point = Point {
            lat: 45.0,
            lon: -122.0,
            ..Default::default()
        };
        store.set_position(point);
        assert_eq!(store.position(), Some(point));
    }
}
