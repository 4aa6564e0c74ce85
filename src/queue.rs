// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of mw-log.
//
// mw-log is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// mw-log is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mw-log.  If not,
// see <http://www.gnu.org/licenses/>.

//! A bounded, closable multi-producer/single-consumer queue.

use crate::error::{Error, Result};

use backtrace::Backtrace;

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard},
};

/// What to do when a record arrives at a full queue
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// discard the incoming record
    #[default]
    DropNewest,
    /// evict the record at the head of the queue to make room
    DropOldest,
    /// wait for the consumer to make room
    Block,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kDropNewest" | "DropNewest" | "drop-newest" => Ok(OverflowPolicy::DropNewest),
            "kDropOldest" | "DropOldest" | "drop-oldest" => Ok(OverflowPolicy::DropOldest),
            "kBlock" | "Block" | "block" => Ok(OverflowPolicy::Block),
            _ => Err(Error::BadOverflowPolicy {
                text: s.to_string(),
                back: Backtrace::new(),
            }),
        }
    }
}

/// Result of [`BoundedQueue::push`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// the item was enqueued, but the oldest item was evicted
    DroppedOldest,
    /// the queue was full & the item was discarded
    DroppedNewest,
    /// the queue has been closed; the item was discarded
    Closed,
}

impl PushOutcome {
    /// Did this push cost exactly one item?
    pub fn dropped(&self) -> bool {
        matches!(self, PushOutcome::DroppedOldest | PushOutcome::DroppedNewest)
    }
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> BoundedQueue<T> {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> BoundedQueue<T> {
        let capacity = std::cmp::max(capacity, 1);
        BoundedQueue {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
        }
    }
    // `State` is never left half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
    pub fn push(&self, item: T) -> PushOutcome {
        let mut state = self.lock();
        if state.closed {
            return PushOutcome::Closed;
        }
        let mut outcome = PushOutcome::Enqueued;
        if state.items.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropNewest => return PushOutcome::DroppedNewest,
                OverflowPolicy::DropOldest => {
                    state.items.pop_front();
                    outcome = PushOutcome::DroppedOldest;
                }
                OverflowPolicy::Block => {
                    while state.items.len() >= self.capacity && !state.closed {
                        state = self
                            .not_full
                            .wait(state)
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                    }
                    if state.closed {
                        return PushOutcome::Closed;
                    }
                }
            }
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        outcome
    }
    /// Block until an item is available; `None` once the queue is closed *and* drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
    /// Refuse further pushes; items already queued remain poppable.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn drop_newest() {
        let q = BoundedQueue::new(2, OverflowPolicy::DropNewest);
        assert_eq!(q.push(1), PushOutcome::Enqueued);
        assert_eq!(q.push(2), PushOutcome::Enqueued);
        assert_eq!(q.push(3), PushOutcome::DroppedNewest);
        q.close();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn drop_oldest() {
        let q = BoundedQueue::new(2, OverflowPolicy::DropOldest);
        q.push(1);
        q.push(2);
        assert_eq!(q.push(3), PushOutcome::DroppedOldest);
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn block_waits_for_room() {
        let q = Arc::new(BoundedQueue::new(1, OverflowPolicy::Block));
        q.push(1);
        let producer = {
            let q = q.clone();
            thread::spawn(move || q.push(2))
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(producer.join().unwrap(), PushOutcome::Enqueued);
        assert_eq!(q.pop(), Some(2));
    }

    #[test]
    fn close_releases_blocked_producer() {
        let q = Arc::new(BoundedQueue::new(1, OverflowPolicy::Block));
        q.push(1);
        let producer = {
            let q = q.clone();
            thread::spawn(move || q.push(2))
        };
        thread::sleep(Duration::from_millis(50));
        q.close();
        assert_eq!(producer.join().unwrap(), PushOutcome::Closed);
        assert_eq!(q.push(3), PushOutcome::Closed);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn policy_names() {
        assert_eq!(
            "kDropOldest".parse::<OverflowPolicy>().unwrap(),
            OverflowPolicy::DropOldest
        );
        assert!("sometimes".parse::<OverflowPolicy>().is_err());
    }
}
