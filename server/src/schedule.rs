//! Deferred effects keyed by due time on the simulation clock.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use shared::PlayerId;

/// An effect that fires once its due time passes. Targets are referenced by
/// id and must be re-validated when the event is applied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Deferred {
    RegenerateWall { wall_id: String },
    Respawn { player: PlayerId },
    RespawnLoot { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    due_ms: u64,
    // Insertion order breaks ties so equal due times pop first-in first-out.
    seq: u64,
    event: Deferred,
}

#[derive(Debug, Default)]
pub struct Schedule {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: u64, event: Deferred) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { due_ms, seq, event }));
    }

    /// Pops every event due at or before `now_ms`, earliest first.
    pub fn drain_due(&mut self, now_ms: u64) -> Vec<Deferred> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.due_ms > now_ms {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry.event);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
