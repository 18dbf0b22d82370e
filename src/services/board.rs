// src/services/board.rs
//! In-process registry of batches whose images are still arriving.
//!
//! Each batch has exactly one writer, the fill task that owns its
//! [`BatchPublisher`]; readers only ever see whole snapshots through a
//! `watch` channel. Opening a new batch in a slot cancels the fill that
//! previously occupied it.

use crate::models::{Batch, BatchSnapshot, BatchStatus, DeferredImage};
use chrono::Utc;
use log::info;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const RETAINED_BATCHES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillSlot {
    Outfits,
    Trends,
    Palette,
}

#[derive(Default)]
struct Entries {
    snapshots: HashMap<Uuid, watch::Receiver<BatchSnapshot>>,
    order: VecDeque<Uuid>,
}

#[derive(Default)]
pub struct BatchBoard {
    entries: Mutex<Entries>,
    inflight: Mutex<HashMap<FillSlot, CancellationToken>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BatchBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels whatever is running in `slot` and hands out the token for
    /// the work replacing it.
    pub fn supersede(&self, slot: FillSlot) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = guard(&self.inflight).insert(slot, token.clone()) {
            if !previous.is_cancelled() {
                info!("superseding in-flight {:?} work", slot);
                previous.cancel();
            }
        }
        token
    }

    /// Registers a freshly produced batch. The returned publisher is the
    /// batch's only writer.
    pub fn open(&self, batch: Batch, cancel: CancellationToken) -> BatchPublisher {
        let batch_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(BatchSnapshot {
            batch_id,
            status: BatchStatus::Filling,
            batch,
            updated_at: Utc::now(),
        });

        let mut entries = guard(&self.entries);
        entries.snapshots.insert(batch_id, rx);
        entries.order.push_back(batch_id);
        while entries.order.len() > RETAINED_BATCHES {
            if let Some(oldest) = entries.order.pop_front() {
                entries.snapshots.remove(&oldest);
            }
        }

        BatchPublisher {
            batch_id,
            tx,
            cancel,
        }
    }

    pub fn snapshot(&self, batch_id: &Uuid) -> Option<BatchSnapshot> {
        guard(&self.entries)
            .snapshots
            .get(batch_id)
            .map(|rx| rx.borrow().clone())
    }
}

pub struct BatchPublisher {
    batch_id: Uuid,
    tx: watch::Sender<BatchSnapshot>,
    cancel: CancellationToken,
}

impl BatchPublisher {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fills the deferred image of item `index` and re-emits the batch.
    pub fn attach_image(&self, index: usize, url: String) {
        self.tx.send_modify(|snapshot| {
            match &mut snapshot.batch {
                Batch::Outfits(result) => {
                    if let Some(item) = result.recommendations.get_mut(index) {
                        item.attach_image(url);
                    }
                }
                Batch::Trends(items) => {
                    if let Some(item) = items.get_mut(index) {
                        item.attach_image(url);
                    }
                }
            }
            snapshot.updated_at = Utc::now();
        });
    }

    pub fn finish(&self, status: BatchStatus) {
        self.tx.send_modify(|snapshot| {
            snapshot.status = status;
            snapshot.updated_at = Utc::now();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrendItem;

    fn trends() -> Batch {
        Batch::Trends(vec![
            TrendItem {
                title: "a".into(),
                description: "d".into(),
                context: "c".into(),
                image_url: None,
            },
            TrendItem {
                title: "b".into(),
                description: "d".into(),
                context: "c".into(),
                image_url: None,
            },
        ])
    }

    #[test]
    fn superseding_cancels_previous_token() {
        let board = BatchBoard::new();
        let first = board.supersede(FillSlot::Outfits);
        let other_slot = board.supersede(FillSlot::Trends);
        let second = board.supersede(FillSlot::Outfits);

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!other_slot.is_cancelled());
    }

    #[test]
    fn published_images_show_up_in_snapshots() {
        let board = BatchBoard::new();
        let publisher = board.open(trends(), CancellationToken::new());
        let id = publisher.batch_id();

        publisher.attach_image(1, "data:image/png;base64,AA".into());
        let snapshot = board.snapshot(&id).unwrap();
        assert_eq!(snapshot.status, BatchStatus::Filling);
        match snapshot.batch {
            Batch::Trends(items) => {
                assert!(items[0].image_url.is_none());
                assert_eq!(items[1].image_url.as_deref(), Some("data:image/png;base64,AA"));
            }
            other => panic!("unexpected batch: {other:?}"),
        }

        publisher.finish(BatchStatus::Partial);
        assert_eq!(board.snapshot(&id).unwrap().status, BatchStatus::Partial);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let board = BatchBoard::new();
        let publisher = board.open(trends(), CancellationToken::new());
        publisher.attach_image(7, "x".into());
        assert_eq!(board.snapshot(&publisher.batch_id()).unwrap().batch, trends());
    }

    #[test]
    fn old_batches_are_evicted() {
        let board = BatchBoard::new();
        let first = board.open(trends(), CancellationToken::new()).batch_id();
        for _ in 0..RETAINED_BATCHES {
            board.open(trends(), CancellationToken::new());
        }
        assert!(board.snapshot(&first).is_none());
    }
}
