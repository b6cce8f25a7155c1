//! Property tests for the message store merge discipline and the sync
//! watermark.
//!
//! Random interleavings of poll merges, optimistic inserts, confirmations,
//! rollbacks and history pages must keep the store sorted and free of
//! duplicate confirmed timestamps, and the watermark must never move
//! backwards.

use std::collections::HashSet;

use guestchat::chat::{MessageStore, SyncWatermark};
use guestchat_proto::message::{Message, MessageId, SenderType, Timestamp};
use proptest::prelude::*;

const BASE_MILLIS: i64 = 1_704_067_200_000;

fn confirmed(n: u64, offset: i64) -> Message {
    Message {
        id: MessageId::new(format!("srv-{n}")),
        content: format!("message {n}"),
        sender_type: if n % 2 == 0 {
            SenderType::Guest
        } else {
            SenderType::Admin
        },
        sender_name: "someone".to_string(),
        created_at: Timestamp::from_millis(BASE_MILLIS + offset),
        read: false,
    }
}

fn temp(offset: i64) -> Message {
    let at = Timestamp::from_millis(BASE_MILLIS + offset);
    Message {
        id: MessageId::temp(at),
        content: "pending".to_string(),
        sender_type: SenderType::Guest,
        sender_name: "Guest-0001".to_string(),
        created_at: at,
        read: false,
    }
}

#[derive(Debug, Clone)]
enum Op {
    /// A poll response with these creation offsets.
    Poll(Vec<i64>),
    /// An older history page with these creation offsets.
    Page(Vec<i64>),
    /// An optimistic send at this offset.
    Send(i64),
    /// Confirm the n-th outstanding temp entry with this offset.
    Confirm(usize, i64),
    /// Roll back the n-th outstanding temp entry.
    Rollback(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(0i64..200, 0..8).prop_map(Op::Poll),
        prop::collection::vec(-200i64..0, 0..8).prop_map(Op::Page),
        (0i64..200).prop_map(Op::Send),
        (0usize..4, 0i64..200).prop_map(|(i, o)| Op::Confirm(i, o)),
        (0usize..4).prop_map(Op::Rollback),
    ]
}

fn is_sorted(messages: &[Message]) -> bool {
    messages.windows(2).all(|w| w[0].created_at <= w[1].created_at)
}

fn confirmed_timestamps_unique(messages: &[Message]) -> bool {
    let mut seen = HashSet::new();
    messages
        .iter()
        .filter(|m| !m.is_temp())
        .all(|m| seen.insert(m.created_at))
}

proptest! {
    /// Any interleaving of merges keeps the list sorted and de-duplicated.
    #[test]
    fn interleaved_merges_stay_sorted_and_unique(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut store = MessageStore::new();
        let mut outstanding: Vec<MessageId> = Vec::new();
        let mut next_id = 0u64;
        let mut next_id_fn = || {
            next_id += 1;
            next_id
        };

        for op in ops {
            match op {
                Op::Poll(offsets) => {
                    store.append(offsets.into_iter().map(|o| confirmed(next_id_fn(), o)));
                }
                Op::Page(offsets) => {
                    store.prepend_older(offsets.into_iter().map(|o| confirmed(next_id_fn(), o)));
                }
                Op::Send(offset) => {
                    let msg = temp(offset);
                    if store.messages().iter().any(|m| m.id == msg.id) {
                        continue;
                    }
                    outstanding.push(msg.id.clone());
                    store.push_temp(msg);
                }
                Op::Confirm(i, offset) => {
                    if outstanding.is_empty() {
                        continue;
                    }
                    let id = outstanding.remove(i % outstanding.len());
                    store.replace_temp(&id, confirmed(next_id_fn(), offset));
                }
                Op::Rollback(i) => {
                    if outstanding.is_empty() {
                        continue;
                    }
                    let id = outstanding.remove(i % outstanding.len());
                    prop_assert!(store.remove_temp(&id).is_some());
                }
            }

            prop_assert!(is_sorted(store.messages()));
            prop_assert!(confirmed_timestamps_unique(store.messages()));
        }

        // Every outstanding temp entry is still present.
        for id in &outstanding {
            prop_assert!(store.messages().iter().any(|m| &m.id == id));
        }
    }

    /// Re-merging a timestamp that is already present never grows the store.
    #[test]
    fn duplicate_timestamps_do_not_grow_store(
        initial in prop::collection::vec(0i64..100, 1..20),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut store = MessageStore::new();
        store.append(initial.iter().enumerate().map(|(i, &o)| confirmed(i as u64, o)));
        let len = store.len();

        let dup_offset = initial[pick.index(initial.len())];
        let inserted = store.append([confirmed(9_999, dup_offset)]);

        prop_assert!(inserted.is_empty());
        prop_assert_eq!(store.len(), len);
    }

    /// The watermark never decreases and tracks the newest confirmed
    /// timestamp seen.
    #[test]
    fn watermark_is_monotonic(batches in prop::collection::vec(prop::collection::vec(0i64..1_000, 0..6), 1..20)) {
        let mut watermark = SyncWatermark::new();
        let mut highest: Option<Timestamp> = None;

        for (round, offsets) in batches.into_iter().enumerate() {
            let batch: Vec<Message> = offsets
                .iter()
                .map(|&o| confirmed(round as u64, o))
                .collect();
            let before = watermark.get();
            watermark.advance_to_max(&batch);
            let after = watermark.get();

            if let Some(before) = before {
                prop_assert!(after >= Some(before));
            }
            let batch_max = batch.iter().map(|m| m.created_at).max();
            highest = highest.max(batch_max);
            prop_assert_eq!(after, highest);
        }
    }
}
