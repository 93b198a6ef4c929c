//! Random operation sequences checked against a simple reference model.

use chrono::{TimeDelta, TimeZone, Utc};
use proptest::prelude::*;
use slotlock_daemon::{AcquireOutcome, LeaseManager, ManualClock, ReleaseOutcome, RenewOutcome};
use std::collections::HashMap;
use std::sync::Arc;

const KEYS: [&str; 3] = ["slot-a", "slot-b", "slot-c"];
const OWNERS: [&str; 3] = ["svc-1", "svc-2", "svc-3"];

#[derive(Debug, Clone)]
enum Op {
    Acquire { key: usize, owner: usize, ttl: i64 },
    Renew { key: usize, owner: usize, ttl: i64 },
    Release { key: usize, owner: usize },
    Advance { millis: i64 },
    Reap,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..3usize, 1..4i64).prop_map(|(key, owner, ttl)| Op::Acquire { key, owner, ttl }),
        (0..3usize, 0..3usize, 1..4i64).prop_map(|(key, owner, ttl)| Op::Renew { key, owner, ttl }),
        (0..3usize, 0..3usize).prop_map(|(key, owner)| Op::Release { key, owner }),
        (0..2_500i64).prop_map(|millis| Op::Advance { millis }),
        Just(Op::Reap),
    ]
}

/// Model entry: owner and expiry, in milliseconds since the start.
type Model = HashMap<usize, (usize, i64)>;

fn live_holder(model: &Model, key: usize, now: i64) -> Option<usize> {
    model
        .get(&key)
        .filter(|(_, expires)| now < *expires)
        .map(|(owner, _)| *owner)
}

proptest! {
    #[test]
    fn manager_matches_model(ops in proptest::collection::vec(op(), 1..80)) {
        let start = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let manager = LeaseManager::new(clock.clone());
        let mut model = Model::new();
        let mut now = 0i64;

        for op in ops {
            match op {
                Op::Acquire { key, owner, ttl } => {
                    let outcome = manager.acquire(KEYS[key], OWNERS[owner], ttl).unwrap();
                    match live_holder(&model, key, now) {
                        Some(holder) => match outcome {
                            AcquireOutcome::Conflict(lease) => prop_assert_eq!(lease.owner_id.as_str(), OWNERS[holder]),
                            other => prop_assert!(false, "granted over live holder: {:?}", other),
                        },
                        None => {
                            prop_assert!(matches!(outcome, AcquireOutcome::Granted(_)));
                            model.insert(key, (owner, now + ttl * 1_000));
                        }
                    }
                }
                Op::Renew { key, owner, ttl } => {
                    let outcome = manager.renew(KEYS[key], OWNERS[owner], ttl).unwrap();
                    match live_holder(&model, key, now) {
                        None => prop_assert_eq!(outcome, RenewOutcome::NotFound),
                        Some(holder) if holder != owner => prop_assert_eq!(outcome, RenewOutcome::NotOwner),
                        Some(_) => {
                            prop_assert!(matches!(outcome, RenewOutcome::Renewed(_)));
                            model.insert(key, (owner, now + ttl * 1_000));
                        }
                    }
                }
                Op::Release { key, owner } => {
                    let outcome = manager.release(KEYS[key], OWNERS[owner]).unwrap();
                    match live_holder(&model, key, now) {
                        None => prop_assert_eq!(outcome, ReleaseOutcome::NotFound),
                        Some(holder) if holder != owner => prop_assert_eq!(outcome, ReleaseOutcome::NotOwner),
                        Some(_) => {
                            prop_assert_eq!(outcome, ReleaseOutcome::Released);
                            model.remove(&key);
                        }
                    }
                }
                Op::Advance { millis } => {
                    clock.advance(TimeDelta::milliseconds(millis));
                    now += millis;
                }
                Op::Reap => {
                    manager.reap_expired();
                }
            }

            let listed: Vec<(String, String)> = manager
                .list()
                .into_iter()
                .map(|lease| (lease.resource_id, lease.owner_id))
                .collect();
            let mut expected: Vec<(String, String)> = (0..KEYS.len())
                .filter_map(|key| {
                    live_holder(&model, key, now).map(|owner| (KEYS[key].to_string(), OWNERS[owner].to_string()))
                })
                .collect();
            expected.sort();
            prop_assert_eq!(listed, expected);
        }
    }
}
