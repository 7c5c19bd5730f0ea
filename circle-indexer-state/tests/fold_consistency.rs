//! Cross-checks between the full-history projector and the incremental cache
//! over randomly generated event logs.

use circle_indexer_shared::{
    ContactPayload, Domain, EventBuilder, EventContext, HcsEvent, Network, TrustPayload,
};
use circle_indexer_state::{CircleCache, CircleUpdate, Projection};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const ACCOUNTS: [&str; 6] = ["0.0.101", "0.0.102", "0.0.103", "0.0.104", "0.0.105", "0.0.106"];

fn random_log(seed: u64, len: usize) -> Vec<HcsEvent> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ts = 1_700_000_000_000i64;
    let mut log = Vec::with_capacity(len);

    for _ in 0..len {
        // Occasional equal timestamps exercise the eid tie-break.
        if rng.gen_bool(0.8) {
            ts += rng.gen_range(1..5_000);
        }
        let builder = EventBuilder::new(EventContext::new(Domain::Social, ts, Network::Testnet));

        let mut pair = ACCOUNTS.choose_multiple(&mut rng, 2);
        let (actor, subject) = match (pair.next(), pair.next()) {
            (Some(a), Some(b)) => (*a, *b),
            _ => unreachable!("two accounts requested"),
        };

        let event = match rng.gen_range(0..5) {
            0 => builder.create_contact(actor, subject, ContactPayload::default()),
            1 | 2 => builder.accept_contact(actor, subject, None, ContactPayload::default()),
            3 => builder.revoke_contact(actor, subject, Some("test")),
            _ => builder.allocate_trust(
                actor,
                subject,
                rng.gen_range(1..=9),
                TrustPayload {
                    weight: Some(rng.gen_range(1..4) as f64),
                    ..Default::default()
                },
            ),
        };
        log.push(event.expect("generated event is valid"));
    }

    log
}

fn feed(cache: &CircleCache, log: &[HcsEvent]) {
    let mut ordered: Vec<&HcsEvent> = log.iter().collect();
    ordered.sort_by(|a, b| a.fold_key().cmp(&b.fold_key()));
    for event in ordered {
        if let Some(update) = CircleUpdate::from_event(event) {
            cache.apply(update);
        }
    }
}

#[test]
fn test_projector_and_cache_agree_on_bonded_pairs() {
    for seed in 0..25 {
        let mut log = random_log(seed, 200);

        let cache = CircleCache::new();
        feed(&cache, &log);

        // The projector sorts on its own; hand it a shuffled copy.
        log.shuffle(&mut StdRng::seed_from_u64(seed + 1_000));
        let mut projection = Projection::new();
        projection.fold(&log);

        assert_eq!(
            projection.bonded_pairs(),
            cache.bonded_pairs(),
            "bonded pairs diverged for seed {seed}"
        );
    }
}

#[test]
fn test_cache_trust_matches_projected_weight() {
    let log = random_log(7, 300);

    let cache = CircleCache::new();
    feed(&cache, &log);
    let mut projection = Projection::new();
    projection.fold(&log);

    for state in projection.trust.snapshot() {
        let edge = cache
            .get_circle_for(&state.actor)
            .edges
            .into_iter()
            .find(|e| e.to == state.subject)
            .expect("allocated pair has a trust edge");
        assert_eq!(edge.strength, state.weight, "pair {}", state.id);
    }
}

#[test]
fn test_prefix_and_suffix_fold_matches_whole_log() {
    let mut log = random_log(42, 250);
    log.sort_by(|a, b| a.fold_key().cmp(&b.fold_key()));

    let mut whole = Projection::new();
    whole.fold(&log);

    for split in [0, 1, 60, 125, 249, 250] {
        let mut incremental = Projection::new();
        incremental.fold(&log[..split]);
        incremental.fold(&log[split..]);
        assert_eq!(whole.snapshot(), incremental.snapshot(), "split at {split}");
    }
}

#[test]
fn test_adjacency_is_symmetric() {
    let log = random_log(99, 400);
    let cache = CircleCache::new();
    feed(&cache, &log);

    for account in ACCOUNTS {
        for contact in cache.get_contacts_for(account) {
            let back = cache.get_contacts_for(&contact.account_id);
            assert!(
                back.iter().any(|n| n.account_id == account),
                "{account} lists {} but not the reverse",
                contact.account_id
            );
        }
    }
}
