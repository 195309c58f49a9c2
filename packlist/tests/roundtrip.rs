//! Property tests: any pushed sequence must survive a full walk in both
//! directions, and arbitrary mutation orders must keep the buffer
//! structurally sound.

use packlist::{End, Entry, Packlist};
use proptest::prelude::*;

/// What a pushed byte string should decode back as.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expected {
    Bytes(Vec<u8>),
    Int(i64),
}

fn expected(value: &[u8]) -> Expected {
    let as_int = std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|v| v.to_string().as_bytes() == value);
    match as_int {
        Some(v) => Expected::Int(v),
        None => Expected::Bytes(value.to_vec()),
    }
}

fn decoded(entry: Entry<'_>) -> Expected {
    match entry {
        Entry::Bytes(b) => Expected::Bytes(b.to_vec()),
        Entry::Int(v) => Expected::Int(v),
    }
}

fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..80),
        any::<i64>().prop_map(|v| v.to_string().into_bytes()),
        (0i64..=12).prop_map(|v| v.to_string().into_bytes()),
        // numeric-looking strings that must stay verbatim
        Just(b"01".to_vec()),
        Just(b"+7".to_vec()),
        Just(b"-0".to_vec()),
        // long enough to force wide prev-entry-length fields
        proptest::collection::vec(any::<u8>(), 250..300),
    ]
}

proptest! {
    #[test]
    fn pushed_values_round_trip(values in proptest::collection::vec(value_strategy(), 0..64)) {
        let mut pl = Packlist::new();
        for v in &values {
            pl.push(v, End::Tail);
        }
        pl.check_integrity().unwrap();
        prop_assert_eq!(pl.len(), values.len());

        let want: Vec<Expected> = values.iter().map(|v| expected(v)).collect();
        let forward: Vec<Expected> = pl.iter().map(decoded).collect();
        prop_assert_eq!(&forward, &want);

        let mut backward = Vec::new();
        let mut at = pl.index(-1);
        while let Some(p) = at {
            backward.push(decoded(pl.get(p)));
            at = pl.prev(p);
        }
        backward.reverse();
        prop_assert_eq!(&backward, &want);

        for (i, w) in want.iter().enumerate() {
            let at = pl.index(i as isize).unwrap();
            prop_assert_eq!(&decoded(pl.get(at)), w);
            let at = pl.index(i as isize - want.len() as isize).unwrap();
            prop_assert_eq!(&decoded(pl.get(at)), w);
        }
    }

    #[test]
    fn head_pushes_reverse_the_sequence(values in proptest::collection::vec(value_strategy(), 0..32)) {
        let mut pl = Packlist::new();
        for v in &values {
            pl.push(v, End::Head);
        }
        pl.check_integrity().unwrap();

        let want: Vec<Expected> = values.iter().rev().map(|v| expected(v)).collect();
        let forward: Vec<Expected> = pl.iter().map(decoded).collect();
        prop_assert_eq!(forward, want);
    }

    #[test]
    fn arbitrary_deletes_keep_structure(
        values in proptest::collection::vec(value_strategy(), 1..40),
        picks in proptest::collection::vec(any::<usize>(), 1..40),
    ) {
        let mut pl = Packlist::new();
        let mut model: Vec<Expected> = Vec::new();
        for v in &values {
            pl.push(v, End::Tail);
            model.push(expected(v));
        }
        for pick in picks {
            if model.is_empty() {
                break;
            }
            let i = pick % model.len();
            let at = pl.index(i as isize).unwrap();
            pl.delete(at);
            model.remove(i);
            pl.check_integrity().unwrap();
        }
        let forward: Vec<Expected> = pl.iter().map(decoded).collect();
        prop_assert_eq!(forward, model);
    }

    #[test]
    fn arbitrary_inserts_match_a_vec_model(
        seed in proptest::collection::vec(value_strategy(), 0..8),
        inserts in proptest::collection::vec((any::<usize>(), value_strategy()), 0..24),
    ) {
        let mut pl = Packlist::new();
        let mut model: Vec<Expected> = Vec::new();
        for v in &seed {
            pl.push(v, End::Tail);
            model.push(expected(v));
        }
        for (pick, v) in &inserts {
            let slot = pick % (model.len() + 1);
            if slot == model.len() {
                pl.push(v, End::Tail);
            } else {
                let at = pl.index(slot as isize).unwrap();
                pl.insert(at, v);
            }
            model.insert(slot, expected(v));
            pl.check_integrity().unwrap();
        }
        let forward: Vec<Expected> = pl.iter().map(decoded).collect();
        prop_assert_eq!(forward, model);
    }
}
