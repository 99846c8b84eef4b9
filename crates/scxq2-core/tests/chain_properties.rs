use proptest::prelude::*;
use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};
use scxq2_canonical::ProofHash;
use scxq2_core::link_value;
use serde_json::{json, Value};

fn payload_strategy() -> impl Strategy<Value = Value> {
    (any::<i32>(), "[a-z]{0,8}", any::<bool>())
        .prop_map(|(n, s, b)| json!({"n": n, "s": s, "b": b}))
}

fn fixed_runner() -> TestRunner {
    let seed = [7u8; 32];
    TestRunner::new_with_rng(
        Config {
            cases: 256,
            ..Config::default()
        },
        TestRng::from_seed(RngAlgorithm::ChaCha, &seed),
    )
}

#[test]
fn test_link_changes_with_payload() {
    let mut runner = fixed_runner();
    let strategy = (any::<u32>(), payload_strategy(), payload_strategy());
    runner
        .run(&strategy, |(prev, p1, p2)| {
            prop_assume!(p1 != p2);
            let prev = Some(ProofHash::from_u32(prev));
            prop_assert_ne!(link_value(prev, &p1), link_value(prev, &p2));
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_link_changes_with_prev() {
    let mut runner = fixed_runner();
    let strategy = (any::<u32>(), any::<u32>(), payload_strategy());
    runner
        .run(&strategy, |(h1, h2, payload)| {
            prop_assume!(h1 != h2);
            let a = link_value(Some(ProofHash::from_u32(h1)), &payload);
            let b = link_value(Some(ProofHash::from_u32(h2)), &payload);
            prop_assert_ne!(a, b);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_link_is_deterministic() {
    let mut runner = fixed_runner();
    runner
        .run(&payload_strategy(), |payload| {
            prop_assert_eq!(link_value(None, &payload), link_value(None, &payload.clone()));
            Ok(())
        })
        .unwrap();
}
