//! Property tests for chain construction and teardown

use proptest::prelude::*;
use promrelay_core::exec::{self, ExecOptions};
use promrelay_core::{Hop, HopAddress, HopCredential, build_chain};
use secrecy::SecretString;

use crate::common::{Event, MockConnector, reversed};

fn route(len: usize) -> Vec<Hop> {
    (0..len)
        .map(|i| {
            Hop::new(
                HopAddress::new(format!("hop{i}"), 22),
                "ops",
                HopCredential::Password(SecretString::from("pw")),
            )
        })
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// Property: N relays plus the target give N+1 connects in order and
    /// N+1 closes in reverse order
    #[test]
    fn full_chain_connects_in_order_closes_in_reverse(relays in 0usize..12) {
        let hops = route(relays + 1);
        let refs: Vec<&Hop> = hops.iter().collect();
        let connector = MockConnector::new();

        runtime().block_on(async {
            let chain = build_chain(&connector, &refs).await.unwrap();
            exec::run(chain, "true", &ExecOptions::default()).await.unwrap();
        });

        let expected_connects: Vec<usize> = (0..=relays).collect();
        prop_assert_eq!(connector.log.connects(), expected_connects);
        prop_assert_eq!(connector.log.closes(), reversed(relays + 1));

        let events = connector.log.events();
        prop_assert_eq!(&events[relays + 1], &Event::Run(relays));
    }

    /// Property: a failure at hop k leaves exactly k hops established, all of
    /// them closed before the error is returned
    #[test]
    fn failure_at_k_unwinds_k_hops((len, k) in (1usize..12).prop_flat_map(|len| (Just(len), 0..len))) {
        let hops = route(len);
        let refs: Vec<&Hop> = hops.iter().collect();
        let connector = MockConnector::new().failing_at(k);

        let err = runtime()
            .block_on(build_chain(&connector, &refs))
            .unwrap_err();

        prop_assert_eq!(err.hop_index(), Some(k));
        let expected_connects: Vec<usize> = (0..k).collect();
        prop_assert_eq!(connector.log.connects(), expected_connects);
        prop_assert_eq!(connector.log.closes(), reversed(k));
    }
}
