//! Chain building and teardown ordering

use std::time::Duration;

use promrelay_core::{ChainError, Hop, HopAddress, HopCredential, build_chain};
use secrecy::SecretString;

use crate::common::{Event, MockConnector, reversed};

fn hops(n: usize) -> Vec<Hop> {
    (0..n)
        .map(|i| {
            Hop::new(
                HopAddress::new(format!("10.0.0.{i}"), 22),
                "ops",
                HopCredential::Password(SecretString::from("pw")),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_direct_target_is_one_hop() {
    let connector = MockConnector::new();
    let route = hops(1);
    let refs: Vec<&Hop> = route.iter().collect();

    let chain = build_chain(&connector, &refs).await.unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.current().unwrap().index, 0);

    chain.release().await;
    assert_eq!(
        connector.log.events(),
        [Event::Connect(0), Event::Close(0)]
    );
}

#[tokio::test]
async fn test_two_relays_connect_in_order_and_close_in_reverse() {
    let connector = MockConnector::new();
    let route = hops(3);
    let refs: Vec<&Hop> = route.iter().collect();

    let chain = build_chain(&connector, &refs).await.unwrap();
    assert_eq!(chain.current().unwrap().index, 2);
    chain.release().await;

    assert_eq!(connector.log.connects(), [0, 1, 2]);
    assert_eq!(connector.log.closes(), [2, 1, 0]);
}

#[tokio::test]
async fn test_failure_unwinds_partial_chain() {
    let connector = MockConnector::new().failing_at(2);
    let route = hops(4);
    let refs: Vec<&Hop> = route.iter().collect();

    let err = build_chain(&connector, &refs).await.unwrap_err();
    assert!(matches!(err, ChainError::Dial { hop: 2, .. }));
    assert_eq!(err.hop_index(), Some(2));

    assert_eq!(
        connector.log.events(),
        [
            Event::Connect(0),
            Event::Connect(1),
            Event::Close(1),
            Event::Close(0)
        ]
    );
}

#[tokio::test]
async fn test_failure_at_first_hop_leaves_nothing() {
    let connector = MockConnector::new().failing_at(0);
    let route = hops(2);
    let refs: Vec<&Hop> = route.iter().collect();

    assert!(build_chain(&connector, &refs).await.is_err());
    assert!(connector.log.events().is_empty());
}

#[tokio::test]
async fn test_empty_route_rejected() {
    let connector = MockConnector::new();
    let err = build_chain(&connector, &[]).await.unwrap_err();
    assert!(matches!(err, ChainError::EmptyRoute));
    assert!(connector.log.events().is_empty());
}

#[tokio::test]
async fn test_dropped_chain_closes_in_reverse() {
    let connector = MockConnector::new();
    let route = hops(3);
    let refs: Vec<&Hop> = route.iter().collect();

    let chain = build_chain(&connector, &refs).await.unwrap();
    drop(chain);

    for _ in 0..50 {
        if connector.log.closes().len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(connector.log.closes(), reversed(3));
}
