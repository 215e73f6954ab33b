//! Remote execution: output capture, deadlines and cancellation

use std::time::Duration;

use promrelay_core::exec::{self, ExecOptions};
use promrelay_core::{
    CancellationToken, CapturedOutput, ExecError, Hop, HopAddress, HopCredential, build_chain,
};
use secrecy::SecretString;

use crate::common::{CommandBehavior, Event, MockConnector};

fn route(n: usize) -> Vec<Hop> {
    (0..n)
        .map(|i| {
            Hop::new(
                HopAddress::new(format!("relay{i}"), 22),
                "ops",
                HopCredential::Password(SecretString::from("pw")),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_runs_on_innermost_hop_then_releases() {
    let connector = MockConnector::new().with_behavior(CommandBehavior::Output(
        CapturedOutput::new("kafka_brokers 3\n", Some(0)),
    ));
    let hops = route(2);
    let refs: Vec<&Hop> = hops.iter().collect();
    let chain = build_chain(&connector, &refs).await.unwrap();

    let captured = exec::run(chain, "true", &ExecOptions::default())
        .await
        .unwrap();
    assert_eq!(captured.text(), "kafka_brokers 3\n");
    assert!(captured.is_success());

    assert_eq!(
        connector.log.events(),
        [
            Event::Connect(0),
            Event::Connect(1),
            Event::Run(1),
            Event::Close(1),
            Event::Close(0)
        ]
    );
}

#[tokio::test]
async fn test_non_zero_exit_is_data() {
    let connector = MockConnector::new().with_behavior(CommandBehavior::Output(
        CapturedOutput::new("boom\n", Some(2)),
    ));
    let hops = route(1);
    let refs: Vec<&Hop> = hops.iter().collect();
    let chain = build_chain(&connector, &refs).await.unwrap();

    let captured = exec::run(chain, "false", &ExecOptions::default())
        .await
        .unwrap();
    assert_eq!(captured.exit_status, Some(2));
    assert!(!captured.is_success());
}

#[tokio::test]
async fn test_session_error_still_releases_chain() {
    let connector = MockConnector::new().with_behavior(CommandBehavior::SessionError);
    let hops = route(3);
    let refs: Vec<&Hop> = hops.iter().collect();
    let chain = build_chain(&connector, &refs).await.unwrap();

    let err = exec::run(chain, "true", &ExecOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Session { .. }));
    assert_eq!(connector.log.closes(), [2, 1, 0]);
}

#[tokio::test]
async fn test_timeout_releases_chain() {
    let connector = MockConnector::new().with_behavior(CommandBehavior::Hang);
    let hops = route(2);
    let refs: Vec<&Hop> = hops.iter().collect();
    let chain = build_chain(&connector, &refs).await.unwrap();

    let options = ExecOptions::default().with_timeout(Some(Duration::from_millis(50)));
    let err = exec::run(chain, "sleep infinity", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::TimedOut { .. }));
    assert_eq!(connector.log.closes(), [1, 0]);
}

#[tokio::test]
async fn test_cancellation_releases_chain() {
    let connector = MockConnector::new().with_behavior(CommandBehavior::Hang);
    let hops = route(2);
    let refs: Vec<&Hop> = hops.iter().collect();
    let chain = build_chain(&connector, &refs).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let options = ExecOptions::default().with_cancel(cancel);
    let err = exec::run(chain, "sleep infinity", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Cancelled));
    assert_eq!(connector.log.closes(), [1, 0]);
}

#[tokio::test]
async fn test_already_cancelled_token_skips_command() {
    let connector = MockConnector::new();
    let hops = route(1);
    let refs: Vec<&Hop> = hops.iter().collect();
    let chain = build_chain(&connector, &refs).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = exec::run(chain, "true", &ExecOptions::default().with_cancel(cancel))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Cancelled));
    assert_eq!(connector.log.events(), [Event::Connect(0), Event::Close(0)]);
}
