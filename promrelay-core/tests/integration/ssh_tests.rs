//! The SSH transport against an in-process server

use std::time::{Duration, Instant};

use promrelay_core::exec::{self, ExecOptions};
use promrelay_core::{ChainError, Hop, HopCredential, HostKeyPolicy, SshConnector, build_chain};
use secrecy::SecretString;

use crate::common::ssh_server::{
    HOST_KEY, ServerBehavior, ServerEvent, TestSshServer, user_key_file,
};

fn connector() -> SshConnector {
    SshConnector::new().with_connect_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_two_hop_route_runs_command_on_final_hop() {
    let server = TestSshServer::start_with(ServerBehavior {
        output: "kafka_brokers 3\n".to_string(),
        exit_status: 3,
        ..ServerBehavior::default()
    })
    .await;
    let key = user_key_file();
    let relay = server.password_hop();
    let target = server.hop(HopCredential::PrivateKey {
        path: key.path().to_path_buf(),
        passphrase: None,
    });

    let chain = build_chain(&connector(), &[&relay, &target]).await.unwrap();
    assert_eq!(chain.len(), 2);

    let captured = exec::run(chain, "kafka_exporter --version", &ExecOptions::default())
        .await
        .unwrap();
    assert_eq!(captured.text(), "kafka_brokers 3\n");
    assert_eq!(captured.exit_status, Some(3));
    assert!(!captured.is_success());

    server.wait_for_ended(2).await;
    assert_eq!(server.log.authenticated(), [0, 1]);
    assert!(
        server
            .log
            .events()
            .contains(&ServerEvent::Exec(1, "kafka_exporter --version".to_string()))
    );
}

#[tokio::test]
async fn test_release_closes_each_tunnel_before_its_relay() {
    let server = TestSshServer::start().await;
    let route: Vec<Hop> = (0..3).map(|_| server.password_hop()).collect();
    let refs: Vec<&Hop> = route.iter().collect();

    let chain = build_chain(&connector(), &refs).await.unwrap();
    chain.release().await;
    server.wait_for_ended(3).await;

    // The EOF on a tunnel is queued on the relay's session before the relay's
    // own disconnect, so the server sees them in teardown order.
    let events = server.log.events();
    for hop in 1..3 {
        let tunnel = server.log.position(&ServerEvent::TunnelClosed(hop));
        let relay = server.log.position(&ServerEvent::SessionEnded(hop - 1));
        assert!(
            matches!((tunnel, relay), (Some(t), Some(r)) if t < r),
            "hop {hop} outlived its relay: {events:?}"
        );
    }
}

#[tokio::test]
async fn test_rejected_password_unwinds_established_hops() {
    let server = TestSshServer::start().await;
    let mut route: Vec<Hop> = (0..2).map(|_| server.password_hop()).collect();
    route.push(server.hop(HopCredential::Password(SecretString::from("wrong"))));
    let refs: Vec<&Hop> = route.iter().collect();

    let err = build_chain(&connector(), &refs).await.unwrap_err();
    assert!(
        matches!(err, ChainError::Auth { hop: 2, method: "password", .. }),
        "{err:?}"
    );

    server.wait_for_ended(3).await;
    assert_eq!(server.log.authenticated(), [0, 1]);

    let tunnel = server.log.position(&ServerEvent::TunnelClosed(1)).unwrap();
    let relay = server.log.position(&ServerEvent::SessionEnded(0)).unwrap();
    assert!(tunnel < relay, "{:?}", server.log.events());
}

#[tokio::test]
async fn test_rejected_public_key_reports_method() {
    let server = TestSshServer::start().await;
    let other = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(other.path(), HOST_KEY).unwrap();
    let hop = server.hop(HopCredential::PrivateKey {
        path: other.path().to_path_buf(),
        passphrase: None,
    });

    let err = build_chain(&connector(), &[&hop]).await.unwrap_err();
    assert!(
        matches!(err, ChainError::Auth { hop: 0, method: "publickey", .. }),
        "{err:?}"
    );
    assert!(server.log.authenticated().is_empty());
}

#[tokio::test]
async fn test_untrusted_host_key_is_rejected_at_its_hop() {
    let server = TestSshServer::start().await;
    let relay = server
        .password_hop()
        .with_host_key_policy(HostKeyPolicy::Trusted(vec![TestSshServer::fingerprint()]));
    let target = server
        .password_hop()
        .with_host_key_policy(HostKeyPolicy::Trusted(vec![
            "SHA256:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
        ]));

    let err = build_chain(&connector(), &[&relay, &target])
        .await
        .unwrap_err();
    match err {
        ChainError::HostKeyRejected {
            hop, fingerprint, ..
        } => {
            assert_eq!(hop, 1);
            assert_eq!(fingerprint, TestSshServer::fingerprint());
        }
        other => panic!("expected a host key rejection, got {other:?}"),
    }

    server.wait_for_ended(2).await;
    assert_eq!(server.log.authenticated(), [0]);
}

#[tokio::test]
async fn test_unanswered_tunnel_times_out_as_dial_error() {
    let server = TestSshServer::start_with(ServerBehavior {
        tunnel_stall: Some(Duration::from_secs(30)),
        ..ServerBehavior::default()
    })
    .await;
    let relay = server.password_hop();
    let target = server.password_hop();
    let connector = SshConnector::new().with_connect_timeout(Duration::from_secs(1));

    let started = Instant::now();
    let err = build_chain(&connector, &[&relay, &target])
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    match &err {
        ChainError::Dial { hop: 1, reason, .. } => {
            assert!(reason.contains("timed out"), "{reason}");
        }
        other => panic!("expected a dial timeout at hop 1, got {other:?}"),
    }
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
}
