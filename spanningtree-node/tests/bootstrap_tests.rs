use pretty_assertions::assert_eq;
use spanningtree_node::{NodeConfig, NodeError, init_node, open_database, open_service};
use spanningtree_storage::NewUser;
use spanningtree_sync::{Peer, SyncOutcome};
use spanningtree_types::{NewMeeting, Role};
use tempfile::TempDir;

fn config_in(dir: &TempDir, email: &str) -> NodeConfig {
    NodeConfig {
        email: Some(email.to_string()),
        data_dir: dir.path().join("data"),
        ..NodeConfig::default()
    }
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, "a@example.org");

    let first = init_node(&config, Role::Facilitator, None).unwrap();
    assert!(first.generated_key);
    assert!(config.key_dir().join("id_ed25519").exists());
    assert_eq!(first.user.public_key, Some(first.verify_key.to_hex()));

    let second = init_node(&config, Role::National, None).unwrap();
    assert!(!second.generated_key);
    assert_eq!(second.verify_key, first.verify_key);
    assert_eq!(second.user, first.user);
    assert_eq!(open_database(&config).unwrap().list_users().unwrap().len(), 1);
}

#[test]
fn init_requires_an_email() {
    let dir = TempDir::new().unwrap();
    let config = NodeConfig {
        data_dir: dir.path().to_path_buf(),
        ..NodeConfig::default()
    };
    let err = init_node(&config, Role::Connector, None).unwrap_err();
    assert!(matches!(err, NodeError::MissingEmail));
}

#[test]
fn service_needs_an_initialized_node() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, "a@example.org");
    assert!(matches!(open_service(&config), Err(NodeError::Crypto(_))));

    init_node(&config, Role::Facilitator, None).unwrap();
    let other = NodeConfig {
        email: Some("nobody@example.org".into()),
        ..config.clone()
    };
    assert!(matches!(open_service(&other), Err(NodeError::NoLocalUser(_))));
    assert!(open_service(&config).is_ok());
}

#[tokio::test]
async fn two_bootstrapped_nodes_sync() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let cfg_a = config_in(&dir_a, "a@example.org");
    let cfg_b = config_in(&dir_b, "b@example.org");
    let a = init_node(&cfg_a, Role::Facilitator, None).unwrap();
    let b = init_node(&cfg_b, Role::National, None).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let b_url = format!("http://{}", listener.local_addr().unwrap());

    // B pins A and serves.
    let service_b = open_service(&cfg_b).unwrap();
    service_b
        .add_peer(Peer::new("a@example.org", a.verify_key, "http://127.0.0.1:1"))
        .await
        .unwrap();
    let app = service_b.router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // A knows B as a user and pins it as a peer.
    open_database(&cfg_a)
        .unwrap()
        .insert_user(&NewUser {
            email: "b@example.org".into(),
            role: Role::National,
            region: None,
            public_key: Some(b.verify_key.to_hex()),
        })
        .unwrap();
    let service_a = open_service(&cfg_a).unwrap();
    service_a
        .add_peer(Peer::new("b@example.org", b.verify_key, b_url))
        .await
        .unwrap();

    let host = service_a.identity().clone();
    let meeting = service_a
        .schedule_meeting(
            &host,
            NewMeeting {
                title: "Neighbourhood walk".into(),
                notes: String::new(),
                city: "boston".into(),
                state: "ma".into(),
                invited_by: None,
            },
        )
        .unwrap();

    match service_a.sync_with("b@example.org").await {
        SyncOutcome::Synced { sent, summary, .. } => {
            assert_eq!(sent, 1);
            assert_eq!(summary.map(|s| s.inserted), Some(1));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(open_database(&cfg_b).unwrap().meeting(&meeting.id).unwrap(), Some(meeting));

    // The checkpoint was persisted to A's peer file.
    let reopened = open_service(&cfg_a).unwrap();
    assert!(reopened.peer("b@example.org").await.unwrap().last_synced.is_some());
}
