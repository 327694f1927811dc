#![allow(dead_code)]

use spanningtree_crypto::KeyStore;
use spanningtree_storage::{Database, NewUser};
use spanningtree_sync::{
    EnvelopeBuilder, HttpTransport, Peer, PeerDirectory, PeerTransport, SyncConfig, SyncService,
};
use spanningtree_types::{Identity, Meeting, MeetingId, Role, Timestamp, UserId};
use std::sync::Arc;
use tempfile::TempDir;

/// One node under test: its own key dir, database, peer file and service.
pub struct Node {
    pub email: String,
    pub identity: Identity,
    pub db: Database,
    pub service: SyncService,
    pub builder: EnvelopeBuilder,
    pub dir: TempDir,
}

impl Node {
    pub fn new(email: &str, role: Role, region: Option<&str>) -> Self {
        Self::with_db(email, role, region, Database::open_in_memory().unwrap())
    }

    pub fn with_db(email: &str, role: Role, region: Option<&str>, db: Database) -> Self {
        let transport = Arc::new(HttpTransport::new(SyncConfig::default().request_timeout).unwrap());
        Self::with_transport(email, role, region, db, transport)
    }

    pub fn with_transport(
        email: &str,
        role: Role,
        region: Option<&str>,
        db: Database,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let keypair = KeyStore::new(dir.path()).generate_and_store().unwrap();
        let builder = EnvelopeBuilder::from_key_dir(dir.path()).unwrap();
        let user = db
            .insert_user(&NewUser {
                email: email.to_string(),
                role,
                region: region.map(str::to_string),
                public_key: Some(keypair.verify_key().to_hex()),
            })
            .unwrap();
        let peers = PeerDirectory::load(dir.path().join("peers.json")).unwrap();
        let service = SyncService::new(
            user.identity(),
            keypair,
            db.clone(),
            peers,
            transport,
            SyncConfig::default(),
        );
        Self {
            email: email.to_string(),
            identity: user.identity(),
            db,
            service,
            builder,
            dir,
        }
    }

    /// Registers `other` as a peer reachable at `address`, and as a local
    /// user with the given role so exports can be filtered for them.
    pub async fn knows(&self, other: &Node, address: &str) {
        let role = other.identity.role;
        self.db
            .insert_user(&NewUser {
                email: other.email.clone(),
                role,
                region: other.identity.region.clone(),
                public_key: Some(other.service.verify_key().to_hex()),
            })
            .unwrap();
        self.service
            .add_peer(Peer::new(&other.email, other.service.verify_key(), address))
            .await
            .unwrap();
    }
}

/// Serves the node's `/sync` router on an OS-assigned port, returning the
/// base URL.
pub async fn serve(service: &SyncService) -> String {
    let app = service.router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

pub fn meeting(city: &str, state: &str, host: i64, last_modified: i64) -> Meeting {
    Meeting {
        city: city.into(),
        host_id: UserId::new(host),
        id: MeetingId::new(),
        invited_by: None,
        last_modified: Some(Timestamp::from_secs(last_modified)),
        notes: String::new(),
        state: state.into(),
        title: format!("{city} meeting"),
    }
}
