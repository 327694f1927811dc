//! Spanning Tree node
//!
//! Serves `POST /sync` for peers and pushes local meetings to them.
//!
//! Usage:
//!   spanningtree init --email me@example.org --role facilitator
//!   spanningtree peer add --email them@example.org --public-key <hex> --address http://host:8000
//!   spanningtree meeting edit --id <uuid> --title "Moved to the library"
//!   spanningtree member add --name Ada --email ada@example.org --city nyc --state ny
//!   spanningtree audit list --limit 20
//!   spanningtree serve
//!   spanningtree sync

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use spanningtree_crypto::VerifyKey;
use spanningtree_node::{NodeConfig, init_node, open_database, open_service};
use spanningtree_storage::NewUser;
use spanningtree_sync::{Peer, SyncOutcome};
use spanningtree_types::{MeetingChanges, MeetingId, NewMeeting, NewMember, Role, UserId};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spanningtree")]
#[command(about = "Spanning Tree meeting sync node")]
struct Args {
    /// Path to the node config file
    #[arg(short, long, default_value = "spanningtree.toml")]
    config: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the node key, database and local user
    Init {
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        region: Option<String>,
    },
    /// Accept sync envelopes from peers
    Serve {
        /// Overrides `listen` from the config
        #[arg(long)]
        listen: Option<String>,
    },
    /// Manage local users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage pinned peers
    #[command(subcommand)]
    Peer(PeerCommand),
    /// Schedule, edit and list meetings
    #[command(subcommand)]
    Meeting(MeetingCommand),
    /// Manage community members
    #[command(subcommand)]
    Member(MemberCommand),
    /// Inspect the signed audit log
    #[command(subcommand)]
    Audit(AuditCommand),
    /// Push pending meetings to one peer or to all of them
    Sync {
        #[arg(long)]
        peer: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        region: Option<String>,
        /// Hex verify key of the user's node
        #[arg(long)]
        public_key: Option<String>,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum PeerCommand {
    /// Pin a peer's verify key and address
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        public_key: String,
        /// Base URL, e.g. http://10.0.0.2:8000
        #[arg(long)]
        address: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum MeetingCommand {
    /// Schedule a meeting hosted by the local user
    Schedule {
        #[arg(long)]
        title: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long)]
        invited_by: Option<i64>,
    },
    /// Edit a meeting the local user may see
    Edit {
        #[arg(long)]
        id: MeetingId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
    },
    /// List the meetings a user may see
    List {
        #[arg(long = "as")]
        viewer: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
    /// Add a member invited by the local user
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
    },
    /// List the members a user may see
    List {
        #[arg(long = "as")]
        viewer: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Newest entries first, with signature status
    List {
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let mut config = NodeConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    match args.command {
        Command::Init {
            email,
            role,
            region,
        } => {
            config.email = Some(email);
            config.save(&args.config)?;
            let report = init_node(&config, role, region)?;
            if report.generated_key {
                info!("generated node key in {}", config.key_dir().display());
            }
            println!("user        {} ({})", report.user.email, report.user.role);
            println!("verify key  {}", report.verify_key);
        }

        Command::Serve { listen } => {
            let service = open_service(&config)?;
            let addr = listen.unwrap_or_else(|| config.listen.clone());
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            info!(%addr, verify_key = %service.verify_key(), "serving /sync");
            axum::serve(listener, service.router())
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("sync server failed")?;
            info!("shut down");
        }

        Command::User(UserCommand::Add {
            email,
            role,
            region,
            public_key,
        }) => {
            if let Some(key) = &public_key {
                VerifyKey::from_hex(key).context("invalid --public-key")?;
            }
            let service = open_service(&config)?;
            let actor = service.identity().clone();
            let user = service.add_user(
                &actor,
                NewUser {
                    email,
                    role,
                    region,
                    public_key,
                },
            )?;
            println!("added user {} ({}) as id {}", user.email, user.role, user.id);
        }

        Command::User(UserCommand::List) => {
            for user in open_database(&config)?.list_users()? {
                println!(
                    "{:>4}  {:<32} {:<12} {}",
                    user.id.to_string(),
                    user.email,
                    user.role.as_str(),
                    user.region.as_deref().unwrap_or("-")
                );
            }
        }

        Command::Peer(PeerCommand::Add {
            email,
            public_key,
            address,
        }) => {
            let key = VerifyKey::from_hex(&public_key).context("invalid --public-key")?;
            let service = open_service(&config)?;
            service.add_peer(Peer::new(email.clone(), key, address)).await?;
            println!("pinned {email} ({key})");
        }

        Command::Peer(PeerCommand::List) => {
            let service = open_service(&config)?;
            for peer in service.list_peers().await {
                let last = peer
                    .last_synced
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!("{:<32} {:<28} last synced {}", peer.email, peer.address, last);
            }
        }

        Command::Meeting(MeetingCommand::Schedule {
            title,
            city,
            state,
            notes,
            invited_by,
        }) => {
            let service = open_service(&config)?;
            let host = service.identity().clone();
            let meeting = service.schedule_meeting(
                &host,
                NewMeeting {
                    title,
                    notes,
                    city,
                    state,
                    invited_by: invited_by.map(UserId::from),
                },
            )?;
            println!("scheduled {} ({})", meeting.title, meeting.id);
        }

        Command::Meeting(MeetingCommand::Edit {
            id,
            title,
            notes,
            city,
            state,
        }) => {
            let service = open_service(&config)?;
            let editor = service.identity().clone();
            let changes = MeetingChanges {
                title,
                notes,
                city,
                state,
            };
            let meeting = service.update_meeting(&editor, &id, changes)?;
            println!("updated {} ({})", meeting.title, meeting.id);
        }

        Command::Meeting(MeetingCommand::List { viewer }) => {
            let viewer = viewer_or_local(viewer, &config)?;
            let service = open_service(&config)?;
            for m in service.meetings_visible_to(&viewer)? {
                println!("{}  {:<32} {}, {}", m.id, m.title, m.city, m.state);
            }
        }

        Command::Member(MemberCommand::Add {
            name,
            email,
            city,
            state,
        }) => {
            let service = open_service(&config)?;
            let inviter = service.identity().clone();
            let member = service.add_member(
                &inviter,
                NewMember {
                    name,
                    email,
                    city,
                    state,
                },
            )?;
            println!("added member {} <{}> as id {}", member.name, member.email, member.id);
        }

        Command::Member(MemberCommand::List { viewer }) => {
            let viewer = viewer_or_local(viewer, &config)?;
            let service = open_service(&config)?;
            for m in service.members_visible_to(&viewer)? {
                println!(
                    "{:>4}  {:<24} {:<32} {}, {}  cc {}",
                    m.id, m.name, m.email, m.city, m.state, m.cc_score
                );
            }
        }

        Command::Audit(AuditCommand::List { limit, offset }) => {
            let service = open_service(&config)?;
            let viewer = service.identity().clone();
            for view in service.audit_log(&viewer, limit, offset)? {
                let r = &view.record;
                println!(
                    "{}  {:<8} {:<10} {:<38} by {:<6} {}",
                    r.timestamp,
                    r.action,
                    r.entity,
                    r.record_id.as_deref().unwrap_or("-"),
                    r.performed_by.map(|u| u.to_string()).unwrap_or_else(|| "-".into()),
                    if view.verified { "ok" } else { "BAD SIGNATURE" }
                );
            }
        }

        Command::Sync { peer } => {
            let service = open_service(&config)?;
            let outcomes = match peer {
                Some(email) => vec![service.sync_with(&email).await],
                None => service.sync_all().await,
            };
            let mut failed = 0;
            for outcome in &outcomes {
                match outcome {
                    SyncOutcome::Synced { email, sent, summary } => match summary {
                        Some(s) => println!(
                            "{email}: sent {sent}, inserted {}, updated {}, skipped {}",
                            s.inserted, s.updated, s.skipped
                        ),
                        None => println!("{email}: sent {sent}"),
                    },
                    SyncOutcome::Busy { email } => println!("{email}: already syncing"),
                    SyncOutcome::Failed { email, error } => {
                        failed += 1;
                        println!("{email}: failed: {error}");
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of {} peers failed", outcomes.len());
            }
        }
    }
    Ok(())
}

fn viewer_or_local(viewer: Option<String>, config: &NodeConfig) -> Result<String> {
    match viewer.or_else(|| config.email.clone()) {
        Some(v) => Ok(v),
        None => bail!("no viewer: pass --as or run `spanningtree init`"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
