#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Space Data Network node entrypoint (systemd-friendly).
//!
//! Wires the eight core components (identity/trust, auth, streaming,
//! envelope, audit, plugins, networking, monitoring) into one running
//! process: opens the durable stores, starts the gossip transport,
//! serves the admin HTTP surface, and shuts down cleanly on signal.

use std::sync::Arc;
use std::time::Duration;

use sdn_node::admin::{self, AllowAllCapabilityVerifier, SessionCapabilityVerifier};
use sdn_node::audit::{event_types, AuditLog, Severity};
use sdn_node::auth::routes::AuthState;
use sdn_node::auth::{ChallengeStore, SessionStore};
use sdn_node::config::{NodeConfig, NodeMode};
use sdn_node::identity::xpub::Xpub;
use sdn_node::identity::{serialize_xpub, KeyManager};
use sdn_node::monitoring::metrics::Metrics;
use sdn_node::networking::p2p::{spawn_p2p, P2pConfig};
use sdn_node::plugins::catalog::PluginCatalog;
use sdn_node::plugins::routes::{CapabilityVerifier, PluginState};
use sdn_node::streaming::manager::StreamingManager;
use sdn_node::trust::rate_limit::PeerRateLimiter;
use sdn_node::trust::TrustRegistry;

use tracing::{info, warn};

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

const CLEANUP_SWEEP_SECS: u64 = 60;
const RATE_LIMIT_BUCKET_IDLE: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let config_path = env("SDN_CONFIG", "./sdn.toml");
    let config = match NodeConfig::load(std::path::Path::new(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config {config_path}: {e}");
            std::process::exit(1);
        }
    };

    let storage_root = config.storage.resolved_path();
    if let Err(e) = std::fs::create_dir_all(&storage_root) {
        eprintln!("failed to create storage root {storage_root:?}: {e}");
        std::process::exit(1);
    }

    let metrics = Arc::new(Metrics::new().expect("metrics registry init failed"));

    let first_run = !storage_root.join("keys").join("signing_private.key").exists();
    let keys = match KeyManager::load_or_create(&storage_root, None) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("identity load/create failed: {e}");
            std::process::exit(1);
        }
    };
    let node_xpub = serialize_xpub(&Xpub {
        depth: 0,
        parent_fingerprint: [0u8; 4],
        child_number: 0,
        chain_code: [0u8; 32],
        public_key: keys.signing_public_key(),
    });

    let peers_db = match sled::open(storage_root.join("peers.db")) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to open peers.db: {e}");
            std::process::exit(1);
        }
    };
    let audit_db = match sled::open(storage_root.join("audit.db")) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to open audit.db: {e}");
            std::process::exit(1);
        }
    };

    let trust = Arc::new(
        TrustRegistry::open(&peers_db, config.peers.strict_mode, &config.peers.trusted_peers)
            .expect("trust registry open failed"),
    );
    let audit = Arc::new(AuditLog::open(&audit_db).expect("audit log open failed"));

    if first_run {
        let _ = audit.append(
            event_types::SETUP_START,
            Severity::Info,
            &node_xpub,
            "127.0.0.1",
            "node",
            &node_xpub,
            "first run: generating identity",
            "{}",
        );
        let _ = audit.append(
            event_types::KEY_GENERATE,
            Severity::Info,
            &node_xpub,
            "127.0.0.1",
            "identity",
            &node_xpub,
            "signing and encryption keys derived",
            "{}",
        );
        let _ = audit.append(
            event_types::SETUP_COMPLETE,
            Severity::Info,
            &node_xpub,
            "127.0.0.1",
            "node",
            &node_xpub,
            "first run setup complete",
            "{}",
        );
    }
    let _ = audit.append(
        event_types::SERVER_START,
        Severity::Info,
        &node_xpub,
        "127.0.0.1",
        "node",
        &node_xpub,
        "node starting",
        "{}",
    );

    let rate_limiter = Arc::new(PeerRateLimiter::new(
        config.network.max_messages_per_second,
        config.network.rate_limit_burst,
    ));

    let streaming = Arc::new(StreamingManager::default());

    let auth_state = Arc::new(AuthState {
        challenges: ChallengeStore::new(),
        sessions: SessionStore::new(config.admin.session_expiry()),
        trust: Arc::clone(&trust),
        audit: Arc::clone(&audit),
        tls: false,
    });

    let plugin_state = if config.mode == NodeMode::Full {
        let plugins_root = storage_root.join("plugins");
        let catalog = PluginCatalog::load(&plugins_root).unwrap_or_else(|e| {
            warn!(?e, root = ?plugins_root, "plugin catalog unavailable; serving an empty manifest");
            PluginCatalog::default()
        });
        let verifier: Box<dyn CapabilityVerifier> = if config.admin.require_auth {
            Box::new(SessionCapabilityVerifier::new(Arc::clone(&auth_state), "plugins.read"))
        } else {
            warn!("admin.require_auth=false: every plugin request is granted the base scope unconditionally");
            Box::new(AllowAllCapabilityVerifier::new("plugins.read"))
        };
        Arc::new(PluginState { catalog, issuer: node_xpub.clone(), capability_verifier: verifier })
    } else {
        info!("edge mode: plugin hosting disabled, serving an empty manifest");
        Arc::new(PluginState {
            catalog: PluginCatalog::default(),
            issuer: node_xpub.clone(),
            capability_verifier: Box::new(AllowAllCapabilityVerifier::new("none")),
        })
    };

    let p2p_data_dir = storage_root.join("p2p").to_string_lossy().to_string();
    let p2p_cfg = P2pConfig {
        listen_addr: config.network.listen.first().cloned().unwrap_or_else(|| "/ip4/0.0.0.0/tcp/4001".to_string()),
        topics: streaming.required_topics().into_iter().collect(),
        max_msg_per_sec: config.network.max_messages_per_second,
        max_peers_per_ip: 8,
        data_dir: p2p_data_dir,
        bootstrap: Vec::new(),
        allow_peers: if config.peers.strict_mode { config.peers.trusted_peers.clone() } else { Vec::new() },
    };

    info!(mode = ?config.mode, storage = ?storage_root, xpub = %node_xpub, "sdn node starting");

    let (mut p2p_node, mut p2p_events, p2p_handle) = match spawn_p2p(p2p_cfg, Arc::clone(&metrics)) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("p2p start failed: {e}");
            std::process::exit(1);
        }
    };

    let streaming_for_inbound = Arc::clone(&streaming);
    let metrics_for_inbound = Arc::clone(&metrics);
    let trust_for_inbound = Arc::clone(&trust);
    let rate_limiter_for_inbound = Arc::clone(&rate_limiter);
    let trust_based_rate_limiting = config.peers.trust_based_rate_limiting;
    let inbound_task = tokio::spawn(async move {
        while let Some((peer_id, topic, bytes)) = p2p_node.inbound().recv().await {
            let Some(schema) = topic.strip_prefix("/sdn/data/") else { continue };
            let from_peer = bs58::encode(&peer_id).into_string();

            let level = if trust_based_rate_limiting {
                trust_for_inbound.classify(&from_peer).unwrap_or(sdn_node::trust::TrustLevel::Standard)
            } else {
                sdn_node::trust::TrustLevel::Standard
            };
            if !rate_limiter_for_inbound.allow(&from_peer, level, 1) {
                metrics_for_inbound.trust_rate_limited_total.inc();
                continue;
            }

            let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
                metrics_for_inbound.p2p_invalid_msg_total.inc();
                continue;
            };
            streaming_for_inbound.process_message(schema, &value, &bytes, &from_peer, false, |_delivery| {
                metrics_for_inbound.streaming_messages_delivered_total.inc();
            });
        }
    });

    let events_task = tokio::spawn(async move {
        while let Some(ev) = p2p_events.recv().await {
            info!(?ev, "p2p event");
        }
    });

    let streaming_for_sweep = Arc::clone(&streaming);
    let rate_limiter_for_sweep = Arc::clone(&rate_limiter);
    let mut sweep_interval = tokio::time::interval(Duration::from_secs(CLEANUP_SWEEP_SECS));
    let sweep_task = tokio::spawn(async move {
        loop {
            sweep_interval.tick().await;
            let expired = streaming_for_sweep.cleanup_expired_sessions();
            if expired > 0 {
                info!(expired, "swept idle streaming sessions");
            }
            rate_limiter_for_sweep.sweep(RATE_LIMIT_BUCKET_IDLE);
        }
    });

    let router = admin::build_router(Arc::clone(&auth_state), plugin_state, Arc::clone(&metrics));

    let listen_addr = config.admin.listen_addr.clone();
    if config.admin.enabled {
        let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
            Ok(l) => l,
            Err(e) => {
                eprintln!("admin listener bind failed on {listen_addr}: {e}");
                std::process::exit(1);
            }
        };
        info!(addr = %listen_addr, "admin http surface listening");
        let _ = axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await;
    } else {
        shutdown_signal().await;
    }

    let _ = audit.append(
        event_types::SERVER_STOP,
        Severity::Info,
        &node_xpub,
        "127.0.0.1",
        "node",
        &node_xpub,
        "node stopping",
        "{}",
    );

    inbound_task.abort();
    events_task.abort();
    sweep_task.abort();
    p2p_handle.abort();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    warn!("shutdown signal received");
}
