//! izlek-sync binary entrypoint: refreshes the cached study plan, enters the remembered
//! room and streams its live view to the log until interrupted.

use std::{env, sync::Arc};

use anyhow::Context;
use tokio_stream::{StreamExt, wrappers::WatchStream};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use izlek_sync::{
    config::AppConfig,
    dao::{
        cache_store::{CacheStore, FileRecordStore},
        models::Participant,
        remote::{
            Backend,
            http::{HttpBackend, HttpBackendConfig},
        },
    },
    dto::format_clock_time,
    services::{
        room_sync::{RoomContext, RoomEvent, RoomSyncClient, RoomSyncConfig},
        sync_coordinator::SyncCoordinator,
    },
    state::{RoomSnapshot, SystemClock},
};

const IDENTITY_ENV: &str = "IZLEK_IDENTITY";
const ROOM_ID_ENV: &str = "IZLEK_ROOM_ID";
const USER_ID_ENV: &str = "IZLEK_USER_ID";
const USER_NAME_ENV: &str = "IZLEK_USER_NAME";
const USER_FIELD_ENV: &str = "IZLEK_USER_FIELD";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let identity = env::var(IDENTITY_ENV)
        .with_context(|| format!("{IDENTITY_ENV} must name the local identity"))?;

    let backend_config = HttpBackendConfig::from_env().context("reading backend configuration")?;
    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::connect(backend_config).context("building backend client")?);
    let cache = CacheStore::new(Arc::new(FileRecordStore::new(config.cache_dir().clone())));

    refresh_programs(backend.clone(), cache.clone(), &identity).await;

    let Some(context) = room_context(&cache, &identity) else {
        warn!(
            identity = %identity,
            "no room to enter; join one first or set {ROOM_ID_ENV}, {USER_ID_ENV} and {USER_NAME_ENV}"
        );
        return Ok(());
    };

    let (client, mut events) = RoomSyncClient::enter(
        backend,
        Arc::new(SystemClock),
        context,
        RoomSyncConfig::from(&config),
    );
    let mut snapshots = WatchStream::new(client.snapshots());
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(event) = events.recv() => log_event(&event),
            Some(snapshot) = snapshots.next() => log_snapshot(&snapshot),
            else => break,
        }
    }

    client.leave().await;
    Ok(())
}

/// Show cached programs right away, then reconcile them with the backend.
async fn refresh_programs(backend: Arc<dyn Backend>, cache: CacheStore, identity: &str) {
    let profile = cache.profile(identity);
    let mut coordinator = SyncCoordinator::new(backend, cache, identity);
    info!(programs = coordinator.hydrate(), "loaded cached programs");

    let Some(profile_id) = profile.profile_id else {
        info!(identity, "no profile cached yet; skipping program refresh");
        return;
    };

    let outcome = coordinator.refresh(&profile_id).await;
    let view = coordinator.view();
    match view.selected() {
        Some(program) => {
            let done = program.tasks.iter().filter(|task| task.completed).count();
            info!(
                ?outcome,
                stale = view.is_stale(),
                program_id = %program.id,
                done,
                total = program.tasks.len(),
                "program list synchronised"
            );
        }
        None => info!(?outcome, "no programs to show"),
    }
}

/// Room from the environment when fully specified, otherwise the one remembered in the cache.
fn room_context(cache: &CacheStore, identity: &str) -> Option<RoomContext> {
    let from_env = (
        env::var(ROOM_ID_ENV),
        env::var(USER_ID_ENV),
        env::var(USER_NAME_ENV),
    );
    if let (Ok(room_id), Ok(id), Ok(name)) = from_env {
        return Some(RoomContext {
            room_id,
            participant: Participant {
                id,
                name,
                study_field: env::var(USER_FIELD_ENV).ok(),
            },
        });
    }

    RoomContext::from_cache(cache, identity)
}

fn log_event(event: &RoomEvent) {
    match event {
        RoomEvent::TimeUp => info!("time is up"),
        RoomEvent::SyncFailed { stream, retryable } => {
            warn!(?stream, retryable, "room sync failed; showing last known data")
        }
        RoomEvent::StaleChanged(stale) => info!(stale, "room data freshness changed"),
        RoomEvent::MessagesApplied {
            total,
            new_messages,
            scroll,
        } => info!(total, new_messages, ?scroll, "chat updated"),
        other => debug!(event = ?other, "room event"),
    }
}

fn log_snapshot(snapshot: &RoomSnapshot) {
    let last = snapshot.clusters.last();
    debug!(
        room = snapshot.name.as_deref().unwrap_or("-"),
        timer = %snapshot.timer_display,
        phase = ?snapshot.timer_phase,
        participants = snapshot.participants.len(),
        messages = snapshot.messages.len(),
        last_sender = last.map(|cluster| cluster.sender_name.as_str()).unwrap_or("-"),
        last_at = %last.map(|cluster| format_clock_time(cluster.last_timestamp)).unwrap_or_default(),
        stale = snapshot.stale,
        "room view"
    );
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,izlek_sync=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
