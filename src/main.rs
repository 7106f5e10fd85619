//! perfkit demo - drives every toolkit component through a simulated
//! read-heavy workload against in-memory shard backends.
//!
//! # Startup Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load configuration from environment variables
//! 3. Build the shard router, caches, coalescing group and batch worker
//! 4. Start background TTL cleanup task
//! 5. Run the workload until it completes or a shutdown signal arrives
//! 6. Flush the batch worker and report statistics

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perfkit::shard::{generate_int_id, int_to_key};
use perfkit::{
    spawn_cleanup_task, BatchSender, BatchWorker, BatchWorkerConfig, CoalescingGroup, Config,
    MultiValueCache, ShardRouter, SlicePool, TypedCache,
};

const WORKERS: u64 = 8;
const REQUESTS_PER_WORKER: u64 = 200;
const DISTINCT_USERS: u64 = 50;

/// Stand-in for a database connection owned by one shard.
#[derive(Debug)]
struct Backend {
    name: String,
}

impl Backend {
    async fn fetch_profile(&self, user_id: u64) -> Result<String, String> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(format!("user-{user_id}@{}", self.name))
    }
}

#[derive(Debug, Clone)]
struct AccessRecord {
    id: u64,
    user_id: u64,
    cached: bool,
}

/// Shared application state handed to every request task.
struct AppContext {
    router: ShardRouter<Arc<Backend>>,
    lookups: CoalescingGroup<String, String>,
    profiles: Arc<TypedCache<u64, String>>,
    history: MultiValueCache<u64, String>,
    access_log: BatchSender<AccessRecord>,
}

impl AppContext {
    async fn profile(&self, user_id: u64) -> Result<String, String> {
        if let Some(profile) = self.profiles.get(&user_id) {
            self.record(user_id, true).await;
            return Ok(profile);
        }

        let backend = self.router.get_shard(int_to_key(user_id));
        let (result, _shared) = self
            .lookups
            .call(&user_id.to_string(), || backend.fetch_profile(user_id))
            .await;

        if let Ok(profile) = &result {
            self.profiles.set(user_id, profile.clone());
            self.history.append(user_id, backend.name.clone());
        }
        self.record(user_id, false).await;
        result
    }

    async fn record(&self, user_id: u64, cached: bool) {
        let id = match generate_int_id() {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "access record id not issued");
                return;
            }
        };
        let record = AccessRecord {
            id,
            user_id,
            cached,
        };
        if let Err(err) = self.access_log.send(record).await {
            warn!(error = %err, "access record not queued");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perfkit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting perfkit demo");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: batch_interval={}ms, batch_capacity={}, overflow={}, shards={}",
        config.batch_interval_ms, config.batch_capacity, config.batch_overflow, config.shards
    );

    let router = config
        .shards
        .build_router(|name| {
            Ok(Arc::new(Backend {
                name: name.to_string(),
            }))
        })
        .context("failed to build shard router")?;

    let profiles: Arc<TypedCache<u64, String>> =
        Arc::new(TypedCache::with_default_ttl(Duration::from_secs(30)));
    let cleanup_handle = spawn_cleanup_task(profiles.clone(), config.cache_cleanup_interval());

    let (access_log, worker) = BatchWorker::new(BatchWorkerConfig::from(&config))?;
    let worker_handle = worker.spawn(|batch: Vec<AccessRecord>| async move {
        let hits = batch.iter().filter(|r| r.cached).count();
        info!(
            size = batch.len(),
            hits,
            first_id = batch.first().map(|r| r.id),
            first_user = batch.first().map(|r| r.user_id),
            "persisting access batch"
        );
    });

    let ctx = Arc::new(AppContext {
        router,
        lookups: CoalescingGroup::new(),
        profiles,
        history: MultiValueCache::new(),
        access_log,
    });

    tokio::select! {
        _ = run_workload(Arc::clone(&ctx)) => info!("Workload complete"),
        _ = shutdown_signal() => warn!("Workload interrupted"),
    }

    report(&ctx);

    cleanup_handle.abort();
    // Dropping the last sender lets the worker flush and exit.
    drop(ctx);
    worker_handle.await.context("batch worker failed")?;

    info!("Shutdown complete");
    Ok(())
}

async fn run_workload(ctx: Arc<AppContext>) {
    let mut tasks = JoinSet::new();
    for worker in 0..WORKERS {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move {
            for i in 0..REQUESTS_PER_WORKER {
                let user_id = (worker * 7 + i) % DISTINCT_USERS;
                if let Err(err) = ctx.profile(user_id).await {
                    warn!(user_id, error = %err, "profile lookup failed");
                }
            }
        });
    }
    while tasks.join_next().await.is_some() {}
}

/// Logs cache statistics and a per-shard fan-out summary.
fn report(ctx: &AppContext) {
    let stats = ctx.profiles.stats();
    info!(
        "Profile cache: hits={}, misses={}, entries={}, hit_rate={:.2}",
        stats.hits,
        stats.misses,
        stats.total_entries,
        stats.hit_rate()
    );

    let buffers: SlicePool<u64> = SlicePool::new(DISTINCT_USERS as usize);
    for index in 0..ctx.router.len() {
        let Some(backend) = ctx.router.get_shard_by_index(index) else {
            continue;
        };
        let mut owned = buffers.acquire();
        owned.extend(
            (0..DISTINCT_USERS)
                .filter(|id| ctx.router.shard_index(int_to_key(*id)) == index)
                .filter(|id| !ctx.history.get(id).is_empty()),
        );
        info!(shard = %backend.name, users = owned.len(), "shard summary");
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating shutdown..."),
    }
}
