//! `quackfsd`: CLI parsing, logging init, backend wiring and the mount
//! loop, `SPEC_FULL.md` §2/§5a. Grounded on
//! `proxy/src/bin/proxy.rs`'s startup shape (`clap` args → `anyhow`
//! `.context`-annotated setup → long-running loop) adapted to a single
//! local process instead of a fleet of connection handlers.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use quackfs::catalog::postgres::PostgresCatalog;
use quackfs::config::{CliArgs, QuackFsConfig};
use quackfs::fuse_adaptor::QuackFsFilesystem;
use quackfs::manager::Manager;
use quackfs::object_store::s3::S3ObjectStore;
use quackfs::wal_store::local_fs::LocalFsWalStore;
use quackfs::{metrics, sweeper};
use tokio_util::sync::CancellationToken;

fn init_tracing(log_level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    let config = QuackFsConfig::load(&cli.config, &cli).context("loading configuration")?;

    init_tracing(&config.log_level);
    metrics::describe();

    tracing::info!(
        mount_point = %config.mount_point,
        metadata_dsn = %config.metadata_dsn,
        bucket = %config.object_store_bucket,
        "starting quackfsd"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let handle = runtime.handle().clone();

    let s3_client = runtime.block_on(async {
        let aws_cfg = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
        aws_sdk_s3::Client::new(&aws_cfg)
    });

    let catalog = PostgresCatalog::connect(&config.metadata_dsn, handle.clone())
        .context("connecting to metadata catalog")?;
    let object_store = S3ObjectStore::new(s3_client.clone(), config.object_store_bucket.clone(), handle.clone());
    let manager = Arc::new(Manager::new(Box::new(catalog), Box::new(object_store)));

    let wal_store = Arc::new(
        LocalFsWalStore::new(config.wal_dir.clone()).context("initializing WAL sidecar directory")?,
    );
    {
        let manager = Arc::clone(&manager);
        wal_store.set_remove_hook(move |data_filename| manager.on_wal_remove(data_filename));
    }

    // The sweeper reads through its own catalog/object-store handles
    // rather than through `Manager`, since `Manager`'s write lock must
    // cover every access to its collaborators (`spec.md` §5) and the
    // sweeper is an independent, best-effort background reader that has
    // no business contending for it.
    let sweeper_catalog = PostgresCatalog::connect(&config.metadata_dsn, handle.clone())
        .context("connecting to metadata catalog (sweeper)")?;
    let sweeper_object_store = S3ObjectStore::new(s3_client, config.object_store_bucket.clone(), handle.clone());

    let cancel = CancellationToken::new();
    let _sweeper = sweeper::spawn(
        Arc::new(sweeper_catalog),
        Arc::new(sweeper_object_store),
        std::time::Duration::from_secs(config.sweeper_interval_secs),
        cancel.clone(),
        &handle,
    );

    let options = vec![
        fuser::MountOption::FSName("quackfs".to_string()),
        fuser::MountOption::AutoUnmount,
    ];
    let filesystem = QuackFsFilesystem::new(manager, wal_store);

    let result = fuser::mount2(filesystem, &config.mount_point, &options).context("mounting quackfs");

    cancel.cancel();
    result
}
