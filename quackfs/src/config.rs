//! Layered configuration: a TOML file plus CLI overrides, `SPEC_FULL.md`
//! §7 "Configuration". Grounded on `pageserver`'s config idiom (a typed
//! struct deserialized from a file, a sibling `defaults` module of
//! `const`s) and `proxy/src/bin/proxy.rs`'s `clap`-derived CLI args for
//! the override layer.
//!
//! No dynamic reload: `spec.md` §1 lists config as out of scope for
//! *functional* behavior, and this loader is only the ambient stack that
//! gets a running process from zero to a mounted filesystem.

use camino::Utf8PathBuf;
use clap::Parser;
use serde::Deserialize;

pub mod defaults {
    pub const SWEEPER_INTERVAL_SECS: u64 = 600;
    pub const LOG_LEVEL: &str = "info";
    pub const OBJECT_STORE_PREFIX: &str = "";
}

/// CLI flags. Every field is optional so a flag only overrides the
/// corresponding value from the config file when actually passed, the
/// same override-only-what's-set discipline `ProxyCliArgs` observes.
#[derive(Parser, Debug)]
#[command(name = "quackfsd", about = "QuackFS: a FUSE-mounted, versioned storage engine for DuckDB files")]
pub struct CliArgs {
    /// Path to the TOML config file.
    #[arg(long, default_value = "quackfs.toml")]
    pub config: Utf8PathBuf,

    #[arg(long)]
    pub mount_point: Option<Utf8PathBuf>,

    #[arg(long)]
    pub metadata_dsn: Option<String>,

    #[arg(long)]
    pub object_store_bucket: Option<String>,

    #[arg(long)]
    pub object_store_prefix: Option<String>,

    #[arg(long)]
    pub wal_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    pub sweeper_interval_secs: Option<u64>,

    #[arg(long)]
    pub log_level: Option<String>,
}

/// The config file's schema. Every field here is required in the file
/// itself (no `#[serde(default)]`) except the ones `defaults` supplies;
/// `CliArgs` is what makes any of them optional to the operator.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct FileConfig {
    pub mount_point: Option<Utf8PathBuf>,
    pub metadata_dsn: Option<String>,
    pub object_store_bucket: Option<String>,
    pub object_store_prefix: Option<String>,
    pub wal_dir: Option<Utf8PathBuf>,
    pub sweeper_interval_secs: Option<u64>,
    pub log_level: Option<String>,
}

/// The fully resolved configuration `main` wires backends from.
#[derive(Debug, Clone)]
pub struct QuackFsConfig {
    pub mount_point: Utf8PathBuf,
    pub metadata_dsn: String,
    pub object_store_bucket: String,
    pub object_store_prefix: String,
    pub wal_dir: Utf8PathBuf,
    pub sweeper_interval_secs: u64,
    pub log_level: String,
}

impl QuackFsConfig {
    /// Reads `path` if present (a missing file falls back to an
    /// all-`None` `FileConfig`, since every field can also come from a
    /// CLI flag), then layers `cli` on top, then `defaults` for whatever
    /// neither supplied.
    pub fn load(path: &Utf8PathBuf, cli: &CliArgs) -> anyhow::Result<Self> {
        let file = match std::fs::read_to_string(path) {
            Ok(contents) => toml_edit::de::from_str::<FileConfig>(&contents)
                .map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => return Err(anyhow::anyhow!("reading {path}: {e}")),
        };

        Ok(Self {
            mount_point: cli
                .mount_point
                .clone()
                .or(file.mount_point)
                .ok_or_else(|| anyhow::anyhow!("mount_point not set (config file or --mount-point)"))?,
            metadata_dsn: cli
                .metadata_dsn
                .clone()
                .or(file.metadata_dsn)
                .ok_or_else(|| anyhow::anyhow!("metadata_dsn not set (config file or --metadata-dsn)"))?,
            object_store_bucket: cli
                .object_store_bucket
                .clone()
                .or(file.object_store_bucket)
                .ok_or_else(|| anyhow::anyhow!("object_store_bucket not set (config file or --object-store-bucket)"))?,
            object_store_prefix: cli
                .object_store_prefix
                .clone()
                .or(file.object_store_prefix)
                .unwrap_or_else(|| defaults::OBJECT_STORE_PREFIX.to_string()),
            wal_dir: cli
                .wal_dir
                .clone()
                .or(file.wal_dir)
                .ok_or_else(|| anyhow::anyhow!("wal_dir not set (config file or --wal-dir)"))?,
            sweeper_interval_secs: cli
                .sweeper_interval_secs
                .or(file.sweeper_interval_secs)
                .unwrap_or(defaults::SWEEPER_INTERVAL_SECS),
            log_level: cli
                .log_level
                .clone()
                .or(file.log_level)
                .unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("quackfsd").chain(args.iter().copied()))
    }

    #[test]
    fn cli_flags_fill_in_an_absent_config_file() {
        let args = cli(&[
            "--config",
            "/nonexistent/quackfs.toml",
            "--mount-point",
            "/mnt/quackfs",
            "--metadata-dsn",
            "postgres://localhost/quackfs",
            "--object-store-bucket",
            "quackfs-layers",
            "--wal-dir",
            "/var/lib/quackfs/wal",
        ]);
        let cfg = QuackFsConfig::load(&args.config, &args).unwrap();
        assert_eq!(cfg.mount_point, Utf8PathBuf::from("/mnt/quackfs"));
        assert_eq!(cfg.sweeper_interval_secs, defaults::SWEEPER_INTERVAL_SECS);
        assert_eq!(cfg.log_level, defaults::LOG_LEVEL);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let args = cli(&["--config", "/nonexistent/quackfs.toml"]);
        assert!(QuackFsConfig::load(&args.config, &args).is_err());
    }
}
