use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use std::{env, fmt, path::PathBuf};

pub const ENV_ENDPOINT: &str = "CEPH_RGW_ENDPOINT";
pub const ENV_ACCESS_KEY: &str = "CEPH_RGW_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "CEPH_RGW_SECRET_KEY";
pub const ENV_ZONE: &str = "CEPH_RGW_ZONE";
pub const ENV_STATE_URL: &str = "RGW_PROVIDER_STATE_URL";

const DEFAULT_ZONE: &str = "default";
const DEFAULT_STATE_URL: &str = "sqlite://./rgw-provider.db";

/// Command line of the provider binary.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Reconcile Ceph RGW buckets and users against a declarative manifest"
)]
pub struct Cli {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Gateway and state settings shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderArgs {
    /// Gateway endpoint URL (overrides CEPH_RGW_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Admin access key (overrides CEPH_RGW_ACCESS_KEY)
    #[arg(long, global = true)]
    pub access_key: Option<String>,

    /// Admin secret key (overrides CEPH_RGW_SECRET_KEY)
    #[arg(long, global = true)]
    pub secret_key: Option<String>,

    /// Zone, used as the data-plane region (overrides CEPH_RGW_ZONE)
    #[arg(long, global = true)]
    pub zone: Option<String>,

    /// Tracked state database (overrides RGW_PROVIDER_STATE_URL)
    #[arg(long, global = true)]
    pub state_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the tracked-state tables and exit
    Migrate,
    /// Converge the gateway onto a manifest
    Apply {
        /// JSON manifest with `buckets` and `users`
        #[arg(long)]
        manifest: PathBuf,

        /// Entities reconciled at once within a phase
        #[arg(long, default_value_t = 4)]
        parallelism: usize,
    },
    /// Re-read every tracked entity
    Refresh,
    /// Delete every tracked entity
    Destroy,
    /// Start tracking an existing entity
    Import {
        #[command(subcommand)]
        target: ImportTarget,
    },
    /// Inspect one bucket
    Bucket {
        #[command(subcommand)]
        command: BucketCommand,
    },
    /// Inspect all buckets
    Buckets {
        #[command(subcommand)]
        command: BucketsCommand,
    },
    /// Inspect or rotate one user
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ImportTarget {
    Bucket { name: String },
    User { id: String },
}

#[derive(Subcommand, Debug)]
pub enum BucketCommand {
    Show { name: String },
}

#[derive(Subcommand, Debug)]
pub enum BucketsCommand {
    List {
        /// Keep buckets whose name contains this substring
        #[arg(long)]
        name: Option<String>,

        /// Keep buckets owned by this user
        #[arg(long)]
        owner: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    Show {
        id: String,

        /// Print the secret key instead of a mask
        #[arg(long)]
        reveal: bool,
    },
    /// Replace the tracked user's key pair with a generated one
    RotateKeys { id: String },
}

impl Command {
    /// Whether the subcommand talks to the gateway.
    pub fn needs_gateway(&self) -> bool {
        !matches!(self, Command::Migrate)
    }

    /// Whether the subcommand reads or writes tracked state.
    pub fn needs_state(&self) -> bool {
        !matches!(
            self,
            Command::Bucket { .. } | Command::Buckets { .. } | Command::User {
                command: UserCommand::Show { .. }
            }
        )
    }
}

/// Resolved gateway connection settings.
#[derive(Clone)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub zone: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("zone", &self.zone)
            .finish()
    }
}

impl ProviderConfig {
    /// Flags win over the environment; every missing or empty value is
    /// reported at once.
    pub fn resolve(args: &ProviderArgs, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pick = |flag: &Option<String>, var: &str| flag.clone().or_else(|| env(var)).unwrap_or_default();

        let endpoint = pick(&args.endpoint, ENV_ENDPOINT);
        let access_key = pick(&args.access_key, ENV_ACCESS_KEY);
        let secret_key = pick(&args.secret_key, ENV_SECRET_KEY);
        let mut zone = pick(&args.zone, ENV_ZONE);
        if zone.is_empty() {
            zone = DEFAULT_ZONE.to_string();
        }

        let missing = [
            ("endpoint", "--endpoint", ENV_ENDPOINT, &endpoint),
            ("access key", "--access-key", ENV_ACCESS_KEY, &access_key),
            ("secret key", "--secret-key", ENV_SECRET_KEY, &secret_key),
        ]
        .into_iter()
        .filter(|(_, _, _, value)| value.is_empty())
        .map(|(what, flag, var, _)| format!("missing or empty Ceph RGW {what}: pass {flag} or set {var}"))
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            bail!(missing.join("; "));
        }

        Ok(Self {
            endpoint,
            access_key,
            secret_key,
            zone,
        })
    }

    pub fn from_env_and_args(args: &ProviderArgs) -> Result<Self> {
        Self::resolve(args, |var| env::var(var).ok())
    }
}

/// Tracked state location: flag, then environment, then the local default.
pub fn state_url(args: &ProviderArgs, env: impl Fn(&str) -> Option<String>) -> String {
    args.state_url
        .clone()
        .or_else(|| env(ENV_STATE_URL))
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_STATE_URL.to_string())
}
