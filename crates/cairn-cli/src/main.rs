mod commands;

use cairn_core::{CairnConfig, Engine};
use cairn_runtime::{select_driver, ContainerDriver, HostInfo, MockHost, SystemHost};
use cairn_schema::ContainerType;
use cairn_store::StoreLayout;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_STORE_ERROR, EXIT_USAGE_ERROR};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "cairn",
    version,
    about = "Manage lightweight containers for legacy desktop applications"
)]
struct Cli {
    /// Path to the Cairn store directory.
    #[arg(long, env = "CAIRN_STORE", default_value = "~/.local/share/cairn")]
    store: String,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Lxc,
    Lxd,
    Chroot,
}

impl From<KindArg> for ContainerType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Lxc => ContainerType::Lxc,
            KindArg::Lxd => ContainerType::Lxd,
            KindArg::Chroot => ContainerType::Chroot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AddRemove {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnableDisable {
    Enable,
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new container.
    Create {
        /// Container id: lowercase letters, digits, '+', '.' and '-'.
        #[arg(short, long)]
        id: String,
        /// Human-readable name.
        #[arg(short, long)]
        name: Option<String>,
        /// Container type (default: lxd, then lxc, then chroot, by host support).
        #[arg(short = 't', long = "type", value_enum)]
        kind: Option<KindArg>,
        /// Ubuntu release codename (default: the host's release).
        #[arg(short, long)]
        distro: Option<String>,
        /// Enable i386 multiarch support.
        #[arg(short, long, default_value_t = false)]
        multiarch: bool,
        /// Prompt for a password for the container user.
        #[arg(long, default_value_t = false)]
        password: bool,
        /// Accept a distro the host does not list as valid.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Destroy a container.
    Destroy {
        #[arg(short, long)]
        id: Option<String>,
        /// Ask the backend to tear down a running container.
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },
    /// Update the locale and upgrade all packages of a container.
    Update {
        #[arg(short, long)]
        id: Option<String>,
    },
    /// Install one or more packages.
    InstallPackage {
        #[arg(short, long)]
        id: Option<String>,
        #[arg(required = true)]
        packages: Vec<String>,
        /// Let the package manager ask questions.
        #[arg(long, default_value_t = false)]
        interactive: bool,
    },
    /// Remove one or more packages.
    RemovePackage {
        #[arg(short, long)]
        id: Option<String>,
        #[arg(required = true)]
        packages: Vec<String>,
        #[arg(long, default_value_t = false)]
        interactive: bool,
    },
    /// Search the package cache of a container.
    SearchCache {
        #[arg(short, long)]
        id: Option<String>,
        query: String,
    },
    /// Run a command inside a container.
    Exec {
        #[arg(short, long)]
        id: Option<String>,
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Change archives, bind mounts, multiarch or freeze settings.
    Configure {
        #[arg(short, long)]
        id: Option<String>,
        #[arg(long, value_enum, requires = "archive_name")]
        archive: Option<AddRemove>,
        /// APT line or PPA to add or remove.
        #[arg(long)]
        archive_name: Option<String>,
        #[arg(long, value_enum, requires = "bind_mount_path")]
        bind_mount: Option<AddRemove>,
        /// Host path to bind into the container.
        #[arg(long)]
        bind_mount_path: Option<String>,
        #[arg(long, value_enum)]
        multiarch: Option<EnableDisable>,
        /// Freeze the container instead of stopping it (lxc/lxd only).
        #[arg(long, value_enum)]
        freeze: Option<OnOff>,
    },
    /// Restart a container.
    Restart {
        #[arg(short, long)]
        id: Option<String>,
    },
    /// Change the human-readable name of a container.
    Rename {
        #[arg(short, long)]
        id: Option<String>,
        name: String,
    },
    /// List all containers.
    List,
    /// List the packages recorded for a container.
    ListApps {
        #[arg(short, long)]
        id: Option<String>,
    },
    /// List the archives recorded for a container.
    ListArchives {
        #[arg(short, long)]
        id: Option<String>,
    },
    /// List the bind mounts recorded for a container.
    ListBindMounts {
        #[arg(short, long)]
        id: Option<String>,
    },
    /// Make a container the default target.
    SetDefault {
        #[arg(short, long)]
        id: String,
    },
    /// Unset the default container.
    ClearDefault {
        /// Skip the confirmation prompt.
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Print the default container.
    ShowDefault,
    /// Copy containers from another registry file.
    Merge { file: PathBuf },
    /// Repair records left behind by an interrupted run.
    FixIntegrity,
    /// Run diagnostic checks on the host and store.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CAIRN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli);

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("store error:") || msg.starts_with("store lock:") {
                EXIT_STORE_ERROR
            } else if msg.starts_with("invalid request:") {
                EXIT_USAGE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<u8, String> {
    if let Commands::Completions { shell } = cli.command {
        return commands::completions::run::<Cli>(shell);
    }

    let store_path = expand_tilde(&cli.store);
    let engine = build_engine(&store_path)?;
    let config = CairnConfig::load_default().map_err(|e| e.to_string())?;
    let json = cli.json;

    match cli.command {
        Commands::Create {
            id,
            name,
            kind,
            distro,
            multiarch,
            password,
            force,
        } => commands::create::run(
            &engine,
            &config,
            commands::create::CreateArgs {
                id,
                name,
                kind: kind.map(ContainerType::from),
                distro,
                multiarch,
                ask_password: password,
                force,
            },
            json,
        ),
        Commands::Destroy { id, force } => {
            commands::destroy::run(&engine, id.as_deref(), force, json)
        }
        Commands::Update { id } => commands::update::run(&engine, id.as_deref(), json),
        Commands::InstallPackage {
            id,
            packages,
            interactive,
        } => commands::packages::install(
            &engine,
            id.as_deref(),
            &packages,
            interactive || config.interactive,
            json,
        ),
        Commands::RemovePackage {
            id,
            packages,
            interactive,
        } => commands::packages::remove(
            &engine,
            id.as_deref(),
            &packages,
            interactive || config.interactive,
            json,
        ),
        Commands::SearchCache { id, query } => {
            commands::search_cache::run(&engine, id.as_deref(), &query)
        }
        Commands::Exec { id, command } => commands::exec::run(&engine, id.as_deref(), &command),
        Commands::Configure {
            id,
            archive,
            archive_name,
            bind_mount,
            bind_mount_path,
            multiarch,
            freeze,
        } => commands::configure::run(
            &engine,
            id.as_deref(),
            &commands::configure::ConfigureArgs {
                archive: archive.zip(archive_name),
                bind_mount: bind_mount.zip(bind_mount_path),
                multiarch: multiarch.map(|m| m == EnableDisable::Enable),
                freeze: freeze.map(|f| f == OnOff::On),
            },
            json,
        ),
        Commands::Restart { id } => commands::restart::run(&engine, id.as_deref(), json),
        Commands::Rename { id, name } => {
            commands::rename::run(&engine, id.as_deref(), &name, json)
        }
        Commands::List => commands::list::containers(&engine, json),
        Commands::ListApps { id } => commands::list::apps(&engine, id.as_deref(), json),
        Commands::ListArchives { id } => commands::list::archives(&engine, id.as_deref(), json),
        Commands::ListBindMounts { id } => {
            commands::list::bind_mounts(&engine, id.as_deref(), json)
        }
        Commands::SetDefault { id } => commands::default::set(&engine, &id, json),
        Commands::ClearDefault { yes } => commands::default::clear(&engine, yes, json),
        Commands::ShowDefault => commands::default::show(&engine, json),
        Commands::Merge { file } => commands::merge::run(&engine, &file, json),
        Commands::FixIntegrity => commands::fix_integrity::run(&engine, json),
        Commands::Doctor => commands::doctor::run(&engine, json),
        Commands::Completions { .. } => Ok(commands::EXIT_SUCCESS),
    }
}

/// `CAIRN_DRIVER=mock` swaps in the recording driver and a fixed mock host.
fn build_engine(store_path: &Path) -> Result<Engine, String> {
    let driver_name = std::env::var("CAIRN_DRIVER").unwrap_or_else(|_| "process".to_owned());
    let driver: Arc<dyn ContainerDriver> =
        Arc::from(select_driver(&driver_name).map_err(|e| e.to_string())?);
    let host: Arc<dyn HostInfo> = if driver_name == "mock" {
        Arc::new(MockHost::default())
    } else {
        Arc::new(SystemHost::new())
    };
    Ok(Engine::new(StoreLayout::new(store_path), driver, host))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
