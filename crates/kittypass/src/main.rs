//! kittypass - Password vaults for the terminal
//!
//! Commands:
//! - add vault|login: Create a vault, or store a login in one
//! - get login: Decrypt and print a login
//! - list vault|login: Search vault or login metadata (no password needed)
//! - update vault|login: Rename, re-describe, change passwords
//! - delete vault|login: Remove a login, or a vault with all its logins
//! - dashboard: Browse vaults and logins interactively
//! - config: Show or initialize the configuration file

mod dashboard;
mod output;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use kittypass::{
    login, vault, CryptoParams, LoginChanges, OpenVault, PasswordGenerator, Storage, VaultRef,
};
use kittypass_core::{Config, Paths};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kittypass")]
#[command(about = "Password vaults for the terminal - every vault sealed by its own master password")]
#[command(version)]
#[command(after_help = "\
EXAMPLES:
    kittypass add vault -n work -d \"job accounts\"      Create a vault
    kittypass add login -v work -n email -u a@b.com    Store a login with a generated password
    kittypass add login -v work -n bank -u me -p       Store a login, typing the password
    kittypass get login -v work -n email               Decrypt a login
    kittypass list login -u a@b.com                    Find logins by username
    kittypass update vault -n work --rekey             Change a master password
    kittypass delete vault -n work                     Delete a vault and its logins
    kittypass dashboard                                Browse vaults in the terminal UI

SECURITY:
    - Master passwords and login passwords are only read from hidden prompts
    - Each vault key is derived with Argon2id, logins are sealed with XChaCha20-Poly1305
    - Changing a master password re-encrypts every login in one transaction

ENVIRONMENT:
    KTPS_DATABASE    Database file (overridden by --db)
    RUST_LOG         Log filter (overrides log_filter in the config file)")]
struct Cli {
    /// Database file to use
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file to use
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a vault or a login
    Add {
        #[command(subcommand)]
        target: AddTarget,
    },

    /// Decrypt and print a login
    Get {
        #[command(subcommand)]
        target: GetTarget,
    },

    /// List vaults or logins
    List {
        #[command(subcommand)]
        target: ListTarget,
    },

    /// Update a vault or a login
    Update {
        #[command(subcommand)]
        target: UpdateTarget,
    },

    /// Delete a vault or a login
    Delete {
        #[command(subcommand)]
        target: DeleteTarget,
    },

    /// Browse vaults and logins interactively
    Dashboard,

    /// Show the effective configuration
    Config {
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand)]
enum AddTarget {
    /// Create a new vault protected by a master password
    Vault {
        /// Name of the vault
        #[arg(short, long)]
        name: String,
        /// Description of the vault
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Store a login; generates a password unless --password is given
    #[command(alias = "pass", alias = "password")]
    Login {
        /// Name of the vault
        #[arg(short, long = "vault")]
        vault: String,
        /// Name of the login
        #[arg(short, long)]
        name: String,
        /// Username or email for the login
        #[arg(short, long)]
        username: String,
        /// Type the password instead of generating one
        #[arg(short, long)]
        password: bool,
        #[command(flatten)]
        generator: GeneratorArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct GeneratorArgs {
    /// Length of the generated password (5 to 64)
    #[arg(short, long, default_value = "16")]
    length: usize,
    /// Use special characters in the generated password
    #[arg(short, long)]
    special_chars: bool,
    /// Use digits in the generated password
    #[arg(short = 'N', long)]
    numerals: bool,
    /// Use uppercase letters in the generated password
    #[arg(short = 'U', long)]
    uppercase: bool,
}

impl From<GeneratorArgs> for PasswordGenerator {
    fn from(args: GeneratorArgs) -> Self {
        PasswordGenerator {
            length: args.length,
            special_chars: args.special_chars,
            numerals: args.numerals,
            uppercase: args.uppercase,
        }
    }
}

#[derive(Subcommand)]
enum GetTarget {
    /// Decrypt a login
    Login {
        /// Name of the vault
        #[arg(short, long)]
        vault: String,
        /// Name of the login
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum ListTarget {
    /// List vaults
    Vault {
        /// Search for a vault name
        #[arg(short, long)]
        name: Option<String>,
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List logins across vaults
    Login {
        /// Limit the search to one vault
        #[arg(short, long)]
        vault: Option<String>,
        /// Search for a login name
        #[arg(short, long)]
        name: Option<String>,
        /// Search for a username or email
        #[arg(short, long)]
        username: Option<String>,
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum UpdateTarget {
    /// Rename a vault, change its description or its master password
    Vault {
        /// Name of the vault
        #[arg(short, long)]
        name: String,
        /// New name for the vault
        #[arg(long)]
        new_name: Option<String>,
        /// New description for the vault
        #[arg(long)]
        new_description: Option<String>,
        /// Change the master password and re-encrypt every login
        #[arg(long)]
        rekey: bool,
    },

    /// Rename a login, change its username or its password
    Login {
        /// Name of the vault
        #[arg(short, long)]
        vault: String,
        /// Name of the login
        #[arg(short, long)]
        name: String,
        /// New name for the login
        #[arg(long)]
        new_name: Option<String>,
        /// New username for the login
        #[arg(long)]
        new_username: Option<String>,
        /// Type a new password for the login
        #[arg(short, long)]
        password: bool,
    },
}

#[derive(Subcommand)]
enum DeleteTarget {
    /// Delete a vault and every login in it
    Vault {
        /// Name of the vault
        #[arg(short, long)]
        name: String,
    },

    /// Delete a single login
    Login {
        /// Name of the vault
        #[arg(short, long)]
        vault: String,
        /// Name of the login
        #[arg(short, long)]
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        output::failure(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let paths = Paths::new();
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let mut config = Config::load(&config_path)?;
    config.apply_env();

    init_logging(&config)?;

    if let Commands::Config { init } = cli.command {
        return cmd_config(&config, &paths, &config_path, init);
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path(&paths));
    let mut store = Storage::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let params = CryptoParams::from(&config);

    match cli.command {
        Commands::Add { target } => match target {
            AddTarget::Vault { name, description } => {
                cmd_add_vault(&store, &name, &description, &params)
            }
            AddTarget::Login {
                vault,
                name,
                username,
                password,
                generator,
            } => cmd_add_login(&store, &vault, &name, &username, password, generator.into()),
        },
        Commands::Get {
            target: GetTarget::Login { vault, name },
        } => cmd_get_login(&store, &vault, &name),
        Commands::List { target } => match target {
            ListTarget::Vault { name, json } => cmd_list_vaults(&store, name.as_deref(), json),
            ListTarget::Login {
                vault,
                name,
                username,
                json,
            } => cmd_list_logins(
                &store,
                vault.as_deref(),
                name.as_deref(),
                username.as_deref(),
                json,
            ),
        },
        Commands::Update { target } => match target {
            UpdateTarget::Vault {
                name,
                new_name,
                new_description,
                rekey,
            } => cmd_update_vault(
                &mut store,
                &name,
                new_name.as_deref(),
                new_description.as_deref(),
                rekey,
                &params,
            ),
            UpdateTarget::Login {
                vault,
                name,
                new_name,
                new_username,
                password,
            } => {
                let changes = LoginChanges {
                    name: new_name,
                    username: new_username,
                };
                cmd_update_login(&store, &vault, &name, &changes, password)
            }
        },
        Commands::Delete { target } => match target {
            DeleteTarget::Vault { name } => cmd_delete_vault(&mut store, &name),
            DeleteTarget::Login { vault, name } => cmd_delete_login(&store, &vault, &name),
        },
        Commands::Dashboard => dashboard::run(&store),
        Commands::Config { .. } => Ok(()),
    }
}

/// Install the tracing subscriber, writing to the log file when one is configured
fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    match &config.log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Read a hidden value, rejecting empty input
fn prompt_secret(prompt: &str) -> Result<String> {
    let value = rpassword::prompt_password(prompt).context("Failed to read password")?;
    let value = value.trim().to_string();
    if value.is_empty() {
        bail!("Empty password not allowed");
    }
    Ok(value)
}

/// Read a hidden value twice and require both to match
fn prompt_confirmed(prompt: &str, confirm: &str) -> Result<String> {
    let value = prompt_secret(prompt)?;
    let again = rpassword::prompt_password(confirm).context("Failed to read password")?;
    if value != again.trim() {
        bail!("Passwords do not match");
    }
    Ok(value)
}

/// Prompt for the master password and unlock the vault
fn unlock(store: &Storage, vault_name: &str) -> Result<OpenVault> {
    let locked = vault::open(store, vault_name)?;
    let master = prompt_secret("Input master password: ")?;
    let opened = locked
        .unlock(&master)
        .with_context(|| format!("Master password check failed for vault '{}'", vault_name))?;
    output::success("Successfully opened vault.");
    Ok(opened)
}

fn cmd_add_vault(store: &Storage, name: &str, description: &str, params: &CryptoParams) -> Result<()> {
    let master = prompt_confirmed("Input master password: ", "Confirm master password: ")?;
    vault::create(store, name, description, &master, params)
        .with_context(|| format!("Failed to create vault '{}'", name))?;
    output::success(&format!("Vault '{}' created successfully.", name));
    Ok(())
}

fn cmd_add_login(
    store: &Storage,
    vault_name: &str,
    name: &str,
    username: &str,
    provide_password: bool,
    generator: PasswordGenerator,
) -> Result<()> {
    // Validate the length before asking for anything
    let generated = if provide_password {
        None
    } else {
        Some(generator.generate()?)
    };

    let vault = unlock(store, vault_name)?;

    let secret = match generated {
        Some(password) => password,
        None => zeroize::Zeroizing::new(prompt_confirmed("Input password: ", "Confirm password: ")?),
    };

    vault
        .add_login(store, name, username, &secret)
        .with_context(|| format!("Failed to add login '{}' to vault '{}'", name, vault_name))?;

    output::success(&format!("Successfully added login '{}' to vault '{}'.", name, vault_name));
    if !provide_password {
        output::print_generated(&secret);
    }
    Ok(())
}

fn cmd_get_login(store: &Storage, vault_name: &str, name: &str) -> Result<()> {
    let vault = unlock(store, vault_name)?;
    let login = vault
        .get_login(store, name)
        .with_context(|| format!("Failed to read login '{}'", name))?;
    output::print_login(&login);
    Ok(())
}

fn cmd_list_vaults(store: &Storage, name: Option<&str>, json: bool) -> Result<()> {
    let vaults = vault::list(store, name)?;
    output::print_vaults(&vaults, json)
}

fn cmd_list_logins(
    store: &Storage,
    vault_name: Option<&str>,
    name: Option<&str>,
    username: Option<&str>,
    json: bool,
) -> Result<()> {
    let locked = vault_name.map(|v| vault::open(store, v)).transpose()?;
    let vault_id = locked.as_ref().map(|v| v.vault_id());
    let logins = login::list(store, vault_id, name, username)?;
    output::print_logins(&logins, json)
}

fn cmd_update_vault(
    store: &mut Storage,
    name: &str,
    new_name: Option<&str>,
    new_description: Option<&str>,
    rekey: bool,
    params: &CryptoParams,
) -> Result<()> {
    if new_name.is_none() && new_description.is_none() && !rekey {
        bail!("Nothing to update. Use --new-name, --new-description or --rekey");
    }

    let mut vault = unlock(store, name)?;

    // Everything is collected up front so one transaction covers all changes
    let new_master = if rekey {
        Some(zeroize::Zeroizing::new(prompt_confirmed(
            "Input new master password: ",
            "Confirm new master password: ",
        )?))
    } else {
        None
    };

    let report = match new_master {
        Some(master) => vault.update_and_rekey(store, new_name, new_description, &master, params),
        None => vault.update(store, new_name, new_description),
    }
    .with_context(|| format!("Failed to update vault '{}'", name))?;

    output::print_update_report(&report);
    Ok(())
}

fn cmd_update_login(
    store: &Storage,
    vault_name: &str,
    name: &str,
    changes: &LoginChanges,
    new_password: bool,
) -> Result<()> {
    if changes.is_empty() && !new_password {
        bail!("Nothing to update. Use --new-name, --new-username or --password");
    }

    let vault = unlock(store, vault_name)?;

    let updated = if new_password {
        let secret = zeroize::Zeroizing::new(prompt_confirmed("Input password: ", "Confirm password: ")?);
        vault.update_login(store, name, changes, Some(secret.as_str()))
    } else {
        login::update(store, &vault, name, changes)
    };
    updated.with_context(|| format!("Failed to update login '{}'", name))?;

    output::success(&format!("Successfully updated login '{}'.", name));
    Ok(())
}

fn cmd_delete_vault(store: &mut Storage, name: &str) -> Result<()> {
    let vault = unlock(store, name)?;
    let report = vault
        .delete(store)
        .with_context(|| format!("Failed to delete vault '{}'", name))?;
    output::print_delete_report(&report);
    Ok(())
}

fn cmd_delete_login(store: &Storage, vault_name: &str, name: &str) -> Result<()> {
    let vault = unlock(store, vault_name)?;
    login::delete(store, &vault, name).with_context(|| format!("Failed to delete login '{}'", name))?;
    output::success(&format!("Successfully deleted login '{}'.", name));
    Ok(())
}

fn cmd_config(config: &Config, paths: &Paths, path: &Path, init: bool) -> Result<()> {
    if init {
        if path.exists() {
            bail!("Config file already exists: {}", path.display());
        }
        let initial = Config {
            log_path: Some(paths.log_file()),
            ..Config::default()
        };
        initial.save(path)?;
        output::success(&format!("Wrote {}", path.display()));
        return Ok(());
    }

    println!("{}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
