//! Skyshelf CLI - Command line interface for storage operations.
//!
//! This tool stores, fetches and removes upload objects on any configured
//! provider, and can run a smoke check against every provider at once.

use anyhow::{bail, ensure, Context, Result};
use bytes::Bytes;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use skyshelf_storage::{
    load_credentials, purge_directory, DirectoryUploader, Provider, ProviderConfig, Settings,
    StorageAdapter, Uploader,
};

#[derive(Parser)]
#[command(name = "skyshelf")]
#[command(about = "Skyshelf - Uniform storage for uploaded files")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Provider to use (AWS, Google, Local, Rackspace). Defaults to the first configured one.
    #[arg(short, long, global = true)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the providers usable with the current credentials.
    Providers,

    /// Store a file.
    Put {
        /// Local file to upload.
        #[arg(short, long)]
        file: PathBuf,

        /// Prefix for the stored object.
        #[arg(short, long, default_value = "uploads")]
        dir: String,

        /// Object name (default: the file's name).
        #[arg(short, long)]
        name: Option<String>,

        /// Store the object privately.
        #[arg(long)]
        private: bool,

        /// Content type recorded with the object.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Fetch an object.
    Get {
        /// Object path, e.g. uploads/bar.txt.
        #[arg(short = 'k', long)]
        path: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Delete an object (succeeds if it is already gone).
    Rm {
        /// Object path.
        #[arg(short = 'k', long)]
        path: String,
    },

    /// Print the public URL of an object.
    Url {
        /// Object path.
        #[arg(short = 'k', long)]
        path: String,
    },

    /// Delete every object in the directory, then the directory.
    Purge,

    /// Run the store/retrieve/delete round trip against every provider.
    Check,

    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let provider = cli.provider.as_deref();
    match cli.command {
        Commands::Providers => cmd_providers().await,

        Commands::Put {
            file,
            dir,
            name,
            private,
            content_type,
        } => cmd_put(provider, &file, &dir, name.as_deref(), private, content_type).await,

        Commands::Get { path, out } => cmd_get(provider, &path, out.as_deref()).await,

        Commands::Rm { path } => cmd_rm(provider, &path).await,

        Commands::Url { path } => cmd_url(provider, &path).await,

        Commands::Purge => cmd_purge(provider).await,

        Commands::Check => cmd_check(provider).await,

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "skyshelf", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Resolve all provider configurations from the environment.
fn resolve_configs() -> Result<(Settings, Vec<ProviderConfig>)> {
    let settings = Settings::from_env();
    let credentials = load_credentials(&settings, |key| std::env::var(key).ok())
        .context("Failed to load credentials")?;
    let configs = settings
        .resolver()
        .context("Invalid settings")?
        .resolve(&credentials);
    Ok((settings, configs))
}

/// Connect to the requested provider, or the first configured one.
async fn open_adapter(provider: Option<&str>) -> Result<StorageAdapter> {
    let (settings, configs) = resolve_configs()?;

    let config = match provider {
        Some(name) => {
            let wanted: Provider = name.parse()?;
            configs
                .into_iter()
                .find(|c| c.provider() == wanted)
                .with_context(|| format!("No credentials configured for {}", wanted))?
        }
        None => configs
            .into_iter()
            .next()
            .context("No provider credentials configured")?,
    };

    info!("Using {} (directory {})", config.provider(), config.directory());
    StorageAdapter::connect(config, settings.mode)
        .await
        .context("Failed to connect to provider")
}

/// List usable providers.
async fn cmd_providers() -> Result<()> {
    let (settings, configs) = resolve_configs()?;

    if configs.is_empty() {
        println!("No providers configured.");
        return Ok(());
    }

    println!("Providers ({:?} mode):", settings.mode);
    for config in &configs {
        println!(
            "  {:<10} directory={} public={} host={}",
            config.provider().name(),
            config.directory(),
            config.is_public(),
            config.host().unwrap_or("-")
        );
    }

    Ok(())
}

/// Store a local file.
async fn cmd_put(
    provider: Option<&str>,
    file: &Path,
    dir: &str,
    name: Option<&str>,
    private: bool,
    content_type: Option<String>,
) -> Result<()> {
    let adapter = open_adapter(provider).await?;

    let identifier = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("Source file has no name")?,
    };

    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut config = adapter.config().clone().with_public(!private);
    if let Some(content_type) = content_type {
        config = config.with_attribute("content_type", content_type);
    }

    let uploader = DirectoryUploader::new(dir);
    let path = uploader.store_path(&identifier);
    let stored = adapter
        .store(content, &path, &config)
        .await
        .context("Failed to store file")?;

    println!("Stored {} ({} bytes)", stored.path(), stored.size().await?);
    if let Some(url) = stored.public_url() {
        println!("  URL: {}", url);
    }

    Ok(())
}

/// Fetch an object.
async fn cmd_get(provider: Option<&str>, path: &str, out: Option<&Path>) -> Result<()> {
    let adapter = open_adapter(provider).await?;

    let file = adapter
        .retrieve(path)
        .await
        .with_context(|| format!("Failed to retrieve {}", path))?;
    let content = file.read().await?;

    match out {
        Some(out) => {
            tokio::fs::write(out, &content)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} bytes to {}", content.len(), out.display());
        }
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

/// Delete an object.
async fn cmd_rm(provider: Option<&str>, path: &str) -> Result<()> {
    let adapter = open_adapter(provider).await?;
    adapter
        .delete(path)
        .await
        .with_context(|| format!("Failed to delete {}", path))?;
    println!("Deleted {}", path);
    Ok(())
}

/// Print a public URL.
async fn cmd_url(provider: Option<&str>, path: &str) -> Result<()> {
    let adapter = open_adapter(provider).await?;
    match adapter.public_url(path, adapter.config()) {
        Some(url) => println!("{}", url),
        None => println!("{} has no public URL", path),
    }
    Ok(())
}

/// Remove the configured directory.
async fn cmd_purge(provider: Option<&str>) -> Result<()> {
    let adapter = open_adapter(provider).await?;
    let directory = adapter.config().directory().to_string();
    let removed = purge_directory(adapter.connection().as_ref(), &directory)
        .await
        .context("Failed to purge directory")?;
    println!("Purged {} ({} objects)", directory, removed);
    Ok(())
}

/// Smoke-test every configured provider.
async fn cmd_check(provider: Option<&str>) -> Result<()> {
    let (settings, configs) = resolve_configs()?;
    let wanted = provider.map(str::parse::<Provider>).transpose()?;

    let mut failures = 0;
    for config in configs {
        if wanted.is_some_and(|w| w != config.provider()) {
            continue;
        }

        let name = config.provider().name();
        let adapter = match StorageAdapter::connect(config, settings.mode).await {
            Ok(adapter) => adapter,
            Err(e) => {
                println!("  [FAIL] {}: {}", name, e);
                failures += 1;
                continue;
            }
        };

        match check_provider(&adapter).await {
            Ok(()) => println!("  [ok]   {}", name),
            Err(e) => {
                println!("  [FAIL] {}: {:#}", name, e);
                failures += 1;
            }
        }

        // Always clean up, whatever the outcome
        let directory = adapter.config().directory();
        if let Err(e) = purge_directory(adapter.connection().as_ref(), directory).await {
            warn!("Cleanup of {} on {} failed: {}", directory, name, e);
        }
    }

    if failures > 0 {
        bail!("{} provider(s) failed the check", failures);
    }
    Ok(())
}

async fn check_provider(adapter: &StorageAdapter) -> Result<()> {
    const BODY: &[u8] = b"this is stuff";
    const PATH: &str = "uploads/bar.txt";

    let stored = adapter
        .store(Bytes::from_static(BODY), PATH, adapter.config())
        .await
        .context("store")?;
    ensure!(stored.path() == PATH, "unexpected path {}", stored.path());
    ensure!(stored.size().await? == BODY.len() as u64, "size mismatch");

    let retrieved = adapter
        .retrieve_for(&DirectoryUploader::default(), "bar.txt")
        .await
        .context("retrieve")?;
    ensure!(retrieved.read().await?.as_ref() == BODY, "content mismatch");

    let hosted = hosted_config(adapter.config())?;
    let url = adapter.public_url(PATH, &hosted);
    ensure!(
        url.as_deref() == Some("http://foo.bar/uploads/bar.txt"),
        "unexpected hosted URL {:?}",
        url
    );

    stored.delete().await.context("delete")?;
    match adapter.retrieve(PATH).await {
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e).context("retrieve after delete"),
        Ok(_) => bail!("object still present after delete"),
    }
}

/// Public copy of `config` rooted at the check host, whatever the configured visibility.
fn hosted_config(config: &ProviderConfig) -> Result<ProviderConfig> {
    Ok(config.clone().with_public(true).with_host("http://foo.bar")?)
}
