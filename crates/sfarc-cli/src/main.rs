//! sfarc: Shannon-Fano archiver
//!
//! Commands:
//!   pack <inputs>... [-o out]     - archive files/directories (optionally encrypted)
//!   unpack <archive> [-d dir]     - extract an archive
//!   list <archive>                - show archived entries and sizes
//!   compress <file> [-o out]      - Shannon-Fano code a single file
//!   decompress <file> [-o out]    - reverse `compress`
//!   verify <file>                 - round-trip a file in memory and compare
//!   config show                   - display the effective configuration

mod collect;
mod write;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use sfarc_archive::{ArchiveOptions, CreatedArchive};
use sfarc_core::config::{LoggingConfig, SfarcConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sfarc",
    version,
    about = "Shannon-Fano archiver with optional AES-256-GCM encryption"
)]
struct Cli {
    /// Path to sfarc.toml configuration file
    #[arg(long, short = 'c', env = "SFARC_CONFIG", default_value = "sfarc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Archive files and directories
    Pack {
        /// Files or directories to archive
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output archive (default: <first input>.<extension>)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Encrypt the archive, prompting for a password if none is given
        #[arg(long, short = 'e')]
        encrypt: bool,
        /// Encryption password (implies --encrypt)
        #[arg(long, env = "SFARC_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Replace the output file if it exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Extract an archive
    Unpack {
        archive: PathBuf,
        /// Destination directory (default: current directory)
        #[arg(long, short = 'd')]
        dest: Option<PathBuf>,
        #[arg(long, env = "SFARC_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Replace existing files (overrides extract.overwrite)
        #[arg(long)]
        overwrite: bool,
    },

    /// List the entries of an archive
    List {
        archive: PathBuf,
        #[arg(long, env = "SFARC_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Compress a single file into a standalone frame
    Compress {
        input: PathBuf,
        /// Output file (default: <input>.sfc)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[arg(long)]
        overwrite: bool,
    },

    /// Decompress a standalone frame
    Decompress {
        input: PathBuf,
        /// Output file (default: <input> without .sfc, or <input>.out)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[arg(long)]
        overwrite: bool,
    },

    /// Compress and decompress a file in memory and check the result matches
    Verify { input: PathBuf },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

const FRAME_EXTENSION: &str = "sfc";

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SfarcConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    init_logging(&config.logging);
    debug!(config = %cli.config.display(), "sfarc starting");

    match cli.command {
        Commands::Pack {
            inputs,
            output,
            encrypt,
            password,
            overwrite,
        } => cmd_pack(&config, &inputs, output.as_deref(), encrypt, password, overwrite),
        Commands::Unpack {
            archive,
            dest,
            password,
            overwrite,
        } => cmd_unpack(&config, &archive, dest.as_deref(), password, overwrite),
        Commands::List { archive, password } => cmd_list(&archive, password),
        Commands::Compress {
            input,
            output,
            overwrite,
        } => cmd_compress(&input, output.as_deref(), overwrite),
        Commands::Decompress {
            input,
            output,
            overwrite,
        } => cmd_decompress(&input, output.as_deref(), overwrite),
        Commands::Verify { input } => cmd_verify(&input),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    // stdout carries listings and reports
    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

// ── Passwords ─────────────────────────────────────────────────────────────────

fn prompt_password(confirm: bool) -> Result<SecretString> {
    let first = rpassword::prompt_password("Password: ").context("reading password")?;
    if first.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    if confirm {
        let second = rpassword::prompt_password("Confirm password: ").context("reading password")?;
        if first != second {
            anyhow::bail!("passwords do not match");
        }
    }
    Ok(SecretString::from(first))
}

/// Password for reading `bytes`: the supplied one, or a prompt if the archive needs one.
fn password_for(bytes: &[u8], supplied: Option<String>) -> Result<Option<SecretString>> {
    let header = sfarc_archive::read_header(bytes).context("reading archive header")?;
    if !header.has_password {
        return Ok(None);
    }
    match supplied {
        Some(password) => Ok(Some(SecretString::from(password))),
        None => prompt_password(false).map(Some),
    }
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn ensure_writable(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        anyhow::bail!("{} already exists (use --overwrite to replace it)", path.display());
    }
    Ok(())
}

// ── `sfarc pack` ──────────────────────────────────────────────────────────────

fn cmd_pack(
    config: &SfarcConfig,
    inputs: &[PathBuf],
    output: Option<&Path>,
    encrypt: bool,
    password: Option<String>,
    overwrite: bool,
) -> Result<()> {
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => default_archive_path(&inputs[0], &config.archive.extension),
    };
    ensure_writable(&output, overwrite)?;

    let password = match password {
        Some(p) => Some(SecretString::from(p)),
        None if encrypt => Some(prompt_password(true)?),
        None => None,
    };

    let spinner = make_spinner("pack");
    spinner.set_message("collecting");
    let entries = collect::collect_entries(inputs, &config.archive.exclude_patterns)?;
    info!(
        entries = entries.len(),
        files = entries.iter().filter(|e| !e.is_dir).count(),
        "collected inputs"
    );

    spinner.set_message(if password.is_some() {
        "encoding and encrypting"
    } else {
        "encoding"
    });
    let options = ArchiveOptions::from(&config.archive);
    let created = sfarc_archive::create_archive_with(&entries, password.as_ref(), &options)
        .context("creating archive")?;

    spinner.set_message("writing");
    std::fs::write(&output, &created.bytes)
        .with_context(|| format!("writing archive: {}", output.display()))?;
    spinner.finish_and_clear();

    report_compression(&created);
    println!(
        "packed {} entries into {} ({}{})",
        created.entries.len(),
        output.display(),
        fmt_bytes(created.bytes.len() as u64),
        if password.is_some() { ", encrypted" } else { "" }
    );
    Ok(())
}

/// `<name>.<extension>` in the current directory, falling back to `archive`
/// for inputs like `.` that have no file name.
fn default_archive_path(first_input: &Path, extension: &str) -> PathBuf {
    let mut file_name = first_input
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "archive".into());
    file_name.push(".");
    file_name.push(extension);
    PathBuf::from(file_name)
}

fn report_compression(created: &CreatedArchive) {
    let (mut original, mut encoded) = (0u64, 0u64);
    for entry in created.entries.iter().filter(|e| !e.is_dir) {
        original += entry.original_size;
        encoded += entry.encoded_size;
        info!(
            path = %entry.relative_path,
            original = entry.original_size,
            archived = entry.encoded_size,
            ratio = %format!("{:.1}%", entry.compression_ratio()),
            "compressed"
        );
    }
    let saved = if original == 0 {
        0.0
    } else {
        (1.0 - encoded as f64 / original as f64) * 100.0
    };
    info!(
        original = original,
        archived = encoded,
        container = created.bytes.len(),
        ratio = %format!("{saved:.1}%"),
        "compression summary"
    );
}

// ── `sfarc unpack` ────────────────────────────────────────────────────────────

fn cmd_unpack(
    config: &SfarcConfig,
    archive: &Path,
    dest: Option<&Path>,
    password: Option<String>,
    overwrite: bool,
) -> Result<()> {
    let bytes =
        std::fs::read(archive).with_context(|| format!("reading archive: {}", archive.display()))?;
    let password = password_for(&bytes, password)?;

    let spinner = make_spinner("unpack");
    spinner.set_message("decoding");
    let options = ArchiveOptions::from(&config.archive);
    let extracted = sfarc_archive::extract_archive_with(&bytes, password.as_ref(), &options);
    spinner.finish_and_clear();
    let extracted = extracted.with_context(|| format!("extracting {}", archive.display()))?;

    let dest = dest.unwrap_or_else(|| Path::new("."));
    let summary = write::write_entries(dest, &extracted, overwrite || config.extract.overwrite)?;
    println!(
        "extracted {} files and {} directories ({}) into {}",
        summary.files,
        summary.dirs,
        fmt_bytes(summary.bytes),
        dest.display()
    );
    Ok(())
}

// ── `sfarc list` ──────────────────────────────────────────────────────────────

fn cmd_list(archive: &Path, password: Option<String>) -> Result<()> {
    let bytes =
        std::fs::read(archive).with_context(|| format!("reading archive: {}", archive.display()))?;
    let password = password_for(&bytes, password)?;
    let entries = sfarc_archive::list_archive(&bytes, password.as_ref())
        .with_context(|| format!("listing {}", archive.display()))?;

    println!("{:>10}  {:>10}  {:>7}  PATH", "SIZE", "ARCHIVED", "SAVED");
    for entry in &entries {
        if entry.is_dir {
            println!("{:>10}  {:>10}  {:>7}  {}/", "-", "-", "-", entry.relative_path);
        } else {
            println!(
                "{:>10}  {:>10}  {:>6.1}%  {}",
                fmt_bytes(entry.original_size),
                fmt_bytes(entry.encoded_size),
                entry.compression_ratio(),
                entry.relative_path
            );
        }
    }
    Ok(())
}

// ── `sfarc compress` / `decompress` / `verify` ────────────────────────────────

fn cmd_compress(input: &Path, output: Option<&Path>, overwrite: bool) -> Result<()> {
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| {
        let mut name = input.as_os_str().to_os_string();
        name.push(".");
        name.push(FRAME_EXTENSION);
        PathBuf::from(name)
    });
    ensure_writable(&output, overwrite)?;

    let data = std::fs::read(input).with_context(|| format!("reading: {}", input.display()))?;
    let frame = sfarc_codec::frame::compress(&data).context("compressing")?;
    std::fs::write(&output, &frame).with_context(|| format!("writing: {}", output.display()))?;

    info!(
        original = data.len(),
        compressed = frame.len(),
        "compressed {}",
        input.display()
    );
    println!(
        "{} -> {} ({} -> {})",
        input.display(),
        output.display(),
        fmt_bytes(data.len() as u64),
        fmt_bytes(frame.len() as u64)
    );
    Ok(())
}

fn cmd_decompress(input: &Path, output: Option<&Path>, overwrite: bool) -> Result<()> {
    let output = match output {
        Some(path) => path.to_path_buf(),
        None if input.extension().is_some_and(|e| e == FRAME_EXTENSION) => input.with_extension(""),
        None => {
            let mut name = input.as_os_str().to_os_string();
            name.push(".out");
            PathBuf::from(name)
        }
    };
    ensure_writable(&output, overwrite)?;

    let frame = std::fs::read(input).with_context(|| format!("reading: {}", input.display()))?;
    let data = sfarc_codec::frame::decompress(&frame)
        .with_context(|| format!("decompressing {}", input.display()))?;
    std::fs::write(&output, &data).with_context(|| format!("writing: {}", output.display()))?;

    println!(
        "{} -> {} ({})",
        input.display(),
        output.display(),
        fmt_bytes(data.len() as u64)
    );
    Ok(())
}

fn cmd_verify(input: &Path) -> Result<()> {
    let data = std::fs::read(input).with_context(|| format!("reading: {}", input.display()))?;
    let frame = sfarc_codec::frame::compress(&data).context("compressing")?;
    let restored = sfarc_codec::frame::decompress(&frame).context("decompressing")?;

    if restored != data {
        anyhow::bail!("round trip of {} does not match the original", input.display());
    }
    println!(
        "{}: OK ({} -> {})",
        input.display(),
        fmt_bytes(data.len() as u64),
        fmt_bytes(frame.len() as u64)
    );
    Ok(())
}

// ── `sfarc config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &SfarcConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
