//! CLI entry point for `mailhook`.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailhook::config::Config;
use mailhook::export::attachment as export;
use mailhook::InboundMessage;

/// Decode inbound-email webhook payloads and save their attachments.
#[derive(Parser)]
#[command(name = "mailhook", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a payload and print a summary of each message
    Show {
        /// Payload file, or `-` for stdin
        payload: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Save attachments and inline images from one or more payloads
    Extract {
        #[arg(required = true)]
        payloads: Vec<PathBuf>,
        /// Output directory (defaults to `export.default_output_dir`)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only save parts of this content type (`image/*` wildcards allowed); repeatable
        #[arg(long = "allow", value_name = "TYPE")]
        allow: Vec<String>,
        /// Use declared names verbatim instead of sanitizing them
        #[arg(long)]
        raw_names: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mailhook::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Show { payload, json } => cmd_show(&payload, json),
        Commands::Extract {
            payloads,
            output,
            allow,
            raw_names,
        } => cmd_extract(&payloads, output, allow, raw_names, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = mailhook::config::log_file_path(config);
    let log_dir = log_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let log_name = log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "mailhook.log".into());
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Read a payload file, or stdin for `-`.
fn read_payload(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    if !path.exists() {
        anyhow::bail!("Payload file not found: {}", path.display());
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn decode_payload(path: &Path) -> anyhow::Result<Vec<InboundMessage>> {
    let json = read_payload(path)?;
    InboundMessage::from_events_json(&json)
        .with_context(|| format!("decoding {}", path.display()))
}

/// Print every message of a payload.
fn cmd_show(path: &Path, json: bool) -> anyhow::Result<()> {
    let messages = decode_payload(path)?;
    if json {
        print_messages_json(&messages)
    } else {
        for message in &messages {
            print_message_table(message);
        }
        Ok(())
    }
}

/// Save the binary parts of every message in the given payloads.
fn cmd_extract(
    payloads: &[PathBuf],
    output: Option<PathBuf>,
    allow: Vec<String>,
    raw_names: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let output = output
        .or_else(|| config.export.default_output_dir.clone())
        .ok_or_else(|| anyhow::anyhow!("No output directory given (use --output)"))?;

    let mut export_config = config.export.clone();
    if !allow.is_empty() {
        export_config.allowed_types = allow;
    }
    if raw_names {
        export_config.sanitize_names = false;
    }

    let mut messages = Vec::new();
    for path in payloads {
        messages.extend(decode_payload(path)?);
    }
    // A single message goes straight into the output directory.
    if messages.len() == 1 {
        export_config.folder_per_message = false;
    }

    let with_parts = messages.iter().filter(|m| m.parts().next().is_some()).count();
    if with_parts == 0 {
        println!("  No messages with attachments or images found.");
        return Ok(());
    }

    let pb = ProgressBar::new(messages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Extracting [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let paths = export::export_bulk(&messages, &output, &export_config, &|current, _total| {
        pb.set_position(current as u64);
    })?;

    pb.finish_and_clear();
    println!(
        "  Extracted {} part(s) from {} message(s) to {}",
        paths.len(),
        with_parts,
        output.display()
    );

    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailhook", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print one message as a human-readable table.
fn print_message_table(message: &InboundMessage) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<14} {}", "Subject", message.subject());
    println!("  {:<14} {}", "From", message.sender());
    for addr in message.to() {
        println!("  {:<14} {}", "To", addr);
    }
    for addr in message.cc() {
        println!("  {:<14} {}", "Cc", addr);
    }
    println!(
        "  {:<14} {}",
        "Date",
        message.send_date().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  {:<14} {}", "Message-Id", message.message_id());
    if !message.mailbox_hash().is_empty() {
        println!("  {:<14} {}", "Mailbox hash", message.mailbox_hash());
    }
    println!(
        "  {:<14} spf={} dkim={} spam={:.1}",
        "Verdicts",
        if message.spf().is_empty() { "-" } else { message.spf() },
        message.dkim(),
        message.spam_score()
    );

    for (label, parts) in [("Attachment", message.attachments()), ("Image", message.images())] {
        for part in parts {
            let size = match part.size() {
                Ok(n) => format_size(n, BINARY),
                Err(_) => "invalid".to_string(),
            };
            println!(
                "  {:<14} {} ({}, {})",
                label,
                part.name(),
                part.content_type(),
                size
            );
        }
    }
    println!();
}

/// Print messages as JSON.
fn print_messages_json(messages: &[InboundMessage]) -> anyhow::Result<()> {
    let part_json = |p: &mailhook::Attachment| {
        serde_json::json!({
            "name": p.name(),
            "content_type": p.content_type(),
            "size": p.size().ok(),
        })
    };

    let items: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "subject": m.subject(),
                "message_id": m.message_id(),
                "date": m.send_date().to_rfc3339(),
                "from": m.sender(),
                "to": m.to(),
                "cc": m.cc(),
                "mailbox_hash": m.mailbox_hash(),
                "spf": m.spf(),
                "dkim": m.dkim(),
                "spam_score": m.spam_score(),
                "attachments": m.attachments().iter().map(part_json).collect::<Vec<_>>(),
                "images": m.images().iter().map(part_json).collect::<Vec<_>>(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "message_count": messages.len(),
        "messages": items,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
