//! CLI entry point for `watney`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use watney::compose::{header::serialize_header, message};
use watney::config::Config;
use watney::model::mail::{sort_newest_first, Message};
use watney::parser::{eml, mime, mime::ParseOptions};

#[derive(Parser)]
#[command(
    name = "watney",
    version,
    about = "Parse, inspect and compose RFC 5322 / MIME messages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an .eml file and print its header, flags and content parts
    Parse {
        path: PathBuf,
        #[arg(long)]
        json: bool,
        /// Decode quoted-printable and base64 text parts
        #[arg(long)]
        decode: bool,
    },
    /// List all .eml files of a directory, newest first
    List {
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Parse the header of an .eml file and print it re-serialized
    Serialize { path: PathBuf },
    /// Print the append payload of the "Sent" copy of an outgoing mail
    Compose {
        #[arg(long)]
        from: String,
        #[arg(long, required = true)]
        to: Vec<String>,
        #[arg(long, default_value = "")]
        subject: String,
        /// File holding the message text (empty body if omitted)
        #[arg(long)]
        body: Option<PathBuf>,
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

    let config = watney::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let options = ParseOptions::from(&config.parser);

    match cli.command {
        Commands::Parse { path, json, decode } => {
            cmd_parse(&path, json, decode || config.parser.decode_content, &options)
        }
        Commands::List { dir, json } => cmd_list(&dir, json, &options),
        Commands::Serialize { path } => cmd_serialize(&path, &options),
        Commands::Compose {
            from,
            to,
            subject,
            body,
        } => cmd_compose(&from, &to, &subject, body.as_deref(), &config),
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

    let log_dir = watney::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "watney.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "watney", &mut std::io::stdout());
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

/// Parse one .eml file and print it.
fn cmd_parse(path: &Path, json: bool, decode: bool, options: &ParseOptions) -> anyhow::Result<()> {
    let mut msg = eml::parse_eml(path, options)?;
    if decode {
        msg.content = msg.content.as_ref().map(mime::decode_content);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&msg)?);
    } else {
        print_message(&msg);
    }
    Ok(())
}

/// Parse every .eml file of a directory and print an overview.
fn cmd_list(dir: &Path, json: bool, options: &ParseOptions) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        })
        .collect();
    paths.sort();

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Parsing [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );

    let mut messages = Vec::with_capacity(paths.len());
    for path in &paths {
        match eml::parse_eml(path, options) {
            Ok(mut msg) => {
                msg.content = None;
                messages.push(msg);
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping message"),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    sort_newest_first(&mut messages);

    if json {
        let headers: Vec<_> = messages.iter().map(|m| &m.header).collect();
        println!("{}", serde_json::to_string_pretty(&headers)?);
    } else {
        print_overview_table(&messages);
    }
    Ok(())
}

/// Print the header of an .eml file in serialized form.
fn cmd_serialize(path: &Path, options: &ParseOptions) -> anyhow::Result<()> {
    let msg = eml::parse_eml(path, options)?;
    println!("{}", serialize_header(&msg.header));
    Ok(())
}

/// Print the mailbox, flags and text of the "Sent" copy of a new mail.
fn cmd_compose(
    from: &str,
    to: &[String],
    subject: &str,
    body: Option<&Path>,
    config: &Config,
) -> anyhow::Result<()> {
    let text = match body {
        Some(path) => std::fs::read_to_string(path)?,
        None => String::new(),
    };

    let (header, flags) =
        message::sent_copy(from, to, subject, chrono::Utc::now(), &config.compose);
    let request = message::prepare_append(&header, &flags, &text, &config.compose);

    println!("Mailbox: {}", request.mailbox);
    println!("Flags:   {}", request.flags.join(" "));
    println!();
    print!("{}", request.message);
    Ok(())
}

fn print_message(msg: &Message) {
    use humansize::{format_size, BINARY};

    let h = &msg.header;
    println!();
    println!("  {:<12} {}", "Date", format_date(msg));
    println!("  {:<12} {}", "From", h.sender);
    println!("  {:<12} {}", "To", h.receiver);
    println!("  {:<12} {}", "Subject", h.subject);
    println!("  {:<12} {}", "Size", format_size(h.size, BINARY));
    println!("  {:<12} {}", "Spam score", h.spam_indicator);
    if h.mime.mime_version > 0.0 {
        println!(
            "  {:<12} {:.1} {} ({})",
            "MIME", h.mime.mime_version, h.mime.content_type, h.mime.transfer_encoding
        );
    }
    let flags = msg.flags.to_symbols();
    if !flags.is_empty() {
        println!("  {:<12} {}", "Flags", flags.join(" "));
    }

    for (media_type, part) in msg.content.iter().flatten() {
        println!();
        println!(
            "  --- {} ({}, {}, {}) ---",
            media_type,
            part.charset,
            part.encoding,
            format_size(part.body.len(), BINARY)
        );
        println!("{}", part.body);
    }
    println!();
}

/// Print messages as a human-readable table.
fn print_overview_table(messages: &[Message]) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {} message(s)", messages.len());
    println!();

    if messages.is_empty() {
        return;
    }

    println!(
        "  {:<17} {:<25} {:<40} {:>8}",
        "Date", "From", "Subject", "Size"
    );
    println!("  {}", "-".repeat(93));

    for msg in messages {
        let from = truncate_str(&msg.header.sender, 24);
        let subject = truncate_str(&msg.header.subject, 39);
        println!(
            "  {:<17} {}{} {}{} {:>8}",
            format_date(msg),
            from,
            pad(&from, 25),
            subject,
            pad(&subject, 40),
            format_size(msg.header.size, BINARY)
        );
    }
    println!();
}

fn format_date(msg: &Message) -> String {
    if msg.header.has_unknown_date() {
        "-".to_string()
    } else {
        msg.header.date.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Spaces filling `s` up to `width` display columns.
fn pad(s: &str, width: usize) -> String {
    " ".repeat(width.saturating_sub(UnicodeWidthStr::width(s)))
}

/// Truncate a string to fit within `max_width` columns, adding "..." if needed.
fn truncate_str(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if current_width + ch_width + 3 > max_width {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("...");
    result
}
