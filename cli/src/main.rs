use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use sparkpost_mailer::{Address, Email, Mailer, SparkPostMailer};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sparkpost", about = "Send email through the SparkPost API")]
struct Cli {
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a message and send it (or preview it with --dry-run)
    Send(SendArgs),
}

#[derive(clap::Args)]
struct SendArgs {
    /// Sender address
    #[arg(long)]
    from: String,

    /// Sender display name
    #[arg(long)]
    from_name: Option<String>,

    /// Recipient, as `email` or `Name <email>`
    #[arg(long, required = true)]
    to: Vec<String>,

    #[arg(long)]
    cc: Vec<String>,

    #[arg(long)]
    bcc: Vec<String>,

    #[arg(long)]
    reply_to: Vec<String>,

    #[arg(short = 's', long, default_value = "")]
    subject: String,

    /// Plain text body
    #[arg(long)]
    text: Option<String>,

    /// HTML body
    #[arg(long)]
    html: Option<String>,

    /// File to attach (repeatable)
    #[arg(short = 'a', long = "attach")]
    attachments: Vec<PathBuf>,

    /// Print the request headers (key masked) and body instead of sending
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("initializing logger")?;

    match cli.command {
        Commands::Send(args) => send(args).await,
    }
}

async fn send(args: SendArgs) -> Result<()> {
    let mailer = SparkPostMailer::from_env().context("loading SparkPost configuration")?;
    let email = compose(&args)?;

    if args.dry_run {
        let headers = serde_json::to_string_pretty(&mailer.request_headers(true))?;
        let body = mailer
            .transmission(&email)
            .context("assembling transmission")?
            .to_json_pretty()?;
        println!("{headers}\n{body}");
        return Ok(());
    }

    let response = mailer.send(&email).await.context("sending transmission")?;
    match response.results() {
        Some(results) => log::info!(
            "Transmission {} accepted for {} recipient(s), {} rejected",
            results.id.as_deref().unwrap_or("-"),
            results.total_accepted_recipients,
            results.total_rejected_recipients
        ),
        None => log::info!("Transmission sent ({})", response.status),
    }
    log::trace!("{}", response.body);

    Ok(())
}

fn compose(args: &SendArgs) -> Result<Email> {
    let mut email = Email::new();
    email.is_mail();
    email.set_from(&args.from, args.from_name.as_deref())?;

    for address in parse_all(&args.to)? {
        email.add_address(&address.email, address.name.as_deref())?;
    }
    for address in parse_all(&args.cc)? {
        email.add_cc(&address.email, address.name.as_deref())?;
    }
    for address in parse_all(&args.bcc)? {
        email.add_bcc(&address.email, address.name.as_deref())?;
    }
    for address in parse_all(&args.reply_to)? {
        email.add_reply_to(&address.email, address.name.as_deref())?;
    }

    email.set_subject(&args.subject);
    if let Some(text) = &args.text {
        email.set_text(text);
    }
    if let Some(html) = &args.html {
        email.set_html(html);
    }
    for path in &args.attachments {
        log::debug!("Attaching {}", path.display());
        email.add_attachment(path);
    }

    Ok(email)
}

fn parse_all(values: &[String]) -> Result<Vec<Address>> {
    values
        .iter()
        .map(|value| {
            value
                .parse::<Address>()
                .with_context(|| format!("parsing address {value:?}"))
        })
        .collect()
}
