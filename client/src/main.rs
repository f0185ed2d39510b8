use clap::{Parser, Subcommand, ValueEnum};

use anyhow::{Context, Result};
use client::config::{Config, read_config, read_config_from_toml};
use client::promo::{hash_code, redeem_code, register_code};
use client::registry::{create_artist, create_concert, create_venue, get_artist, get_concert, get_venue, next_id};
use client::rpc::{JsonRpcLedger, JsonRpcWallet};
use client::validation::{ValidatorRole, buy_ticket, validate_as};
use client::{Session, Transaction, TxStatus};
use ledger_api::CounterKind;
use sandbox::{InMemoryLedger, SandboxWallet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ticketing")]
struct Cli {
    /// Path to config.toml (defaults to ./config/config.toml)
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Role {
    Artist,
    Venue,
}

impl From<Role> for ValidatorRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Artist => ValidatorRole::Artist,
            Role::Venue => ValidatorRole::Venue,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect the wallet and print the bound account
    Connect,
    /// Register an artist profile
    CreateArtist {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 1)]
        royalty_rate: u64,
    },
    /// Register a venue profile
    CreateVenue {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 100)]
        capacity: u64,
        #[arg(long, default_value_t = 20)]
        commission: u8,
    },
    /// Schedule a concert pairing an artist and a venue
    CreateConcert {
        #[arg(long)]
        artist_id: u64,
        #[arg(long)]
        venue_id: u64,
        /// Date, e.g. 2026-06-21T20:30 (UTC) or RFC 3339
        #[arg(long, default_value = "")]
        date: String,
        /// Ticket price in ETH
        #[arg(long, default_value = "0.1")]
        price: String,
    },
    /// Attest a concert as its artist or venue
    Validate {
        #[arg(long)]
        concert_id: u64,
        #[arg(long, value_enum)]
        role: Role,
    },
    /// Buy a ticket at the concert's price
    BuyTicket {
        #[arg(long)]
        concert_id: u64,
    },
    /// Register the hash of a promo code for a concert
    RegisterCode {
        #[arg(long)]
        concert_id: u64,
        #[arg(long)]
        code: String,
    },
    /// Redeem a promo code for a free ticket
    RedeemCode {
        #[arg(long)]
        code: String,
    },
    /// Print the hash a promo code commits to
    HashCode {
        #[arg(long)]
        code: String,
    },
    ShowArtist {
        #[arg(long)]
        id: u64,
    },
    ShowVenue {
        #[arg(long)]
        id: u64,
    },
    ShowConcert {
        #[arg(long)]
        id: u64,
    },
    /// Print the next artist, venue and concert ids
    Counters,
    /// Run the whole workflow against an in-memory sandbox
    Demo,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => read_config(path),
        None => read_config_from_toml(),
    }
}

/// Prints a status line for every tracked write, like a wallet status bar.
fn spawn_status_printer(session: &Session) -> JoinHandle<()> {
    let mut updates = BroadcastStream::new(session.tracker().subscribe());
    tokio::spawn(async move {
        while let Some(update) = updates.next().await {
            match update {
                Ok(tx) => println!("{}", status_line(&tx)),
                Err(e) => warn!("Status feed lagged: {}", e),
            }
        }
    })
}

fn status_line(tx: &Transaction) -> String {
    match tx.status {
        TxStatus::Submitted => format!("[{}] Waiting for signature...", tx.kind),
        TxStatus::Pending => format!(
            "[{}] Transaction sent... {}",
            tx.kind,
            tx.explorer_link
                .clone()
                .or_else(|| tx.hash.map(|h| h.to_string()))
                .unwrap_or_default()
        ),
        TxStatus::Confirmed => format!("[{}] Confirmed", tx.kind),
        TxStatus::Failed => format!(
            "[{}] Failed: {}",
            tx.kind,
            tx.error_detail.as_deref().unwrap_or("unknown error")
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::HashCode { code } => {
            init_tracing("info");
            info!("H({:?}) = {}", code, hash_code(&code));
            Ok(())
        }
        Commands::Demo => {
            init_tracing("info");
            run_demo().await
        }
        command => {
            let config = load_config(cli.config_file.as_ref())?;
            init_tracing(&config.logging.level);
            let ledger = JsonRpcLedger::new(
                config.ledger.rpc_url.clone(),
                config.ledger.contract_address()?,
                config.ledger.poll_interval(),
            );
            let wallet = JsonRpcWallet::new(ledger);
            let session = Session::connect(Some(&wallet), config.ledger.explorer_url.clone())
                .await
                .context("Connection rejected")?;
            let printer = spawn_status_printer(&session);

            let result = run_command(&session, command).await;

            session.disconnect();
            let _ = printer.await;
            result
        }
    }
}

async fn run_command(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Connect => {
            info!("Connected as {}", session.identity().address());
        }
        Commands::CreateArtist { name, royalty_rate } => {
            let created = create_artist(session, &name, royalty_rate).await?;
            info!("Artist Profile Created (ID: {})", created.id);
        }
        Commands::CreateVenue {
            name,
            capacity,
            commission,
        } => {
            let created = create_venue(session, &name, capacity, commission).await?;
            info!("Venue Profile Created (ID: {})", created.id);
        }
        Commands::CreateConcert {
            artist_id,
            venue_id,
            date,
            price,
        } => {
            let created = create_concert(session, artist_id, venue_id, &date, &price).await?;
            info!("Event Created (ID: {})", created.id);
        }
        Commands::Validate { concert_id, role } => {
            let role = ValidatorRole::from(role);
            validate_as(session, concert_id, role).await?;
            info!("Validated by {}", role);
        }
        Commands::BuyTicket { concert_id } => {
            buy_ticket(session, concert_id).await?;
            info!("Ticket Successfully Purchased!");
        }
        Commands::RegisterCode { concert_id, code } => {
            register_code(session, concert_id, &code).await?;
            info!("Promo Code {:?} linked to Event #{}", code, concert_id);
        }
        Commands::RedeemCode { code } => {
            redeem_code(session, &code).await?;
            info!("Ticket Redeemed successfully!");
        }
        Commands::ShowArtist { id } => {
            info!("{:#?}", get_artist(session, id).await?);
        }
        Commands::ShowVenue { id } => {
            info!("{:#?}", get_venue(session, id).await?);
        }
        Commands::ShowConcert { id } => {
            let concert = get_concert(session, id).await?;
            info!("{:#?}", concert);
            info!("Purchasable: {}", concert.is_purchasable());
        }
        Commands::Counters => {
            for kind in [CounterKind::Artist, CounterKind::Venue, CounterKind::Concert] {
                info!("{}: {}", kind.function_name(), next_id(session, kind).await?);
            }
        }
        Commands::HashCode { .. } | Commands::Demo => {
            anyhow::bail!("{:?} runs without a wallet connection", command)
        }
    }
    Ok(())
}

/// Artist, venue, organizer and fan each drive their own session against one sandbox.
async fn run_demo() -> Result<()> {
    let ledger = Arc::new(InMemoryLedger::new());
    let artist_wallet = SandboxWallet::new(Arc::clone(&ledger), "artist");
    let venue_wallet = SandboxWallet::new(Arc::clone(&ledger), "venue");
    let fan_wallet = SandboxWallet::new(Arc::clone(&ledger), "fan");

    let artist = Session::connect(Some(&artist_wallet), None).await?;
    let venue = Session::connect(Some(&venue_wallet), None).await?;
    let fan = Session::connect(Some(&fan_wallet), None).await?;

    let artist_id = create_artist(&artist, "Daft Punk", 1).await?.id;
    let venue_id = create_venue(&venue, "Olympia", 2000, 20).await?.id;
    let date = (chrono::Utc::now() + chrono::Duration::days(60))
        .format("%Y-%m-%dT%H:%M")
        .to_string();
    let concert_id = create_concert(&venue, artist_id, venue_id, &date, "0.1").await?.id;
    info!("Concert {} scheduled on {}", concert_id, date);

    match buy_ticket(&fan, concert_id).await {
        Err(e) => info!("Purchase before validation refused: {}", e),
        Ok(_) => warn!("Purchase before validation went through"),
    }

    validate_as(&artist, concert_id, ValidatorRole::Artist).await?;
    validate_as(&venue, concert_id, ValidatorRole::Venue).await?;
    buy_ticket(&fan, concert_id).await?;
    info!("Fan bought a ticket for concert {}", concert_id);

    register_code(&venue, concert_id, "VIP2025").await?;
    redeem_code(&fan, "VIP2025").await?;
    match redeem_code(&fan, "VIP2025").await {
        Err(e) => info!("Second redemption refused: {}", e),
        Ok(_) => warn!("Promo code redeemed twice"),
    }

    info!(
        "Fan {} holds {} tickets",
        fan.identity().address().short(),
        ledger.tickets_of(fan.identity().address()).len()
    );
    Ok(())
}
