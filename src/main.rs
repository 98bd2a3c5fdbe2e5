use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fee_ledger::{
    export_slip, insert_person, ledger, list_persons, logging, Config, LedgerSummary,
    NewPerson, Store, SyncClient,
};

#[derive(Parser)]
#[command(name = "fee-ledger", version, about = "Monthly fee ledger with peer store sync")]
struct Cli {
    /// TOML config file (defaults to $FEE_LEDGER_CONFIG, then env vars)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store file, overriding the config
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the store file and its tables
    Init,

    /// Register or list persons
    #[command(subcommand)]
    Person(PersonCommand),

    /// Show the 12-month schedule for a person
    Schedule { person_id: i64 },

    /// Record the amount paid for one month slot (0-11)
    Pay {
        person_id: i64,
        month_index: i64,
        amount: i64,
    },

    /// Write a person's fee slip as CSV
    Slip {
        person_id: i64,
        #[arg(long)]
        out: PathBuf,
    },

    /// Pull the remote store over ours, then push it back
    Sync {
        /// host:port or http://host:port; falls back to remote_url in config
        remote: Option<String>,
    },
}

#[derive(Subcommand)]
enum PersonCommand {
    Add {
        #[arg(long)]
        group: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        guardian: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long, default_value_t = 0)]
        charge: i64,
    },
    List {
        #[arg(long)]
        group: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => Config::load().context("Failed to load config")?,
    };
    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }

    logging::init(&config.log_filter);

    let store = Store::open(&config.store_path)?;

    match cli.command {
        Command::Init => {
            println!("✓ Store ready at {:?}", store.path());
        }
        Command::Person(PersonCommand::Add {
            group,
            name,
            guardian,
            contact,
            charge,
        }) => {
            let conn = store.connect()?;
            let id = insert_person(
                &conn,
                &NewPerson {
                    group_name: group,
                    display_name: name,
                    guardian_name: guardian,
                    contact,
                    base_monthly_charge: charge,
                },
            )?;
            println!("✓ Registered person {}", id);
        }
        Command::Person(PersonCommand::List { group }) => {
            let conn = store.connect()?;
            let persons = list_persons(&conn, group.as_deref())?;
            for p in &persons {
                println!(
                    "{:>5}  {:<10} {:<30} {:>8}",
                    p.id, p.group_name, p.display_name, p.base_monthly_charge
                );
            }
            println!("{} person(s)", persons.len());
        }
        Command::Schedule { person_id } => {
            let conn = store.connect()?;
            let (person, _, schedule) = ledger::load_schedule(&conn, person_id)?;

            println!("📒 {} ({})", person.display_name, person.group_name);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            for m in &schedule {
                println!(
                    "{:<10} expected {:>7}  paid {:>7} {}  due {:>8}",
                    ledger::month_name(m.month_index),
                    m.expected_this_month,
                    m.amount_paid,
                    if m.paid() { "✓" } else { " " },
                    m.carry_forward_due
                );
            }
            let summary = LedgerSummary::from_schedule(&schedule);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!(
                "Total expected {}  paid {}  outstanding {}",
                summary.total_expected, summary.total_paid, summary.outstanding
            );
        }
        Command::Pay {
            person_id,
            month_index,
            amount,
        } => {
            let conn = store.connect()?;
            let payment_id = ledger::set_payment(&conn, person_id, month_index, amount)?;
            println!("✓ Payment {} recorded", payment_id);
        }
        Command::Slip { person_id, out } => {
            let conn = store.connect()?;
            let (person, _, schedule) = ledger::load_schedule(&conn, person_id)?;
            export_slip(&out, &person, &schedule)?;
            println!("✓ Slip written to {:?}", out);
        }
        Command::Sync { remote } => {
            let remote = remote
                .or_else(|| config.remote_url.clone())
                .context("No remote given and remote_url is not configured")?;

            let client = SyncClient::new(&remote, config.request_timeout())?;
            let report = client.run_session(store.path()).await;

            // A failed session is reported, not raised
            if report.is_completed() {
                println!("✅ {}", report.summary());
            } else {
                println!("⚠️  {}", report.summary());
            }
        }
    }

    Ok(())
}
