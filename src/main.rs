//! coachlink - Trainer/student coaching backend

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use coachlink::backend::seed::{seed_demo, DEMO_STUDENT, DEMO_TRAINER};
use coachlink::config::StoreBackend;
use coachlink::gateway::ConfiguredProvider;
use coachlink::metrics::{
    consumed_macros, diet_completion, remaining_macros, scheduled_workouts, workout_completion,
    ProgressAnalytics,
};
use coachlink::models::Role;
use coachlink::state::IdentityCache;
use coachlink::store::{export_document, import_document, open_store, StoreDocument};
use coachlink::{Backend, ClientState, Config};

#[derive(Parser)]
#[command(name = "coachlink")]
#[command(author, version, about = "Trainer/student coaching backend")]
struct Cli {
    /// Store backend: sqlite or json
    #[arg(long, global = true)]
    store: Option<String>,

    /// Store file (defaults to coachlink.db / coachlink.json)
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the RPC server
    Serve {
        /// Listen address
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Create demo accounts and plans
    Seed,

    /// Dump the whole store to a JSON file
    Export { file: PathBuf },

    /// Load records from a JSON file written by `export`
    Import { file: PathBuf },

    /// Sign in through the configured gateway and print a summary
    Summary {
        username: String,
        password: String,

        /// RPC server base URL
        #[arg(long)]
        rpc_url: Option<String>,
    },

    /// Show streaks and trends for one student
    Progress {
        student_id: String,

        /// Meals that count as a full day (defaults to the student's diet plan)
        #[arg(short, long)]
        meals: Option<u32>,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(store) = &cli.store {
        config.store_backend = StoreBackend::parse(store)?;
    }
    if let Some(path) = &cli.store_path {
        config.store_path = Some(path.clone());
    }
    Ok(config)
}

fn open_backend(config: &Config) -> Result<Backend> {
    let store = open_store(config)
        .with_context(|| format!("opening store {}", config.store_path().display()))?;
    Ok(Backend::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(addr) = bind {
                config.bind_addr = addr;
            }
            let backend = open_backend(&config)?;
            coachlink::server::serve(config.bind_addr, backend).await?;
        }

        Commands::Seed => {
            let backend = open_backend(&config)?;
            if tokio::task::spawn_blocking(move || seed_demo(&backend)).await?? {
                println!("Demo data created:");
                println!("  trainer  {} / {}", DEMO_TRAINER.0, DEMO_TRAINER.1);
                println!("  student  {} / {}", DEMO_STUDENT.0, DEMO_STUDENT.1);
            } else {
                println!("Demo data already present");
            }
        }

        Commands::Export { file } => {
            let store = open_store(&config)?;
            let doc = export_document(store.as_ref())?;
            fs::write(&file, serde_json::to_vec_pretty(&doc)?)
                .with_context(|| format!("writing {}", file.display()))?;
            println!("Exported {} records to {}", doc.len(), file.display());
        }

        Commands::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let doc: StoreDocument = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a store export", file.display()))?;
            let store = open_store(&config)?;
            let count = import_document(store.as_ref(), &doc)?;
            println!("Imported {} records", count);
        }

        Commands::Summary { username, password, rpc_url } => {
            if let Some(url) = rpc_url {
                config.rpc_url = url.trim_end_matches('/').to_string();
            }
            let provider = Arc::new(ConfiguredProvider::new(&config));
            let identity = IdentityCache::new(&config.identity_path);
            let mut state = ClientState::new(provider, Some(identity));

            let user = state.login(&username, &password).await?;
            print_summary(&state, &user.name, user.role);
        }

        Commands::Progress { student_id, meals } => {
            let backend = open_backend(&config)?;
            let entries = backend.list_progress(&student_id)?;
            let meals_per_day = match meals {
                Some(m) => m,
                None => backend
                    .list_diets(&student_id)?
                    .first()
                    .map(|d| d.meals.len() as u32)
                    .unwrap_or(0),
            };
            let today = Local::now().date_naive();
            let analytics = ProgressAnalytics::new(entries);

            println!("Progress for {}", student_id);
            println!("{:-<40}", "");
            println!("Full days this week: {}/7", analytics.weekly_streak(meals_per_day, today));
            println!("Current streak:      {} days", analytics.current_streak(meals_per_day, today));
            println!("Workouts (30 days):  {:.0}%", analytics.completion_rate(30, today));
            match analytics.weight_change(30, today) {
                Some(delta) => println!("Weight (30 days):    {:+.1} kg", delta),
                None => println!("Weight (30 days):    not enough entries"),
            }
        }
    }

    Ok(())
}

fn print_summary(state: &ClientState, name: &str, role: Role) {
    let today = Local::now().date_naive();
    println!("Signed in as {} ({:?}) via {}", name, role, state.gateway_name());
    println!("{:-<60}", "");

    if role == Role::Trainer {
        println!("Students: {}", state.students().len());
        for s in state.students() {
            println!(
                "  {:20} | {} workout plans | {} diet plans",
                s.name,
                state.workouts_for(&s.id).count(),
                state.diets_for(&s.id).count()
            );
        }
        return;
    }

    let today_plans = scheduled_workouts(state.workouts(), today);
    println!("Workouts scheduled today: {}", today_plans.len());
    for plan in state.workouts() {
        println!("  {:24} {:5.1}% done", plan.name, workout_completion(plan));
    }
    for plan in state.diets() {
        let consumed = consumed_macros(plan);
        let remaining = remaining_macros(plan);
        println!(
            "  {:24} {:5.1}% eaten | {:.0} kcal in, {:.0} kcal left",
            plan.name,
            diet_completion(plan),
            consumed.calories,
            remaining.calories
        );
    }
    println!("Progress entries: {} | media: {}", state.progress().len(), state.media().len());
}
