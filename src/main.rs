use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use topical::analysis::{ChatCompletionsAnalyzer, ReportKind, TopicAnalyzer};
use topical::config::Config;
use topical::db::models::Priority;
use topical::db::Database;
use topical::output::{export, terminal};
use topical::session::{SessionHost, Submission, SubmissionContent};
use topical::topics::search::{SearchFilter, SearchQuery};

/// Topical: topic analysis for chat records.
///
/// Sends chat records to an OpenAI-compatible analysis service, stores the
/// topics it finds per chat group, and serves a browser UI over them.
#[derive(Parser)]
#[command(name = "topical", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web session host
    Serve {
        /// Port to listen on (default: TOPICAL_PORT or 8501)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: TOPICAL_BIND or 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Initialize the database
    Init,

    /// Analyse a file of chat records (.txt, .md, .log, .csv, .pdf, .docx)
    Analyze {
        /// The file to analyse
        file: PathBuf,

        /// Chat group the records belong to
        #[arg(long)]
        group: String,

        /// Optional group description passed to the service
        #[arg(long, default_value = "")]
        description: String,

        /// Replace the group's stored topics instead of appending
        #[arg(long)]
        replace: bool,
    },

    /// List chat groups
    Groups,

    /// List topics, high priority first
    Topics {
        /// Only this group (e.g. group_001)
        #[arg(long)]
        group: Option<String>,

        /// Only this priority (high, medium, low)
        #[arg(long)]
        priority: Option<String>,
    },

    /// Search topics by keyword, optionally ranked by the analysis service
    Search {
        query: String,

        /// Only groups whose name contains this
        #[arg(long)]
        group: Option<String>,

        /// Only topics whose name contains this
        #[arg(long)]
        topic: Option<String>,

        /// Also ask the analysis service for a semantic ranking
        #[arg(long)]
        ai: bool,

        /// Max AI recommendations (default: 10)
        #[arg(long, default_value = "10")]
        max: usize,

        /// Send candidates to the service in batches of this size
        #[arg(long)]
        batch: Option<usize>,
    },

    /// Generate a report for one topic
    Report {
        topic_id: String,

        /// summary, detailed or analysis
        #[arg(long, default_value = "detailed")]
        kind: ReportKind,

        /// Also write the report to the reports directory
        #[arg(long)]
        export: bool,
    },

    /// Show how topics link to each other
    Graph {
        /// Only this group (e.g. group_001)
        #[arg(long)]
        group: Option<String>,
    },

    /// Write all groups and topics to a JSON file
    Export { path: PathBuf },

    /// Replace all stored groups with the contents of a JSON export
    Import { path: PathBuf },

    /// Show configuration and database status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("topical=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::load()?);

    match cli.command {
        Commands::Serve { port, bind } => {
            // A missing or malformed key stops startup before anything binds
            let api_key = config.require_api_key()?;
            let analyzer = ChatCompletionsAnalyzer::new(&config, api_key)?;
            let db = topical::db::initialize_sqlite(&config.db_path)?;
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            let port = port.unwrap_or(config.port);

            info!(model = %config.model, db = %config.db_path, "Starting session host");
            let session = Arc::new(SessionHost::new(config.clone(), Arc::new(analyzer), db));
            topical::web::run_server(session, &bind, port).await?;
        }

        Commands::Init => {
            info!("Initializing Topical database...");
            let db = topical::db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            if config.api_key.is_none() {
                println!("\nNext step: set TOPICAL_API_KEY in your .env file");
                println!("  (see .env.example for the other variables)");
            }
            println!("\nThen run: topical serve");
        }

        Commands::Analyze {
            file,
            group,
            description,
            replace,
        } => {
            let session = session_host(&config)?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let spinner = terminal::service_spinner(&format!("Analysing {file_name}"));
            let result = session
                .submit(Submission {
                    group_name: group,
                    description,
                    content: SubmissionContent::Document { file_name, bytes },
                    replace_existing: replace,
                })
                .await;
            spinner.finish_and_clear();

            terminal::display_submission(&result?);
        }

        Commands::Groups => {
            let db = topical::db::open_sqlite(&config.db_path)?;
            let structure = db.load_structure().await?;
            terminal::display_groups(&structure.chat_groups);
        }

        Commands::Topics { group, priority } => {
            let db = topical::db::open_sqlite(&config.db_path)?;
            let structure = db.load_structure().await?;
            let priority = priority.as_deref().map(Priority::from_label);
            let topics = topical::topics::by_priority(&structure, group.as_deref(), priority);
            terminal::display_topics(&topics);
        }

        Commands::Search {
            query,
            group,
            topic,
            ai,
            max,
            batch,
        } => {
            let db = topical::db::open_sqlite(&config.db_path)?;
            let structure = db.load_structure().await?;

            // Keyword search works without a key; only the AI ranking needs one
            let analyzer = if ai {
                Some(ChatCompletionsAnalyzer::new(&config, config.require_api_key()?)?)
            } else {
                None
            };

            let request = SearchQuery {
                query,
                filter: SearchFilter {
                    group_name: group,
                    topic_name: topic,
                },
                use_ai: ai,
                max_results: max,
                batch_size: batch,
            };

            let spinner = ai.then(|| terminal::service_spinner("Ranking topics"));
            let results = topical::topics::search::search(
                analyzer.as_ref().map(|a| a as &dyn TopicAnalyzer),
                &structure,
                &request,
            )
            .await;
            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }

            terminal::display_search_results(&results?);
        }

        Commands::Report {
            topic_id,
            kind,
            export,
        } => {
            let session = session_host(&config)?;
            let spinner = terminal::service_spinner(&format!("Writing {kind} report"));
            let result = session.report(&topic_id, kind, export).await;
            spinner.finish_and_clear();

            let outcome = result?;
            println!("\n{}\n", outcome.content);
            if let Some(path) = outcome.exported_to {
                println!("{} Report saved to {}", "✓".green(), path.display());
            }
        }

        Commands::Graph { group } => {
            let db = topical::db::open_sqlite(&config.db_path)?;
            let structure = db.load_structure().await?;
            let graph = topical::topics::graph::TopicGraph::build(&structure, group.as_deref());
            terminal::display_graph(&graph);
        }

        Commands::Export { path } => {
            let db = topical::db::open_sqlite(&config.db_path)?;
            let structure = db.load_structure().await?;
            export::write_structure(&path, &structure)?;
            println!(
                "{} Exported {} groups, {} topics to {}",
                "✓".green(),
                structure.chat_groups.len(),
                structure.topic_count(),
                path.display()
            );
        }

        Commands::Import { path } => {
            let structure = export::read_structure(&path)?;
            let db = topical::db::initialize_sqlite(&config.db_path)?;
            let groups = db.import_structure(&structure).await?;
            println!(
                "{} Imported {groups} groups, {} topics from {}",
                "✓".green(),
                structure.topic_count(),
                path.display()
            );
        }

        Commands::Status => {
            let db = if std::path::Path::new(&config.db_path).exists() {
                Some(topical::db::open_sqlite(&config.db_path)?)
            } else {
                None
            };
            topical::status::show(&config, db.as_ref()).await?;
        }
    }

    Ok(())
}

/// Session host for one-shot CLI commands that call the analysis service.
fn session_host(config: &Arc<Config>) -> Result<SessionHost> {
    let api_key = config.require_api_key()?;
    let analyzer = ChatCompletionsAnalyzer::new(config, api_key)?;
    let db: Arc<dyn Database> = topical::db::open_sqlite(&config.db_path)?;
    Ok(SessionHost::new(config.clone(), Arc::new(analyzer), db))
}
