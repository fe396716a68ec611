use std::path::PathBuf;

use agentdeck_core::config::EngineConfig;
use agentdeck_core::database::connection::{establish_connection, get_database_url};
use agentdeck_core::database::schema_gate::{ensure_schema_current, pending_migrations};
use agentdeck_core::services::SyncReport;
use agentdeck_core::AppContext;
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// SQLite file or database URL; overrides the config file and environment.
    #[clap(short, long, global = true)]
    database: Option<String>,
    /// Optional TOML configuration file.
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
    /// Apply pending migrations before running the command.
    #[clap(long, global = true)]
    auto_migrate: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply all pending migrations.
    #[command(name = "migrate")]
    Migrate,
    /// List migrations that have not been applied yet.
    #[command(name = "schema-status")]
    SchemaStatus,
    /// Reconcile every project in a category with its attached templates.
    #[command(name = "sync-category")]
    SyncCategory { category_id: String },
    /// Reconcile a single project.
    #[command(name = "sync-project")]
    SyncProject { project_id: String },
    /// Reconcile every category a template is attached to.
    #[command(name = "sync-template")]
    SyncTemplate { template_id: String },
    /// Replace a template's category attachments and resync.
    #[command(name = "attach")]
    Attach {
        template_id: String,
        /// Categories to attach to; omit all to detach everywhere.
        category_ids: Vec<String>,
    },
    /// Remove one attachment and resync the category.
    #[command(name = "detach")]
    Detach {
        template_id: String,
        category_id: String,
    },
    /// Resolve an instance or template id to the user's instance, creating it
    /// on demand.
    #[command(name = "materialize")]
    Materialize {
        id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        project: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database.as_deref() {
        config.database_url = get_database_url(Some(database));
    }
    if cli.auto_migrate {
        config.auto_migrate = true;
    }

    info!(database = %config.database_url, "Connecting to database");
    let db = establish_connection(&config.database_url).await?;

    match cli.command {
        Command::Migrate => {
            ensure_schema_current(&db, true).await?;
            println!("Schema is current");
            return Ok(());
        }
        Command::SchemaStatus => {
            let pending = pending_migrations(&db).await?;
            if pending.is_empty() {
                println!("Schema is current");
            } else {
                for name in pending {
                    println!("pending: {}", name);
                }
            }
            return Ok(());
        }
        _ => {}
    }

    ensure_schema_current(&db, config.auto_migrate).await?;
    let ctx = AppContext::new(db, &config);

    match cli.command {
        Command::SyncCategory { category_id } => print_report(&ctx.sync_category(&category_id).await?)?,
        Command::SyncProject { project_id } => print_report(&ctx.sync_project(&project_id).await?)?,
        Command::SyncTemplate { template_id } => print_report(&ctx.sync_template(&template_id).await?)?,
        Command::Attach {
            template_id,
            category_ids,
        } => print_report(&ctx.attach_template(&template_id, &category_ids).await?)?,
        Command::Detach {
            template_id,
            category_id,
        } => print_report(&ctx.detach_template(&template_id, &category_id).await?)?,
        Command::Materialize { id, user, project } => {
            match ctx
                .get_or_create_instance(&id, &user, project.as_deref())
                .await
            {
                Some(instance) => println!("{}", serde_json::to_string_pretty(&instance)?),
                None => bail!("No instance could be resolved for {}", id),
            }
        }
        Command::Migrate | Command::SchemaStatus => {}
    }

    Ok(())
}

fn print_report(report: &SyncReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_deref()
        .unwrap_or("info")
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
