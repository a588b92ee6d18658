use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

use hearken_cli::{
    cli::{Cli, Commands, OutputFormat},
    commands,
    engine::Engine,
};
use hearken_config::ConfigLoader;
use hearken_lua::LuaCompiler;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    // Apply database path override if provided
    if let Some(db_path) = &cli.db_path {
        config.storage.path = db_path.clone();
    }

    // Priority: --log-level, then --verbose, then config file
    let env_filter = match (cli.log_level, cli.verbose) {
        (Some(level), _) => LevelFilter::from(level).to_string(),
        (None, true) => "debug".to_string(),
        (None, false) => {
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone())
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_ansi(config.logging.ansi)
        .with_writer(std::io::stderr)
        .init();
    debug!(db = %config.storage.path.display(), "Configuration loaded");

    let format = cli.format;
    let user = cli.user;

    match cli.command {
        Commands::Check { file } => {
            commands::check::execute(&LuaCompiler::from_config(&config.runner), &file)
        }
        command => {
            let engine = Engine::open(&config, &user).await?;
            run(&engine, command, format).await
        }
    }
}

async fn run(engine: &Engine, command: Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::List { all } => commands::listeners::list(engine, all, format).await,
        Commands::Show { id } => commands::listeners::show(engine, id, format).await,
        Commands::Create(args) => commands::listeners::create(engine, args, format).await,
        Commands::Update { id, listener } => {
            commands::listeners::update(engine, id, listener, format).await
        }
        Commands::Delete { id } => commands::listeners::delete(engine, id).await,
        Commands::History { id } => commands::listeners::history(engine, id, format).await,
        Commands::Fire {
            event_type,
            payload,
        } => commands::fire::execute(engine, event_type, &payload, format)
            .await
            .map(|_| ()),
        Commands::Check { file } => commands::check::execute(&engine.compiler, &file),
    }
}
