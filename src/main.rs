use anyhow::Result;
use clap::Parser;
use ironlog::OutputFmt;
use ironlog::cli::{Cli, Commands};
use ironlog::commands;
use ironlog::db::open;
use ironlog::storage::{self, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let fmt = OutputFmt::from_json_flag(cli.json);

    let config = Config::load(&storage::config_path()?)?;
    let db_path = match config.db_path() {
        Some(path) => path,
        None => storage::default_db_path()?,
    };

    let pool = open(&db_path).await?;

    match cli.cmd {
        Commands::Session(cmd) => commands::session::handle(cmd, &pool, &config, fmt).await?,
        Commands::Template(cmd) => commands::template::handle(cmd, &pool, fmt).await?,
        Commands::Split(cmd) => commands::split::handle(cmd, &pool, fmt).await?,
        Commands::Exercise(cmd) => commands::exercise::handle(cmd, &pool, fmt).await?,
        Commands::Status { template, session } => {
            commands::status::handle(&pool, template, session, &config, fmt).await?
        }
        Commands::Dashboard => commands::dashboard::handle(&pool, fmt).await?,
        Commands::Calendar { year, month } => commands::calendar::handle(&pool, year, month).await?,
        Commands::Config(cmd) => commands::config::handle(cmd).await?,
    }

    Ok(())
}
