//! geoform CLI - offline-first survey capture and sync from the terminal.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands, ConfigCommands, ProjectCommands};
use crate::commands::common::resolve_db_path;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("geoform=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Project { command } => match command {
            ProjectCommands::Create { name, fields } => {
                let fields = commands::project::resolve_fields_path(fields);
                commands::project::run_create(&name, fields.as_deref(), &db_path).await?;
            }
            ProjectCommands::List { json } => {
                commands::project::run_list(json, &db_path).await?;
            }
            ProjectCommands::MarkSynced { id, version_id } => {
                commands::project::run_mark_synced(&id, &version_id, &db_path).await?;
            }
        },
        Commands::Add {
            project,
            data,
            lng,
            lat,
            geom,
        } => {
            commands::record::run_add(&project, &data, lng, lat, geom.as_deref(), &db_path).await?;
        }
        Commands::List {
            project,
            limit,
            offset,
            keyword,
            json,
        } => {
            commands::record::run_list(&project, limit, offset, keyword.as_deref(), json, &db_path)
                .await?;
        }
        Commands::Edit { id, data } => {
            commands::record::run_edit(&id, &data, &db_path).await?;
        }
        Commands::Delete { id } => {
            commands::record::run_delete(&id, &db_path).await?;
        }
        Commands::Attach { id, file } => {
            commands::record::run_attach(&id, &file, &db_path).await?;
        }
        Commands::Watch { project } => {
            commands::record::run_watch(&project, &db_path).await?;
        }
        Commands::Submit { project } => {
            commands::submit::run_submit(&project, &db_path).await?;
        }
        Commands::Status { project } => {
            commands::submit::run_status(&project, &db_path).await?;
        }
        Commands::Backup { output } => {
            commands::backup::run_backup(output.as_deref(), &db_path).await?;
        }
        Commands::Restore {
            file,
            accept_version_diff,
            accept_missing_tables,
        } => {
            commands::backup::run_restore(
                &file,
                accept_version_diff,
                accept_missing_tables,
                &db_path,
            )
            .await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config::run_show(&db_path).await?,
            ConfigCommands::Camera { id } => commands::config::run_camera(&id, &db_path).await?,
            ConfigCommands::ContinuousBackup => {
                commands::backup::run_toggle_continuous(&db_path).await?;
            }
        },
    }

    Ok(())
}
