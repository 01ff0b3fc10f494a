//! Session management commands

use crate::app::App;
use crate::cli::{OutputFormat, SessionCommands};
use crate::output;
use anyhow::Result;

/// Execute a session subcommand
pub async fn execute(app: &App, format: OutputFormat, cmd: SessionCommands) -> Result<()> {
    let conversations = &app.conversations;
    match cmd {
        SessionCommands::Create { owner, title } => {
            let session = conversations.create_session(owner, title.as_deref()).await?;
            match format {
                OutputFormat::Json => output::print_json(&session)?,
                OutputFormat::Table => println!("Created session {} ({})", session.id, session.title),
            }
        }
        SessionCommands::List { owner } => {
            let sessions = conversations.list_sessions(owner).await?;
            match format {
                OutputFormat::Json => output::print_json(&sessions)?,
                OutputFormat::Table if sessions.is_empty() => println!("No sessions found."),
                OutputFormat::Table => println!("{}", output::sessions_table(&sessions)),
            }
        }
        SessionCommands::Rename { id, title, owner } => {
            let session = conversations.rename_session(owner, id, &title).await?;
            match format {
                OutputFormat::Json => output::print_json(&session)?,
                OutputFormat::Table => println!("Renamed session {} to {}", session.id, session.title),
            }
        }
        SessionCommands::Delete { id, owner } => {
            conversations.delete_session(owner, id).await?;
            match format {
                OutputFormat::Json => output::print_json(&serde_json::json!({ "deleted": id }))?,
                OutputFormat::Table => println!("Deleted session {id}"),
            }
        }
        SessionCommands::Messages { id, owner } => {
            let messages = conversations.messages(owner, id).await?;
            match format {
                OutputFormat::Json => output::print_json(&messages)?,
                OutputFormat::Table if messages.is_empty() => println!("No messages yet."),
                OutputFormat::Table => println!("{}", output::messages_table(&messages)),
            }
        }
    }
    Ok(())
}
