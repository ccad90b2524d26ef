use clap::Subcommand;

use crate::cli::app::App;
use crate::cli::utils::{output_collection, preview};
use crate::cli::OutputFormat;
use crate::gate::Route;
use crate::resource::{Journal, JournalForm};
use crate::types::RecordId;

#[derive(Subcommand)]
pub enum JournalCommands {
    #[command(about = "List entries, newest first")]
    List,

    #[command(about = "Write a new entry")]
    Add {
        #[arg(help = "Entry title")]
        title: String,
        #[arg(long, default_value = "", help = "Entry body")]
        content: String,
    },

    #[command(about = "Change an existing entry")]
    Edit {
        #[arg(help = "Entry ID")]
        id: String,
        #[arg(long, help = "New title")]
        title: Option<String>,
        #[arg(long, help = "New body")]
        content: Option<String>,
    },

    #[command(about = "Delete an entry")]
    Delete {
        #[arg(help = "Entry ID")]
        id: String,
    },
}

pub async fn handle(cmd: JournalCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let app = App::start(output_format)?;
    let ctx = app.enter(Route::Journal).await?;
    let journal = app.manager::<Journal>(ctx);

    match cmd {
        JournalCommands::List => {
            journal.load().await?;
            let entries = journal.records();
            let lines = entries
                .iter()
                .map(|e| {
                    format!(
                        "{}  {}  {}  {}",
                        e.id,
                        e.created_at.format("%Y-%m-%d %H:%M"),
                        e.title,
                        preview(&e.content, 48)
                    )
                })
                .collect();
            output_collection(
                &output_format,
                "entries",
                serde_json::to_value(&entries)?,
                lines,
                "No entries yet",
            )
        }
        JournalCommands::Add { title, content } => {
            journal.set_form(JournalForm { title, content });
            journal.submit().await?;
            Ok(())
        }
        JournalCommands::Edit { id, title, content } => {
            journal.load().await?;
            let id = RecordId::new(id);
            if !journal.begin_edit(&id) {
                anyhow::bail!("Entry '{}' not found", id);
            }
            journal.edit_form(|form| {
                if let Some(title) = title {
                    form.title = title;
                }
                if let Some(content) = content {
                    form.content = content;
                }
            });
            journal.submit().await?;
            Ok(())
        }
        JournalCommands::Delete { id } => {
            journal.delete(&RecordId::new(id)).await?;
            Ok(())
        }
    }
}
