use clap::Subcommand;

use crate::cli::app::App;
use crate::cli::utils::output_collection;
use crate::cli::OutputFormat;
use crate::gate::Route;
use crate::resource::{SecretForm, Secrets};
use crate::secrets::SecretsView;
use crate::types::RecordId;

#[derive(Subcommand)]
pub enum SecretsCommands {
    #[command(about = "List secrets with values masked")]
    List {
        #[arg(long, help = "Show the value of this secret ID (repeatable)")]
        reveal: Vec<String>,
    },

    #[command(about = "Store a new secret")]
    Add {
        #[arg(help = "Secret key")]
        key: String,
        #[arg(help = "Secret value")]
        value: String,
        #[arg(long, default_value = "", help = "Optional description")]
        description: String,
    },

    #[command(about = "Change an existing secret")]
    Update {
        #[arg(help = "Secret ID")]
        id: String,
        #[arg(long, help = "New key")]
        key: Option<String>,
        #[arg(long, help = "New value")]
        value: Option<String>,
        #[arg(long, help = "New description (empty to remove)")]
        description: Option<String>,
    },

    #[command(about = "Delete a secret")]
    Delete {
        #[arg(help = "Secret ID")]
        id: String,
    },
}

pub async fn handle(cmd: SecretsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let app = App::start(output_format)?;
    let ctx = app.enter(Route::Secrets).await?;
    let view = SecretsView::new(app.manager::<Secrets>(ctx), &app.config.resources);

    match cmd {
        SecretsCommands::List { reveal } => {
            view.manager().load().await?;
            for id in reveal {
                view.toggle(&RecordId::new(id));
            }

            let rows = view.rows();
            let lines = rows
                .iter()
                .map(|row| {
                    let mut line = format!("{}  {} = {}", row.id, row.key, row.value);
                    if let Some(description) = &row.description {
                        line.push_str(&format!("  ({})", description));
                    }
                    line
                })
                .collect();
            output_collection(
                &output_format,
                "secrets",
                serde_json::to_value(&rows)?,
                lines,
                "No secrets stored",
            )
        }
        SecretsCommands::Add { key, value, description } => {
            view.manager().set_form(SecretForm {
                key,
                value,
                description,
            });
            view.manager().submit().await?;
            Ok(())
        }
        SecretsCommands::Update {
            id,
            key,
            value,
            description,
        } => {
            let secrets = view.manager();
            secrets.load().await?;
            let id = RecordId::new(id);
            if !secrets.begin_edit(&id) {
                anyhow::bail!("Secret '{}' not found", id);
            }
            secrets.edit_form(|form| {
                if let Some(key) = key {
                    form.key = key;
                }
                if let Some(value) = value {
                    form.value = value;
                }
                if let Some(description) = description {
                    form.description = description;
                }
            });
            secrets.submit().await?;
            Ok(())
        }
        SecretsCommands::Delete { id } => {
            view.manager().delete(&RecordId::new(id)).await?;
            Ok(())
        }
    }
}
