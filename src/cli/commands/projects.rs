use clap::Subcommand;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::FunctionInvoker;
use crate::cli::app::App;
use crate::cli::utils::{output_collection, output_success};
use crate::cli::OutputFormat;
use crate::editor::CodeEditor;
use crate::gate::Route;
use crate::resource::project::{is_supported_language, LANGUAGES};
use crate::resource::Projects;
use crate::types::RecordId;

#[derive(Subcommand)]
pub enum ProjectsCommands {
    #[command(about = "List code projects, newest first")]
    List,

    #[command(about = "Save a file as a project (updates it when --id is given)")]
    Save {
        #[arg(help = "Project name")]
        name: String,
        #[arg(help = "File holding the code")]
        file: PathBuf,
        #[arg(long, help = "Language of the code (default javascript)")]
        language: Option<String>,
        #[arg(long, help = "Existing project ID to update")]
        id: Option<String>,
    },

    #[command(about = "Delete a project")]
    Delete {
        #[arg(help = "Project ID")]
        id: String,
    },

    #[command(about = "Generate code from a prompt")]
    Generate {
        #[arg(help = "What the code should do")]
        prompt: String,
        #[arg(long, help = "Target language (default: the project's, else javascript)")]
        language: Option<String>,
        #[arg(long, help = "Open this project first and replace its code")]
        id: Option<String>,
        #[arg(long, help = "Save the result under this project name")]
        save: Option<String>,
        #[arg(long, help = "Write the generated code to this file")]
        out: Option<PathBuf>,
    },
}

pub async fn handle(cmd: ProjectsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let app = App::start(output_format)?;
    let ctx = app.enter(Route::Code).await?;
    let functions: Arc<dyn FunctionInvoker> = Arc::new(app.client.clone());
    let editor = CodeEditor::new(
        app.manager::<Projects>(ctx),
        functions,
        app.config.generation.clone(),
    );

    match cmd {
        ProjectsCommands::List => {
            let projects = editor.projects();
            projects.load().await?;
            let records = projects.records();
            let lines = records
                .iter()
                .map(|p| {
                    format!(
                        "{}  {}  {}  {} file(s)",
                        p.id,
                        p.language,
                        p.name,
                        p.files.len()
                    )
                })
                .collect();
            output_collection(
                &output_format,
                "projects",
                serde_json::to_value(&records)?,
                lines,
                "No projects yet",
            )
        }
        ProjectsCommands::Save {
            name,
            file,
            language,
            id,
        } => {
            let code = fs::read_to_string(&file)?;
            if let Some(id) = id {
                open(&editor, id).await?;
            }
            if let Some(language) = language {
                check_language(&language)?;
                editor.set_language(&language);
            }
            editor.set_project_name(name);
            editor.set_code(code);
            editor.save().await?;
            Ok(())
        }
        ProjectsCommands::Delete { id } => {
            editor.projects().delete(&RecordId::new(id)).await?;
            Ok(())
        }
        ProjectsCommands::Generate {
            prompt,
            language,
            id,
            save,
            out,
        } => {
            if let Some(id) = id {
                open(&editor, id).await?;
            }
            if let Some(language) = language {
                check_language(&language)?;
                editor.set_language(&language);
            }
            editor.set_prompt(prompt);
            editor.generate().await?;

            let code = editor.draft().code;
            match &out {
                Some(path) => {
                    fs::write(path, &code)?;
                    output_success(
                        &output_format,
                        &format!("Wrote {}", path.display()),
                        Some(serde_json::json!({ "code": code })),
                    )?;
                }
                None if output_format == OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&editor.draft())?);
                }
                None => println!("{}", code),
            }

            if let Some(name) = save {
                editor.set_project_name(name);
                editor.save().await?;
            }
            Ok(())
        }
    }
}

async fn open(editor: &CodeEditor, id: String) -> anyhow::Result<()> {
    editor.projects().load().await?;
    let id = RecordId::new(id);
    if !editor.open_project(&id) {
        anyhow::bail!("Project '{}' not found", id);
    }
    Ok(())
}

fn check_language(language: &str) -> anyhow::Result<()> {
    if !is_supported_language(language) {
        anyhow::bail!(
            "Unsupported language '{}' (expected one of: {})",
            language,
            LANGUAGES.join(", ")
        );
    }
    Ok(())
}
