use clap::Subcommand;
use serde_json::json;
use std::io::BufRead;

use crate::cli::app::App;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Sign in with email and password")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (read from stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Sign out and forget the stored session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh authentication token")]
    Refresh,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let app = App::start(output_format)?;
    // Let any stored session finish resolving before replacing it
    let session = app.settle().await;

    match cmd {
        AuthCommands::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };

            match app.auth.sign_in(&email, &password).await {
                Ok(identity) => output_success(
                    &output_format,
                    &format!("Signed in as {}", email),
                    Some(json!({ "user_id": identity.id })),
                ),
                Err(e) => Err(e.into()),
            }
        }
        AuthCommands::Logout => {
            // Local state is cleared even when the backend call fails
            if let Err(e) = app.auth.sign_out().await {
                tracing::debug!(error = %e, "remote sign out failed");
            }
            output_success(&output_format, "Signed out", None)
        }
        AuthCommands::Status => {
            match output_format {
                OutputFormat::Json => {
                    let user_id = session.user.as_ref().map(|u| u.id.clone());
                    println!("{}", serde_json::to_string_pretty(&json!({
                        "signed_in": session.is_signed_in(),
                        "user_id": user_id,
                    }))?);
                }
                OutputFormat::Text => match &session.user {
                    Some(user) => println!("Signed in (user {})", user.id),
                    None => println!("Not signed in"),
                },
            }
            Ok(())
        }
        AuthCommands::Refresh => match app.auth.refresh().await {
            Ok(identity) => output_success(
                &output_format,
                "Session refreshed",
                Some(json!({ "user_id": identity.id })),
            ),
            Err(e) => Err(e.into()),
        },
    }
}

fn read_password() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("password is required");
    }
    Ok(password)
}
