use std::sync::Arc;

use crate::backend::{RestAuth, RestClient};
use crate::cli::config::FileSessionStore;
use crate::cli::utils::{output_error, ConsoleNotifier};
use crate::cli::OutputFormat;
use crate::config::{config, AppConfig};
use crate::error::ClientError;
use crate::gate::{GateState, Route, RouteGate};
use crate::notify::SharedNotifier;
use crate::resource::{ResourceKind, ResourceManager};
use crate::session::{Session, SessionContext, SessionManager};

/// Everything one CLI invocation needs: backend client, auth, session and gate
pub struct App {
    pub config: &'static AppConfig,
    pub client: RestClient,
    pub auth: Arc<RestAuth>,
    pub session: SessionManager,
    pub gate: RouteGate,
    pub notifier: SharedNotifier,
    pub output_format: OutputFormat,
}

impl App {
    pub fn start(output_format: OutputFormat) -> anyhow::Result<Self> {
        let config = config();
        let client = RestClient::new(&config.backend)?;
        let store = FileSessionStore::in_config_dir()?;
        let auth = Arc::new(RestAuth::new(client.clone(), Box::new(store), &config.auth));
        let session = SessionManager::start(auth.clone());

        Ok(Self {
            config,
            client,
            auth,
            session,
            gate: RouteGate::new(&config.auth),
            notifier: Arc::new(ConsoleNotifier::new(output_format)),
            output_format,
        })
    }

    /// Wait for the stored session to be resolved
    pub async fn settle(&self) -> Session {
        self.session.context().settled().await
    }

    /// Pass the route gate for `route`, returning the session to scope views with
    pub async fn enter(&self, route: Route) -> anyhow::Result<SessionContext> {
        let mut ctx = self.session.context();
        let session = ctx.settled().await;

        match self.gate.admit(route, &session) {
            GateState::Admitted => Ok(ctx),
            GateState::Denied { redirect_to, .. } => {
                tracing::debug!(route = route.path(), %redirect_to, "navigation denied");
                output_error(
                    &self.output_format,
                    "Not signed in. Run `homebase auth login <email>` first.",
                    Some("DENIED"),
                )?;
                Err(ClientError::SignedOut.into())
            }
            GateState::Pending => Err(anyhow::anyhow!("session is still resolving")),
        }
    }

    /// Remote-backed view for one record kind
    pub fn manager<K: ResourceKind>(&self, ctx: SessionContext) -> ResourceManager<K> {
        ResourceManager::owned(
            Arc::new(self.client.table::<K>()),
            ctx,
            self.notifier.clone(),
            &self.config.resources,
        )
    }
}
