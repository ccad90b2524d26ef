//! Code editor: the Draft Buffer over the project store, plus remote code
//! generation that replaces the buffer.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::FunctionInvoker;
use crate::config::GenerationConfig;
use crate::error::ClientError;
use crate::resource::project::is_supported_language;
use crate::resource::{Projects, ResourceManager};
use crate::types::{Operation, RecordId};

pub const EMPTY_PROMPT: &str = "Please enter a prompt";
pub const GENERATED: &str = "Code generated!";

/// What the editor currently shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftBuffer {
    pub code: String,
    pub language: String,
    pub project_name: String,
    pub current_project_id: Option<RecordId>,
}

/// Reply from the generation function: either code or an error payload
#[derive(Debug, Default, Deserialize)]
struct GenerateReply {
    code: Option<String>,
    error: Option<Value>,
}

impl GenerateReply {
    fn into_code(self) -> Result<String, Option<String>> {
        if let Some(error) = self.error {
            return Err(error_message(&error));
        }
        self.code.ok_or(None)
    }
}

fn error_message(error: &Value) -> Option<String> {
    let message = match error {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("message").and_then(Value::as_str),
        _ => None,
    };
    message.filter(|m| !m.trim().is_empty()).map(str::to_string)
}

pub struct CodeEditor {
    projects: ResourceManager<Projects>,
    functions: Arc<dyn FunctionInvoker>,
    config: GenerationConfig,
    prompt: Mutex<String>,
    generating: AtomicBool,
}

impl CodeEditor {
    pub fn new(
        projects: ResourceManager<Projects>,
        functions: Arc<dyn FunctionInvoker>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            projects,
            functions,
            config,
            prompt: Mutex::new(String::new()),
            generating: AtomicBool::new(false),
        }
    }

    pub fn projects(&self) -> &ResourceManager<Projects> {
        &self.projects
    }

    pub fn draft(&self) -> DraftBuffer {
        let form = self.projects.form();
        DraftBuffer {
            code: form.code,
            language: form.language,
            project_name: form.name,
            current_project_id: self.projects.editing(),
        }
    }

    pub fn set_code(&self, code: impl Into<String>) {
        let code = code.into();
        self.projects.edit_form(|form| form.code = code);
    }

    /// Switch language; unsupported names are ignored. Returns whether it changed.
    pub fn set_language(&self, language: &str) -> bool {
        if !is_supported_language(language) {
            tracing::debug!(language, "unsupported language ignored");
            return false;
        }
        self.projects
            .edit_form(|form| form.language = language.to_string());
        true
    }

    pub fn set_project_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.projects.edit_form(|form| form.name = name);
    }

    fn prompt_slot(&self) -> MutexGuard<'_, String> {
        self.prompt
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn prompt(&self) -> String {
        self.prompt_slot().clone()
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        *self.prompt_slot() = prompt.into();
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    /// Reset the buffer to the starter snippet with no current project
    pub fn new_project(&self) {
        self.projects.cancel_edit();
    }

    /// Load a listed project into the buffer and make it current
    pub fn open_project(&self, id: &RecordId) -> bool {
        self.projects.begin_edit(id)
    }

    /// Create or update depending on whether a project is current
    pub async fn save(&self) -> Result<(), ClientError> {
        self.projects.submit().await
    }

    /// Ask the generation function for code and replace the buffer with it.
    ///
    /// A call while another is running is ignored. On failure the buffer and
    /// the prompt are left as they were.
    pub async fn generate(&self) -> Result<(), ClientError> {
        let notifier = self.projects.notifier();
        let prompt = self.prompt();
        if prompt.trim().is_empty() {
            notifier.notify_failure(EMPTY_PROMPT);
            return Err(ClientError::validation(EMPTY_PROMPT));
        }
        if self.generating.swap(true, Ordering::SeqCst) {
            tracing::debug!("generation already running");
            return Ok(());
        }

        let language = self.projects.form().language;
        let epoch = self.projects.epoch();
        tracing::debug!(function = %self.config.function_name, %language, "invoking generation");

        let result = self
            .functions
            .invoke(
                &self.config.function_name,
                json!({ "prompt": prompt, "language": language }),
            )
            .await;
        self.generating.store(false, Ordering::SeqCst);

        let outcome = match result {
            Ok(body) => serde_json::from_value::<GenerateReply>(body)
                .unwrap_or_default()
                .into_code(),
            Err(err) => {
                tracing::warn!(op = %Operation::Generate, error = %err, "remote call failed");
                Err(Some(err.message).filter(|m| !m.trim().is_empty()))
            }
        };

        match outcome {
            Ok(code) => {
                if !self.projects.edit_form_since(epoch, |form| form.code = code) {
                    tracing::debug!("generation finished after unmount, ignored");
                    return Ok(());
                }
                self.prompt_slot().clear();
                notifier.notify_success(GENERATED);
                Ok(())
            }
            Err(message) => {
                let message = message.unwrap_or_else(|| self.config.fallback_message.clone());
                notifier.notify_failure(&message);
                Err(ClientError::generation(message))
            }
        }
    }
}

impl Drop for CodeEditor {
    fn drop(&mut self) {
        self.projects.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryFunctions;
    use crate::error::RemoteError;
    use crate::notify::RecordingNotifier;
    use crate::resource::project::STARTER_CODE;

    fn editor() -> (CodeEditor, Arc<MemoryFunctions>, Arc<RecordingNotifier>) {
        let sink = RecordingNotifier::new();
        let functions = Arc::new(MemoryFunctions::new());
        let projects = ResourceManager::<Projects>::local(sink.clone());
        let editor = CodeEditor::new(projects, functions.clone(), GenerationConfig::default());
        (editor, functions, sink)
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_locally() {
        let (editor, functions, sink) = editor();
        editor.set_prompt("   ");

        let err = editor.generate().await.unwrap_err();
        assert_eq!(err, ClientError::validation(EMPTY_PROMPT));
        assert!(functions.calls().is_empty());
        assert_eq!(sink.failures(), vec![EMPTY_PROMPT]);
    }

    #[tokio::test]
    async fn error_payload_message_is_reported() {
        let (editor, functions, sink) = editor();
        functions.reply(Ok(json!({ "error": "Rate limit exceeded" })));
        editor.set_prompt("sort a list");

        let err = editor.generate().await.unwrap_err();
        assert_eq!(err, ClientError::generation("Rate limit exceeded"));
        assert_eq!(editor.draft().code, STARTER_CODE);
        assert_eq!(editor.prompt(), "sort a list");
        assert!(!editor.is_generating());
        assert_eq!(sink.failures(), vec!["Rate limit exceeded"]);
    }

    #[tokio::test]
    async fn silent_failure_uses_fallback_message() {
        let (editor, functions, sink) = editor();
        functions.reply(Err(RemoteError::new("")));
        editor.set_prompt("x");

        assert!(editor.generate().await.is_err());
        assert_eq!(sink.failures(), vec!["Failed to generate code"]);

        functions.reply(Ok(json!({})));
        assert!(editor.generate().await.is_err());
        assert_eq!(sink.last().map(|n| n.message), Some("Failed to generate code".to_string()));
    }

    #[tokio::test]
    async fn language_must_be_supported() {
        let (editor, _functions, _sink) = editor();
        assert!(editor.set_language("python"));
        assert!(!editor.set_language("cobol"));
        assert_eq!(editor.draft().language, "python");
    }
}
