use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::{present, Messages, OwnerScope, ResourceKind};
use crate::types::{OwnerId, RecordId};

/// Buffer contents for a new, unsaved project
pub const STARTER_CODE: &str = "// Start coding...\nconsole.log(\"Hello, World!\");";

pub const DEFAULT_LANGUAGE: &str = "javascript";

/// Languages the editor offers
pub const LANGUAGES: &[&str] = &["javascript", "typescript", "python", "html", "css"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeProject {
    pub id: RecordId,
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub language: String,
    #[serde(default)]
    pub files: Vec<ProjectFile>,
    pub created_at: DateTime<Utc>,
}

impl CodeProject {
    /// Content of the first file, which backs the editor buffer
    pub fn main_content(&self) -> Option<&str> {
        self.files.first().map(|f| f.content.as_str())
    }
}

/// Editable project state: name, language and the code buffer
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectForm {
    pub name: String,
    pub language: String,
    pub code: String,
}

impl Default for ProjectForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            code: STARTER_CODE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectFields {
    pub name: String,
    pub language: String,
    pub files: Vec<ProjectFile>,
}

pub struct Projects;

impl ResourceKind for Projects {
    type Record = CodeProject;
    type Form = ProjectForm;
    type Draft = ProjectFields;
    type Patch = ProjectFields;

    const NAME: &'static str = "projects";
    const TABLE: &'static str = "code_projects";
    const SCOPE: OwnerScope = OwnerScope::Owned;
    const MESSAGES: Messages = Messages {
        load_failed: "Failed to load projects",
        missing_fields: "Please enter a project name",
        created: "Project saved!",
        create_failed: "Failed to save project",
        updated: "Project updated!",
        update_failed: "Failed to update project",
        deleted: "Project deleted",
        delete_failed: "Failed to delete project",
        duplicate: None,
    };

    fn id(record: &CodeProject) -> &RecordId {
        &record.id
    }

    fn owner(record: &CodeProject) -> Option<&str> {
        Some(&record.owner_id)
    }

    fn created_at(record: &CodeProject) -> DateTime<Utc> {
        record.created_at
    }

    fn validate(form: &ProjectForm) -> Result<(), &'static str> {
        if present(&form.name) {
            Ok(())
        } else {
            Err(Self::MESSAGES.missing_fields)
        }
    }

    fn draft(form: &ProjectForm) -> ProjectFields {
        fields(form)
    }

    fn patch(form: &ProjectForm) -> ProjectFields {
        fields(form)
    }

    fn populate(record: &CodeProject) -> ProjectForm {
        // A project without files keeps the starter buffer
        let code = record
            .main_content()
            .map(str::to_string)
            .unwrap_or_else(|| STARTER_CODE.to_string());
        ProjectForm {
            name: record.name.clone(),
            language: record.language.clone(),
            code,
        }
    }

    fn materialize(
        id: RecordId,
        owner: Option<OwnerId>,
        draft: ProjectFields,
        now: DateTime<Utc>,
    ) -> CodeProject {
        CodeProject {
            id,
            owner_id: owner.unwrap_or_default(),
            name: draft.name,
            description: None,
            language: draft.language,
            files: draft.files,
            created_at: now,
        }
    }

    fn apply_patch(record: &mut CodeProject, patch: ProjectFields, _now: DateTime<Utc>) {
        record.name = patch.name;
        record.language = patch.language;
        record.files = patch.files;
    }
}

/// File name a buffer is saved under for the given language
pub fn main_file_name(language: &str) -> String {
    let ext = match language {
        "javascript" => "js",
        "python" => "py",
        _ => "txt",
    };
    format!("main.{}", ext)
}

pub fn is_supported_language(language: &str) -> bool {
    LANGUAGES.contains(&language)
}

fn fields(form: &ProjectForm) -> ProjectFields {
    ProjectFields {
        name: form.name.clone(),
        language: form.language.clone(),
        files: vec![ProjectFile {
            name: main_file_name(&form.language),
            content: form.code.clone(),
        }],
    }
}
