mod common;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use homebase::backend::{MemoryTable, RecordStore};
use homebase::config::{ListOrdering, ResourceConfig};
use homebase::error::{ClientError, RemoteError};
use homebase::notify::RecordingNotifier;
use homebase::resource::journal::{JournalChanges, NewJournalEntry};
use homebase::resource::{
    Journal, JournalEntry, JournalForm, NoteForm, Notes, ResourceKind, ResourceManager,
};
use homebase::types::{Operation, OwnerId, RecordId};
use tokio::sync::oneshot;

fn form(title: &str, content: &str) -> JournalForm {
    JournalForm {
        title: title.to_string(),
        content: content.to_string(),
    }
}

#[tokio::test]
async fn create_then_list_returns_submitted_fields_for_owner() -> Result<()> {
    let (_session, ctx) = common::signed_in("alice").await;
    let table = Arc::new(MemoryTable::<Journal>::new());
    let sink = RecordingNotifier::new();
    let journal = ResourceManager::owned(table.clone(), ctx, sink.clone(), &ResourceConfig::default());

    journal.set_form(form("Day one", "It rained."));
    journal.submit().await?;

    let entries = journal.records();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title, "Day one");
    assert_eq!(entries[0].content, "It rained.");
    assert_eq!(entries[0].owner_id, "alice");
    assert!(entries[0].tags.is_empty());

    assert_eq!(journal.form(), JournalForm::default());
    assert_eq!(sink.successes(), vec!["Entry created!"]);
    Ok(())
}

#[tokio::test]
async fn list_is_newest_first_and_scoped_to_identity() -> Result<()> {
    let table = Arc::new(MemoryTable::<Journal>::new());
    table
        .insert(
            Some("bob".to_string()),
            NewJournalEntry {
                title: "bob's".to_string(),
                content: String::new(),
                tags: vec![],
            },
        )
        .await?;

    let (_session, ctx) = common::signed_in("alice").await;
    let journal = ResourceManager::owned(
        table.clone(),
        ctx,
        RecordingNotifier::new(),
        &ResourceConfig::default(),
    );
    for title in ["first", "second", "third"] {
        journal.set_form(form(title, ""));
        journal.submit().await?;
    }

    let titles: Vec<String> = journal.records().into_iter().map(|e| e.title).collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
    Ok(())
}

#[tokio::test]
async fn empty_title_never_reaches_the_store() -> Result<()> {
    let (_session, ctx) = common::signed_in("alice").await;
    let table = Arc::new(MemoryTable::<Journal>::new());
    let sink = RecordingNotifier::new();
    let journal = ResourceManager::owned(table.clone(), ctx, sink.clone(), &ResourceConfig::default());

    journal.set_form(form("   ", "body I typed"));
    let err = journal.submit().await.unwrap_err();

    assert_eq!(err, ClientError::validation("Please enter a title"));
    assert_eq!(table.call_count(), 0);
    assert_eq!(journal.form(), form("   ", "body I typed"));
    assert_eq!(sink.failures(), vec!["Please enter a title"]);
    Ok(())
}

#[tokio::test]
async fn failed_create_keeps_the_form() -> Result<()> {
    let (_session, ctx) = common::signed_in("alice").await;
    let table = Arc::new(MemoryTable::<Journal>::new());
    let sink = RecordingNotifier::new();
    let journal = ResourceManager::owned(table.clone(), ctx, sink.clone(), &ResourceConfig::default());

    table.fail_next(Operation::Create, RemoteError::new("network down"));
    journal.set_form(form("Retry me", "still here"));
    let err = journal.submit().await.unwrap_err();

    assert!(matches!(err, ClientError::Remote { .. }));
    assert_eq!(journal.form(), form("Retry me", "still here"));
    assert!(!journal.is_saving());
    assert_eq!(sink.failures(), vec!["Failed to create entry"]);

    // Same action again succeeds without re-typing
    journal.submit().await?;
    assert_eq!(journal.records().len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_list_leaves_collection_untouched() -> Result<()> {
    let (_session, ctx) = common::signed_in("alice").await;
    let table = Arc::new(MemoryTable::<Journal>::new());
    let sink = RecordingNotifier::new();
    let journal = ResourceManager::owned(table.clone(), ctx, sink.clone(), &ResourceConfig::default());

    journal.set_form(form("kept", ""));
    journal.submit().await?;
    let before = journal.records();

    table.fail_next(Operation::List, RemoteError::new("timeout"));
    assert!(journal.load().await.is_err());
    assert_eq!(journal.records(), before);
    assert_eq!(sink.failures(), vec!["Failed to load entries"]);
    Ok(())
}

#[tokio::test]
async fn update_changes_only_the_edited_record() -> Result<()> {
    let (_session, ctx) = common::signed_in("alice").await;
    let table = Arc::new(MemoryTable::<Journal>::new());
    let sink = RecordingNotifier::new();
    let journal = ResourceManager::owned(table.clone(), ctx, sink.clone(), &ResourceConfig::default());

    journal.set_form(form("one", "a"));
    journal.submit().await?;
    journal.set_form(form("two", "b"));
    journal.submit().await?;

    let target = journal.records().into_iter().find(|e| e.title == "one").unwrap();
    let other = journal.records().into_iter().find(|e| e.title == "two").unwrap();

    assert!(journal.begin_edit(&target.id));
    assert_eq!(journal.form(), form("one", "a"));
    journal.edit_form(|f| f.content = "changed".to_string());
    journal.submit().await?;

    assert_eq!(journal.editing(), None);
    assert_eq!(journal.form(), JournalForm::default());
    assert_eq!(journal.records().len(), 2);
    assert_eq!(journal.find(&target.id).unwrap().content, "changed");
    assert_eq!(journal.find(&other.id).unwrap(), other);
    assert_eq!(sink.last().unwrap().message, "Entry updated!");
    Ok(())
}

#[tokio::test]
async fn failed_update_stays_in_edit_mode() -> Result<()> {
    let (_session, ctx) = common::signed_in("alice").await;
    let table = Arc::new(MemoryTable::<Journal>::new());
    let sink = RecordingNotifier::new();
    let journal = ResourceManager::owned(table.clone(), ctx, sink.clone(), &ResourceConfig::default());

    journal.set_form(form("draft", ""));
    journal.submit().await?;
    let id = journal.records()[0].id.clone();
    journal.begin_edit(&id);
    journal.edit_form(|f| f.title = "renamed".to_string());

    table.fail_next(Operation::Update, RemoteError::new("permission denied").with_status(403));
    assert!(journal.update().await.is_err());
    assert_eq!(journal.editing(), Some(id.clone()));
    assert_eq!(journal.form().title, "renamed");
    assert_eq!(sink.last().unwrap().message, "Failed to update entry");

    // Clearing the title in edit mode is caught locally too
    let calls = table.call_count();
    journal.edit_form(|f| f.title.clear());
    assert!(matches!(journal.update().await, Err(ClientError::Validation(_))));
    assert_eq!(table.call_count(), calls);
    Ok(())
}

#[tokio::test]
async fn delete_refreshes_and_failure_keeps_collection() -> Result<()> {
    let (_session, ctx) = common::signed_in("alice").await;
    let table = Arc::new(MemoryTable::<Journal>::new());
    let sink = RecordingNotifier::new();
    let journal = ResourceManager::owned(table.clone(), ctx, sink.clone(), &ResourceConfig::default());

    journal.set_form(form("gone soon", ""));
    journal.submit().await?;
    journal.set_form(form("stays", ""));
    journal.submit().await?;
    let doomed = journal.records().into_iter().find(|e| e.title == "gone soon").unwrap();

    table.fail_next(Operation::Delete, RemoteError::new("offline"));
    assert!(journal.delete(&doomed.id).await.is_err());
    assert_eq!(journal.records().len(), 2);
    assert_eq!(sink.last().unwrap().message, "Failed to delete entry");

    journal.delete(&doomed.id).await?;
    let titles: Vec<String> = journal.records().into_iter().map(|e| e.title).collect();
    assert_eq!(titles, vec!["stays"]);
    assert_eq!(sink.last().unwrap().message, "Entry deleted");
    Ok(())
}

#[tokio::test]
async fn signed_out_owned_kind_fails_locally() -> Result<()> {
    let (_session, ctx) = common::anonymous().await;
    let table = Arc::new(MemoryTable::<Journal>::new());
    let journal = ResourceManager::owned(
        table.clone(),
        ctx,
        RecordingNotifier::new(),
        &ResourceConfig::default(),
    );

    journal.set_form(form("title", ""));
    assert_eq!(journal.submit().await, Err(ClientError::SignedOut));
    assert_eq!(journal.delete(&RecordId::new("x")).await, Err(ClientError::SignedOut));
    assert_eq!(table.call_count(), 0);
    assert_eq!(journal.form(), form("title", ""));
    Ok(())
}

#[tokio::test]
async fn local_notes_work_without_identity() -> Result<()> {
    let sink = RecordingNotifier::new();
    let notes = ResourceManager::<Notes>::local(sink.clone());

    notes.set_form(NoteForm {
        title: "groceries".to_string(),
        content: "milk".to_string(),
    });
    notes.submit().await?;
    let id = notes.records()[0].id.clone();

    notes.begin_edit(&id);
    notes.edit_form(|f| f.content = "milk, eggs".to_string());
    notes.submit().await?;
    assert_eq!(notes.records()[0].content, "milk, eggs");

    notes.delete(&id).await?;
    assert!(notes.records().is_empty());
    assert_eq!(
        sink.successes(),
        vec!["Note created successfully!", "Note updated!", "Note deleted"]
    );
    Ok(())
}

/// Store whose list calls complete only when the test releases them
#[derive(Default)]
struct GatedJournal {
    pending: Mutex<VecDeque<oneshot::Receiver<Vec<JournalEntry>>>>,
    started: AtomicUsize,
}

impl GatedJournal {
    fn gate(&self) -> oneshot::Sender<Vec<JournalEntry>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl RecordStore<Journal> for GatedJournal {
    async fn list(&self, _owner: Option<OwnerId>) -> Result<Vec<JournalEntry>, RemoteError> {
        let rx = self.pending.lock().unwrap().pop_front();
        self.started.fetch_add(1, Ordering::SeqCst);
        match rx {
            Some(rx) => rx.await.map_err(|_| RemoteError::new("list abandoned")),
            None => Err(RemoteError::new("unexpected list")),
        }
    }

    async fn insert(
        &self,
        _owner: Option<OwnerId>,
        _draft: NewJournalEntry,
    ) -> Result<JournalEntry, RemoteError> {
        Err(RemoteError::new("read only"))
    }

    async fn update(
        &self,
        _owner: Option<OwnerId>,
        _id: RecordId,
        _patch: JournalChanges,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::new("read only"))
    }

    async fn delete(&self, _owner: Option<OwnerId>, _id: RecordId) -> Result<(), RemoteError> {
        Err(RemoteError::new("read only"))
    }
}

fn entry(title: &str) -> JournalEntry {
    Journal::materialize(
        RecordId::generate(),
        Some("alice".to_string()),
        NewJournalEntry {
            title: title.to_string(),
            content: String::new(),
            tags: vec![],
        },
        Utc::now(),
    )
}

/// Issue two lists, complete the second first, and return the final titles
async fn overlapping_lists(ordering: ListOrdering) -> Result<Vec<String>> {
    let (_session, ctx) = common::signed_in("alice").await;
    let store = Arc::new(GatedJournal::default());
    let config = ResourceConfig {
        list_ordering: ordering,
        ..ResourceConfig::default()
    };
    let journal = ResourceManager::owned(store.clone(), ctx, RecordingNotifier::new(), &config);

    let first_tx = store.gate();
    let second_tx = store.gate();

    let view = journal.clone();
    let first = tokio::spawn(async move { view.load().await });
    while store.started.load(Ordering::SeqCst) < 1 {
        tokio::task::yield_now().await;
    }
    let view = journal.clone();
    let second = tokio::spawn(async move { view.load().await });
    while store.started.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }

    let _ = second_tx.send(vec![entry("second response")]);
    second.await??;
    let _ = first_tx.send(vec![entry("first response")]);
    first.await??;

    Ok(journal.records().into_iter().map(|e| e.title).collect())
}

#[tokio::test]
async fn overlapping_lists_keep_latest_issued_by_default() -> Result<()> {
    assert_eq!(
        overlapping_lists(ListOrdering::LatestIssued).await?,
        vec!["second response"]
    );
    Ok(())
}

#[tokio::test]
async fn overlapping_lists_can_keep_latest_completed() -> Result<()> {
    assert_eq!(
        overlapping_lists(ListOrdering::LatestCompleted).await?,
        vec!["first response"]
    );
    Ok(())
}

#[tokio::test]
async fn unmount_discards_pending_list() -> Result<()> {
    let (_session, ctx) = common::signed_in("alice").await;
    let store = Arc::new(GatedJournal::default());
    let journal = ResourceManager::owned(
        store.clone(),
        ctx,
        RecordingNotifier::new(),
        &ResourceConfig::default(),
    );

    let tx = store.gate();
    let view = journal.clone();
    let pending = tokio::spawn(async move { view.load().await });
    while store.started.load(Ordering::SeqCst) < 1 {
        tokio::task::yield_now().await;
    }

    journal.unmount();
    let _ = tx.send(vec![entry("stale")]);
    pending.await??;
    assert!(journal.records().is_empty());
    Ok(())
}
