//! Per-document state owned by the server.
//!
//! Entries are created on didOpen and removed on didClose. Every access
//! goes through a short DashMap shard lock that is never held across an
//! `.await`.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tower_lsp_server::ls_types::{Diagnostic, TextDocumentContentChangeEvent, Uri};

use crate::diagnostics::{CycleTicket, GenerationCounter, PushTag, VersionGate};
use crate::text::apply_content_changes;

pub(crate) struct DocumentState {
    pub(crate) text: String,
    pub(crate) version: i32,
    pub(crate) language_id: String,
    /// Heuristic and qcc diagnostics of the last admitted cycle.
    pub(crate) local: Vec<Diagnostic>,
    pub(crate) gate: VersionGate,
    /// clangd diagnostics after the mode filter.
    pub(crate) peer: Vec<Diagnostic>,
    pub(crate) generations: GenerationCounter,
}

impl DocumentState {
    fn new(text: String, version: i32, language_id: String, epoch: u64) -> Self {
        Self {
            text,
            version,
            language_id,
            local: Vec::new(),
            gate: VersionGate::new(epoch, version),
            peer: Vec::new(),
            generations: GenerationCounter::new(epoch),
        }
    }
}

/// Outcome of tagging a clangd push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushAdmission {
    Tagged(PushTag),
    /// The push was computed for an older version than the open buffer.
    Outdated { pushed: i32, current: i32 },
    NotOpen,
}

/// Copy of what a validation cycle needs.
#[derive(Debug, Clone)]
pub(crate) struct DocumentSnapshot {
    pub(crate) uri: Uri,
    pub(crate) text: String,
    pub(crate) version: i32,
    pub(crate) language_id: String,
}

#[derive(Default)]
pub(crate) struct DocumentStore {
    documents: DashMap<String, (Uri, DocumentState)>,
    /// One per didOpen. Survives didClose.
    epochs: AtomicU64,
}

impl DocumentStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open(&self, uri: Uri, text: String, version: i32, language_id: String) {
        let key = uri.as_str().to_string();
        let epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        self.documents.insert(
            key,
            (uri, DocumentState::new(text, version, language_id, epoch)),
        );
    }

    /// Apply edits and record the new version. Returns the updated text.
    pub(crate) fn change(
        &self,
        uri: &Uri,
        version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Option<String> {
        let mut entry = self.documents.get_mut(uri.as_str())?;
        let (_, doc) = entry.value_mut();
        doc.text = apply_content_changes(&doc.text, changes);
        doc.version = version;
        doc.gate.observe(version);
        Some(doc.text.clone())
    }

    pub(crate) fn close(&self, uri: &Uri) -> bool {
        self.documents.remove(uri.as_str()).is_some()
    }

    pub(crate) fn contains(&self, uri: &Uri) -> bool {
        self.documents.contains_key(uri.as_str())
    }

    pub(crate) fn text(&self, uri: &Uri) -> Option<String> {
        self.documents
            .get(uri.as_str())
            .map(|entry| entry.value().1.text.clone())
    }

    pub(crate) fn snapshot(&self, uri: &Uri) -> Option<DocumentSnapshot> {
        self.documents.get(uri.as_str()).map(|entry| {
            let (uri, doc) = entry.value();
            DocumentSnapshot {
                uri: uri.clone(),
                text: doc.text.clone(),
                version: doc.version,
                language_id: doc.language_id.clone(),
            }
        })
    }

    pub(crate) fn snapshots(&self) -> Vec<DocumentSnapshot> {
        let uris: Vec<Uri> = self
            .documents
            .iter()
            .map(|entry| entry.value().0.clone())
            .collect();
        uris.iter().filter_map(|uri| self.snapshot(uri)).collect()
    }

    /// Start a validation cycle for the current version, together with the
    /// text that version has.
    pub(crate) fn begin_cycle(&self, uri: &Uri) -> Option<(CycleTicket, DocumentSnapshot)> {
        let mut entry = self.documents.get_mut(uri.as_str())?;
        let (uri, doc) = entry.value_mut();
        let version = doc.version;
        let ticket = doc.gate.begin(version);
        let snapshot = DocumentSnapshot {
            uri: uri.clone(),
            text: doc.text.clone(),
            version,
            language_id: doc.language_id.clone(),
        };
        Some((ticket, snapshot))
    }

    /// Store `local` if the cycle is still current. Returns whether it was.
    pub(crate) fn finish_cycle(&self, uri: &Uri, ticket: CycleTicket, local: Vec<Diagnostic>) -> bool {
        let Some(mut entry) = self.documents.get_mut(uri.as_str()) else {
            return false;
        };
        let doc = &mut entry.value_mut().1;
        if !doc.gate.admits(ticket) {
            return false;
        }
        doc.local = local;
        true
    }

    /// Tag a peer push for `version`. A push for an older version than the
    /// buffer is not tagged.
    pub(crate) fn tag_push(&self, uri: &Uri, version: Option<i32>) -> PushAdmission {
        let Some(mut entry) = self.documents.get_mut(uri.as_str()) else {
            return PushAdmission::NotOpen;
        };
        let doc = &mut entry.value_mut().1;
        if let Some(pushed) = version {
            if pushed < doc.version {
                return PushAdmission::Outdated {
                    pushed,
                    current: doc.version,
                };
            }
        }
        PushAdmission::Tagged(doc.generations.next())
    }

    /// Store filtered peer diagnostics if `tag` is still the latest.
    pub(crate) fn store_peer(&self, uri: &Uri, tag: PushTag, peer: Vec<Diagnostic>) -> bool {
        let Some(mut entry) = self.documents.get_mut(uri.as_str()) else {
            return false;
        };
        let doc = &mut entry.value_mut().1;
        if !doc.generations.is_latest(tag) {
            return false;
        }
        doc.peer = peer;
        true
    }

    /// Drop every document's peer diagnostics and invalidate pushes in flight.
    pub(crate) fn clear_peer(&self) {
        for mut entry in self.documents.iter_mut() {
            let doc = &mut entry.value_mut().1;
            doc.peer.clear();
            let _ = doc.generations.next();
        }
    }

    /// Peer and local diagnostics currently stored for `uri`.
    pub(crate) fn diagnostics(&self, uri: &Uri) -> Option<(Vec<Diagnostic>, Vec<Diagnostic>)> {
        self.documents.get(uri.as_str()).map(|entry| {
            let doc = &entry.value().1;
            (doc.peer.clone(), doc.local.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tower_lsp_server::ls_types::{Position, Range};

    fn uri() -> Uri {
        Uri::from_str("file:///sim/drop.c").unwrap()
    }

    fn diag(message: &str) -> Diagnostic {
        Diagnostic {
            range: Range {
                start: Position { line: 0, character: 0 },
                end: Position { line: 0, character: 1 },
            },
            message: message.to_string(),
            ..Default::default()
        }
    }

    fn full_change(text: &str) -> Vec<TextDocumentContentChangeEvent> {
        vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: text.to_string(),
        }]
    }

    #[test]
    fn cycle_for_superseded_version_is_discarded() {
        let store = DocumentStore::new();
        store.open(uri(), "v1".into(), 1, "basilisk".into());

        let (slow, snapshot) = store.begin_cycle(&uri()).unwrap();
        assert_eq!(slow.version(), 1);
        assert_eq!(snapshot.text, "v1");
        store.change(&uri(), 2, full_change("v2"));

        assert!(!store.finish_cycle(&uri(), slow, vec![diag("stale")]));
        let (fresh, _) = store.begin_cycle(&uri()).unwrap();
        assert!(store.finish_cycle(&uri(), fresh, vec![diag("fresh")]));

        let (_, local) = store.diagnostics(&uri()).unwrap();
        assert_eq!(local[0].message, "fresh");
        assert_eq!(store.text(&uri()).as_deref(), Some("v2"));
    }

    fn tagged(admission: PushAdmission) -> PushTag {
        match admission {
            PushAdmission::Tagged(tag) => tag,
            other => panic!("push not tagged: {:?}", other),
        }
    }

    #[test]
    fn cycle_from_previous_open_is_discarded_after_reopen() {
        let store = DocumentStore::new();
        store.open(uri(), "old {".into(), 1, "basilisk".into());
        let (stale, _) = store.begin_cycle(&uri()).unwrap();
        store.close(&uri());

        // Clients restart versions at 1 on reopen.
        store.open(uri(), "new text".into(), 1, "basilisk".into());
        let (fresh, snapshot) = store.begin_cycle(&uri()).unwrap();
        assert_eq!(snapshot.text, "new text");

        assert!(!store.finish_cycle(&uri(), stale, vec![diag("Unmatched '{'")]));
        assert!(store.diagnostics(&uri()).unwrap().1.is_empty());
        assert!(store.finish_cycle(&uri(), fresh, Vec::new()));
    }

    #[test]
    fn push_tag_from_previous_open_is_not_stored_after_reopen() {
        let store = DocumentStore::new();
        store.open(uri(), String::new(), 1, "c".into());
        let stale = tagged(store.tag_push(&uri(), Some(1)));
        store.close(&uri());

        store.open(uri(), String::new(), 1, "c".into());
        assert!(!store.store_peer(&uri(), stale, vec![diag("old")]));
        assert!(store.diagnostics(&uri()).unwrap().0.is_empty());
    }

    #[test]
    fn only_latest_peer_generation_is_stored() {
        let store = DocumentStore::new();
        store.open(uri(), String::new(), 1, "c".into());

        let first = tagged(store.tag_push(&uri(), None));
        let second = tagged(store.tag_push(&uri(), None));
        assert!(!store.store_peer(&uri(), first, vec![diag("old")]));
        assert!(store.store_peer(&uri(), second, vec![diag("new")]));
        assert_eq!(store.diagnostics(&uri()).unwrap().0[0].message, "new");
    }

    #[test]
    fn push_for_older_version_is_not_tagged() {
        let store = DocumentStore::new();
        store.open(uri(), "a".into(), 1, "c".into());
        store.change(&uri(), 3, full_change("b"));

        assert_eq!(
            store.tag_push(&uri(), Some(2)),
            PushAdmission::Outdated { pushed: 2, current: 3 }
        );
        assert!(matches!(store.tag_push(&uri(), Some(3)), PushAdmission::Tagged(_)));
        assert!(matches!(store.tag_push(&uri(), None), PushAdmission::Tagged(_)));
    }

    #[test]
    fn clearing_peer_state_invalidates_pending_pushes() {
        let store = DocumentStore::new();
        store.open(uri(), String::new(), 1, "c".into());
        let tag = tagged(store.tag_push(&uri(), None));
        store.store_peer(&uri(), tag, vec![diag("x")]);

        store.clear_peer();
        assert!(store.diagnostics(&uri()).unwrap().0.is_empty());
        assert!(!store.store_peer(&uri(), tag, vec![diag("late")]));
    }

    #[test]
    fn closed_documents_are_forgotten() {
        let store = DocumentStore::new();
        store.open(uri(), String::new(), 1, "c".into());
        assert!(store.close(&uri()));
        assert!(!store.contains(&uri()));
        assert_eq!(store.tag_push(&uri(), None), PushAdmission::NotOpen);
        assert!(store.begin_cycle(&uri()).is_none());
        assert!(!store.close(&uri()));
    }
}
