use super::entry::{Speaker, TranscriptEntry};
use tracing::debug;

/// What a fragment did to the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// A new provisional entry was appended
    Opened,
    /// The live entry's text was replaced
    Updated,
    /// The live entry was frozen
    Finalized,
    /// A fragment arrived already final and was appended frozen
    AppendedFinal,
}

impl FragmentKind {
    /// Whether an entry transitioned to final as a result of the fragment
    pub fn is_final(self) -> bool {
        matches!(self, FragmentKind::Finalized | FragmentKind::AppendedFinal)
    }
}

/// Result of [`TranscriptReconciler::apply_fragment`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedFragment {
    pub kind: FragmentKind,
    /// Position of the touched entry in the history
    pub index: usize,
    /// Snapshot of the touched entry after the update
    pub entry: TranscriptEntry,
}

/// Reconciles a stream of `(speaker, text, is_final)` fragments
///
/// Fragments for one speaker arrive in order; fragments across speakers may
/// interleave arbitrarily. History is never pruned here. Callers that cap
/// the displayed length should trim their own copy.
#[derive(Debug, Default)]
pub struct TranscriptReconciler {
    entries: Vec<TranscriptEntry>,
    /// Index of the live entry per speaker
    live: [Option<usize>; 2],
    next_sequence: u64,
    next_commit: u64,
}

impl TranscriptReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fragment.
    ///
    /// Returns `None` when the fragment was dropped (a blank interim that
    /// would open a new entry).
    pub fn apply_fragment(
        &mut self,
        speaker: Speaker,
        text: &str,
        is_final: bool,
    ) -> Option<AppliedFragment> {
        if let Some(index) = self.live[speaker.index()] {
            let commit = if is_final {
                self.live[speaker.index()] = None;
                Some(self.take_commit())
            } else {
                None
            };

            let entry = &mut self.entries[index];
            entry.text = text.to_string();
            if let Some(commit) = commit {
                entry.is_final = true;
                entry.commit = Some(commit);
            }

            let kind = if is_final {
                FragmentKind::Finalized
            } else {
                FragmentKind::Updated
            };
            return Some(AppliedFragment {
                kind,
                index,
                entry: entry.clone(),
            });
        }

        if !is_final && text.trim().is_empty() {
            debug!("Dropping blank interim fragment for {}", speaker);
            return None;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let commit = if is_final { Some(self.take_commit()) } else { None };

        let index = self.entries.len();
        self.entries.push(TranscriptEntry {
            speaker,
            text: text.to_string(),
            is_final,
            sequence,
            commit,
        });

        let kind = if is_final {
            FragmentKind::AppendedFinal
        } else {
            self.live[speaker.index()] = Some(index);
            FragmentKind::Opened
        };

        Some(AppliedFragment {
            kind,
            index,
            entry: self.entries[index].clone(),
        })
    }

    /// Full history in insertion order
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// The live (non-final) entry for a speaker, if any
    pub fn live_entry(&self, speaker: Speaker) -> Option<&TranscriptEntry> {
        self.live[speaker.index()].map(|i| &self.entries[i])
    }

    /// Frozen entries only
    pub fn finals(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter().filter(|e| e.is_final)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn take_commit(&mut self) -> u64 {
        let commit = self.next_commit;
        self.next_commit += 1;
        commit
    }
}
