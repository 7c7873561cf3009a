//! Durable claim ledger backed by an append-only JSONL journal.
//!
//! Every state change appends one serialized [`ClaimRecord`] line and flushes
//! before the change becomes visible; on open the file is replayed
//! last-writer-wins per key to rebuild the in-memory index. A key that
//! reached `ISSUED` before a crash is therefore still `AlreadyIssued` after
//! restart, which is the property the in-memory ledger cannot give.
//!
//! A torn final line (crash mid-append) is tolerated and dropped with a
//! warning. An unparseable line **before** the tail is corruption and refuses
//! to open: silently skipping history in an exactly-once store is how double
//! payouts happen.
//!
//! The journal doubles as the operator's artifact: `FAILED` and
//! reward-annotated lines are what a human inspects (and, in the stalled
//! `ISSUING` case, hand-resolves).

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use openvend_types::{Claim, ClaimKey, ClaimRecord, Result, VendError};

use crate::claim_ledger::{
    apply_outcome, apply_reward_result, decide_begin, BeginIssuance, ClaimLedger, ClaimOutcome,
    RewardResult,
};

#[derive(Debug)]
struct JournalInner {
    index: HashMap<ClaimKey, ClaimRecord>,
    file: File,
}

/// File-backed [`ClaimLedger`]. One mutex covers the index and the file so a
/// decision, its journal line, and its index update are a single atomic step
/// with respect to concurrent callers.
#[derive(Debug)]
pub struct JournalClaimLedger {
    path: PathBuf,
    inner: Mutex<JournalInner>,
}

impl JournalClaimLedger {
    /// Open (or create) the journal at `path` and replay it.
    ///
    /// # Errors
    /// I/O errors from the filesystem, or [`VendError::JournalCorrupt`] when
    /// a non-tail line does not parse.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let index = replay(&path)?;
        info!(path = %path.display(), keys = index.len(), "claim journal opened");
        Ok(Self { path, inner: Mutex::new(JournalInner { index, file }) })
    }

    /// Serialize and append one record, flushing before returning. The index
    /// is only updated by callers after this succeeds, so a write failure
    /// leaves both sides on the pre-change state.
    fn append(inner: &mut JournalInner, record: &ClaimRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(inner.file, "{line}")?;
        inner.file.flush()?;
        Ok(())
    }

    /// Where the journal lives, for log lines and operator pointers.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn replay(path: &Path) -> Result<HashMap<ClaimKey, ClaimRecord>> {
    let mut index = HashMap::new();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut pending_error: Option<(usize, String)> = None;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // A bad line only condemns the journal if a good line follows it;
        // otherwise it is the torn tail of an interrupted append.
        if let Some((bad_line, reason)) = pending_error.take() {
            return Err(VendError::JournalCorrupt { line: bad_line + 1, reason });
        }
        match serde_json::from_str::<ClaimRecord>(&line) {
            Ok(record) => {
                index.insert(record.key, record);
            }
            Err(err) => pending_error = Some((line_no, err.to_string())),
        }
    }
    if let Some((bad_line, reason)) = pending_error {
        warn!(
            path = %path.display(),
            line = bad_line + 1,
            %reason,
            "dropping torn trailing journal line"
        );
    }
    Ok(index)
}

#[async_trait]
impl ClaimLedger for JournalClaimLedger {
    async fn try_begin_issuance(&self, claim: &Claim) -> Result<BeginIssuance> {
        let mut inner = self.inner.lock();
        let (decision, updated) = decide_begin(inner.index.get(&claim.key()), claim)?;
        if let Some(record) = updated {
            Self::append(&mut inner, &record)?;
            inner.index.insert(claim.key(), record);
        }
        Ok(decision)
    }

    async fn record_outcome(&self, key: ClaimKey, outcome: ClaimOutcome) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut record =
            inner.index.get(&key).cloned().ok_or(VendError::ClaimNotFound(key))?;
        apply_outcome(&mut record, outcome)?;
        Self::append(&mut inner, &record)?;
        inner.index.insert(key, record);
        Ok(())
    }

    async fn record_reward_result(&self, key: ClaimKey, result: RewardResult) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut record =
            inner.index.get(&key).cloned().ok_or(VendError::ClaimNotFound(key))?;
        apply_reward_result(&mut record, result)?;
        Self::append(&mut inner, &record)?;
        inner.index.insert(key, record);
        Ok(())
    }

    async fn get(&self, key: ClaimKey) -> Result<Option<ClaimRecord>> {
        Ok(self.inner.lock().index.get(&key).cloned())
    }
}
