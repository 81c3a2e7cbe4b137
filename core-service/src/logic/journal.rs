//! Attempt Journal
//!
//! Append-only JSONL audit log of one attempt (violations, transitions,
//! directives), plus the frozen final ledger with a SHA-256 digest for
//! tamper evidence.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::logic::error::ProctorError;
use crate::logic::escalation::{TerminateDirective, Transition};
use crate::logic::ledger::{LedgerSnapshot, Violation};

const JOURNAL_EXT: &str = ".jsonl";
const FROZEN_EXT: &str = ".ledger.json";

// ============================================================================
// ENTRIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", content = "data", rename_all = "snake_case")]
pub enum JournalEntry {
    Started { attempt_id: Uuid },
    Violation(Violation),
    Transition(Transition),
    Directive(TerminateDirective),
    Frozen { digest: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalRecord {
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    pub entry: JournalEntry,
}

/// Final ledger as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrozenLedger {
    pub ledger: LedgerSnapshot,
    /// hex SHA-256 of the ledger's JSON encoding
    pub digest: String,
    pub frozen_at: DateTime<Utc>,
}

impl FrozenLedger {
    pub fn new(ledger: LedgerSnapshot) -> Result<Self, ProctorError> {
        let digest = ledger_digest(&ledger)?;
        Ok(Self {
            ledger,
            digest,
            frozen_at: Utc::now(),
        })
    }

    /// Recompute the digest and compare
    pub fn verify(&self) -> Result<bool, ProctorError> {
        Ok(ledger_digest(&self.ledger)? == self.digest)
    }
}

pub fn ledger_digest(ledger: &LedgerSnapshot) -> Result<String, ProctorError> {
    let bytes = serde_json::to_vec(ledger)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

// ============================================================================
// JOURNAL
// ============================================================================

pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    frozen_path: PathBuf,
    seq: u64,
}

impl Journal {
    /// Open (or continue) the journal of `attempt_id` under `dir`
    pub fn open(dir: &Path, attempt_id: Uuid) -> Result<Self, ProctorError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}{}", attempt_id, JOURNAL_EXT));
        let frozen_path = dir.join(format!("{}{}", attempt_id, FROZEN_EXT));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::info!("[Journal] Opened {:?}", path);

        let mut journal = Self {
            writer: BufWriter::new(file),
            path,
            frozen_path,
            seq: 0,
        };
        journal.record(JournalEntry::Started { attempt_id })?;
        Ok(journal)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, entry: JournalEntry) -> Result<(), ProctorError> {
        self.seq += 1;
        let record = JournalRecord {
            seq: self.seq,
            recorded_at: Utc::now(),
            entry,
        };
        let line = serde_json::to_string(&record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        // Flush per line so a crash loses at most the line being written
        self.writer.flush()?;
        Ok(())
    }

    /// Write the final ledger next to the journal. Consumes the journal.
    pub fn freeze(mut self, ledger: LedgerSnapshot) -> Result<FrozenLedger, ProctorError> {
        let frozen = FrozenLedger::new(ledger)?;
        let json = serde_json::to_string_pretty(&frozen)?;
        std::fs::write(&self.frozen_path, json)?;
        self.record(JournalEntry::Frozen {
            digest: frozen.digest.clone(),
        })?;
        log::info!(
            "[Journal] Froze ledger of attempt {} ({} violations, sha256 {})",
            frozen.ledger.attempt_id,
            frozen.ledger.violations.len(),
            &frozen.digest[..12]
        );
        Ok(frozen)
    }
}

// ============================================================================
// READING
// ============================================================================

/// Read every record of a journal file. Malformed lines are skipped.
pub fn read_journal(path: &Path) -> Result<Vec<JournalRecord>, ProctorError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("[Journal] Skipping malformed line {} in {:?}: {}", n + 1, path, e),
        }
    }
    Ok(records)
}

pub fn read_frozen(path: &Path) -> Result<FrozenLedger, ProctorError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
