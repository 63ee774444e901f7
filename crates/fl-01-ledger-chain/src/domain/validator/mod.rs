//! # Chain Validator
//!
//! Walks an ordered run of entries and checks, per entry and in this order:
//!
//! 1. sequence numbers increase by exactly one (`SequenceGap`)
//! 2. the recomputed hash equals the stored hash (`TamperedHash`)
//! 3. `prev_hash` equals the predecessor's stored hash (`BrokenLink`)
//!
//! Only the genesis entry may carry the all-zero `prev_hash`.
//!
//! Every check is made at the entry's *position* in the chain, which is not
//! necessarily the `sequence_number` it carries. Pages read from storage know
//! each position from the storage key. A bare run of entries infers it: an
//! entry whose stored hash only recomputes under the expected sequence number
//! sits at that position and had its `sequence_number` edited.
//!
//! Validation never mutates entries. A [`ChainCursor`] carries state between
//! calls so a long chain can be verified page by page.

use super::codec::HashCodec;
use super::entry::{EntryHash, LedgerEntry, SequenceNumber, GENESIS_SEQUENCE};
use super::errors::{ChainIntegrityViolation, ViolationKind};
use super::value_objects::ValidationMode;
use serde::{Deserialize, Serialize};


/// Position of a validation walk between pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainCursor {
    /// Sequence number the next entry must carry, if known.
    expected: Option<SequenceNumber>,
    /// Stored hash of the last entry seen, if known.
    prev_hash: Option<EntryHash>,
}

impl ChainCursor {
    /// A cursor with no knowledge of what precedes the first entry.
    pub fn unanchored() -> Self {
        Self::default()
    }

    /// A cursor that expects the walk to start at genesis.
    pub fn from_genesis() -> Self {
        Self {
            expected: Some(GENESIS_SEQUENCE),
            prev_hash: Some(EntryHash::GENESIS),
        }
    }

    /// A cursor that continues after a trusted predecessor.
    pub fn after(predecessor: &LedgerEntry) -> Self {
        Self {
            expected: predecessor.sequence_number.checked_add(1),
            prev_hash: Some(predecessor.hash),
        }
    }

    /// A cursor expecting `sequence_number` next, linked to `prev_hash`.
    pub fn anchored(sequence_number: SequenceNumber, prev_hash: EntryHash) -> Self {
        Self {
            expected: Some(sequence_number),
            prev_hash: Some(prev_hash),
        }
    }

    /// A cursor that knows where the walk starts but not the hash before it.
    pub fn expecting(sequence_number: SequenceNumber) -> Self {
        Self {
            expected: Some(sequence_number),
            prev_hash: None,
        }
    }

    /// Sequence number the next entry should carry.
    pub fn expected(&self) -> Option<SequenceNumber> {
        self.expected
    }

    fn advance(&mut self, position: SequenceNumber, entry: &LedgerEntry) {
        // Past u64::MAX nothing can follow; the walk continues unanchored.
        self.expected = position.checked_add(1);
        self.prev_hash = Some(entry.hash);
    }
}

/// Outcome of walking a range of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub entries_checked: u64,
    pub first_sequence: Option<SequenceNumber>,
    pub last_sequence: Option<SequenceNumber>,
    pub violations: Vec<ChainIntegrityViolation>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn first_violation(&self) -> Option<&ChainIntegrityViolation> {
        self.violations.first()
    }

    /// Collapse into the first violation, if any.
    pub fn into_result(self) -> Result<(), ChainIntegrityViolation> {
        match self.violations.into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    fn record(&mut self, position: SequenceNumber) {
        self.entries_checked += 1;
        if self.first_sequence.is_none() {
            self.first_sequence = Some(position);
        }
        self.last_sequence = Some(position);
    }
}

/// Stateless chain validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainValidator {
    codec: HashCodec,
}

impl ChainValidator {
    pub fn new(codec: HashCodec) -> Self {
        Self { codec }
    }

    /// Verify an ordered run of entries, stopping at the first violation.
    ///
    /// The first entry is not checked against a predecessor unless it is the
    /// genesis entry.
    pub fn verify_range(&self, entries: &[LedgerEntry]) -> Result<(), ChainIntegrityViolation> {
        self.inspect_range(entries, ValidationMode::default())
            .into_result()
    }

    /// Walk an ordered run of entries and report what was found.
    pub fn inspect_range(&self, entries: &[LedgerEntry], mode: ValidationMode) -> VerificationReport {
        let mut cursor = ChainCursor::unanchored();
        let mut report = VerificationReport::default();
        self.continue_walk(&mut cursor, entries, mode, &mut report);
        report
    }

    /// Continue a walk from `cursor` over the next page of entries.
    ///
    /// Returns `false` once the walk should stop: a violation was found and
    /// `mode.stop_on_first_error` is set.
    pub fn continue_walk(
        &self,
        cursor: &mut ChainCursor,
        entries: &[LedgerEntry],
        mode: ValidationMode,
        report: &mut VerificationReport,
    ) -> bool {
        self.walk(cursor, entries.iter().map(|e| (None, e)), mode, report)
    }

    /// Like [`continue_walk`](Self::continue_walk) over `(position, entry)`
    /// pairs whose positions come from storage keys.
    pub fn continue_walk_stored(
        &self,
        cursor: &mut ChainCursor,
        entries: &[(SequenceNumber, LedgerEntry)],
        mode: ValidationMode,
        report: &mut VerificationReport,
    ) -> bool {
        self.walk(cursor, entries.iter().map(|(pos, e)| (Some(*pos), e)), mode, report)
    }

    fn walk<'e>(
        &self,
        cursor: &mut ChainCursor,
        entries: impl Iterator<Item = (Option<SequenceNumber>, &'e LedgerEntry)>,
        mode: ValidationMode,
        report: &mut VerificationReport,
    ) -> bool {
        for (known, entry) in entries {
            let position = known.unwrap_or_else(|| self.locate(cursor, entry));
            report.record(position);
            let found = self.check_entry(cursor, position, entry);
            cursor.advance(position, entry);

            if found.is_empty() {
                continue;
            }
            if mode.stop_on_first_error {
                report.violations.extend(found.into_iter().take(1));
                return false;
            }
            report.violations.extend(found);
        }
        true
    }

    /// Position of an entry read without its storage key.
    ///
    /// Normally its own `sequence_number`. When that disagrees with the
    /// position the walk expects (genesis, for an unanchored entry carrying
    /// the zero `prev_hash`) and the stored hash recomputes under the expected
    /// number instead, the entry belongs there.
    fn locate(&self, cursor: &ChainCursor, entry: &LedgerEntry) -> SequenceNumber {
        let claimed = entry.sequence_number;
        let expected = cursor.expected.or_else(|| {
            (cursor.prev_hash.is_none() && entry.prev_hash.is_genesis_sentinel())
                .then_some(GENESIS_SEQUENCE)
        });

        match expected {
            Some(expected) if expected != claimed => {
                let mut original = entry.clone();
                original.sequence_number = expected;
                match self.codec.hash_entry(&original) {
                    Ok(hash) if hash == entry.hash => expected,
                    _ => claimed,
                }
            }
            _ => claimed,
        }
    }

    /// All violations attributable to the entry at `position` given what
    /// precedes it.
    fn check_entry(
        &self,
        cursor: &ChainCursor,
        position: SequenceNumber,
        entry: &LedgerEntry,
    ) -> Vec<ChainIntegrityViolation> {
        let mut found = Vec::new();

        let contiguous = match cursor.expected {
            Some(expected) if expected != position => {
                found.push(ChainIntegrityViolation::new(
                    position,
                    ViolationKind::SequenceGap,
                    format!("expected sequence {}, found {}", expected, position),
                ));
                false
            }
            Some(_) => true,
            None => false,
        };

        if entry.sequence_number != position {
            found.push(ChainIntegrityViolation::new(
                position,
                ViolationKind::TamperedHash,
                format!(
                    "entry at sequence {} carries sequence number {}",
                    position, entry.sequence_number
                ),
            ));
        } else {
            match self.codec.hash_entry(entry) {
                Ok(recomputed) if recomputed == entry.hash => {}
                Ok(recomputed) => found.push(ChainIntegrityViolation::new(
                    position,
                    ViolationKind::TamperedHash,
                    format!("stored {}, recomputed {}", entry.hash, recomputed),
                )),
                Err(e) => found.push(ChainIntegrityViolation::new(
                    position,
                    ViolationKind::TamperedHash,
                    format!("entry no longer encodes: {}", e),
                )),
            }
        }

        if let Some(violation) = self.check_link(cursor, position, entry, contiguous) {
            found.push(violation);
        }

        found
    }

    fn check_link(
        &self,
        cursor: &ChainCursor,
        position: SequenceNumber,
        entry: &LedgerEntry,
        contiguous: bool,
    ) -> Option<ChainIntegrityViolation> {
        let seq = position;

        if seq == GENESIS_SEQUENCE {
            if !entry.prev_hash.is_genesis_sentinel() {
                return Some(ChainIntegrityViolation::new(
                    seq,
                    ViolationKind::BrokenLink,
                    "genesis entry must carry the zero prev_hash",
                ));
            }
            return None;
        }

        if entry.prev_hash.is_genesis_sentinel() {
            return Some(ChainIntegrityViolation::new(
                seq,
                ViolationKind::BrokenLink,
                "only the genesis entry may carry the zero prev_hash",
            ));
        }

        // Across a gap the predecessor is unknown; the gap itself is reported.
        if !contiguous {
            return None;
        }

        match cursor.prev_hash {
            Some(prev) if prev != entry.prev_hash => Some(ChainIntegrityViolation::new(
                seq,
                ViolationKind::BrokenLink,
                format!("prev_hash {} does not match predecessor hash {}", entry.prev_hash, prev),
            )),
            _ => None,
        }
    }
}
