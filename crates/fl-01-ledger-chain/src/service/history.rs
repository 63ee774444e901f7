//! Lazy account history.

use super::chain_store::ChainStore;
use crate::domain::entry::{AccountId, LedgerEntry, SequenceNumber};
use crate::domain::errors::{ChainStoreError, LedgerError};
use crate::ports::outbound::{EntrySerializer, KeyValueStore, TimeSource};
use std::collections::VecDeque;
use std::sync::Arc;

/// Source of account index pages.
pub(crate) trait HistorySource: Send + Sync {
    fn page(
        &self,
        account: AccountId,
        after: Option<SequenceNumber>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, ChainStoreError>;
}

impl<KV, TS, SER> HistorySource for ChainStore<KV, TS, SER>
where
    KV: KeyValueStore,
    TS: TimeSource,
    SER: EntrySerializer,
{
    fn page(
        &self,
        account: AccountId,
        after: Option<SequenceNumber>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, ChainStoreError> {
        self.account_entries(account, after, limit)
    }
}

/// Entries touching one account, in ascending sequence order.
///
/// Pages are fetched on demand. Entries appended while iterating are picked
/// up by later pages. After an error the iterator is finished.
pub struct AccountHistory {
    source: Arc<dyn HistorySource>,
    account: AccountId,
    page_size: usize,
    buffer: VecDeque<LedgerEntry>,
    after: Option<SequenceNumber>,
    exhausted: bool,
}

impl AccountHistory {
    pub(crate) fn new(source: Arc<dyn HistorySource>, account: AccountId, page_size: usize) -> Self {
        Self {
            source,
            account,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            after: None,
            exhausted: false,
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    fn fill(&mut self) -> Result<(), LedgerError> {
        let page = self.source.page(self.account, self.after, self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.after = Some(last.sequence_number);
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for AccountHistory {
    type Item = Result<LedgerEntry, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl std::fmt::Debug for AccountHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountHistory")
            .field("account", &self.account)
            .field("after", &self.after)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
