//! Playtime ledger.
//!
//! Every mutation runs under one async mutex and persists before releasing
//! it, so the accrual loop and verification completion never interleave and
//! saves never overlap.

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::LedgerError;
use crate::models::{Identity, LedgerEntry, PlayerName, ServerStatus};
use crate::store::{LedgerStore, Records};

/// Result of crediting one accrual tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccrualReport {
    /// Players credited with a minute
    pub credited: usize,
    /// Of those, players seen for the first time
    pub created: usize,
    /// Whether the ledger was written to the store
    pub persisted: bool,
}

pub struct Ledger<S> {
    records: Mutex<Records>,
    store: S,
}

impl<S: LedgerStore> Ledger<S> {
    /// Load the ledger from `store`. Never fails; a bad store means an empty ledger.
    pub async fn load(store: S) -> Self {
        let records = store.load().await;
        Self {
            records: Mutex::new(records),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Credit one minute to every sampled player, creating entries for new
    /// names, then persist once.
    ///
    /// A reachable tick with nobody online changes nothing and is not saved.
    pub async fn accrue(&self, status: &ServerStatus) -> AccrualReport {
        if status.players.is_empty() {
            return AccrualReport::default();
        }

        let mut records = self.records.lock().await;
        let mut report = AccrualReport::default();
        for player in &status.players {
            match records.get_mut(&player.name) {
                Some(entry) => {
                    entry.minutes += 1;
                    entry.id.clone_from(&player.id);
                }
                None => {
                    info!(player = %player.name, "tracking new player");
                    let entry = LedgerEntry::first_seen(player.id.clone());
                    records.insert(player.name.clone(), entry);
                    report.created += 1;
                }
            }
            report.credited += 1;
        }

        report.persisted = self.persist(&records).await;
        debug!(
            credited = report.credited,
            created = report.created,
            persisted = report.persisted,
            "accrued playtime"
        );
        report
    }

    /// Attach a chat identity to a player's entry and persist immediately.
    pub async fn link(&self, player: &str, identity: &Identity) -> Result<(), LedgerError> {
        let mut records = self.records.lock().await;
        let entry = records
            .get_mut(player)
            .ok_or_else(|| LedgerError::UnknownPlayer(player.to_string()))?;
        entry.linked_identity_name.clone_from(&identity.name);
        entry.linked_identity_id.clone_from(&identity.id);
        info!(player, identity = %identity.name, "linked player to identity");

        self.persist(&records).await;
        Ok(())
    }

    /// Save failures are logged; the in-memory ledger stays authoritative
    /// and the next mutation tries again.
    async fn persist(&self, records: &Records) -> bool {
        match self.store.save(records).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to persist ledger");
                false
            }
        }
    }

    pub async fn entry(&self, player: &str) -> Option<LedgerEntry> {
        self.records.lock().await.get(player).cloned()
    }

    /// Find the player linked to `query`, given either the identity's name
    /// or a mention of its id (`<@id>` / `<@!id>`).
    pub async fn resolve_player_by_identity(&self, query: &str) -> Option<PlayerName> {
        let mentioned = mention_id(query);
        let records = self.records.lock().await;
        records
            .iter()
            .find(|(_, entry)| {
                (!entry.linked_identity_name.is_empty() && entry.linked_identity_name == query)
                    || (!entry.linked_identity_id.is_empty()
                        && mentioned == Some(entry.linked_identity_id.as_str()))
            })
            .map(|(name, _)| name.clone())
    }

    /// Entry linked to the given identity id.
    pub async fn find_by_identity_id(&self, id: &str) -> Option<(PlayerName, LedgerEntry)> {
        if id.is_empty() {
            return None;
        }
        let records = self.records.lock().await;
        records
            .iter()
            .find(|(_, entry)| entry.linked_identity_id == id)
            .map(|(name, entry)| (name.clone(), entry.clone()))
    }

    /// Entry with the most minutes. Ties go to the earliest tracked player.
    pub async fn highest_accrual(&self) -> Option<(PlayerName, LedgerEntry)> {
        let records = self.records.lock().await;
        let mut best: Option<(&PlayerName, &LedgerEntry)> = None;
        for (name, entry) in records.iter() {
            if best.is_none_or(|(_, top)| entry.minutes > top.minutes) {
                best = Some((name, entry));
            }
        }
        best.map(|(name, entry)| (name.clone(), entry.clone()))
    }

    pub async fn entries(&self) -> Vec<(PlayerName, LedgerEntry)> {
        self.records
            .lock()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

/// Extract the id from a user mention such as `<@1234>` or `<@!1234>`.
pub fn mention_id(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix("<@")?.strip_suffix('>')?;
    let id = inner.strip_prefix('!').unwrap_or(inner);
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

/// Human readable playtime: whole hours past the first hour, minutes before.
pub fn format_playtime(minutes: u64) -> String {
    if minutes > 60 {
        format!("{} hours", minutes / 60)
    } else {
        format!("{minutes} minutes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::tests::status;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn ledger_with(entries: &[(&str, u64, &str, &str)]) -> Ledger<MemoryStore> {
        let mut records = Records::new();
        for (name, minutes, linked_name, linked_id) in entries {
            let entry = LedgerEntry {
                minutes: *minutes,
                id: format!("{name}-uuid"),
                linked_identity_name: linked_name.to_string(),
                linked_identity_id: linked_id.to_string(),
            };
            records.insert(name.to_string(), entry);
        }
        Ledger::load(MemoryStore::with_records(records)).await
    }

    #[tokio::test]
    async fn test_new_player_starts_at_one_minute() {
        let ledger = Ledger::load(MemoryStore::new()).await;

        let report = ledger.accrue(&status(&["Steve"])).await;

        let expected = AccrualReport {
            credited: 1,
            created: 1,
            persisted: true,
        };
        assert_eq!(report, expected);
        let entry = ledger.entry("Steve").await.unwrap();
        assert_eq!(entry.minutes, 1);
        assert_eq!(entry.id, "Steve-uuid");
        assert!(entry.linked_identity_name.is_empty());
        assert!(entry.linked_identity_id.is_empty());
    }

    #[tokio::test]
    async fn test_continuous_presence_accrues_one_minute_per_tick() {
        let ledger = ledger_with(&[("Steve", 10, "", "")]).await;

        for _ in 0..7 {
            ledger.accrue(&status(&["Steve", "Alex"])).await;
        }

        assert_eq!(ledger.entry("Steve").await.unwrap().minutes, 17);
        assert_eq!(ledger.entry("Alex").await.unwrap().minutes, 7);
        assert_eq!(ledger.store().save_count(), 7);
    }

    #[tokio::test]
    async fn test_long_player_names_are_credited() {
        let ledger = Ledger::load(MemoryStore::new()).await;

        ledger.accrue(&status(&[".BedrockPlayer123"])).await;
        ledger.accrue(&status(&[".BedrockPlayer123"])).await;

        assert_eq!(ledger.entry(".BedrockPlayer123").await.unwrap().minutes, 2);
        assert!(ledger.store().records().contains_key(".BedrockPlayer123"));
    }

    #[tokio::test]
    async fn test_empty_server_does_not_write() {
        let ledger = ledger_with(&[("Steve", 10, "", "")]).await;

        let report = ledger.accrue(&status(&[])).await;

        assert_eq!(report, AccrualReport::default());
        assert_eq!(ledger.store().save_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_memory_ledger() {
        let ledger = ledger_with(&[("Steve", 10, "", "")]).await;
        ledger.store().set_failing(true);

        let report = ledger.accrue(&status(&["Steve"])).await;
        assert!(!report.persisted);
        assert_eq!(ledger.entry("Steve").await.unwrap().minutes, 11);

        ledger.store().set_failing(false);
        ledger.accrue(&status(&["Steve"])).await;
        assert_eq!(ledger.store().records()["Steve"].minutes, 12);
    }

    #[tokio::test]
    async fn test_link_persists_immediately() {
        let ledger = ledger_with(&[("Steve", 10, "", "")]).await;

        ledger
            .link("Steve", &Identity::new("steve#1", "111"))
            .await
            .unwrap();

        let saved = ledger.store().records();
        assert_eq!(saved["Steve"].linked_identity_name, "steve#1");
        assert_eq!(saved["Steve"].linked_identity_id, "111");
        assert_eq!(
            ledger.link("Nobody", &Identity::new("x", "1")).await,
            Err(LedgerError::UnknownPlayer("Nobody".to_string()))
        );
    }

    #[tokio::test]
    async fn test_accrual_keeps_linked_identity() {
        let ledger = ledger_with(&[("Steve", 10, "steve", "111")]).await;

        ledger.accrue(&status(&["Steve"])).await;

        let entry = ledger.entry("Steve").await.unwrap();
        assert_eq!(entry.linked_identity_name, "steve");
        assert_eq!(entry.linked_identity_id, "111");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_accrual_and_link_lose_nothing() {
        let ledger = Arc::new(ledger_with(&[("Steve", 10, "", ""), ("Alex", 0, "", "")]).await);

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            tasks.push(tokio::spawn(async move {
                ledger.accrue(&status(&["Steve", "Alex"])).await;
            }));
        }
        let linker = ledger.clone();
        let (linked, _) = tokio::join!(
            async move { linker.link("Steve", &Identity::new("steve#1", "111")).await },
            async {
                for task in tasks {
                    task.await.unwrap();
                }
            }
        );
        linked.unwrap();

        let saved = ledger.store().records();
        assert_eq!(saved["Steve"].minutes, 30);
        assert_eq!(saved["Alex"].minutes, 20);
        assert_eq!(saved["Steve"].linked_identity_name, "steve#1");
        assert_eq!(saved["Steve"].linked_identity_id, "111");
        assert_eq!(ledger.store().save_count(), 21);
    }

    #[tokio::test]
    async fn test_entries_and_len_follow_insertion_order() {
        let ledger = ledger_with(&[("Steve", 10, "", "")]).await;
        assert_eq!(ledger.len().await, 1);
        assert!(!ledger.is_empty().await);

        ledger.accrue(&status(&["Alex", "Steve"])).await;

        let names: Vec<PlayerName> = ledger
            .entries()
            .await
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["Steve", "Alex"]);
        assert_eq!(ledger.len().await, 2);
        assert!(Ledger::load(MemoryStore::new()).await.is_empty().await);
    }

    #[tokio::test]
    async fn test_resolve_player_by_identity() {
        let ledger = ledger_with(&[
            ("Steve", 10, "steve", "111"),
            ("Alex", 5, "", ""),
            ("jeb_", 3, "jeb", "222"),
        ])
        .await;

        for (query, expected) in [
            ("steve", Some("Steve")),
            ("<@!222>", Some("jeb_")),
            ("<@111>", Some("Steve")),
            ("alex", None),
            ("<@!999>", None),
            ("", None),
            ("111", None),
        ] {
            let found = ledger.resolve_player_by_identity(query).await;
            assert_eq!(found.as_deref(), expected, "query {query:?}");
        }
    }

    #[tokio::test]
    async fn test_find_by_identity_id() {
        let ledger = ledger_with(&[("Steve", 10, "steve", "111"), ("Alex", 5, "", "")]).await;

        let (name, entry) = ledger.find_by_identity_id("111").await.unwrap();
        assert_eq!(name, "Steve");
        assert_eq!(entry.minutes, 10);
        assert!(ledger.find_by_identity_id("").await.is_none());
    }

    #[tokio::test]
    async fn test_highest_accrual_prefers_first_tracked_on_tie() {
        let ledger = ledger_with(&[
            ("Alex", 5, "", ""),
            ("Steve", 90, "", ""),
            ("jeb_", 90, "", ""),
        ])
        .await;

        let (name, entry) = ledger.highest_accrual().await.unwrap();
        assert_eq!(name, "Steve");
        assert_eq!(entry.minutes, 90);

        let empty = Ledger::load(MemoryStore::new()).await;
        assert!(empty.highest_accrual().await.is_none());
    }

    #[test]
    fn test_mention_id() {
        assert_eq!(mention_id("<@123>"), Some("123"));
        assert_eq!(mention_id("<@!123>"), Some("123"));
        assert_eq!(mention_id("<@&123>"), None);
        assert_eq!(mention_id("<@>"), None);
        assert_eq!(mention_id("123"), None);
    }

    #[test]
    fn test_format_playtime() {
        assert_eq!(format_playtime(1), "1 minutes");
        assert_eq!(format_playtime(60), "60 minutes");
        assert_eq!(format_playtime(61), "1 hours");
        assert_eq!(format_playtime(250), "4 hours");
    }
}
