pub mod sqlite;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::config::{ReferralBackend, ReferralsConfig};

pub use sqlite::SqliteReferralStore;

/// Records which referral, if any, brought a chat to the bot
#[async_trait]
pub trait ReferralStore: Send + Sync {
    async fn save(&self, chat_id: i64, referral_id: Option<&str>) -> Result<()>;
}

/// Writes referrals to the process log only
#[derive(Debug, Default, Clone)]
pub struct LogReferralStore;

#[async_trait]
impl ReferralStore for LogReferralStore {
    async fn save(&self, chat_id: i64, referral_id: Option<&str>) -> Result<()> {
        info!(
            "Saving referral ID {} for chat ID {}",
            referral_id.unwrap_or("none"),
            chat_id
        );
        Ok(())
    }
}

/// Build the store selected in the config
pub fn open(config: &ReferralsConfig) -> Result<Arc<dyn ReferralStore>> {
    match config.store {
        ReferralBackend::Log => Ok(Arc::new(LogReferralStore)),
        ReferralBackend::Sqlite => Ok(Arc::new(SqliteReferralStore::open(
            &config.database_path,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_store_accepts_missing_referral() {
        let store = LogReferralStore;
        store.save(42, Some("REF123")).await.unwrap();
        store.save(42, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReferralsConfig {
            store: ReferralBackend::Sqlite,
            database_path: dir.path().join("refs.db"),
        };
        let store = open(&config).unwrap();
        store.save(7, Some("abc")).await.unwrap();
        assert!(config.database_path.exists());
    }
}
