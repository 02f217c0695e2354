//! Token and cost ledger, one record per day, provider and model.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{DocumentStore, DocumentStoreExt, USAGE_KEY};
use crate::types::ModelProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// YYYY-MM-DD (UTC).
    pub date: String,
    pub provider: ModelProvider,
    pub model: String,
    pub requests: u64,
    pub tokens_used: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub requests: u64,
    pub tokens_used: u64,
    pub cost: f64,
}

pub struct UsageLedger {
    store: Arc<dyn DocumentStore>,
    write_lock: Mutex<()>,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn records(&self) -> Result<Vec<UsageRecord>> {
        self.store.load(USAGE_KEY, Vec::new())
    }

    pub fn record(&self, provider: ModelProvider, model: &str, tokens: u64, cost: f64) -> Result<()> {
        self.record_on(Utc::now().date_naive(), provider, model, tokens, cost)
    }

    /// Add one request to the bucket for (`date`, `provider`, `model`).
    pub fn record_on(
        &self,
        date: NaiveDate,
        provider: ModelProvider,
        model: &str,
        tokens: u64,
        cost: f64,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();
        let date = date.format("%Y-%m-%d").to_string();
        let mut records = self.records()?;

        match records
            .iter_mut()
            .find(|r| r.date == date && r.provider == provider && r.model == model)
        {
            Some(r) => {
                r.requests += 1;
                r.tokens_used += tokens;
                r.cost += cost;
            }
            None => records.push(UsageRecord {
                date,
                provider,
                model: model.to_string(),
                requests: 1,
                tokens_used: tokens,
                cost,
            }),
        }

        self.store.save(USAGE_KEY, &records)
    }

    /// Totals, optionally restricted to records on or after `since`.
    pub fn summary(&self, since: Option<NaiveDate>) -> Result<UsageSummary> {
        let since = since.map(|d| d.format("%Y-%m-%d").to_string());
        let mut summary = UsageSummary::default();
        for r in self.records()? {
            if since.as_ref().is_some_and(|s| r.date < *s) {
                continue;
            }
            summary.requests += r.requests;
            summary.tokens_used += r.tokens_used;
            summary.cost += r.cost;
        }
        Ok(summary)
    }
}
