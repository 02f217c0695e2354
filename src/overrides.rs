//! Manual factor overrides, keyed by feature id.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{DashboardError, Result};
use crate::store::{DocumentStore, DocumentStoreExt, OVERRIDES_KEY};
use crate::types::{CustomerTier, Factor, ScoreFactors};

pub type OverrideMap = BTreeMap<String, ScoreFactors>;

fn validate_score(factor: Factor, value: f64) -> Result<()> {
    if !(1.0..=10.0).contains(&value) {
        return Err(DashboardError::InvalidInput(format!(
            "{} override must be between 1 and 10, got {}",
            factor, value
        )));
    }
    Ok(())
}

pub struct OverrideStore {
    store: Arc<dyn DocumentStore>,
    write_lock: Mutex<()>,
}

impl OverrideStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn all(&self) -> Result<OverrideMap> {
        self.store.load(OVERRIDES_KEY, OverrideMap::new())
    }

    pub fn get(&self, feature_id: &str) -> Result<Option<ScoreFactors>> {
        Ok(self.all()?.remove(feature_id))
    }

    fn update<F>(&self, feature_id: &str, edit: F) -> Result<ScoreFactors>
    where
        F: FnOnce(&mut ScoreFactors),
    {
        let _guard = self.write_lock.lock();
        let mut all = self.all()?;
        let entry = all.entry(feature_id.to_string()).or_default();
        edit(entry);
        let updated = entry.clone();
        if updated.is_empty() {
            all.remove(feature_id);
        }
        self.store.save(OVERRIDES_KEY, &all)?;
        Ok(updated)
    }

    /// Set or clear (`None`) one factor override.
    pub fn set_factor(
        &self,
        feature_id: &str,
        factor: Factor,
        value: Option<f64>,
    ) -> Result<ScoreFactors> {
        if let Some(v) = value {
            validate_score(factor, v)?;
        }
        log::info!(
            "Overrides: {} {} -> {:?}",
            feature_id,
            factor,
            value
        );
        self.update(feature_id, |o| o.set(factor, value))
    }

    /// Override the customer tier used for the multiplier lookup.
    pub fn set_tier(&self, feature_id: &str, tier: Option<CustomerTier>) -> Result<ScoreFactors> {
        self.update(feature_id, |o| o.customer_tier = tier)
    }

    /// Replace every override for a feature at once.
    pub fn replace(&self, feature_id: &str, overrides: ScoreFactors) -> Result<ScoreFactors> {
        for factor in Factor::ALL {
            if let Some(v) = overrides.get(factor) {
                validate_score(factor, v)?;
            }
        }
        self.update(feature_id, |o| *o = overrides)
    }

    pub fn clear(&self, feature_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut all = self.all()?;
        let removed = all.remove(feature_id).is_some();
        if removed {
            self.store.save(OVERRIDES_KEY, &all)?;
        }
        Ok(removed)
    }
}
