use crate::carrier::models::{normalize_key, PickupLocation};
use crate::carrier::{CarrierError, CarrierGateway};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Matches free-text pickup labels against the account's registered pickup addresses.
pub struct PickupResolver {
    gateway: Arc<dyn CarrierGateway>,
    locations: RwLock<Vec<PickupLocation>>,
}

impl PickupResolver {
    pub fn new(gateway: Arc<dyn CarrierGateway>) -> Self {
        Self {
            gateway,
            locations: RwLock::new(Vec::new()),
        }
    }

    /// Replace the location set with a fresh listing. On failure the previous set stays.
    pub async fn refresh(&self) -> Result<usize, CarrierError> {
        let fetched = match self.gateway.list_pickup_locations().await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "Pickup refresh failed, keeping previous locations");
                return Err(e);
            }
        };

        let mut seen = HashSet::new();
        let locations: Vec<PickupLocation> = fetched
            .into_iter()
            .filter(|l| seen.insert(l.normalized_key.clone()))
            .collect();

        let count = locations.len();
        *self
            .locations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = locations;
        info!(count, "Pickup locations refreshed");
        Ok(count)
    }

    /// Refresh only when nothing has been loaded yet.
    pub async fn ensure_loaded(&self) -> Result<(), CarrierError> {
        if self.is_empty() {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Rules apply in order across the whole set: exact key, label inside key, key inside
    /// label. No label or no match falls back to the first location.
    ///
    /// Each rule scans every location before the next rule runs, so an exact match beats
    /// an earlier partial match. The bot this replaces took the first location passing
    /// any rule; the stricter order is deliberate.
    ///
    /// The fallback is a product policy and can ship from the wrong address on a typo.
    /// Do not tighten it without sign-off.
    pub fn resolve(&self, label: Option<&str>) -> Option<PickupLocation> {
        let locations = self
            .locations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let first = locations.first()?;

        let wanted = label.map(normalize_key).unwrap_or_default();
        if wanted.is_empty() {
            warn!(pickup = %first.name, "No pickup label given, using first pickup location");
            return Some(first.clone());
        }

        let found = locations
            .iter()
            .find(|l| l.normalized_key == wanted)
            .or_else(|| {
                locations
                    .iter()
                    .find(|l| l.normalized_key.contains(wanted.as_str()))
            })
            .or_else(|| {
                locations
                    .iter()
                    .find(|l| wanted.contains(l.normalized_key.as_str()))
            });
        if let Some(found) = found {
            return Some(found.clone());
        }

        warn!(
            label = label.unwrap_or_default(),
            pickup = %first.name,
            "Pickup label matched nothing, using first pickup location"
        );
        Some(first.clone())
    }

    pub fn locations(&self) -> Vec<PickupLocation> {
        self.locations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
