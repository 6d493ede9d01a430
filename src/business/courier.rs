use crate::carrier::models::CourierCandidate;
use crate::carrier::{CarrierError, CarrierGateway};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tier for carriers matched by neither the override table nor the allow-list.
pub const UNLISTED_TIER: i64 = 99;

/// Ranking rules for courier candidates.
#[derive(Debug, Clone)]
pub struct CourierPolicy {
    allow_list: Vec<String>,
    overrides: HashMap<String, i64>,
}

impl CourierPolicy {
    /// Allow-list entries are matched as lowercase substrings of the carrier name; the
    /// first entry is tier 1.
    pub fn new(allow_list: Vec<String>) -> Self {
        Self {
            allow_list: allow_list.into_iter().map(|s| s.to_lowercase()).collect(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, i64>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Load the override table from a JSON object of `"<carrier name> <Mode>" -> integer`.
    /// A missing or unreadable file leaves only the allow-list in effect.
    pub fn load(allow_list: Vec<String>, overrides_path: &Path) -> Self {
        let policy = Self::new(allow_list);
        let text = match std::fs::read_to_string(overrides_path) {
            Ok(text) => text,
            Err(_) => {
                debug!(path = %overrides_path.display(), "No courier priority overrides");
                return policy;
            }
        };

        match serde_json::from_str::<HashMap<String, Value>>(&text) {
            Ok(raw) => {
                let overrides: HashMap<String, i64> = raw
                    .into_iter()
                    .filter_map(|(key, value)| value.as_i64().map(|tier| (key, tier)))
                    .collect();
                info!(count = overrides.len(), "Loaded courier priority overrides");
                policy.with_overrides(overrides)
            }
            Err(e) => {
                warn!(path = %overrides_path.display(), error = %e, "Ignoring unreadable courier priority file");
                policy
            }
        }
    }

    pub fn tier(&self, candidate: &CourierCandidate) -> i64 {
        let name = candidate.carrier_name.trim();
        let mode = candidate.mode_label.trim();
        let key = if mode.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", name, title_case(mode))
        };
        if let Some(tier) = self.overrides.get(&key) {
            return *tier;
        }

        let lower = name.to_lowercase();
        self.allow_list
            .iter()
            .position(|entry| lower.contains(entry.as_str()))
            .map(|index| index as i64 + 1)
            .unwrap_or(UNLISTED_TIER)
    }

    /// Order candidates by tier, service mode, then rate (unknown rates last). Name and id
    /// break remaining ties so the order never depends on input order.
    pub fn rank(&self, candidates: Vec<CourierCandidate>) -> Vec<CourierCandidate> {
        let mut keyed: Vec<(i64, CourierCandidate)> = candidates
            .into_iter()
            .map(|c| (self.tier(&c), c))
            .collect();
        keyed.sort_by(|(tier_a, a), (tier_b, b)| {
            tier_a
                .cmp(tier_b)
                .then(a.service_mode.preference().cmp(&b.service_mode.preference()))
                .then_with(|| compare_rates(a.quoted_rate, b.quoted_rate))
                .then_with(|| a.carrier_name.cmp(&b.carrier_name))
                .then_with(|| a.carrier_id.cmp(&b.carrier_id))
        });
        keyed.into_iter().map(|(_, c)| c).collect()
    }
}

fn compare_rates(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(f64::INFINITY)
        .total_cmp(&b.unwrap_or(f64::INFINITY))
}

/// Uppercase each letter that follows a non-letter, lowercase the rest, so
/// `surface-express` becomes `Surface-Express`.
fn title_case(text: &str) -> String {
    let mut previous_is_letter = false;
    text.chars()
        .flat_map(|c| {
            let mapped: Vec<char> = if !c.is_alphabetic() {
                vec![c]
            } else if previous_is_letter {
                c.to_lowercase().collect()
            } else {
                c.to_uppercase().collect()
            };
            previous_is_letter = c.is_alphabetic();
            mapped
        })
        .collect()
}

/// The courier that accepted a shipment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourierAssignment {
    pub courier: String,
    pub courier_id: String,
    pub tracking_number: String,
    pub rate: Option<f64>,
}

/// Tries ranked couriers until one assigns a tracking number.
pub struct CourierSelector {
    gateway: Arc<dyn CarrierGateway>,
    policy: CourierPolicy,
}

impl CourierSelector {
    pub fn new(gateway: Arc<dyn CarrierGateway>, policy: CourierPolicy) -> Self {
        Self { gateway, policy }
    }

    /// `Ok(None)` when no candidate accepted. Transport failures on a single assignment
    /// move on to the next candidate; authentication failures stop the walk.
    pub async fn create_shipment_with_courier(
        &self,
        shipment_id: &str,
        pickup_pin: &str,
        delivery_pin: &str,
        weight: f64,
        cod: bool,
    ) -> Result<Option<CourierAssignment>, CarrierError> {
        let candidates = self
            .gateway
            .quote_couriers(pickup_pin, delivery_pin, weight, cod)
            .await;
        if candidates.is_empty() {
            warn!(shipment_id, pickup_pin, delivery_pin, "No serviceable couriers");
            return Ok(None);
        }

        for candidate in self.policy.rank(candidates) {
            let courier_id = match candidate.carrier_id.as_deref() {
                Some(id) => id,
                None => {
                    info!(courier = %candidate.carrier_name, "Skipping courier without an id");
                    continue;
                }
            };

            match self.gateway.assign_awb(shipment_id, courier_id).await {
                Ok(Some(tracking_number)) => {
                    info!(
                        shipment_id,
                        courier = %candidate.carrier_name,
                        %tracking_number,
                        "Courier assigned"
                    );
                    return Ok(Some(CourierAssignment {
                        courier: candidate.carrier_name.clone(),
                        courier_id: courier_id.to_string(),
                        tracking_number,
                        rate: candidate.quoted_rate,
                    }));
                }
                Ok(None) => {
                    info!(shipment_id, courier = %candidate.carrier_name, "Courier declined");
                }
                Err(e) if e.is_authentication() => return Err(e),
                Err(e) => {
                    error!(
                        shipment_id,
                        courier = %candidate.carrier_name,
                        error = %e,
                        "AWB assignment failed, trying next courier"
                    );
                }
            }
        }

        warn!(shipment_id, "Every courier declined the shipment");
        Ok(None)
    }
}
