use serde::{Deserialize, Serialize};

use crate::Offer;

/// Resolution of a lazy group: the substitutions that turn placeholder tracking URLs of the group
/// into real ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyOffer {
    /// Lazy group this resolution applies to.
    pub lazy_id: String,
    /// Substitutions, applied in order.
    #[serde(default)]
    pub fields: Vec<LazyField>,
}

/// A single find/replace pair of a [`LazyOffer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyField {
    /// Placeholder token to look for.
    pub search: String,
    /// Value to put in its place.
    pub replace: String,
}

impl LazyOffer {
    /// Patch `offer` if it belongs to this lazy group. Returns whether the offer matched.
    ///
    /// Each field replaces the first occurrence of its search token. A matching offer becomes
    /// visible.
    pub fn apply_to(&self, offer: &mut Offer) -> bool {
        if offer.lazy_id.as_deref() != Some(self.lazy_id.as_str()) {
            return false;
        }

        for field in &self.fields {
            offer.tracking_url = offer.tracking_url.replacen(&field.search, &field.replace, 1);
        }
        offer.is_visible = true;

        true
    }
}
