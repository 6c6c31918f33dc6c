use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::transport::is_truthy;

/// A promotable item a user can act on for a reward.
///
/// Offers are built from the raw records of an offers response. Missing, empty or mistyped fields
/// fall back to defaults, so an `Offer` is always fully populated. Numeric fields also accept
/// numeric strings.
///
/// A lazy offer is not visible until its tracking URL has been patched by a matching
/// [`LazyOffer`](crate::LazyOffer). The patched list is delivered through
/// [`LazyOffersListener`](crate::LazyOffersListener).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawOffer", into = "RawOffer")]
pub struct Offer {
    /// Campaign identifier. Used to track views.
    pub id: String,
    /// Free-form attributes attached to the campaign.
    pub attributes: Map<String, Value>,
    /// Cost type of the campaign. Defaults to [`Offer::DEFAULT_COST_TYPE`].
    pub cost_type: String,
    /// Reward credited to the user.
    pub credits: f64,
    /// Call-to-action text.
    pub cta_text: Option<String>,
    /// Call-to-action title.
    pub cta_title: Option<String>,
    /// Image to display. Defaults to [`Offer::DEFAULT_IMAGE_URL`].
    pub image_url: String,
    /// Whether the tracking URL is resolved by a follow-up lazy call.
    pub is_lazy: bool,
    /// Lazy group the offer belongs to.
    pub lazy_id: Option<String>,
    /// Payout of the campaign.
    pub payout: f64,
    /// Body text.
    pub text: String,
    /// Title text.
    pub title: String,
    /// Tracking URL. For lazy offers it contains placeholder tokens until resolved.
    pub tracking_url: String,
    /// Kind of the record. Defaults to [`Offer::KIND_OFFER`].
    pub kind: String,
    /// `false` while the offer is lazy and unresolved.
    pub is_visible: bool,
}

impl Offer {
    /// Kind of regular offers.
    pub const KIND_OFFER: &'static str = "offer";

    /// Cost type used when the server does not provide one.
    pub const DEFAULT_COST_TYPE: &'static str = "cpa";

    /// Placeholder image used when the server does not provide one.
    pub const DEFAULT_IMAGE_URL: &'static str = "https://admin.annecy.media/images/logo-colored.png";

    /// Whether the offer should be shown in an offer list.
    pub fn is_displayable(&self) -> bool {
        self.is_visible && self.kind == Offer::KIND_OFFER
    }
}

/// Wire shape of an offer. Everything but `campaign_uuid` may be missing or loosely typed.
///
/// Offers are written back in the same shape, with `is_visible` added so that resolved lazy
/// offers survive a round trip.
#[derive(Debug, Serialize, Deserialize)]
struct RawOffer {
    campaign_uuid: String,
    #[serde(default)]
    attributes: Value,
    #[serde(default)]
    cost_type: Value,
    #[serde(default)]
    credits: Value,
    #[serde(default)]
    cta_text: Value,
    #[serde(default)]
    cta_title: Value,
    #[serde(default)]
    image_url: Value,
    #[serde(default)]
    lazy: Value,
    #[serde(default)]
    lazy_id: Value,
    #[serde(default)]
    payout: Value,
    #[serde(default)]
    text: Value,
    #[serde(default)]
    title: Value,
    #[serde(default)]
    tracking_url: Value,
    #[serde(default, rename = "type")]
    kind: Value,
    #[serde(default)]
    is_visible: Value,
}

/// Non-empty strings, with numbers spelled out. Anything else counts as missing.
fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers and numeric strings. Anything else is zero.
fn amount(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn optional_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::String)
}

impl From<RawOffer> for Offer {
    fn from(raw: RawOffer) -> Offer {
        let is_lazy = is_truthy(&raw.lazy);
        let is_visible = match raw.is_visible {
            Value::Bool(visible) => visible,
            _ => !is_lazy,
        };
        Offer {
            id: raw.campaign_uuid,
            attributes: match raw.attributes {
                Value::Object(attributes) => attributes,
                _ => Map::new(),
            },
            cost_type: text(raw.cost_type).unwrap_or_else(|| Offer::DEFAULT_COST_TYPE.to_owned()),
            credits: amount(&raw.credits),
            cta_text: text(raw.cta_text),
            cta_title: text(raw.cta_title),
            image_url: text(raw.image_url).unwrap_or_else(|| Offer::DEFAULT_IMAGE_URL.to_owned()),
            is_lazy,
            lazy_id: text(raw.lazy_id),
            payout: amount(&raw.payout),
            text: text(raw.text).unwrap_or_default(),
            title: text(raw.title).unwrap_or_default(),
            tracking_url: text(raw.tracking_url).unwrap_or_default(),
            kind: text(raw.kind).unwrap_or_else(|| Offer::KIND_OFFER.to_owned()),
            is_visible,
        }
    }
}

impl From<Offer> for RawOffer {
    fn from(offer: Offer) -> RawOffer {
        RawOffer {
            campaign_uuid: offer.id,
            attributes: Value::Object(offer.attributes),
            cost_type: Value::String(offer.cost_type),
            credits: Value::from(offer.credits),
            cta_text: optional_text(offer.cta_text),
            cta_title: optional_text(offer.cta_title),
            image_url: Value::String(offer.image_url),
            lazy: Value::Bool(offer.is_lazy),
            lazy_id: optional_text(offer.lazy_id),
            payout: Value::from(offer.payout),
            text: Value::String(offer.text),
            title: Value::String(offer.title),
            tracking_url: Value::String(offer.tracking_url),
            kind: Value::String(offer.kind),
            is_visible: Value::Bool(offer.is_visible),
        }
    }
}
