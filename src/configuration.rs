use serde::{Deserialize, Serialize};

/// Identity of the user and device requesting offers.
///
/// The host application supplies a `Configuration` once through
/// [`Engine::init`](crate::Engine::init). The engine keeps it as an immutable snapshot: requests
/// that are already in flight keep using the snapshot they started with.
///
/// Every field is optional and defaults to an empty string.
///
/// ```
/// # use annecy::Configuration;
/// let configuration = Configuration::new()
///     .with_country("US")
///     .with_locale("en")
///     .with_token("annecy-media-token")
///     .with_user_id("1");
/// ```
///
/// It can also be deserialized from the object shape used by the host layer:
///
/// ```
/// # use annecy::Configuration;
/// let configuration: Configuration = serde_json::from_str(
///     r#"{"country": "US", "idfaGaid": "00000000-0000-0000-0000-000000000000"}"#,
/// ).unwrap();
/// assert_eq!(configuration.locale, "");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// ISO country code of the user.
    pub country: String,
    /// Advertising identifier of the device (IDFA on iOS, GAID on Android).
    pub idfa_gaid: String,
    /// Locale of the user interface.
    pub locale: String,
    /// Bearer token used to authorize API requests.
    pub token: String,
    /// Identifier of the user in the host application.
    pub user_id: String,
}

impl Configuration {
    /// Create an empty configuration.
    pub fn new() -> Configuration {
        Configuration::default()
    }

    /// Update the country code.
    pub fn with_country(mut self, country: impl Into<String>) -> Configuration {
        self.country = country.into();
        self
    }

    /// Update the advertising identifier.
    pub fn with_idfa_gaid(mut self, idfa_gaid: impl Into<String>) -> Configuration {
        self.idfa_gaid = idfa_gaid.into();
        self
    }

    /// Update the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Configuration {
        self.locale = locale.into();
        self
    }

    /// Update the API token.
    pub fn with_token(mut self, token: impl Into<String>) -> Configuration {
        self.token = token.into();
        self
    }

    /// Update the user identifier.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Configuration {
        self.user_id = user_id.into();
        self
    }
}

/// User and device parameters attached to every API call.
///
/// Sent as query parameters when fetching offers and as the `params` object of a view batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RequestParams {
    pub advertiser_id: String,
    pub country: String,
    pub locale: String,
    pub platform: String,
    pub user_id: String,
}

impl RequestParams {
    /// Build parameters from an optional configuration snapshot. Missing configuration yields
    /// empty strings.
    pub fn new(configuration: Option<&Configuration>, platform: &str) -> RequestParams {
        let configuration = configuration.cloned().unwrap_or_default();
        RequestParams {
            advertiser_id: configuration.idfa_gaid,
            country: configuration.country,
            locale: configuration.locale,
            platform: platform.to_owned(),
            user_id: configuration.user_id,
        }
    }

    /// Parameters as query pairs, in a stable order.
    pub fn to_query(&self) -> Vec<(String, String)> {
        vec![
            ("advertiser_id".to_owned(), self.advertiser_id.clone()),
            ("country".to_owned(), self.country.clone()),
            ("locale".to_owned(), self.locale.clone()),
            ("platform".to_owned(), self.platform.clone()),
            ("user_id".to_owned(), self.user_id.clone()),
        ]
    }
}
