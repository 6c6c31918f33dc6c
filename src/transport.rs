//! HTTP plumbing between the engine and the offers API.
use derive_more::From;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Method, StatusCode, Url,
};

use crate::{Error, Result};

/// Where a request is sent.
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum Target {
    /// Path relative to the configured base URL (e.g., `/offers`).
    Path(&'static str),
    /// Absolute URL handed out by the server (lazy calls).
    Url(Url),
}

/// A transport-agnostic API request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Endpoint.
    pub target: Target,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<serde_json::Value>,
    /// Bearer token.
    pub token: String,
}

impl Request {
    /// Create a `GET` request.
    pub fn get(target: impl Into<Target>) -> Request {
        Request {
            method: Method::GET,
            target: target.into(),
            query: Vec::new(),
            body: None,
            token: String::new(),
        }
    }

    /// Create a `POST` request with a JSON body.
    pub fn post(target: impl Into<Target>, body: serde_json::Value) -> Request {
        Request {
            method: Method::POST,
            target: target.into(),
            query: Vec::new(),
            body: Some(body),
            token: String::new(),
        }
    }

    /// Set query parameters.
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Request {
        self.query = query;
        self
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Request {
        self.token = token.into();
        self
    }
}

/// Performs API requests for the engine.
///
/// Implementations return the parsed response body. Statuses of 400 and above must be reported as
/// [`Error::HttpStatus`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response body.
    async fn send(&self, request: Request) -> Result<serde_json::Value>;
}

/// [`Transport`] over HTTP.
pub struct HttpTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::Client,
    base_url: String,
    api_version: String,
}

impl HttpTransport {
    /// Create a new transport.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, api_version: &str) -> Result<HttpTransport> {
        Url::parse(base_url).map_err(Error::InvalidBaseUrl)?;

        Ok(HttpTransport {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_version: api_version.to_owned(),
        })
    }

    fn url(&self, request: &Request) -> Result<Url> {
        let mut url = match &request.target {
            Target::Path(path) => {
                Url::parse(&format!("{}{}", self.base_url, path)).map_err(Error::InvalidBaseUrl)?
            }
            Target::Url(url) => url.clone(),
        };

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        Ok(url)
    }

    /// Assemble the HTTP request: headers, query, and body.
    fn build(&self, request: &Request) -> Result<reqwest::Request> {
        let url = self.url(request)?;

        let builder = self
            .client
            .request(request.method.clone(), url)
            .header(ACCEPT, "application/json")
            .header("API-VERSION", &self.api_version)
            .bearer_auth(&request.token);

        let builder = match &request.body {
            Some(body) => builder.json(body),
            None if !request.query.is_empty() => {
                builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            }
            None => builder.header(CONTENT_TYPE, "application/json"),
        };

        Ok(builder.build()?)
    }
}

/// Statuses of 400 and above are errors.
fn check_status(status: StatusCode) -> Result<()> {
    if status.as_u16() >= 400 {
        log::debug!(target: "annecy", status = status.as_u16(); "received error status");
        return Err(Error::HttpStatus(status.as_u16()));
    }
    Ok(())
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<serde_json::Value> {
        let http_request = self.build(&request)?;

        log::trace!(target: "annecy",
                    method:display = http_request.method(),
                    url:display = http_request.url();
                    "sending request");

        let response = self.client.execute(http_request).await?;
        check_status(response.status())?;

        let body: serde_json::Value = response.json().await?;

        Ok(unwrap_envelope(body))
    }
}

/// Responses may wrap their payload in a `data` field.
fn unwrap_envelope(mut body: serde_json::Value) -> serde_json::Value {
    if body.get("data").is_some_and(is_truthy) {
        body["data"].take()
    } else {
        body
    }
}

/// Truthiness of a JSON value, as loosely typed clients understand it.
pub(crate) fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method, StatusCode, Url,
    };
    use serde_json::json;

    use super::{check_status, unwrap_envelope, HttpTransport, Request, Target};
    use crate::Error;

    #[test]
    fn unwraps_data_envelope() {
        assert_eq!(
            unwrap_envelope(json!({"data": {"offers": []}})),
            json!({"offers": []})
        );
    }

    #[test]
    fn keeps_body_without_envelope() {
        assert_eq!(
            unwrap_envelope(json!({"offers": [], "request_id": "R"})),
            json!({"offers": [], "request_id": "R"})
        );
        assert_eq!(unwrap_envelope(json!([1, 2])), json!([1, 2]));
        assert_eq!(unwrap_envelope(json!(null)), json!(null));
    }

    #[test]
    fn keeps_body_with_falsy_data() {
        assert_eq!(unwrap_envelope(json!({"data": null})), json!({"data": null}));
        assert_eq!(unwrap_envelope(json!({"data": ""})), json!({"data": ""}));
        assert_eq!(unwrap_envelope(json!({"data": 0})), json!({"data": 0}));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            HttpTransport::new("annecy", "1.0"),
            Err(Error::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn joins_path_and_query() {
        let transport = HttpTransport::new("https://api.annecy.test/", "1.0").unwrap();
        let request = Request::get("/offers").with_query(vec![
            ("country".to_owned(), "US".to_owned()),
            ("locale".to_owned(), "en US".to_owned()),
        ]);

        let url = transport.url(&request).unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.annecy.test/offers?country=US&locale=en+US"
        );
    }

    #[test]
    fn absolute_targets_ignore_base_url() {
        let transport = HttpTransport::new("https://api.annecy.test", "1.0").unwrap();
        let lazy = Url::parse("https://lazy.test/batch/1?sig=abc").unwrap();
        let request = Request::get(lazy.clone());

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.target, Target::Url(lazy.clone()));
        assert_eq!(transport.url(&request).unwrap(), lazy);
    }

    fn header<'a>(
        request: &'a reqwest::Request,
        name: impl reqwest::header::AsHeaderName,
    ) -> &'a str {
        request.headers().get(name).unwrap().to_str().unwrap()
    }

    #[test]
    fn query_requests_are_form_encoded() {
        let transport = HttpTransport::new("https://api.annecy.test", "1.0").unwrap();
        let request = Request::get("/offers")
            .with_query(vec![("country".to_owned(), "US".to_owned())])
            .with_token("annecy-media-token");

        let built = transport.build(&request).unwrap();

        assert_eq!(*built.method(), Method::GET);
        assert_eq!(built.url().as_str(), "https://api.annecy.test/offers?country=US");
        assert_eq!(header(&built, ACCEPT), "application/json");
        assert_eq!(header(&built, "API-VERSION"), "1.0");
        assert_eq!(header(&built, AUTHORIZATION), "Bearer annecy-media-token");
        assert_eq!(header(&built, CONTENT_TYPE), "application/x-www-form-urlencoded");
        assert!(built.body().is_none());
    }

    #[test]
    fn body_requests_are_json() {
        let transport = HttpTransport::new("https://api.annecy.test", "2.1").unwrap();
        let request =
            Request::post("/views", json!({"request_id": "R1"})).with_token("annecy-media-token");

        let built = transport.build(&request).unwrap();

        assert_eq!(*built.method(), Method::POST);
        assert_eq!(header(&built, ACCEPT), "application/json");
        assert_eq!(header(&built, "API-VERSION"), "2.1");
        assert_eq!(header(&built, AUTHORIZATION), "Bearer annecy-media-token");
        assert_eq!(header(&built, CONTENT_TYPE), "application/json");
        let body = built.body().and_then(|body| body.as_bytes()).unwrap();
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(body).unwrap(),
            json!({"request_id": "R1"})
        );
    }

    #[test]
    fn bare_requests_are_json_with_empty_bearer() {
        let transport = HttpTransport::new("https://api.annecy.test", "1.0").unwrap();

        let built = transport.build(&Request::get("/offers")).unwrap();

        assert_eq!(header(&built, CONTENT_TYPE), "application/json");
        assert_eq!(header(&built, AUTHORIZATION), "Bearer ");
        assert_eq!(header(&built, "API-VERSION"), "1.0");
    }

    #[test]
    fn statuses_from_400_are_errors() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(check_status(StatusCode::from_u16(399).unwrap()).is_ok());
        assert!(matches!(
            check_status(StatusCode::BAD_REQUEST),
            Err(Error::HttpStatus(400))
        ));
        assert!(matches!(
            check_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(Error::HttpStatus(500))
        ));
    }
}
