//! Gate-checked HTTP GET with redirects disabled and DNS pinned.
//!
//! Every request is preceded by a full [`Gate::validate`] and the client is
//! pinned to the addresses that validation approved, so a DNS answer cannot
//! change between the check and the connection. Redirects are never
//! followed automatically: depending on [`RedirectMode`] they either fail the
//! fetch or are validated from scratch before an explicit next request.

use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy as RedirectPolicy;
use reqwest::{Client, Response};
use tracing::{debug, info};

use crate::config::{FetchConfig, RedirectMode};
use crate::error::Error;
use crate::validate::{Gate, Validated};

/// Maximum number of redirects followed in [`RedirectMode::Revalidate`].
pub const MAX_REDIRECTS: u8 = 10;

/// Result of a fetch operation.
#[derive(Debug)]
pub struct FetchResult {
    pub status: u16,

    /// Response body, lossily decoded and capped at the configured size.
    pub body: String,

    /// The URL that produced `body`.
    pub final_url: String,

    /// Validated hops, the original URL first.
    pub chain: Vec<Validated>,
}

/// Fetches URLs only after the gate approves them.
#[derive(Debug, Clone)]
pub struct Fetcher {
    gate: Gate,
    timeout: Duration,
    user_agent: String,
    max_body_bytes: usize,
    redirects: RedirectMode,
}

impl Fetcher {
    pub fn new(gate: Gate) -> Self {
        Self::from_config(gate, &FetchConfig::default())
    }

    pub fn from_config(gate: Gate, config: &FetchConfig) -> Self {
        Self {
            gate,
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config.user_agent.clone(),
            max_body_bytes: config.max_body_bytes,
            redirects: config.redirects,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_redirects(mut self, mode: RedirectMode) -> Self {
        self.redirects = mode;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Fetch a URL.
    ///
    /// # Errors
    ///
    /// Gate errors for the original URL are returned as-is. A 3xx response
    /// yields [`Error::RedirectRefused`] in refuse mode; in revalidate mode an
    /// unsafe hop yields [`Error::RedirectBlocked`]. Statuses of 400 and above
    /// yield [`Error::HttpStatus`].
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, Error> {
        let original_url = url.trim().to_string();
        let mut current_url = original_url.clone();
        let mut chain: Vec<Validated> = Vec::new();

        for _ in 0..=MAX_REDIRECTS {
            let validated = self.gate.validate(&current_url).await.map_err(|e| {
                if chain.is_empty() {
                    e
                } else {
                    Error::RedirectBlocked {
                        original_url: original_url.clone(),
                        redirect_url: current_url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

            let response = self.send(&validated).await?;
            let status = response.status();
            let request_url = validated.url.clone();
            chain.push(validated);

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|h| h.to_str().ok())
                    .ok_or_else(|| Error::HttpError {
                        url: request_url.clone(),
                        message: "Redirect without Location header".to_string(),
                    })?;

                match self.redirects {
                    RedirectMode::Refuse => {
                        debug!("fetch: refusing redirect from {} to {}", request_url, location);
                        return Err(Error::RedirectRefused {
                            url: request_url,
                            location: location.to_string(),
                        });
                    }
                    RedirectMode::Revalidate => {
                        current_url = resolve_redirect_url(&request_url, location)?;
                        debug!("fetch: re-validating redirect hop {}", current_url);
                        continue;
                    }
                }
            }

            if !status.is_success() {
                return Err(Error::HttpStatus {
                    url: request_url,
                    status: status.as_u16(),
                });
            }

            let body = read_limited(response, self.max_body_bytes, &request_url).await?;
            info!(
                "fetch: {} -> {} ({} bytes, {} hop(s))",
                original_url,
                status.as_u16(),
                body.len(),
                chain.len()
            );

            return Ok(FetchResult {
                status: status.as_u16(),
                body,
                final_url: request_url,
                chain,
            });
        }

        Err(Error::TooManyRedirects {
            url: original_url,
            max: MAX_REDIRECTS,
        })
    }

    /// One GET with redirects off, pinned to the validated addresses.
    async fn send(&self, validated: &Validated) -> Result<Response, Error> {
        let mut builder = Client::builder()
            .redirect(RedirectPolicy::none())
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str());

        // IP literals are connected to directly
        if !validated.literal {
            let addrs = validated.socket_addrs();
            builder = builder.resolve_to_addrs(&validated.host, &addrs);

            // the client looks up the host exactly as the URL spells it,
            // which keeps a trailing dot that the normalized host drops
            let request_host = request_host(&validated.url)?;
            if request_host != validated.host {
                builder = builder.resolve_to_addrs(&request_host, &addrs);
            }
        }

        let client = builder.build().map_err(|e| Error::http(&validated.url, &e))?;

        client
            .get(&validated.url)
            .send()
            .await
            .map_err(|e| Error::http(&validated.url, &e))
    }
}

/// Host of `url` as the HTTP client will see it.
fn request_host(url: &str) -> Result<String, Error> {
    let parsed = url::Url::parse(url).map_err(|e| Error::malformed(url, e.to_string()))?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| Error::malformed(url, "URL has no host"))
}

/// Encoding named by a `Content-Type` charset parameter, UTF-8 otherwise.
fn response_encoding(response: &Response) -> &'static Encoding {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value.split(';').skip(1).find_map(|param| {
                let (name, label) = param.split_once('=')?;
                name.trim()
                    .eq_ignore_ascii_case("charset")
                    .then(|| label.trim().trim_matches('"'))
            })
        })
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8)
}

/// Read at most `limit` bytes of the body and decode them with the
/// response charset.
async fn read_limited(mut response: Response, limit: usize, url: &str) -> Result<String, Error> {
    let encoding = response_encoding(&response);
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = response.chunk().await.map_err(|e| Error::http(url, &e))? {
        let remaining = limit.saturating_sub(buf.len());
        if chunk.len() >= remaining {
            buf.extend_from_slice(&chunk[..remaining]);
            debug!("fetch: body from {} capped at {} bytes", url, limit);
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    // a BOM overrides the declared charset
    let (text, _, _) = encoding.decode(&buf);
    Ok(text.into_owned())
}

/// Resolve a redirect URL (which may be relative) against the base URL.
fn resolve_redirect_url(base: &str, location: &str) -> Result<String, Error> {
    let base_url = url::Url::parse(base).map_err(|e| Error::malformed(base, e.to_string()))?;

    let resolved = base_url
        .join(location)
        .map_err(|e| Error::malformed(location, e.to_string()))?;

    Ok(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use crate::resolver::StaticResolver;
    use std::net::IpAddr;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOOPBACK: &str = "127.0.0.1";

    /// A gate that admits the loopback mock server and maps `shop.example`
    /// onto it.
    fn loopback_gate() -> Gate {
        let resolver = StaticResolver::new()
            .with("shop.example", [LOOPBACK.parse::<IpAddr>().unwrap()])
            .with("meta.example", ["169.254.169.254".parse::<IpAddr>().unwrap()]);
        Gate::new(Policy::builder().allow_cidr("127.0.0.0/8").build(), resolver)
    }

    fn shop_url(server: &MockServer, path: &str) -> String {
        format!("http://shop.example:{}{}", server.address().port(), path)
    }

    #[tokio::test]
    async fn test_fetch_pinned_to_validated_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate());
        // shop.example exists only in the static resolver
        let result = fetcher.fetch(&shop_url(&server, "/page")).await.unwrap();

        assert_eq!(result.status, 200);
        assert_eq!(result.body, "<p>hello</p>");
        assert_eq!(result.chain.len(), 1);
        assert_eq!(result.chain[0].host, "shop.example");
    }

    #[tokio::test]
    async fn test_pin_applies_to_host_spelling_variants() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pinned"))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate());
        let port = server.address().port();

        // shop.example. and SHOP.Example only resolve through the pin
        let dotted = fetcher
            .fetch(&format!("http://shop.example.:{}/page", port))
            .await
            .unwrap();
        assert_eq!(dotted.body, "pinned");
        assert_eq!(dotted.chain[0].host, "shop.example");

        let mixed = fetcher
            .fetch(&format!("http://SHOP.Example:{}/page", port))
            .await
            .unwrap();
        assert_eq!(mixed.body, "pinned");
    }

    #[tokio::test]
    async fn test_revalidate_hop_to_dotted_host_is_pinned() {
        let server = MockServer::start().await;
        let port = server.address().port();
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "location",
                format!("http://shop.example.:{}/final", port).as_str(),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/final"))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate()).with_redirects(RedirectMode::Revalidate);
        let result = fetcher.fetch(&shop_url(&server, "/start")).await.unwrap();
        assert_eq!(result.body, "done");
        assert_eq!(result.chain.len(), 2);
        assert_eq!(result.final_url, format!("http://shop.example.:{}/final", port));
    }

    #[test]
    fn test_request_host_keeps_trailing_dot() {
        assert_eq!(request_host("http://shop.example.:8080/").unwrap(), "shop.example.");
        assert_eq!(request_host("http://Shop.Example/").unwrap(), "shop.example");
    }

    #[tokio::test]
    async fn test_body_decoded_with_declared_charset() {
        let server = MockServer::start().await;
        // "café" in ISO-8859-1
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=ISO-8859-1")
                    .set_body_bytes(b"caf\xe9".to_vec()),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate());
        let result = fetcher.fetch(&shop_url(&server, "/latin1")).await.unwrap();
        assert_eq!(result.body, "café");
    }

    #[tokio::test]
    async fn test_body_defaults_to_utf8() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes("café".as_bytes().to_vec()),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate());
        let result = fetcher.fetch(&shop_url(&server, "/utf8")).await.unwrap();
        assert_eq!(result.body, "café");
    }

    #[tokio::test]
    async fn test_unsafe_url_is_never_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Gate::new(Policy::public_only(), StaticResolver::new()));
        let err = fetcher.fetch(&format!("{}/", server.uri())).await.unwrap_err();
        assert!(matches!(err, Error::UnsafeAddress { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_redirect_refused_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "http://169.254.169.254/latest/meta-data/"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate());
        let err = fetcher.fetch(&shop_url(&server, "/start")).await.unwrap_err();
        match err {
            Error::RedirectRefused { location, .. } => {
                assert_eq!(location, "http://169.254.169.254/latest/meta-data/");
            }
            other => panic!("expected RedirectRefused, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_redirect_to_safe_target_refused_too() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/final"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/final"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate());
        assert!(matches!(
            fetcher.fetch(&shop_url(&server, "/start")).await,
            Err(Error::RedirectRefused { .. })
        ));
    }

    #[tokio::test]
    async fn test_revalidate_blocks_unsafe_hop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(
                ResponseTemplate::new(307).insert_header("location", "http://meta.example/latest/"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate()).with_redirects(RedirectMode::Revalidate);
        let err = fetcher.fetch(&shop_url(&server, "/start")).await.unwrap_err();
        match err {
            Error::RedirectBlocked { redirect_url, .. } => {
                assert_eq!(redirect_url, "http://meta.example/latest/");
            }
            other => panic!("expected RedirectBlocked, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_revalidate_follows_safe_relative_hop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/final"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/final"))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate()).with_redirects(RedirectMode::Revalidate);
        let result = fetcher.fetch(&shop_url(&server, "/start")).await.unwrap();
        assert_eq!(result.body, "done");
        assert_eq!(result.chain.len(), 2);
        assert!(result.final_url.ends_with("/final"));
    }

    #[tokio::test]
    async fn test_too_many_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate()).with_redirects(RedirectMode::Revalidate);
        let err = fetcher.fetch(&shop_url(&server, "/loop")).await.unwrap_err();
        assert!(matches!(err, Error::TooManyRedirects { max: MAX_REDIRECTS, .. }));
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate());
        let err = fetcher.fetch(&shop_url(&server, "/missing")).await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate()).with_timeout(Duration::from_millis(50));
        let err = fetcher.fetch(&shop_url(&server, "/slow")).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_body_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(1000)))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(loopback_gate()).with_max_body_bytes(64);
        let result = fetcher.fetch(&shop_url(&server, "/big")).await.unwrap();
        assert_eq!(result.body.len(), 64);
    }

    #[test]
    fn test_resolve_redirect_url() {
        assert_eq!(
            resolve_redirect_url("http://a.example/x/y", "../z").unwrap(),
            "http://a.example/z"
        );
        assert_eq!(
            resolve_redirect_url("http://a.example/", "https://b.example/p").unwrap(),
            "https://b.example/p"
        );
    }
}
