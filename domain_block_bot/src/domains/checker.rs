use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::types::{Domain, Verdict};

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response has no verdict for {0}")]
    MissingDomain(String),
    #[error("verdict has no usable \"blocked\" field: {0}")]
    BadVerdict(String),
}

/// Something that can tell whether a domain is blocked.
pub trait BlockChecker: Send + Sync {
    fn check(&self, domain: &Domain) -> impl Future<Output = Result<Verdict, CheckError>> + Send;
}

/// What to do with a domain whose check failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckErrorPolicy {
    /// Consider the domain not blocked for this scan. If it was alerted,
    /// the alert gets cleared, and a later blocked verdict alerts again.
    #[default]
    TreatAsNotBlocked,
    /// Leave the domain's alert state exactly as it was.
    KeepPreviousState,
}

impl CheckErrorPolicy {
    /// Turn a check result into the verdict the alert tracker acts on.
    ///
    /// Returns [`None`] if this domain's state must not be touched this scan.
    pub fn resolve(self, domain: &Domain, result: Result<Verdict, CheckError>) -> Option<Verdict> {
        match result {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                log::warn!("Failed to check {domain}: {e}");
                match self {
                    CheckErrorPolicy::TreatAsNotBlocked => Some(Verdict::NotBlocked),
                    CheckErrorPolicy::KeepPreviousState => None,
                }
            }
        }
    }
}

/// Checker backed by an HTTP reputation service answering
/// `GET <check_url>?domain=<domain>&json=true`.
pub struct ReputationChecker {
    client: reqwest::Client,
    check_url: Url,
}

impl ReputationChecker {
    pub fn new(check_url: Url) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("domain_block_bot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(7))
            .build()?;

        Ok(Self { client, check_url })
    }
}

impl BlockChecker for ReputationChecker {
    async fn check(&self, domain: &Domain) -> Result<Verdict, CheckError> {
        let mut url = self.check_url.clone();
        url.query_pairs_mut()
            .append_pair("domain", domain.as_str())
            .append_pair("json", "true");

        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let verdict = parse_verdict(&body, domain)?;
        log::debug!("Checked {domain} and got: {verdict:?}");
        Ok(verdict)
    }
}

/// Dig the verdict for `domain` out of a reputation service response.
///
/// The response is an object keyed by domain name, in whatever casing the
/// service feels like. The value is either an object with a `blocked` field,
/// or a string containing such an object as JSON. `blocked` itself is either
/// a boolean or the string `"true"`/`"false"`.
pub fn parse_verdict(body: &str, domain: &Domain) -> Result<Verdict, CheckError> {
    let response: Value = serde_json::from_str(body)?;

    let entry = response
        .as_object()
        .and_then(|map| {
            map.iter()
                .find(|(key, _)| domain.is_same(key))
                .map(|(_, value)| value)
        })
        .ok_or_else(|| CheckError::MissingDomain(domain.to_string()))?;

    let decoded;
    let entry = match entry {
        Value::String(nested) => {
            decoded = serde_json::from_str::<Value>(nested)?;
            &decoded
        }
        entry => entry,
    };

    match entry.get("blocked") {
        Some(Value::Bool(blocked)) => Ok(Verdict::from(*blocked)),
        Some(Value::String(blocked)) if blocked.trim().eq_ignore_ascii_case("true") => {
            Ok(Verdict::Blocked)
        }
        Some(Value::String(blocked)) if blocked.trim().eq_ignore_ascii_case("false") => {
            Ok(Verdict::NotBlocked)
        }
        _ => Err(CheckError::BadVerdict(entry.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(name: &str) -> Domain {
        Domain::new(name).unwrap()
    }

    #[test]
    fn plain_boolean() {
        let body = r#"{"a.com": {"blocked": true}}"#;
        assert_eq!(parse_verdict(body, &domain("a.com")).unwrap(), Verdict::Blocked);

        let body = r#"{"a.com": {"blocked": false}}"#;
        assert_eq!(parse_verdict(body, &domain("a.com")).unwrap(), Verdict::NotBlocked);
    }

    #[test]
    fn key_casing_differs() {
        let body = r#"{"shop.example.com": {"blocked": true}}"#;
        assert_eq!(
            parse_verdict(body, &domain("Shop.Example.COM")).unwrap(),
            Verdict::Blocked
        );
    }

    #[test]
    fn nested_string_with_string_boolean() {
        let body = r#"{"A.com": "{\"blocked\": \"true\"}"}"#;
        assert_eq!(parse_verdict(body, &domain("a.com")).unwrap(), Verdict::Blocked);

        let body = r#"{"a.com": {"blocked": "false"}}"#;
        assert_eq!(parse_verdict(body, &domain("a.com")).unwrap(), Verdict::NotBlocked);
    }

    #[test]
    fn garbage() {
        let a = domain("a.com");
        assert!(matches!(
            parse_verdict("<html>502</html>", &a),
            Err(CheckError::Json(_))
        ));
        assert!(matches!(
            parse_verdict(r#"{"b.com": {"blocked": true}}"#, &a),
            Err(CheckError::MissingDomain(_))
        ));
        assert!(matches!(
            parse_verdict(r#"[1, 2, 3]"#, &a),
            Err(CheckError::MissingDomain(_))
        ));
        assert!(matches!(
            parse_verdict(r#"{"a.com": {"blocked": "maybe"}}"#, &a),
            Err(CheckError::BadVerdict(_))
        ));
        assert!(matches!(
            parse_verdict(r#"{"a.com": "not json"}"#, &a),
            Err(CheckError::Json(_))
        ));
    }

    #[test]
    fn policy() {
        let a = domain("a.com");
        let failed = || Err(CheckError::MissingDomain("a.com".to_string()));

        assert_eq!(
            CheckErrorPolicy::TreatAsNotBlocked.resolve(&a, failed()),
            Some(Verdict::NotBlocked)
        );
        assert_eq!(CheckErrorPolicy::KeepPreviousState.resolve(&a, failed()), None);
        assert_eq!(
            CheckErrorPolicy::KeepPreviousState.resolve(&a, Ok(Verdict::Blocked)),
            Some(Verdict::Blocked)
        );
    }

    /// Serve `body` on a random local port, returning the URL to query.
    async fn serve(body: &'static str) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = axum::Router::new().route("/", axum::routing::get(move || async move { body }));
        tokio::spawn(async move { axum::serve(listener, app).await });
        Url::parse(&format!("http://{address}/")).unwrap()
    }

    #[tokio::test]
    async fn over_http() {
        let url = serve(r#"{"A.COM": {"blocked": true}}"#).await;
        let checker = ReputationChecker::new(url).unwrap();
        assert_eq!(checker.check(&domain("a.com")).await.unwrap(), Verdict::Blocked);
    }

    #[tokio::test]
    async fn unreachable_service_is_not_blocked() {
        // Grab a free port and close it again, so nothing listens there.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{address}/")).unwrap();
        let checker = ReputationChecker::new(url).unwrap();
        let a = domain("a.com");

        let result = checker.check(&a).await;
        assert!(matches!(result, Err(CheckError::Request(_))));
        assert_eq!(
            CheckErrorPolicy::default().resolve(&a, result),
            Some(Verdict::NotBlocked)
        );
    }
}
