use url::Url;

use crate::config::ScriptConfig;
use crate::{Error, Result};

/// Resolves a `src` attribute against the page URL.
pub fn resolve_script_url(base: &Url, src: &str) -> Result<Url> {
    base.join(src.trim()).map_err(|err| Error::InvalidUrl {
        url: src.to_string(),
        reason: err.to_string(),
    })
}

/// Source of external script bodies.
pub trait ScriptFetcher {
    /// Body text of the script at `url`. Any non-success is `Error::Fetch`.
    fn fetch(&self, url: &Url) -> Result<String>;
}

/// Fetches scripts over HTTP with a blocking client.
///
/// Each request carries the configured `User-Agent` and is bounded by the
/// configured timeout. Redirects are followed; only a final `200 OK` counts as
/// success.
#[derive(Debug, Clone)]
pub struct HttpScriptFetcher {
    client: reqwest::blocking::Client,
}

impl HttpScriptFetcher {
    pub fn new(config: &ScriptConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.fetch_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|err| Error::HttpClient(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ScriptFetcher for HttpScriptFetcher {
    fn fetch(&self, url: &Url) -> Result<String> {
        let fetch_error = |reason: String| Error::Fetch {
            url: url.to_string(),
            reason,
        };
        log::debug!("fetching external script {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| fetch_error(err.to_string()))?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(fetch_error(format!(
                "failed to fetch script, status code: {}",
                status.as_u16()
            )));
        }
        response
            .text()
            .map_err(|err| fetch_error(format!("failed to read response body: {err}")))
    }
}

impl<F> ScriptFetcher for F
where
    F: Fn(&Url) -> Result<String>,
{
    fn fetch(&self, url: &Url) -> Result<String> {
        self(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_sources_resolve_against_the_page() -> Result<()> {
        let base = Url::parse("https://example.test/app/index.html").map_err(|err| {
            Error::InvalidUrl {
                url: "base".into(),
                reason: err.to_string(),
            }
        })?;
        assert_eq!(
            resolve_script_url(&base, "js/main.js")?.as_str(),
            "https://example.test/app/js/main.js"
        );
        assert_eq!(
            resolve_script_url(&base, "/lib.js")?.as_str(),
            "https://example.test/lib.js"
        );
        assert_eq!(
            resolve_script_url(&base, "//cdn.test/x.js")?.as_str(),
            "https://cdn.test/x.js"
        );
        Ok(())
    }

    #[test]
    fn malformed_sources_are_invalid_urls() -> Result<()> {
        let base = Url::parse("https://example.test/").map_err(|err| Error::InvalidUrl {
            url: "base".into(),
            reason: err.to_string(),
        })?;
        match resolve_script_url(&base, "http://[::1") {
            Err(Error::InvalidUrl { url, .. }) => assert_eq!(url, "http://[::1"),
            other => panic!("expected InvalidUrl, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn closures_act_as_fetchers() -> Result<()> {
        let fetcher = |url: &Url| -> Result<String> { Ok(format!("// {url}")) };
        let url = Url::parse("https://example.test/a.js").map_err(|err| Error::InvalidUrl {
            url: "a".into(),
            reason: err.to_string(),
        })?;
        assert_eq!(fetcher.fetch(&url)?, "// https://example.test/a.js");
        Ok(())
    }
}
