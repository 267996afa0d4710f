//! CRL retrieval from distribution points over HTTP

use std::time::Duration;

use log::debug;

use crate::environment::pki_environment_traits::CrlFetch;
use crate::util::error::*;

/// [`RemoteCrlFetcher`] retrieves CRLs from HTTP distribution points using a blocking client.
/// Register an instance via
/// [`PkiEnvironment::add_crl_fetcher`](crate::PkiEnvironment::add_crl_fetcher) to enable
/// distribution point fallback during the revocation sweep.
pub struct RemoteCrlFetcher {
    timeout: Duration,
}

impl RemoteCrlFetcher {
    /// Returns a fetcher with the presented per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        RemoteCrlFetcher { timeout }
    }
}

impl Default for RemoteCrlFetcher {
    fn default() -> Self {
        RemoteCrlFetcher::new(Duration::from_secs(60))
    }
}

impl CrlFetch for RemoteCrlFetcher {
    fn fetch_crl(&self, uri: &str) -> Result<Vec<u8>> {
        if !uri.starts_with("http") {
            debug!("Ignored non-HTTP URI presented for CRL retrieval");
            return Err(Error::InvalidUriScheme);
        }

        let client = match reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                debug!("Failed to prepare HTTP client to retrieve CRL: {}", e);
                return Err(Error::NetworkError);
            }
        };

        match client.get(uri).send() {
            Ok(response) => match response.bytes() {
                Ok(bytes) => Ok(bytes.to_vec()),
                Err(e) => {
                    debug!("Failed to retrieve CRL bytes from {} with {}", uri, e);
                    Err(Error::NetworkError)
                }
            },
            Err(e) => {
                debug!("Failed to fetch CRL from {}: {:?}", uri, e);
                Err(Error::NetworkError)
            }
        }
    }
}
