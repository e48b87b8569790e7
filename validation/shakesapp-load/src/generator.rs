//! Request URL generation.

use crate::error::ConfigError;
use rand::Rng;
use url::Url;

/// Name of the query parameter carrying the term.
pub const QUERY_PARAM: &str = "q";

/// A single request to issue: the chosen term and the URL carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub term: String,
    pub url: Url,
}

/// Builds `<endpoint>?q=<term>` requests from a fixed vocabulary.
///
/// Construction validates the vocabulary and endpoint once, so
/// [`RequestGenerator::generate`] cannot fail.
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    vocabulary: Vec<String>,
    endpoint: Url,
}

impl RequestGenerator {
    /// Create a generator for the given vocabulary and base endpoint.
    pub fn new(vocabulary: &[String], endpoint: &str) -> Result<Self, ConfigError> {
        if vocabulary.is_empty() {
            return Err(ConfigError::EmptyVocabulary);
        }
        let endpoint = parse_endpoint(endpoint)?;

        Ok(Self {
            vocabulary: vocabulary.to_vec(),
            endpoint,
        })
    }

    /// Pick a term uniformly at random and build its request URL.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> RequestDescriptor {
        let idx = rng.gen_range(0..self.vocabulary.len());
        let term = self.vocabulary[idx].clone();

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair(QUERY_PARAM, &term);

        RequestDescriptor { term, url }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// One-shot form of [`RequestGenerator::generate`] that validates its inputs.
pub fn generate<R: Rng + ?Sized>(
    vocabulary: &[String],
    endpoint: &str,
    rng: &mut R,
) -> Result<RequestDescriptor, ConfigError> {
    Ok(RequestGenerator::new(vocabulary, endpoint)?.generate(rng))
}

/// Read the term back out of a generated URL.
pub fn decode_term(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    // An existing q pair would shadow the generated one.
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != QUERY_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if retained.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(retained);
    }
    url.set_fragment(None);

    Ok(url)
}
