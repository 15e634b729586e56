use std::net::{IpAddr, SocketAddr};

use log::debug;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use serde::Deserialize;
use thiserror::Error;

const DOH_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";

const RECORD_TYPE_A: u16 = 1;
const RECORD_TYPE_AAAA: u16 = 28;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("encrypted DNS query failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("encrypted DNS returned no usable records for {host}")]
    NoRecords { host: String },
}

/// DNS resolver preferring DNS-over-HTTPS, falling back to the system
/// resolver for any lookup the encrypted path cannot answer.
///
/// The bootstrap client resolves the DoH endpoint's own hostname through the
/// platform resolver, so the encrypted path never depends on itself.
pub struct DohResolver {
    bootstrap: reqwest::Client,
}

#[derive(Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answers: Vec<DohAnswer>,
}

#[derive(Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

impl DohResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bootstrap: reqwest::Client::new(),
        }
    }
}

impl Default for DohResolver {
    fn default() -> Self {
        Self::new()
    }
}

async fn resolve_encrypted(
    bootstrap: &reqwest::Client,
    host: &str,
) -> Result<Vec<IpAddr>, ResolutionError> {
    let mut addrs = Vec::new();
    for record_type in ["A", "AAAA"] {
        let response = bootstrap
            .get(DOH_ENDPOINT)
            .query(&[("name", host), ("type", record_type)])
            .header(reqwest::header::ACCEPT, "application/dns-json")
            .send()
            .await?
            .error_for_status()?;
        let answer: DohResponse = response.json().await?;
        addrs.extend(answer.answers.iter().filter_map(parse_address));
    }

    if addrs.is_empty() {
        return Err(ResolutionError::NoRecords {
            host: host.to_owned(),
        });
    }
    Ok(addrs)
}

/// CNAME entries share the answer section with address records and are
/// skipped because their data field is not an IP address.
fn parse_address(answer: &DohAnswer) -> Option<IpAddr> {
    if answer.record_type != RECORD_TYPE_A && answer.record_type != RECORD_TYPE_AAAA {
        return None;
    }
    answer.data.parse().ok()
}

impl Resolve for DohResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let bootstrap = self.bootstrap.clone();
        Box::pin(async move {
            let host = name.as_str().to_owned();
            match resolve_encrypted(&bootstrap, &host).await {
                Ok(ips) => {
                    // The connector rewrites the port, so 0 is fine here.
                    let addrs: Addrs =
                        Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
                    Ok(addrs)
                }
                Err(error) => {
                    debug!("Encrypted resolution of {host} failed ({error}), using system resolver");
                    let fallback: Vec<SocketAddr> =
                        tokio::net::lookup_host((host.as_str(), 0)).await?.collect();
                    Ok(Box::new(fallback.into_iter()) as Addrs)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{DohAnswer, DohResponse, parse_address};

    #[test]
    fn answer_parsing_keeps_only_address_records() {
        let raw = r#"{
            "Status": 0,
            "Answer": [
                {"name": "example.org.", "type": 5, "TTL": 300, "data": "cdn.example.org."},
                {"name": "cdn.example.org.", "type": 1, "TTL": 60, "data": "93.184.216.34"},
                {"name": "cdn.example.org.", "type": 28, "TTL": 60, "data": "2606:2800:220:1::1"}
            ]
        }"#;

        let parsed: DohResponse =
            serde_json::from_str(raw).expect("DoH JSON response should deserialize");
        let addrs: Vec<_> = parsed.answers.iter().filter_map(parse_address).collect();

        assert_eq!(addrs.len(), 2);
        assert!(addrs[0].is_ipv4());
        assert!(addrs[1].is_ipv6());
    }

    #[test]
    fn answer_parsing_tolerates_missing_answer_section() {
        let parsed: DohResponse =
            serde_json::from_str(r#"{"Status": 3}"#).expect("NXDOMAIN response should deserialize");
        assert!(parsed.answers.is_empty());
    }

    #[test]
    fn malformed_address_data_is_skipped() {
        let answer = DohAnswer {
            record_type: 1,
            data: "not-an-address".to_owned(),
        };
        assert!(parse_address(&answer).is_none());
    }
}
