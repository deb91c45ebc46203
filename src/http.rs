use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::KiraError;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

pub fn user_agent() -> String {
    format!("kira-dh/{}", env!("CARGO_PKG_VERSION"))
}

/// Blocking client with the crate user agent; `on_error` tags build failures.
pub fn blocking_client(
    timeout: Duration,
    on_error: fn(String) -> KiraError,
) -> Result<Client, KiraError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent()).map_err(|err| on_error(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| on_error(err.to_string()))
}

/// Re-sends on connection errors and 429/5xx with a linear delay.
pub fn send_with_retries<F>(mut make_req: F) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match make_req().send() {
            Ok(resp) => {
                if attempt < MAX_RETRIES && is_retryable_status(resp.status().as_u16()) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

fn backoff(attempt: usize) {
    thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// How query keys and values are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEncoding {
    /// RFC 3986 percent-encoding; a space is `%20`.
    Percent,
    /// `application/x-www-form-urlencoded`; a space is `+`.
    Form,
}

pub fn build_query_url(base: &str, params: &[(&str, &str)]) -> String {
    build_query_url_with(base, params, QueryEncoding::Percent)
}

pub fn build_query_url_with(
    base: &str,
    params: &[(&str, &str)],
    encoding: QueryEncoding,
) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let mut out = String::from(base);
    out.push('?');
    for (idx, (key, value)) in params.iter().enumerate() {
        if idx > 0 {
            out.push('&');
        }
        out.push_str(&encode_query_component(key, encoding));
        out.push('=');
        out.push_str(&encode_query_component(value, encoding));
    }
    out
}

pub fn encode_query_component(value: &str, encoding: QueryEncoding) -> String {
    let mut out = String::new();
    for byte in value.as_bytes() {
        match *byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char)
            }
            b' ' if encoding == QueryEncoding::Form => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// `NCBI_API_KEY` from the environment, when set and non-blank.
pub fn ncbi_api_key() -> Option<String> {
    std::env::var("NCBI_API_KEY")
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_url_encodes_values() {
        assert_eq!(
            build_query_url(
                "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi",
                &[("db", "gds"), ("term", "(lung) AND gse[ETYP]")]
            ),
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?db=gds&term=%28lung%29%20AND%20gse%5BETYP%5D"
        );
    }

    #[test]
    fn form_encoding_turns_spaces_into_plus() {
        assert_eq!(
            encode_query_component("Homo sapiens (x+y)", QueryEncoding::Form),
            "Homo+sapiens+%28x%2By%29"
        );
        assert_eq!(
            encode_query_component("Homo sapiens", QueryEncoding::Percent),
            "Homo%20sapiens"
        );
        assert_eq!(
            build_query_url_with(
                "https://ae.example/q",
                &[("keywords", "a b")],
                QueryEncoding::Form
            ),
            "https://ae.example/q?keywords=a+b"
        );
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }
}
