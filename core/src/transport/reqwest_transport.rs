use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tracing::warn;

use crate::config::ClientConfig;
use crate::error::{Result, VaultError};
use crate::http::{classify, HttpMethod, RawBody, Request, Response, Transfer, FORM_CONTENT_TYPE};

use super::{build_url, log_request, log_response, Transport};

/// Alternative backend over `reqwest::blocking`.
///
/// Form calls behave exactly like [`UreqTransport`](super::UreqTransport).
/// Binary transfers are not available and are rejected before any network
/// activity.
pub struct ReqwestTransport {
    client: Client,
    config: ClientConfig,
}

impl ReqwestTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(map_error)?;
        Ok(Self { client, config })
    }

    fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

impl Transport for ReqwestTransport {
    fn invoke(&self, request: Request) -> Result<Response> {
        match request.transfer {
            Transfer::None => {}
            Transfer::Upload(_) => {
                return Err(VaultError::Unsupported {
                    capability: "binary upload",
                })
            }
            Transfer::Download(_) => {
                return Err(VaultError::Unsupported {
                    capability: "binary download",
                })
            }
        }

        let url = build_url(&self.config.endpoint, &request.path, &request.query)?;
        log_request(&self.config, request.method, &url, "none");

        let response = self
            .client
            .request(Self::to_reqwest_method(request.method), url)
            .basic_auth(&self.config.api_key, Some(""))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(request.params.to_form()?)
            .send()
            .map_err(map_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        log_response(&self.config, status, &content_type, &headers);

        let body = response.bytes().map_err(map_error)?;
        classify(status, &content_type, RawBody::Bytes(body.to_vec()))
    }
}

/// Message with the whole source chain appended, e.g.
/// `error sending request ...: client error (Connect): ...`.
fn map_error(error: reqwest::Error) -> VaultError {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    warn!(%message, "vault request failed");
    let code = error.status().map_or(0, |s| i64::from(s.as_u16()));
    VaultError::transport(message, code)
}
