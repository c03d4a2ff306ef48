use std::io::Read;

use tracing::warn;
use ureq::{AsSendBody, Agent, SendBody};

use crate::config::ClientConfig;
use crate::error::{Result, VaultError};
use crate::http::{
    classify, HttpMethod, RawBody, Request, Response, Transfer, FORM_CONTENT_TYPE,
    OCTET_STREAM_CONTENT_TYPE,
};
use crate::transfer::TransferHandle;

use super::{basic_auth, build_url, log_request, log_response, Transport};

const CHUNK_SIZE: usize = 64 * 1024;

/// Default backend, built on a blocking `ureq` agent.
///
/// Supports every transfer mode. Uploads stream straight from the handle
/// with a declared `Content-Length`; downloads are written to the sink chunk
/// by chunk as they arrive.
pub struct UreqTransport {
    agent: Agent,
    config: ClientConfig,
}

impl UreqTransport {
    pub fn new(config: ClientConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(config.connect_timeout))
            .timeout_global(Some(config.timeout))
            .build()
            .new_agent();
        Self { agent, config }
    }

    fn send(
        &self,
        method: HttpMethod,
        url: &str,
        content_type: &str,
        content_length: Option<u64>,
        body: impl AsSendBody,
    ) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        macro_rules! prepare {
            ($builder:expr) => {{
                let builder = $builder
                    .header("Authorization", basic_auth(&self.config.api_key))
                    .header("User-Agent", self.config.user_agent.as_str())
                    .header("Content-Type", content_type);
                match content_length {
                    Some(length) => builder.header("Content-Length", length.to_string()),
                    None => builder,
                }
            }};
        }

        match method {
            HttpMethod::Get => prepare!(self.agent.get(url)).force_send_body().send(body),
            HttpMethod::Delete => prepare!(self.agent.delete(url)).force_send_body().send(body),
            HttpMethod::Post => prepare!(self.agent.post(url)).send(body),
            HttpMethod::Put => prepare!(self.agent.put(url)).send(body),
        }
    }
}

impl Transport for UreqTransport {
    fn invoke(&self, request: Request) -> Result<Response> {
        let Request {
            path,
            method,
            params,
            query,
            transfer,
        } = request;
        let url = build_url(&self.config.endpoint, &path, &query)?;
        log_request(&self.config, method, &url, transfer.label());

        let (sent, sink) = match transfer {
            Transfer::Upload(mut source) => {
                let size = source.size()?;
                let sent = self.send(
                    method,
                    url.as_str(),
                    OCTET_STREAM_CONTENT_TYPE,
                    Some(size),
                    SendBody::from_reader(&mut source),
                );
                let closed = source.close();
                let sent = sent.map_err(transport_error)?;
                closed?;
                (sent, None)
            }
            Transfer::Download(sink) => {
                let form = params.to_form()?;
                let sent = self
                    .send(method, url.as_str(), FORM_CONTENT_TYPE, None, form.as_bytes())
                    .map_err(transport_error)?;
                (sent, Some(sink))
            }
            Transfer::None => {
                let form = params.to_form()?;
                let sent = self
                    .send(method, url.as_str(), FORM_CONTENT_TYPE, None, form.as_bytes())
                    .map_err(transport_error)?;
                (sent, None)
            }
        };

        let mut response = sent;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        log_response(&self.config, status, &content_type, &headers);

        let raw = match sink {
            Some(mut sink) => {
                let written = stream_into(&mut sink, &content_type, response.body_mut().as_reader());
                let closed = sink.close();
                let bytes = written?;
                closed?;
                RawBody::Streamed { bytes }
            }
            None => RawBody::Bytes(
                response
                    .body_mut()
                    .with_config()
                    .limit(u64::MAX)
                    .read_to_vec()
                    .map_err(transport_error)?,
            ),
        };

        classify(status, &content_type, raw)
    }
}

/// Copy the response body into the download sink as it arrives.
fn stream_into(sink: &mut TransferHandle, content_type: &str, mut body: impl Read) -> Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = body
            .read(&mut buf)
            .map_err(|e| VaultError::transport(e.to_string(), e.raw_os_error().unwrap_or(0).into()))?;
        if read == 0 {
            return Ok(total);
        }
        total += sink.write_chunk(content_type, &buf[..read])? as u64;
    }
}

fn transport_error(error: ureq::Error) -> VaultError {
    warn!(%error, "vault request failed");
    let code = match &error {
        ureq::Error::Io(io) => io.raw_os_error().unwrap_or(0).into(),
        _ => 0,
    };
    VaultError::transport(error.to_string(), code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;

    #[test]
    fn stream_into_counts_bytes() {
        let mut sink = TransferHandle::from_writer("out", Vec::new());
        let written = stream_into(&mut sink, "application/octet-stream", Cursor::new(vec![1u8; 200_000])).unwrap();
        assert_eq!(written, 200_000);
    }

    #[test]
    fn stream_into_rejects_error_pages_before_writing() {
        let mut sink = TransferHandle::from_writer("out", Vec::new());
        let err = stream_into(&mut sink, "text/html", Cursor::new(b"<html/>".to_vec())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::File);
    }

    #[test]
    fn empty_body_never_reaches_the_sink_check() {
        let mut sink = TransferHandle::from_writer("out", Vec::new());
        assert_eq!(stream_into(&mut sink, "application/json", Cursor::new(Vec::new())).unwrap(), 0);
    }

    #[test]
    fn unknown_upload_length_fails_before_connecting() {
        let transport = UreqTransport::new(
            ClientConfig::new("key", "account").with_endpoint("http://127.0.0.1:9"),
        );
        let source = TransferHandle::from_reader("pipe", std::io::empty(), Vec::new());
        let request = Request::new(HttpMethod::Post, "vaults/v/blobs").with_transfer(Transfer::Upload(source));
        let err = transport.invoke(request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::File);
    }

    #[test]
    fn connection_refused_is_a_transport_error() {
        let transport = UreqTransport::new(
            ClientConfig::new("key", "account").with_endpoint("http://127.0.0.1:9"),
        );
        let err = transport
            .invoke(Request::new(HttpMethod::Get, "accounts/a/vaults"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
