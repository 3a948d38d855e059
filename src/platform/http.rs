// VitalGuard - HTTP Uplink Transport
//
// POSTs batch envelopes to the collector with esp-idf's HTTP client. The
// connection is rebuilt after any failure, since its state is unknown once
// a request has timed out halfway.

use std::time::Duration;

use embedded_svc::http::client::Client;
use embedded_svc::io::Write;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

use crate::error::VitalsError;
use crate::uplink::Transport;

pub struct EspHttpTransport {
    url: String,
    timeout: Duration,
    client: Option<Client<EspHttpConnection>>,
}

impl EspHttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self { url: url.into(), timeout, client: None }
    }

    fn connect(&self) -> Result<Client<EspHttpConnection>, VitalsError> {
        let connection = EspHttpConnection::new(&Configuration {
            timeout: Some(self.timeout),
            ..Default::default()
        })
        .map_err(|e| VitalsError::Network(format!("http client init: {e}")))?;
        Ok(Client::wrap(connection))
    }

    fn send(client: &mut Client<EspHttpConnection>, url: &str, body: &str) -> Result<u16, VitalsError> {
        let length = body.len().to_string();
        let headers = [("content-type", "application/json"), ("content-length", length.as_str())];

        let mut request = client
            .post(url, &headers)
            .map_err(|e| VitalsError::Network(format!("open {url}: {e:?}")))?;
        request
            .write_all(body.as_bytes())
            .map_err(|e| VitalsError::Network(format!("write body: {e:?}")))?;
        request
            .flush()
            .map_err(|e| VitalsError::Network(format!("flush body: {e:?}")))?;
        let response = request
            .submit()
            .map_err(|e| VitalsError::Network(format!("submit: {e:?}")))?;
        Ok(response.status())
    }
}

impl Transport for EspHttpTransport {
    fn post_json(&mut self, body: &str) -> Result<u16, VitalsError> {
        let mut client = match self.client.take() {
            Some(client) => client,
            None => self.connect()?,
        };
        let result = Self::send(&mut client, &self.url, body);
        if result.is_ok() {
            self.client = Some(client);
        }
        result
    }
}
