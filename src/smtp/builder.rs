/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::{
    hash::Hash,
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use smtp_proto::EXT_START_TLS;
use tokio::net::TcpStream;

use crate::{SmtpClient, SmtpClientBuilder};

use super::tls::tls_connector;

impl<T: AsRef<str> + PartialEq + Eq + Hash> SmtpClientBuilder<T> {
    /// Creates a new builder. A hostname that already includes a port
    /// (`host:port`) is dialed as-is and `port` is ignored.
    pub fn new(hostname: T, port: u16) -> Self {
        let addr = {
            let host = hostname.as_ref();
            if let Ok(ip) = host.parse::<IpAddr>() {
                SocketAddr::new(ip, port).to_string()
            } else if host.contains(':') {
                host.to_string()
            } else {
                format!("{host}:{port}")
            }
        };

        SmtpClientBuilder {
            addr,
            timeout: Duration::from_secs(60 * 60),
            allow_invalid_certs: false,
            tls_hostname: hostname,
            starttls: true,
            local_host: gethostname::gethostname()
                .to_str()
                .unwrap_or("[127.0.0.1]")
                .to_string(),
        }
    }

    /// Accept any certificate presented during STARTTLS
    pub fn allow_invalid_certs(mut self) -> Self {
        self.allow_invalid_certs = true;
        self
    }

    /// Upgrade the connection with STARTTLS when the server supports it
    pub fn starttls(mut self, starttls: bool) -> Self {
        self.starttls = starttls;
        self
    }

    /// Set the EHLO hostname
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    /// Sets the SMTP connection timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name presented to the server during the TLS handshake.
    pub fn tls_name(&self) -> &str {
        let hostname = self.tls_hostname.as_ref();
        if hostname.parse::<IpAddr>().is_ok() {
            return hostname;
        }
        match hostname.rsplit_once(':') {
            Some((host, port)) if port.parse::<u16>().is_ok() => {
                host.trim_start_matches('[').trim_end_matches(']')
            }
            _ => hostname,
        }
    }

    /// Connects to the server and reads its greeting.
    pub async fn connect(&self) -> crate::Result<SmtpClient<TcpStream>> {
        log::debug!("Connecting to {}", self.addr);
        let mut client = SmtpClient {
            stream: tokio::time::timeout(self.timeout, async {
                TcpStream::connect(&self.addr).await
            })
            .await
            .map_err(|_| crate::Error::Timeout)??,
            timeout: self.timeout,
        };

        if let Err(err) = client.greeting().await {
            client.abort().await;
            return Err(err);
        }

        Ok(client)
    }

    /// Delivers a message in a single session.
    ///
    /// When STARTTLS is enabled and advertised by the server the session is
    /// upgraded before the envelope is sent; a failed upgrade ends the
    /// delivery attempt. Servers that do not advertise STARTTLS are used in
    /// plain text.
    pub async fn deliver(
        &self,
        mail_from: &str,
        rcpt_to: &[String],
        message: &[u8],
    ) -> crate::Result<()> {
        let mut client = self.connect().await?;
        let capabilities = match client.ehlo(&self.local_host).await {
            Ok(capabilities) => capabilities,
            Err(err) => {
                client.abort().await;
                return Err(err);
            }
        };

        if self.starttls {
            if capabilities.has_capability(EXT_START_TLS) {
                let mut client = client
                    .start_tls(&tls_connector(!self.allow_invalid_certs), self.tls_name())
                    .await?;
                log::debug!(
                    "TLS established with {} ({:?})",
                    self.addr,
                    client.stream.get_ref().1.protocol_version()
                );

                if let Err(err) = client.ehlo(&self.local_host).await {
                    client.abort().await;
                    return Err(err);
                }
                return client.transmit(mail_from, rcpt_to, message).await;
            }

            log::warn!(
                "{} does not advertise STARTTLS, delivering in plain text",
                self.addr
            );
        }

        client.transmit(mail_from, rcpt_to, message).await
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::{Error, SmtpClientBuilder};

    #[test]
    fn dial_address() {
        assert_eq!(
            SmtpClientBuilder::new("localhost", 25).addr,
            "localhost:25"
        );
        assert_eq!(
            SmtpClientBuilder::new("mx.example.org:2525", 25).addr,
            "mx.example.org:2525"
        );
        assert_eq!(
            SmtpClientBuilder::new("127.0.0.1", 587).addr,
            "127.0.0.1:587"
        );
        assert_eq!(SmtpClientBuilder::new("::1", 25).addr, "[::1]:25");
    }

    #[test]
    fn tls_server_name() {
        for (hostname, expected) in [
            ("mx.example.org", "mx.example.org"),
            ("mx.example.org:2525", "mx.example.org"),
            ("10.0.0.1:25", "10.0.0.1"),
            ("[::1]:25", "::1"),
            ("::1", "::1"),
        ] {
            assert_eq!(SmtpClientBuilder::new(hostname, 25).tls_name(), expected);
        }
    }

    #[test]
    fn certificate_verification() {
        let builder = SmtpClientBuilder::new("localhost", 25);
        assert!(!builder.allow_invalid_certs);
        assert!(builder.allow_invalid_certs().allow_invalid_certs);
    }

    #[tokio::test]
    async fn connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = SmtpClientBuilder::new("127.0.0.1", port)
            .timeout(Duration::from_secs(5))
            .connect()
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
