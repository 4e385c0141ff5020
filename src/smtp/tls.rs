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

use std::{io, sync::Arc};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::{Error, SmtpClient};

use super::AssertReply;

impl SmtpClient<TcpStream> {
    /// Issues STARTTLS and performs the handshake on the same socket.
    ///
    /// A rejected STARTTLS resets and closes the session. A failed handshake
    /// consumes the socket, which is closed when dropped.
    pub async fn start_tls(
        mut self,
        tls_connector: &TlsConnector,
        hostname: &str,
    ) -> crate::Result<SmtpClient<TlsStream<TcpStream>>> {
        let server_name = match ServerName::try_from(hostname) {
            Ok(name) => name.to_owned(),
            Err(_) => {
                self.abort().await;
                return Err(Error::InvalidTLSName);
            }
        };

        if let Err(err) = self.starttls_command().await {
            self.abort().await;
            return Err(err);
        }

        log::debug!("Starting TLS handshake with {hostname}");
        let timeout = self.timeout;
        let stream = tokio::time::timeout(timeout, tls_connector.connect(server_name, self.stream))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(handshake_error)?;

        Ok(SmtpClient { stream, timeout })
    }

    async fn starttls_command(&mut self) -> crate::Result<()> {
        self.cmd(b"STARTTLS\r\n")
            .await?
            .assert_positive_completion()
    }
}

// tokio-rustls reports handshake failures as io::Error wrapping the rustls error.
fn handshake_error(err: io::Error) -> Error {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(tls) => Error::Tls(Box::new(tls.clone())),
        None => Error::Io(err),
    }
}

/// Builds the connector used for STARTTLS.
///
/// With `verify_certs` the server chain is checked against the webpki roots,
/// otherwise any certificate is accepted while handshake signatures are still
/// checked by the active crypto provider.
pub fn tls_connector(verify_certs: bool) -> TlsConnector {
    let builder = ClientConfig::builder();
    let config = if verify_certs {
        builder
            .with_root_certificates(RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            })
            .with_no_client_auth()
    } else {
        let verifier = AnyServerCert {
            provider: builder.crypto_provider().clone(),
        };
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth()
    };

    TlsConnector::from(Arc::new(config))
}

#[derive(Debug)]
struct AnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
