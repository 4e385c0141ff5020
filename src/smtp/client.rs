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

use smtp_proto::{response::parser::ResponseReceiver, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::SmtpClient;

use super::AssertReply;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    pub(crate) async fn read(&mut self) -> crate::Result<Response<String>> {
        let mut buf = vec![0u8; 1024];
        let mut parser = ResponseReceiver::default();

        loop {
            let br = self.stream.read(&mut buf).await?;

            if br == 0 {
                return Err(crate::Error::UnparseableReply);
            }

            match parser.parse(&mut buf[..br].iter()) {
                Ok(reply) => {
                    log::trace!("S: {} {}", reply.code, reply.message);
                    return Ok(reply);
                }
                Err(err) => match err {
                    smtp_proto::Error::NeedsMoreData { .. } => (),
                    _ => {
                        return Err(crate::Error::UnparseableReply);
                    }
                },
            }
        }
    }

    /// Reads the server greeting.
    pub async fn greeting(&mut self) -> crate::Result<()> {
        tokio::time::timeout(self.timeout, self.read())
            .await
            .map_err(|_| crate::Error::Timeout)??
            .assert_positive_completion()
    }

    /// Sends a command to the SMTP server and waits for a reply.
    pub async fn cmd(&mut self, cmd: impl AsRef<[u8]>) -> crate::Result<Response<String>> {
        let cmd = cmd.as_ref();
        log::trace!("C: {}", String::from_utf8_lossy(cmd).trim_end());

        tokio::time::timeout(self.timeout, async {
            self.stream.write_all(cmd).await?;
            self.stream.flush().await?;
            self.read().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::{Error, SmtpClient};

    #[tokio::test]
    async fn read_multiline_reply() {
        let (client_io, mut server_io) = tokio::io::duplex(1024);
        let mut client = SmtpClient {
            stream: client_io,
            timeout: Duration::from_secs(5),
        };

        server_io
            .write_all(b"250-first line\r\n250 second line\r\n")
            .await
            .unwrap();
        let reply = client.cmd(b"NOOP\r\n").await.unwrap();
        assert_eq!(reply.code, 250);
        assert!(reply.message.contains("second line"));

        let mut sent = vec![0u8; 6];
        server_io.read_exact(&mut sent).await.unwrap();
        assert_eq!(sent, b"NOOP\r\n");
    }

    #[tokio::test]
    async fn rejected_greeting() {
        let (client_io, mut server_io) = tokio::io::duplex(1024);
        let mut client = SmtpClient {
            stream: client_io,
            timeout: Duration::from_secs(5),
        };

        server_io
            .write_all(b"554 5.3.2 Service unavailable\r\n")
            .await
            .unwrap();
        assert!(matches!(
            client.greeting().await,
            Err(Error::UnexpectedReply(reply)) if reply.code == 554
        ));
    }

    #[tokio::test]
    async fn closed_connection() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let mut client = SmtpClient {
            stream: client_io,
            timeout: Duration::from_secs(5),
        };
        drop(server_io);

        assert!(client.greeting().await.is_err());
    }

    #[tokio::test]
    async fn reply_timeout() {
        let (client_io, _server_io) = tokio::io::duplex(1024);
        let mut client = SmtpClient {
            stream: client_io,
            timeout: Duration::from_millis(50),
        };

        assert!(matches!(
            client.cmd(b"NOOP\r\n").await,
            Err(Error::Timeout)
        ));
    }
}
