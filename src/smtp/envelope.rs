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

use tokio::io::{AsyncRead, AsyncWrite};

use crate::SmtpClient;

use super::AssertReply;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Sends a MAIL FROM command to the server.
    pub async fn mail_from(&mut self, addr: &str) -> crate::Result<()> {
        self.cmd(format!("MAIL FROM:<{addr}>\r\n").as_bytes())
            .await?
            .assert_positive_completion()
    }

    /// Sends a RCPT TO command to the server.
    pub async fn rcpt_to(&mut self, addr: &str) -> crate::Result<()> {
        self.cmd(format!("RCPT TO:<{addr}>\r\n").as_bytes())
            .await?
            .assert_positive_completion()
    }

    /// Sends a DATA command to the server.
    pub async fn data(&mut self, message: impl AsRef<[u8]>) -> crate::Result<()> {
        self.cmd(b"DATA\r\n").await?.assert_code(354)?;
        tokio::time::timeout(self.timeout, async {
            // Write message
            self.write_message(message.as_ref()).await?;
            self.read().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)??
        .assert_positive_completion()
    }

    /// Sends a RSET command to the server.
    pub async fn rset(&mut self) -> crate::Result<()> {
        self.cmd(b"RSET\r\n").await?.assert_positive_completion()
    }

    /// Sends a QUIT command to the server.
    pub async fn quit(mut self) -> crate::Result<()> {
        self.cmd(b"QUIT\r\n").await?.assert_positive_completion()
    }

    /// Resets the session and quits, ignoring any errors.
    pub async fn abort(mut self) {
        if let Err(err) = self.rset().await {
            log::debug!("RSET failed while aborting session: {err}");
        }
        if let Err(err) = self.quit().await {
            log::debug!("QUIT failed while aborting session: {err}");
        }
    }

    /// Runs a complete mail transaction and closes the session.
    ///
    /// The first failing command aborts the session and its error
    /// is returned.
    pub async fn transmit(
        mut self,
        mail_from: &str,
        rcpt_to: &[String],
        message: &[u8],
    ) -> crate::Result<()> {
        match self.transaction(mail_from, rcpt_to, message).await {
            Ok(()) => {
                if let Err(err) = self.quit().await {
                    log::debug!("QUIT failed after delivery: {err}");
                }
                Ok(())
            }
            Err(err) => {
                self.abort().await;
                Err(err)
            }
        }
    }

    async fn transaction(
        &mut self,
        mail_from: &str,
        rcpt_to: &[String],
        message: &[u8],
    ) -> crate::Result<()> {
        self.mail_from(mail_from).await?;
        for rcpt in rcpt_to {
            self.rcpt_to(rcpt).await?;
        }
        self.data(message).await?;
        log::debug!(
            "Delivered {} bytes from <{}> to {} recipient(s)",
            message.len(),
            mail_from,
            rcpt_to.len()
        );
        Ok(())
    }
}
