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

use crate::SmtpClientBuilder;

use super::MailMessage;

impl MailMessage {
    /// Connection parameters used by [`MailMessage::send`].
    ///
    /// Certificates presented during STARTTLS are not verified.
    pub fn client_builder(&self) -> SmtpClientBuilder<&str> {
        let builder = SmtpClientBuilder::new(self.server.as_str(), self.port)
            .starttls(self.use_tls)
            .allow_invalid_certs()
            .timeout(self.timeout);
        match &self.helo_host {
            Some(host) => builder.helo_host(host.as_str()),
            None => builder,
        }
    }

    /// Builds the message if needed and delivers it to the configured server.
    ///
    /// When TLS is enabled the connection is upgraded with STARTTLS if the
    /// server offers it. A failed upgrade aborts the delivery instead of
    /// falling back to plain text.
    pub async fn send(&mut self) -> crate::Result<()> {
        self.bytes()?;

        let message = self.built.as_deref().unwrap_or_default();
        log::debug!(
            "Sending {} byte message from <{}> to {} recipient(s) via {}:{}",
            message.len(),
            self.mail_from,
            self.rcpt_to.len(),
            self.server,
            self.port
        );

        self.client_builder()
            .deliver(&self.mail_from, &self.rcpt_to, message)
            .await
    }
}
