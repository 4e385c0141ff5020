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

use std::{io, path::Path, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};

pub mod mime;
pub mod send;

pub const DEFAULT_PORT: u16 = 25;
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";
pub const SUBJECT_PREFIX: &str = "mail-dispatch";

/// A MIME message together with the server it will be delivered to.
///
/// Fields may be changed until the message is serialized, either
/// explicitly with [`MailMessage::bytes`] or by [`MailMessage::send`].
/// The serialized bytes are produced once and reused afterwards.
#[derive(Debug)]
pub struct MailMessage {
    server: String,
    port: u16,
    mail_from: String,
    rcpt_to: Vec<String>,
    use_tls: bool,
    subject: String,
    content_type: String,
    body: Vec<u8>,
    attachments: Vec<Attachment>,
    timeout: Duration,
    helo_host: Option<String>,
    built: Option<Vec<u8>>,
}

/// A file attached to a message, already base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub contents: Vec<u8>,
    pub boundary: String,
}

impl Attachment {
    /// Length of the encoded contents, as advertised in the `size` parameter.
    pub fn encoded_len(&self) -> usize {
        self.contents.len()
    }
}

impl MailMessage {
    /// Creates a new message.
    ///
    /// A port of `0` is replaced with the default SMTP port.
    pub fn new<U>(
        server: impl Into<String>,
        port: u16,
        mail_from: impl Into<String>,
        rcpt_to: impl IntoIterator<Item = U>,
        use_tls: bool,
    ) -> crate::Result<Self>
    where
        U: Into<String>,
    {
        let server = server.into();
        let mail_from = mail_from.into();
        let rcpt_to: Vec<String> = rcpt_to.into_iter().map(Into::into).collect();

        if server.is_empty() {
            return Err(crate::Error::MissingServer);
        } else if mail_from.is_empty() {
            return Err(crate::Error::MissingMailFrom);
        } else if rcpt_to.is_empty() {
            return Err(crate::Error::MissingRcptTo);
        }

        Ok(MailMessage {
            server,
            port: if port == 0 { DEFAULT_PORT } else { port },
            mail_from,
            rcpt_to,
            use_tls,
            subject: format!("{} - {}", SUBJECT_PREFIX, chrono::Local::now().to_rfc2822()),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body: Vec::new(),
            attachments: Vec::new(),
            timeout: Duration::from_secs(60 * 60),
            helo_host: None,
            built: None,
        })
    }

    /// Appends text to the message body.
    pub fn set_body(&mut self, text: impl AsRef<str>) {
        self.set_body_bytes(text.as_ref().as_bytes());
    }

    /// Appends raw bytes to the message body.
    pub fn set_body_bytes(&mut self, bytes: impl AsRef<[u8]>) {
        self.body.extend_from_slice(bytes.as_ref());
    }

    /// Sets the body content type, an empty value restores `text/plain`.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        let content_type = content_type.into();
        self.content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            content_type
        };
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        let subject = subject.into();
        if !subject.is_empty() {
            self.subject = subject;
        }
    }

    /// Sets the timeout applied to each step of the SMTP session.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Sets the name announced in EHLO, the local host name by default.
    pub fn set_helo_host(&mut self, host: impl Into<String>) {
        let host = host.into();
        self.helo_host = (!host.is_empty()).then_some(host);
    }

    /// Reads and encodes a file as an attachment named after the last
    /// component of its path.
    ///
    /// An attachment with the same name is replaced and receives a new
    /// boundary.
    pub fn add_attachment(&mut self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(crate::Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "No attachment specified",
            )));
        }

        let contents = std::fs::read(path)?;
        let name = path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .into_owned();
        let attachment = Attachment {
            contents: STANDARD.encode(&contents).into_bytes(),
            boundary: mime::make_boundary(),
            name,
        };

        match self.attachments.iter_mut().find(|a| a.name == attachment.name) {
            Some(existing) => *existing = attachment,
            None => self.attachments.push(attachment),
        }

        Ok(())
    }

    /// Returns the serialized message, building it on the first call.
    pub fn bytes(&mut self) -> crate::Result<&[u8]> {
        if self.built.is_none() {
            if self.body.is_empty() {
                return Err(crate::Error::EmptyBody);
            }
            self.built = Some(self.write_to_vec());
        }

        Ok(self.built.as_deref().unwrap_or_default())
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn mail_from(&self) -> &str {
        &self.mail_from
    }

    pub fn rcpt_to(&self) -> &[String] {
        &self.rcpt_to
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}
