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

//! # mail-dispatch
//!
//! _mail-dispatch_ is a small Rust library to build MIME e-mail messages with
//! file attachments and deliver them via SMTP. It includes the following features:
//!
//! - Plain-text bodies with a configurable content type, base64 transfer encoded.
//! - File attachments, base64 encoded, each delimited by its own boundary.
//! - Simple Mail Transfer Protocol (**SMTP**; _RFC 5321_) delivery.
//! - Opportunistic upgrade to **TLS** with STARTTLS (_RFC 3207_).
//! - Full async (requires Tokio).
//!
//! ## Usage Example
//!
//! Send a message with a single attachment, upgrading to TLS when the server
//! advertises STARTTLS:
//!
//! ```rust
//!     let mut message = MailMessage::new(
//!         "smtp.example.com",
//!         587,
//!         "john@example.com",
//!         ["jane@example.com"],
//!         true,
//!     )
//!     .unwrap();
//!
//!     message.set_subject("Quarterly report");
//!     message.set_body("Please find the report attached.");
//!     message.add_attachment("./report.pdf").unwrap();
//!
//!     message.send().await.unwrap();
//! ```
//!
//! The serialized message can also be obtained without sending it:
//!
//! ```rust
//!     let bytes = message.bytes().unwrap();
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!

pub mod message;
pub mod smtp;

use std::{fmt::Display, hash::Hash, time::Duration};

use smtp_proto::Response;
use tokio::io::{AsyncRead, AsyncWrite};

pub use message::{Attachment, MailMessage};

#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// TLS error
    Tls(Box<rustls::Error>),

    /// Failure parsing SMTP reply
    UnparseableReply,

    /// Unexpected SMTP reply.
    UnexpectedReply(Response<String>),

    /// Invalid TLS name provided.
    InvalidTLSName,

    /// Missing SMTP server.
    MissingServer,

    /// Missing message sender.
    MissingMailFrom,

    /// Missing message recipients.
    MissingRcptTo,

    /// The message body is empty.
    EmptyBody,

    /// Connection timeout.
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;

/// SMTP client.
pub struct SmtpClient<T: AsyncRead + AsyncWrite> {
    pub stream: T,
    pub timeout: Duration,
}

/// Connection parameters for an [`SmtpClient`].
#[derive(Clone)]
pub struct SmtpClientBuilder<T: AsRef<str> + PartialEq + Eq + Hash> {
    pub timeout: Duration,
    pub allow_invalid_certs: bool,
    pub tls_hostname: T,
    pub starttls: bool,
    pub addr: String,
    pub local_host: String,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Tls(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Tls(e) => write!(f, "TLS error: {e}"),
            Error::UnparseableReply => write!(f, "Unparseable SMTP reply"),
            Error::UnexpectedReply(e) => {
                write!(f, "Unexpected reply: {} {}", e.code, e.message)
            }
            Error::InvalidTLSName => write!(f, "Invalid TLS name provided"),
            Error::MissingServer => write!(f, "SMTP server required"),
            Error::MissingMailFrom => write!(f, "SMTP sender required"),
            Error::MissingRcptTo => write!(f, "Mail recipient(s) required"),
            Error::EmptyBody => write!(f, "Message body is empty"),
            Error::Timeout => write!(f, "Connection timeout"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Error::Tls(Box::new(err))
    }
}
