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

use std::io::{self, Write};

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::Rng;

use super::MailMessage;

const BOUNDARY_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const BOUNDARY_LEN: usize = 16;

/// Generates a random base-36 boundary token.
pub fn make_boundary() -> String {
    let mut rng = rand::thread_rng();
    (0..BOUNDARY_LEN)
        .map(|_| BOUNDARY_ALPHABET[rng.gen_range(0..BOUNDARY_ALPHABET.len())] as char)
        .collect()
}

impl MailMessage {
    /// Writes the message to a writer.
    ///
    /// Each attachment declares its own `multipart/mixed` boundary ahead of
    /// the body part and closes it after its encoded contents.
    fn write_to(&self, mut output: impl Write) -> io::Result<()> {
        output.write_all(b"To: ")?;
        output.write_all(self.rcpt_to.join(", ").as_bytes())?;
        output.write_all(b"\r\nSubject: ")?;
        output.write_all(self.subject.as_bytes())?;
        output.write_all(b"\r\n")?;

        for attachment in &self.attachments {
            write!(
                output,
                "Content-Type: multipart/mixed; boundary=\"{}\"\r\n--{}\r\n",
                attachment.boundary, attachment.boundary
            )?;
        }

        output.write_all(b"Content-Transfer-Encoding: base64\r\n")?;
        output.write_all(b"MIME-Version: 1.0;\r\n")?;
        write!(
            output,
            "Content-Type: {}; charset=\"utf-8\";\r\n\r\n",
            self.content_type
        )?;
        output.write_all(STANDARD.encode(&self.body).as_bytes())?;

        for attachment in &self.attachments {
            write!(
                output,
                concat!(
                    "\r\n\r\n--{boundary}\r\n",
                    "Content-Type: application/octet-stream; name=\"{name}\"\r\n",
                    "Content-Description: {name}\r\n",
                    "Content-Disposition: attachment; filename=\"{name}\"; size={size}\r\n",
                    "Content-Transfer-Encoding: base64\r\n\r\n"
                ),
                boundary = attachment.boundary,
                name = attachment.name,
                size = attachment.encoded_len()
            )?;
            output.write_all(&attachment.contents)?;
            write!(output, "\r\n--{}--", attachment.boundary)?;
        }

        Ok(())
    }

    /// Writes the message to a vector. Callers go through
    /// [`MailMessage::bytes`], which rejects an empty body.
    pub(crate) fn write_to_vec(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(self.estimated_size());
        // Writing to a Vec cannot fail
        let _ = self.write_to(&mut output);
        output
    }

    fn estimated_size(&self) -> usize {
        256 + self.body.len() * 4 / 3
            + self
                .attachments
                .iter()
                .map(|a| 384 + a.name.len() * 3 + a.contents.len())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod test {
    use base64::{engine::general_purpose::STANDARD, Engine};

    use crate::MailMessage;

    use super::make_boundary;

    fn message() -> MailMessage {
        MailMessage::new("localhost", 0, "a@x.com", ["b@x.com"], false).unwrap()
    }

    fn lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .split("\r\n")
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn boundary_tokens() {
        let boundary = make_boundary();
        assert_eq!(boundary.len(), 16);
        assert!(boundary
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
        assert_ne!(make_boundary(), make_boundary());
    }

    #[test]
    fn text_message() {
        let mut message = message();
        message.set_subject("Greetings");
        message.set_body("hello");

        assert_eq!(
            lines(message.bytes().unwrap()),
            vec![
                "To: b@x.com",
                "Subject: Greetings",
                "Content-Transfer-Encoding: base64",
                "MIME-Version: 1.0;",
                "Content-Type: text/plain; charset=\"utf-8\";",
                "",
                "aGVsbG8=",
            ]
        );
    }

    #[test]
    fn default_headers() {
        let mut message = message();
        message.set_body("hello");
        let output = String::from_utf8(message.bytes().unwrap().to_vec()).unwrap();

        assert!(output.contains("Subject: mail-dispatch - "));
        assert!(output.contains("To: b@x.com\r\n"));
        assert!(output.contains("Content-Type: text/plain; charset=\"utf-8\";\r\n"));
        assert!(output.ends_with("aGVsbG8="));
    }

    #[test]
    fn multiple_recipients_and_content_type() {
        let mut message = MailMessage::new(
            "localhost",
            25,
            "a@x.com",
            vec!["b@x.com".to_string(), "c@x.com".to_string()],
            false,
        )
        .unwrap();
        message.set_content_type("text/html");
        message.set_body("<p>hi</p>");
        let output = String::from_utf8(message.bytes().unwrap().to_vec()).unwrap();

        assert!(output.starts_with("To: b@x.com, c@x.com\r\n"));
        assert!(output.contains("Content-Type: text/html; charset=\"utf-8\";\r\n"));
    }

    #[test]
    fn idempotent_build() {
        let mut message = message();
        message.set_body("hello");
        let first = message.bytes().unwrap().to_vec();

        message.set_body(" again");
        message.set_subject("changed");
        assert_eq!(message.bytes().unwrap(), first.as_slice());
        assert_eq!(message.bytes().unwrap(), first.as_slice());
    }

    #[test]
    fn single_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let contents = [0u8, 1, 2, 3, 4, 5, 250, 251, 252, 253];
        std::fs::write(&path, contents).unwrap();

        let mut message = message();
        message.set_subject("Files");
        message.set_body("hello");
        message.add_attachment(&path).unwrap();
        let boundary = message.attachments()[0].boundary.clone();
        let encoded = STANDARD.encode(contents);
        assert_eq!(encoded.len(), 16);

        let output = String::from_utf8(message.bytes().unwrap().to_vec()).unwrap();
        assert_eq!(output.matches(&format!("--{boundary}\r\n")).count(), 2);
        assert_eq!(output.matches(&format!("--{boundary}--")).count(), 1);

        assert_eq!(
            lines(output.as_bytes()),
            vec![
                "To: b@x.com".to_string(),
                "Subject: Files".to_string(),
                format!("Content-Type: multipart/mixed; boundary=\"{boundary}\""),
                format!("--{boundary}"),
                "Content-Transfer-Encoding: base64".to_string(),
                "MIME-Version: 1.0;".to_string(),
                "Content-Type: text/plain; charset=\"utf-8\";".to_string(),
                "".to_string(),
                "aGVsbG8=".to_string(),
                "".to_string(),
                format!("--{boundary}"),
                "Content-Type: application/octet-stream; name=\"data.bin\"".to_string(),
                "Content-Description: data.bin".to_string(),
                "Content-Disposition: attachment; filename=\"data.bin\"; size=16".to_string(),
                "Content-Transfer-Encoding: base64".to_string(),
                "".to_string(),
                encoded.clone(),
                format!("--{boundary}--"),
            ]
        );

        let block = lines(output.as_bytes())[16].clone();
        assert_eq!(STANDARD.decode(block).unwrap(), contents);
    }

    #[test]
    fn attachments_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut message = message();
        message.set_body("hello");
        for name in ["zeta.txt", "alpha.txt", "mid.txt"] {
            let path = dir.path().join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            message.add_attachment(&path).unwrap();
        }
        let boundaries = message
            .attachments()
            .iter()
            .map(|a| a.boundary.clone())
            .collect::<Vec<_>>();

        let output = String::from_utf8(message.bytes().unwrap().to_vec()).unwrap();
        let headers = boundaries
            .iter()
            .map(|b| {
                output
                    .find(&format!("multipart/mixed; boundary=\"{b}\""))
                    .unwrap()
            })
            .collect::<Vec<_>>();
        let parts = ["zeta.txt", "alpha.txt", "mid.txt"]
            .iter()
            .map(|n| output.find(&format!("name=\"{n}\"")).unwrap())
            .collect::<Vec<_>>();

        assert!(headers.windows(2).all(|w| w[0] < w[1]));
        assert!(parts.windows(2).all(|w| w[0] < w[1]));
        assert!(headers[2] < output.find("Content-Transfer-Encoding").unwrap());
        for (boundary, name) in boundaries.iter().zip(["zeta.txt", "alpha.txt", "mid.txt"]) {
            assert!(output.contains(&format!(
                "--{boundary}\r\nContent-Type: application/octet-stream; name=\"{name}\""
            )));
        }
    }
}
