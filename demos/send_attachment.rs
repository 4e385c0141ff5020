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

use mail_dispatch::MailMessage;

#[tokio::main]
async fn main() {
    env_logger::init();

    // Build a simple text message with a single attachment
    let mut message = MailMessage::new(
        "mail.smtp2go.com",
        2525,
        "john@example.com",
        ["jane@example.com"],
        true,
    )
    .unwrap();
    message.set_subject("Hello, world!");
    message.set_body("Hello, world!");
    message.add_attachment("Cargo.toml").unwrap();

    // Connect to an SMTP relay server.
    // The connection is upgraded to TLS if the server supports it.
    message.send().await.unwrap();
}
