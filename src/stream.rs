use tokio::io::{AsyncRead, AsyncReadExt};

use crate::dispatcher::Dispatcher;
use crate::location::{Locatable, Location};

/// I/O-layer failure from [`send_runes`] or [`send_bytes`]. Distinct from
/// [`crate::error::ParseError`]: this is a plain `Result`/`?`-propagated
/// error for the adapter itself, not a value produced by a rule.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("I/O error reading stream: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid UTF-8 byte sequence in rune stream")]
    InvalidUtf8,
}

/// Decode a UTF-8 character stream from `reader`, sending each character
/// wrapped in [`Locatable<char>`] through `dispatcher`, then a single EOF
/// packet carrying `'\0'`. `location` advances a line on `'\n'` and a column
/// otherwise, and is attached to each packet *before* advancing — so a
/// packet's location is where that character was actually read from.
///
/// A malformed byte sequence is reported as [`StreamError::InvalidUtf8`]
/// without ever sending the EOF packet, so callers can distinguish "read
/// everything, cleanly" from "stopped partway through".
pub async fn send_runes<R>(
    dispatcher: &Dispatcher<Locatable<char>>,
    mut reader: R,
    mut location: Location,
) -> Result<(), StreamError>
where
    R: AsyncRead + Unpin,
{
    let mut pending: Vec<u8> = Vec::new();
    let mut buffer = [0u8; 256];

    loop {
        let count = reader.read(&mut buffer).await?;
        if count == 0 {
            if !pending.is_empty() {
                return Err(StreamError::InvalidUtf8);
            }
            dispatcher.send(Locatable::new('\0', location), true).await;
            return Ok(());
        }
        pending.extend_from_slice(&buffer[..count]);

        loop {
            match std::str::from_utf8(&pending) {
                Ok(valid) => {
                    for ch in valid.chars() {
                        dispatcher.send(Locatable::new(ch, location.clone()), false).await;
                        advance(&mut location, ch);
                    }
                    pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_len = e.valid_up_to();
                    if valid_len > 0 {
                        let valid = std::str::from_utf8(&pending[..valid_len]).expect("validated above");
                        for ch in valid.chars() {
                            dispatcher.send(Locatable::new(ch, location.clone()), false).await;
                            advance(&mut location, ch);
                        }
                    }
                    match e.error_len() {
                        Some(_) => return Err(StreamError::InvalidUtf8),
                        None => {
                            // Incomplete sequence at the end of the buffer: keep the
                            // undecoded tail and read more before judging it invalid.
                            pending.drain(..valid_len);
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn advance(location: &mut Location, ch: char) {
    if ch == '\n' {
        location.next_line();
    } else {
        location.next_column();
    }
}

/// Read raw bytes from `reader`, sending each one wrapped in
/// [`Locatable<u8>`] through `dispatcher`, then a single EOF packet carrying
/// `0u8`. `location` advances the same way as in [`send_runes`].
pub async fn send_bytes<R>(
    dispatcher: &Dispatcher<Locatable<u8>>,
    mut reader: R,
    mut location: Location,
) -> Result<(), StreamError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; 128];
    loop {
        let count = reader.read(&mut buffer).await?;
        if count == 0 {
            dispatcher.send(Locatable::new(0u8, location), true).await;
            return Ok(());
        }
        for &byte in &buffer[..count] {
            dispatcher.send(Locatable::new(byte, location.clone()), false).await;
            if byte == b'\n' {
                location.next_line();
            } else {
                location.next_column();
            }
        }
    }
}
