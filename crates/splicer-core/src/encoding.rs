//! Character decoding for spliced sources.
//!
//! An [`Encoding`] turns a freshly opened byte stream into a [`CharSource`]
//! before anything has been read from it. The reader above it only ever sees
//! characters.

use std::fmt;
use std::io::{self, BufReader, Read};
use std::str::FromStr;

/// Sequential producer of characters.
///
/// Returns `Ok(None)` at end of input. Decoding failures surface as
/// [`io::ErrorKind::InvalidData`].
pub trait CharSource {
    /// Produce the next character.
    fn next_char(&mut self) -> io::Result<Option<char>>;
}

/// Character encoding of the files being spliced.
///
/// Every file in an include chain is decoded with the same encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub enum Encoding {
    /// Narrow text, decoded as UTF-8. Nothing is consumed or rewritten.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "utf-8"))]
    Utf8,
    /// UTF-16 with byte order mark detection.
    ///
    /// A leading BOM selects the byte order and is consumed. Without one the
    /// input is read as big-endian.
    #[cfg_attr(feature = "serde", serde(rename = "utf-16"))]
    Utf16,
    /// UTF-16, big-endian. A BOM is decoded as U+FEFF.
    #[cfg_attr(feature = "serde", serde(rename = "utf-16be"))]
    Utf16Be,
    /// UTF-16, little-endian. A BOM is decoded as U+FEFF.
    #[cfg_attr(feature = "serde", serde(rename = "utf-16le"))]
    Utf16Le,
}

impl Encoding {
    /// Prepare an unread byte stream for character decoding.
    pub fn prepare<R: Read + 'static>(self, reader: R) -> Box<dyn CharSource> {
        let bytes = ByteReader::new(reader);
        match self {
            Self::Utf8 => Box::new(Utf8Chars { bytes }),
            Self::Utf16 => Box::new(Utf16Chars {
                bytes,
                order: None,
            }),
            Self::Utf16Be => Box::new(Utf16Chars {
                bytes,
                order: Some(ByteOrder::Big),
            }),
            Self::Utf16Le => Box::new(Utf16Chars {
                bytes,
                order: Some(ByteOrder::Little),
            }),
        }
    }

    /// Canonical name, as accepted by [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16 => "utf-16",
            Self::Utf16Be => "utf-16be",
            Self::Utf16Le => "utf-16le",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-16" | "utf16" => Ok(Self::Utf16),
            "utf-16be" | "utf16be" => Ok(Self::Utf16Be),
            "utf-16le" | "utf16le" => Ok(Self::Utf16Le),
            _ => Err(format!(
                "unknown encoding '{s}' (expected utf-8, utf-16, utf-16be or utf-16le)"
            )),
        }
    }
}

/// Buffered byte-at-a-time access to the underlying stream.
struct ByteReader {
    inner: BufReader<Box<dyn Read>>,
}

impl ByteReader {
    fn new<R: Read + 'static>(reader: R) -> Self {
        let inner: Box<dyn Read> = Box::new(reader);
        Self {
            inner: BufReader::new(inner),
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_owned())
}

struct Utf8Chars {
    bytes: ByteReader,
}

impl CharSource for Utf8Chars {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        let Some(first) = self.bytes.next_byte()? else {
            return Ok(None);
        };

        let width = match first {
            0x00..=0x7F => return Ok(Some(char::from(first))),
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return Err(invalid_data("invalid UTF-8 lead byte")),
        };

        let mut buf = [first, 0, 0, 0];
        for slot in &mut buf[1..width] {
            *slot = self
                .bytes
                .next_byte()?
                .ok_or_else(|| invalid_data("truncated UTF-8 sequence"))?;
        }

        std::str::from_utf8(&buf[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .map(Some)
            .ok_or_else(|| invalid_data("invalid UTF-8 sequence"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Big,
    Little,
}

struct Utf16Chars {
    bytes: ByteReader,
    /// `None` until the BOM check has run.
    order: Option<ByteOrder>,
}

impl Utf16Chars {
    fn next_unit_raw(&mut self) -> io::Result<Option<[u8; 2]>> {
        let Some(hi) = self.bytes.next_byte()? else {
            return Ok(None);
        };
        let lo = self
            .bytes
            .next_byte()?
            .ok_or_else(|| invalid_data("odd number of bytes in UTF-16 input"))?;
        Ok(Some([hi, lo]))
    }

    fn next_unit(&mut self) -> io::Result<Option<u16>> {
        let order = match self.order {
            Some(order) => order,
            None => {
                let Some(pair) = self.next_unit_raw()? else {
                    return Ok(None);
                };
                let (order, bom) = match pair {
                    [0xFE, 0xFF] => (ByteOrder::Big, true),
                    [0xFF, 0xFE] => (ByteOrder::Little, true),
                    _ => (ByteOrder::Big, false),
                };
                self.order = Some(order);
                if !bom {
                    return Ok(Some(u16::from_be_bytes(pair)));
                }
                order
            }
        };

        Ok(self.next_unit_raw()?.map(|pair| match order {
            ByteOrder::Big => u16::from_be_bytes(pair),
            ByteOrder::Little => u16::from_le_bytes(pair),
        }))
    }
}

impl CharSource for Utf16Chars {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        let Some(unit) = self.next_unit()? else {
            return Ok(None);
        };

        match unit {
            0xD800..=0xDBFF => {
                let low = self
                    .next_unit()?
                    .ok_or_else(|| invalid_data("unpaired UTF-16 surrogate"))?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(invalid_data("unpaired UTF-16 surrogate"));
                }
                let code = 0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
                char::from_u32(code)
                    .map(Some)
                    .ok_or_else(|| invalid_data("invalid UTF-16 code point"))
            }
            0xDC00..=0xDFFF => Err(invalid_data("unpaired UTF-16 surrogate")),
            _ => char::from_u32(u32::from(unit))
                .map(Some)
                .ok_or_else(|| invalid_data("invalid UTF-16 code point")),
        }
    }
}
