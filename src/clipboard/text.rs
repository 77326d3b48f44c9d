// src/clipboard/text.rs

//! Text encodings used by the clipboard text formats.
//!
//! `CF_TEXT` holds Windows-1252 bytes, `CF_OEMTEXT` code page 437 and
//! `CF_UNICODETEXT` UTF-16LE, each NUL-terminated with CRLF line ends. The
//! host side speaks Latin-1 `STRING` and `UTF8_STRING` with bare LF.

/// Windows-1252, bytes 0x80..=0xFF. The five undefined slots decode to the
/// matching C1 control, as the system codepage tables do.
const CP1252_HIGH: [char; 128] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
    '\u{00A0}', '\u{00A1}', '\u{00A2}', '\u{00A3}', '\u{00A4}', '\u{00A5}', '\u{00A6}', '\u{00A7}',
    '\u{00A8}', '\u{00A9}', '\u{00AA}', '\u{00AB}', '\u{00AC}', '\u{00AD}', '\u{00AE}', '\u{00AF}',
    '\u{00B0}', '\u{00B1}', '\u{00B2}', '\u{00B3}', '\u{00B4}', '\u{00B5}', '\u{00B6}', '\u{00B7}',
    '\u{00B8}', '\u{00B9}', '\u{00BA}', '\u{00BB}', '\u{00BC}', '\u{00BD}', '\u{00BE}', '\u{00BF}',
    '\u{00C0}', '\u{00C1}', '\u{00C2}', '\u{00C3}', '\u{00C4}', '\u{00C5}', '\u{00C6}', '\u{00C7}',
    '\u{00C8}', '\u{00C9}', '\u{00CA}', '\u{00CB}', '\u{00CC}', '\u{00CD}', '\u{00CE}', '\u{00CF}',
    '\u{00D0}', '\u{00D1}', '\u{00D2}', '\u{00D3}', '\u{00D4}', '\u{00D5}', '\u{00D6}', '\u{00D7}',
    '\u{00D8}', '\u{00D9}', '\u{00DA}', '\u{00DB}', '\u{00DC}', '\u{00DD}', '\u{00DE}', '\u{00DF}',
    '\u{00E0}', '\u{00E1}', '\u{00E2}', '\u{00E3}', '\u{00E4}', '\u{00E5}', '\u{00E6}', '\u{00E7}',
    '\u{00E8}', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{00EC}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{00F0}', '\u{00F1}', '\u{00F2}', '\u{00F3}', '\u{00F4}', '\u{00F5}', '\u{00F6}', '\u{00F7}',
    '\u{00F8}', '\u{00F9}', '\u{00FA}', '\u{00FB}', '\u{00FC}', '\u{00FD}', '\u{00FE}', '\u{00FF}',
];

/// Code page 437, bytes 0x80..=0xFF.
const CP437_HIGH: [char; 128] = [
    '\u{00C7}', '\u{00FC}', '\u{00E9}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E5}', '\u{00E7}',
    '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00EF}', '\u{00EE}', '\u{00EC}', '\u{00C4}', '\u{00C5}',
    '\u{00C9}', '\u{00E6}', '\u{00C6}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00FB}', '\u{00F9}',
    '\u{00FF}', '\u{00D6}', '\u{00DC}', '\u{00A2}', '\u{00A3}', '\u{00A5}', '\u{20A7}', '\u{0192}',
    '\u{00E1}', '\u{00ED}', '\u{00F3}', '\u{00FA}', '\u{00F1}', '\u{00D1}', '\u{00AA}', '\u{00BA}',
    '\u{00BF}', '\u{2310}', '\u{00AC}', '\u{00BD}', '\u{00BC}', '\u{00A1}', '\u{00AB}', '\u{00BB}',
    '\u{2591}', '\u{2592}', '\u{2593}', '\u{2502}', '\u{2524}', '\u{2561}', '\u{2562}', '\u{2556}',
    '\u{2555}', '\u{2563}', '\u{2551}', '\u{2557}', '\u{255D}', '\u{255C}', '\u{255B}', '\u{2510}',
    '\u{2514}', '\u{2534}', '\u{252C}', '\u{251C}', '\u{2500}', '\u{253C}', '\u{255E}', '\u{255F}',
    '\u{255A}', '\u{2554}', '\u{2569}', '\u{2566}', '\u{2560}', '\u{2550}', '\u{256C}', '\u{2567}',
    '\u{2568}', '\u{2564}', '\u{2565}', '\u{2559}', '\u{2558}', '\u{2552}', '\u{2553}', '\u{256B}',
    '\u{256A}', '\u{2518}', '\u{250C}', '\u{2588}', '\u{2584}', '\u{258C}', '\u{2590}', '\u{2580}',
    '\u{03B1}', '\u{00DF}', '\u{0393}', '\u{03C0}', '\u{03A3}', '\u{03C3}', '\u{00B5}', '\u{03C4}',
    '\u{03A6}', '\u{0398}', '\u{03A9}', '\u{03B4}', '\u{221E}', '\u{03C6}', '\u{03B5}', '\u{2229}',
    '\u{2261}', '\u{00B1}', '\u{2265}', '\u{2264}', '\u{2320}', '\u{2321}', '\u{00F7}', '\u{2248}',
    '\u{00B0}', '\u{2219}', '\u{00B7}', '\u{221A}', '\u{207F}', '\u{00B2}', '\u{25A0}', '\u{00A0}',
];

const UNMAPPABLE: u8 = b'?';

/// A single-byte code page with an ASCII lower half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codepage {
    Windows1252,
    Oem437,
    Latin1,
}

impl Codepage {
    pub fn decode_byte(self, byte: u8) -> char {
        if byte < 0x80 {
            return byte as char;
        }
        match self {
            Codepage::Windows1252 => CP1252_HIGH[(byte - 0x80) as usize],
            Codepage::Oem437 => CP437_HIGH[(byte - 0x80) as usize],
            Codepage::Latin1 => byte as char,
        }
    }

    pub fn encode_char(self, c: char) -> u8 {
        if c.is_ascii() {
            return c as u8;
        }
        let high = match self {
            Codepage::Windows1252 => &CP1252_HIGH,
            Codepage::Oem437 => &CP437_HIGH,
            Codepage::Latin1 => {
                return u8::try_from(u32::from(c)).unwrap_or(UNMAPPABLE);
            }
        };
        high.iter()
            .position(|mapped| *mapped == c)
            .map(|index| 0x80 + index as u8)
            .unwrap_or(UNMAPPABLE)
    }

    /// Decodes up to the first NUL.
    pub fn decode(self, bytes: &[u8]) -> String {
        until_nul(bytes).iter().map(|b| self.decode_byte(*b)).collect()
    }

    /// Encodes without adding a terminator.
    pub fn encode(self, text: &str) -> Vec<u8> {
        text.chars().map(|c| self.encode_char(c)).collect()
    }
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|b| *b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Re-encodes a NUL-terminated buffer byte by byte, keeping its length and
/// terminator.
pub fn recode(bytes: &[u8], from: Codepage, to: Codepage) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for byte in bytes {
        if *byte == 0 {
            out.push(0);
            continue;
        }
        out.push(to.encode_char(from.decode_byte(*byte)));
    }
    out
}

pub fn ansi_to_oem(bytes: &[u8]) -> Vec<u8> {
    recode(bytes, Codepage::Windows1252, Codepage::Oem437)
}

pub fn oem_to_ansi(bytes: &[u8]) -> Vec<u8> {
    recode(bytes, Codepage::Oem437, Codepage::Windows1252)
}

/// Outbound line-ending normalization.
///
/// Copies up to the first NUL, dropping every `\r` that precedes `\n`, the
/// terminator or the end of the buffer. A lone `\r` in the middle of a line
/// is kept.
pub fn strip_carriage_returns(bytes: &[u8]) -> Vec<u8> {
    let text = until_nul(bytes);
    let mut out = Vec::with_capacity(text.len());
    for (i, byte) in text.iter().enumerate() {
        if *byte == b'\r' && text.get(i + 1).map_or(true, |next| *next == b'\n') {
            continue;
        }
        out.push(*byte);
    }
    out
}

/// Inbound line-ending normalization: LF becomes CRLF (an existing CRLF is
/// left alone) and the result is NUL-terminated.
pub fn expand_line_feeds(bytes: &[u8]) -> Vec<u8> {
    let text = until_nul(bytes);
    let mut out = Vec::with_capacity(text.len() + text.len() / 8 + 1);
    let mut previous = 0u8;
    for byte in text {
        if *byte == b'\n' && previous != b'\r' {
            out.push(b'\r');
        }
        out.push(*byte);
        previous = *byte;
    }
    out.push(0);
    out
}

/// Decodes NUL-terminated UTF-16LE; unpaired surrogates become U+FFFD.
pub fn utf16le_to_string(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0);
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Encodes to UTF-16LE with a NUL terminator.
pub fn string_to_utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

pub fn ansi_to_string(bytes: &[u8]) -> String {
    Codepage::Windows1252.decode(bytes)
}

/// Encodes to Windows-1252 with a NUL terminator.
pub fn string_to_ansi(text: &str) -> Vec<u8> {
    let mut out = Codepage::Windows1252.encode(text);
    out.push(0);
    out
}

/// Windows-1252 to the Latin-1 that `STRING` carries.
pub fn ansi_to_latin1(bytes: &[u8]) -> Vec<u8> {
    recode(bytes, Codepage::Windows1252, Codepage::Latin1)
}

pub fn latin1_to_ansi(bytes: &[u8]) -> Vec<u8> {
    recode(bytes, Codepage::Latin1, Codepage::Windows1252)
}
