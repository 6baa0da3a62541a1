//! Simple Node Ident Protocol (SNIP) self-description.

use std::fmt;

/// Cached SNIP self-description for one node.
///
/// Reply payload: a version byte, four NUL-terminated strings
/// (manufacturer, model, hardware version, software version), a second
/// version byte, then two more NUL-terminated strings (user-set name and
/// description). Truncated or malformed payloads parse best-effort; missing
/// strings stay empty.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Snip {
    pub manufacturer: String,
    pub model: String,
    pub hardware_version: String,
    pub software_version: String,
    pub user_name: String,
    pub user_description: String,
    /// Raw reply bytes accumulated so far; the string fields above are
    /// re-parsed from this on every [`Snip::add_data`].
    pub(crate) data: Vec<u8>,
}

impl Snip {
    /// Append reply bytes and re-parse. Replies can arrive split across
    /// several messages; the accumulator keeps whatever has been seen.
    pub fn add_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
        self.parse();
    }

    /// Drop accumulated bytes, ahead of a fresh request.
    pub fn clear(&mut self) {
        *self = Snip::default();
    }

    fn parse(&mut self) {
        let mut cursor = Cursor(&self.data);
        cursor.skip_version();
        self.manufacturer = cursor.string();
        self.model = cursor.string();
        self.hardware_version = cursor.string();
        self.software_version = cursor.string();
        cursor.skip_version();
        self.user_name = cursor.string();
        self.user_description = cursor.string();
    }

    /// Encode as a reply payload, with version bytes 4 and 2.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(4);
        for s in [
            &self.manufacturer,
            &self.model,
            &self.hardware_version,
            &self.software_version,
        ] {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        out.push(2);
        for s in [&self.user_name, &self.user_description] {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        out
    }
}

impl fmt::Debug for Snip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Snip({:?} {:?} as {:?})",
            self.manufacturer, self.model, self.user_name
        )
    }
}

struct Cursor<'a>(&'a [u8]);

impl Cursor<'_> {
    fn skip_version(&mut self) {
        if !self.0.is_empty() {
            self.0 = &self.0[1..];
        }
    }

    /// Take bytes up to the next NUL, lossily decoded. A missing
    /// terminator consumes the rest.
    fn string(&mut self) -> String {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(self.0.len());
        let s = String::from_utf8_lossy(&self.0[..end]).into_owned();
        self.0 = &self.0[(end + 1).min(self.0.len())..];
        s
    }
}
