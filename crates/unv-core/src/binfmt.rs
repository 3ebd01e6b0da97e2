// Primitive reads shared by every section decoder. All integers are
// little-endian; field widths were established by reverse engineering.
use chrono::{Days, NaiveDate};

use crate::error::{DecodeError, Result};

/// Day index of 1976-07-04, the base of every universe date field.
pub const DATE_EPOCH_INDEX: u32 = 2_442_964;

/// Cursor over the raw file bytes. Section readers seek to an absolute
/// offset taken from the resolved marker map, then advance forward only.
#[derive(Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let avail = self.data.len().saturating_sub(self.pos);
        if len > avail {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len - avail,
            });
        }
        let s = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(s)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_slice(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_slice(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let s = self.read_slice(2)?;
        Ok(u16::from_le_bytes([s[0], s[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let s = self.read_slice(4)?;
        Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    /// Length-prefixed string: u16 length, then that many bytes.
    ///
    /// A zero length means the field is absent, which the format keeps
    /// distinct from an empty string. CR/LF bytes are stripped and invalid
    /// UTF-8 is replaced rather than treated as fatal.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let len = self.read_u16()? as usize;
        if len == 0 {
            return Ok(None);
        }
        let raw = self.read_slice(len)?;
        if raw.contains(&b'\r') || raw.contains(&b'\n') {
            let cleaned: Vec<u8> = raw
                .iter()
                .copied()
                .filter(|b| *b != b'\r' && *b != b'\n')
                .collect();
            Ok(Some(String::from_utf8_lossy(&cleaned).into_owned()))
        } else {
            Ok(Some(String::from_utf8_lossy(raw).into_owned()))
        }
    }

    /// Date stored as a u32 day count; see [`date_from_index`].
    pub fn read_date(&mut self) -> Result<NaiveDate> {
        let index = self.read_u32()?;
        date_from_index(index)
    }
}

/// Convert a universe day index into a date. Indices below
/// [`DATE_EPOCH_INDEX`] do not occur in valid files and fail decoding.
pub fn date_from_index(index: u32) -> Result<NaiveDate> {
    if index < DATE_EPOCH_INDEX {
        return Err(DecodeError::InvalidDateIndex { index });
    }
    let epoch = NaiveDate::from_ymd_opt(1976, 7, 4).expect("epoch date is valid");
    epoch
        .checked_add_days(Days::new(u64::from(index - DATE_EPOCH_INDEX)))
        .ok_or(DecodeError::InvalidDateIndex { index })
}
