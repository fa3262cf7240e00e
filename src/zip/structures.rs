use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{Datelike, NaiveDateTime, Timelike};

use anyhow::{bail, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
}

impl CompressionMethod {
    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
        }
    }
}

/// Fields wider than this spill into the ZIP64 extra field.
pub const ZIP64_THRESHOLD_U32: u64 = 0xFFFFFFFF;
pub const ZIP64_THRESHOLD_U16: u64 = 0xFFFF;

/// Version 2.0: deflate, directories.
pub const VERSION_DEFAULT: u16 = 20;
/// Version 4.5: ZIP64 records.
pub const VERSION_ZIP64: u16 = 45;
/// Upper byte of "version made by": 3 = UNIX, so external attributes carry a mode.
pub const HOST_UNIX: u16 = 3 << 8;

/// General purpose flag bits
pub const FLAG_DEFLATE_MAXIMUM: u16 = 0x0002;
pub const FLAG_DEFLATE_FAST: u16 = 0x0004;
pub const FLAG_DEFLATE_SUPER_FAST: u16 = 0x0006;
/// CRC and sizes follow the data in a [`DataDescriptor`].
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
pub const FLAG_UTF8: u16 = 0x0800;

pub const S_IFREG: u32 = 0o100000;
pub const S_IFDIR: u32 = 0o040000;
/// MS-DOS directory attribute, kept in the low byte of the external attributes.
pub const DOS_DIRECTORY: u32 = 0x10;

/// MS-DOS packed date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant.
    pub const MIN: DosDateTime = DosDateTime {
        time: 0,
        date: (1 << 5) | 1,
    };

    /// 2107-12-31 23:59:58
    pub const MAX: DosDateTime = DosDateTime {
        time: (23 << 11) | (59 << 5) | 29,
        date: (127 << 9) | (12 << 5) | 31,
    };

    /// Pack a calendar time, clamping to the representable range.
    pub fn from_naive(dt: NaiveDateTime) -> Self {
        let year = dt.year();
        if year < 1980 {
            return Self::MIN;
        }
        if year > 2107 {
            return Self::MAX;
        }

        let date = (((year - 1980) as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
        let time =
            ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
        Self { time, date }
    }
}

#[cfg(test)]
impl DosDateTime {
    /// Unpack to (year, month, day)
    pub fn ymd(&self) -> (u16, u8, u8) {
        let day = (self.date & 0x1F) as u8;
        let month = ((self.date >> 5) & 0x0F) as u8;
        let year = ((self.date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Unpack to (hour, minute, second)
    pub fn hms(&self) -> (u8, u8, u8) {
        let second = ((self.time & 0x1F) * 2) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// ZIP64 extended information extra field (header ID 0x0001).
///
/// Only the values whose classic header field overflowed are present, in this
/// fixed order.
#[derive(Debug, Default)]
pub struct Zip64ExtraField {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub lfh_offset: Option<u64>,
}

impl Zip64ExtraField {
    pub const HEADER_ID: u16 = 0x0001;

    pub fn is_empty(&self) -> bool {
        self.uncompressed_size.is_none()
            && self.compressed_size.is_none()
            && self.lfh_offset.is_none()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<u64> = [self.uncompressed_size, self.compressed_size, self.lfh_offset]
            .into_iter()
            .flatten()
            .collect();

        let mut out = Vec::with_capacity(4 + values.len() * 8);
        out.write_u16::<LittleEndian>(Self::HEADER_ID)?;
        out.write_u16::<LittleEndian>((values.len() * 8) as u16)?;
        for value in values {
            out.write_u64::<LittleEndian>(value)?;
        }
        Ok(out)
    }
}

fn name_len(name: &[u8]) -> Result<u16> {
    if name.len() > u16::MAX as usize {
        bail!("File name too long ({} bytes)", name.len());
    }
    Ok(name.len() as u16)
}

fn extra_len(extra: &[u8]) -> Result<u16> {
    if extra.len() > u16::MAX as usize {
        bail!("Extra field too long ({} bytes)", extra.len());
    }
    Ok(extra.len() as u16)
}

/// Clamp a 64-bit value into a classic 32-bit field.
pub fn u32_or_marker(value: u64) -> u32 {
    if value >= ZIP64_THRESHOLD_U32 {
        0xFFFFFFFF
    } else {
        value as u32
    }
}

/// Local File Header (LFH) - 30 bytes + name + extra
pub struct LocalFileHeader<'a> {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name: &'a [u8],
}

impl LocalFileHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    pub fn is_zip64(&self) -> bool {
        self.compressed_size >= ZIP64_THRESHOLD_U32 || self.uncompressed_size >= ZIP64_THRESHOLD_U32
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        // A ZIP64 local header must carry both sizes.
        let extra = if self.is_zip64() {
            Zip64ExtraField {
                uncompressed_size: Some(self.uncompressed_size),
                compressed_size: Some(self.compressed_size),
                lfh_offset: None,
            }
            .to_bytes()?
        } else {
            Vec::new()
        };
        let (compressed, uncompressed) = if self.is_zip64() {
            (0xFFFFFFFF, 0xFFFFFFFF)
        } else {
            (self.compressed_size as u32, self.uncompressed_size as u32)
        };

        let mut out = Vec::with_capacity(Self::SIZE + self.file_name.len() + extra.len());
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.modified.time)?;
        out.write_u16::<LittleEndian>(self.modified.date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(compressed)?;
        out.write_u32::<LittleEndian>(uncompressed)?;
        out.write_u16::<LittleEndian>(name_len(self.file_name)?)?;
        out.write_u16::<LittleEndian>(extra_len(&extra)?)?;
        out.extend_from_slice(self.file_name);
        out.extend_from_slice(&extra);
        Ok(out)
    }
}

/// Data descriptor - 16 bytes, or 24 with ZIP64 sizes
///
/// Follows the data of a member whose local header has
/// [`FLAG_DATA_DESCRIPTOR`] set and zeroed CRC and sizes.
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl DataDescriptor {
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";
    pub const SIZE: usize = 16;
    pub const SIZE_ZIP64: usize = 24;

    pub fn is_zip64(&self) -> bool {
        self.compressed_size >= ZIP64_THRESHOLD_U32 || self.uncompressed_size >= ZIP64_THRESHOLD_U32
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::SIZE_ZIP64);
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u32::<LittleEndian>(self.crc32)?;
        if self.is_zip64() {
            out.write_u64::<LittleEndian>(self.compressed_size)?;
            out.write_u64::<LittleEndian>(self.uncompressed_size)?;
        } else {
            out.write_u32::<LittleEndian>(self.compressed_size as u32)?;
            out.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        }
        Ok(out)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes + name + extra
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub external_attrs: u32,
    pub lfh_offset: u64,
    pub file_name: Vec<u8>,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const SIZE: usize = 46;

    pub fn zip64_extra(&self) -> Zip64ExtraField {
        let overflow = |v: u64| (v >= ZIP64_THRESHOLD_U32).then_some(v);
        Zip64ExtraField {
            uncompressed_size: overflow(self.uncompressed_size),
            compressed_size: overflow(self.compressed_size),
            lfh_offset: overflow(self.lfh_offset),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let extra = self.zip64_extra().to_bytes()?;

        let mut out = Vec::with_capacity(Self::SIZE + self.file_name.len() + extra.len());
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.modified.time)?;
        out.write_u16::<LittleEndian>(self.modified.date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(u32_or_marker(self.compressed_size))?;
        out.write_u32::<LittleEndian>(u32_or_marker(self.uncompressed_size))?;
        out.write_u16::<LittleEndian>(name_len(&self.file_name)?)?;
        out.write_u16::<LittleEndian>(extra_len(&extra)?)?;
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(self.external_attrs)?;
        out.write_u32::<LittleEndian>(u32_or_marker(self.lfh_offset))?;
        out.extend_from_slice(&self.file_name);
        out.extend_from_slice(&extra);
        Ok(out)
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn is_zip64(&self) -> bool {
        self.total_entries >= ZIP64_THRESHOLD_U16
            || self.cd_size >= ZIP64_THRESHOLD_U32
            || self.cd_offset >= ZIP64_THRESHOLD_U32
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let entries = self.total_entries.min(ZIP64_THRESHOLD_U16) as u16;

        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u16::<LittleEndian>(0)?; // disk number
        out.write_u16::<LittleEndian>(0)?; // disk with central directory
        out.write_u16::<LittleEndian>(entries)?;
        out.write_u16::<LittleEndian>(entries)?;
        out.write_u32::<LittleEndian>(u32_or_marker(self.cd_size))?;
        out.write_u32::<LittleEndian>(u32_or_marker(self.cd_offset))?;
        out.write_u16::<LittleEndian>(0)?; // comment length
        Ok(out)
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u32::<LittleEndian>(0)?; // disk with ZIP64 EOCD
        out.write_u64::<LittleEndian>(self.eocd64_offset)?;
        out.write_u32::<LittleEndian>(1)?; // total disks
        Ok(out)
    }
}

/// ZIP64 End of Central Directory - 56 bytes
pub struct Zip64EOCD {
    pub version_made_by: u16,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const SIZE: usize = 56;

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(Self::SIGNATURE);
        // Size of the remaining record, excluding signature and this field.
        out.write_u64::<LittleEndian>((Self::SIZE - 12) as u64)?;
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(VERSION_ZIP64)?;
        out.write_u32::<LittleEndian>(0)?; // disk number
        out.write_u32::<LittleEndian>(0)?; // disk with central directory
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.cd_size)?;
        out.write_u64::<LittleEndian>(self.cd_offset)?;
        Ok(out)
    }
}
