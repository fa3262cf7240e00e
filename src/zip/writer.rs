//! Sequential ZIP archive writer.
//!
//! File data is compressed and written as it arrives. The local header goes
//! out first with the data descriptor flag and zeroed CRC and sizes; the real
//! values follow the data in a [`DataDescriptor`] and are repeated in the
//! central directory, so the output never needs to be seekable. The central
//! directory is kept in memory and written by [`ZipWriter::finish`].

use std::io::Write;

use anyhow::{bail, Result};
use async_trait::async_trait;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::structures::*;
use crate::io::{ArchiveSink, EntryOptions};

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;

enum Encoder {
    Stored,
    Deflate(DeflateEncoder<Vec<u8>>),
}

impl Encoder {
    fn new(options: &EntryOptions) -> Self {
        match options.method {
            CompressionMethod::Stored => Encoder::Stored,
            CompressionMethod::Deflate => Encoder::Deflate(DeflateEncoder::new(
                Vec::new(),
                Compression::new(options.level.clamp(1, 9) as u32),
            )),
        }
    }
}

/// File member between `start_file` and `finish_file`.
struct PendingFile {
    name: Vec<u8>,
    flags: u16,
    options: EntryOptions,
    lfh_offset: u64,
    data_offset: u64,
    crc: Crc,
    uncompressed_size: u64,
    encoder: Encoder,
}

/// General purpose flags for a member name and its compression settings.
fn member_flags(name: &str, options: &EntryOptions) -> u16 {
    let mut flags = 0;
    if !name.is_ascii() {
        flags |= FLAG_UTF8;
    }
    if options.method == CompressionMethod::Deflate {
        flags |= match options.level {
            8..=9 => FLAG_DEFLATE_MAXIMUM,
            2 => FLAG_DEFLATE_FAST,
            1 => FLAG_DEFLATE_SUPER_FAST,
            _ => 0,
        };
    }
    flags
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "/" {
        bail!("Archive member name must not be empty");
    }
    if name.starts_with('/') {
        bail!("Archive member name must be relative: {name}");
    }
    Ok(())
}

/// ZIP writer over any async byte sink.
pub struct ZipWriter<W> {
    out: W,
    offset: u64,
    central: Vec<CentralDirectoryHeader>,
    pending: Option<PendingFile>,
}

impl<W: AsyncWrite + Unpin + Send> ZipWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            offset: 0,
            central: Vec::new(),
            pending: None,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Give back the underlying sink, e.g. to discard it after a failure.
    pub fn into_inner(self) -> W {
        self.out
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes).await?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    /// Remember the central record of a member whose local header is at `lfh_offset`.
    fn push_central(&mut self, header: &LocalFileHeader<'_>, lfh_offset: u64, external_attrs: u32) {
        let mut record = CentralDirectoryHeader {
            version_made_by: HOST_UNIX | header.version_needed,
            version_needed: header.version_needed,
            flags: header.flags,
            compression_method: header.compression_method,
            modified: header.modified,
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            external_attrs,
            lfh_offset,
            file_name: header.file_name.to_vec(),
        };
        if !record.zip64_extra().is_empty() {
            record.version_needed = VERSION_ZIP64;
            record.version_made_by = HOST_UNIX | VERSION_ZIP64;
        }
        self.central.push(record);
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ArchiveSink for ZipWriter<W> {
    async fn add_directory(&mut self, name: &str, options: EntryOptions) -> Result<()> {
        check_name(name)?;
        if self.pending.is_some() {
            bail!("Cannot add directory {name} while a file member is open");
        }
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };

        let mode = options.unix_mode.unwrap_or(DEFAULT_DIR_MODE) & 0o7777;
        let header = LocalFileHeader {
            version_needed: VERSION_DEFAULT,
            flags: if name.is_ascii() { 0 } else { FLAG_UTF8 },
            compression_method: CompressionMethod::Stored,
            modified: DosDateTime::from_naive(options.modified),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: name.as_bytes(),
        };
        let lfh_offset = self.offset;
        self.write_raw(&header.to_bytes()?).await?;
        self.push_central(&header, lfh_offset, ((S_IFDIR | mode) << 16) | DOS_DIRECTORY);
        Ok(())
    }

    async fn start_file(&mut self, name: &str, options: EntryOptions) -> Result<()> {
        check_name(name)?;
        if name.ends_with('/') {
            bail!("File member name must not end with '/': {name}");
        }
        if let Some(pending) = &self.pending {
            bail!(
                "Cannot start {name}: {} is still open",
                String::from_utf8_lossy(&pending.name)
            );
        }

        let flags = member_flags(name, &options) | FLAG_DATA_DESCRIPTOR;
        let header = LocalFileHeader {
            version_needed: VERSION_DEFAULT,
            flags,
            compression_method: options.method,
            modified: DosDateTime::from_naive(options.modified),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: name.as_bytes(),
        };
        let lfh_offset = self.offset;
        self.write_raw(&header.to_bytes()?).await?;

        self.pending = Some(PendingFile {
            name: name.as_bytes().to_vec(),
            flags,
            options,
            lfh_offset,
            data_offset: self.offset,
            crc: Crc::new(),
            uncompressed_size: 0,
            encoder: Encoder::new(&options),
        });
        Ok(())
    }

    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        let Some(pending) = self.pending.as_mut() else {
            bail!("No file member is open");
        };
        pending.crc.update(data);
        pending.uncompressed_size += data.len() as u64;

        let compressed = match &mut pending.encoder {
            Encoder::Stored => None,
            Encoder::Deflate(encoder) => {
                encoder.write_all(data)?;
                Some(std::mem::take(encoder.get_mut()))
            }
        };
        match compressed {
            Some(bytes) => self.write_raw(&bytes).await,
            None => self.write_raw(data).await,
        }
    }

    async fn finish_file(&mut self) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            bail!("No file member is open");
        };
        let PendingFile {
            name,
            flags,
            options,
            lfh_offset,
            data_offset,
            crc,
            uncompressed_size,
            encoder,
        } = pending;

        if let Encoder::Deflate(encoder) = encoder {
            let tail = encoder.finish()?;
            self.write_raw(&tail).await?;
        }
        let compressed_size = self.offset - data_offset;

        let descriptor = DataDescriptor {
            crc32: crc.sum(),
            compressed_size,
            uncompressed_size,
        };
        self.write_raw(&descriptor.to_bytes()?).await?;

        let header = LocalFileHeader {
            version_needed: if descriptor.is_zip64() {
                VERSION_ZIP64
            } else {
                VERSION_DEFAULT
            },
            flags,
            compression_method: options.method,
            modified: DosDateTime::from_naive(options.modified),
            crc32: descriptor.crc32,
            compressed_size,
            uncompressed_size,
            file_name: &name,
        };
        let mode = options.unix_mode.unwrap_or(DEFAULT_FILE_MODE) & 0o7777;
        self.push_central(&header, lfh_offset, (S_IFREG | mode) << 16);
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        if let Some(pending) = &self.pending {
            bail!(
                "Cannot finish archive: {} is still open",
                String::from_utf8_lossy(&pending.name)
            );
        }

        let cd_offset = self.offset;
        let records = std::mem::take(&mut self.central);
        for record in &records {
            let bytes = record.to_bytes()?;
            self.write_raw(&bytes).await?;
        }
        let cd_size = self.offset - cd_offset;
        let total_entries = records.len() as u64;
        self.central = records;

        let eocd = EndOfCentralDirectory {
            total_entries,
            cd_size,
            cd_offset,
        };
        if eocd.is_zip64() {
            let eocd64_offset = self.offset;
            let eocd64 = Zip64EOCD {
                version_made_by: HOST_UNIX | VERSION_ZIP64,
                total_entries,
                cd_size,
                cd_offset,
            }
            .to_bytes()?;
            self.write_raw(&eocd64).await?;
            let locator = Zip64EOCDLocator { eocd64_offset }.to_bytes()?;
            self.write_raw(&locator).await?;
        }
        let bytes = eocd.to_bytes()?;
        self.write_raw(&bytes).await?;

        self.out.flush().await?;
        Ok(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::{Cursor, Read};

    fn options(level: u8) -> EntryOptions {
        EntryOptions {
            method: if level == 0 {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflate
            },
            level,
            modified: NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_opt(10, 20, 30)
                .unwrap(),
            unix_mode: Some(0o640),
        }
    }

    impl<W> ZipWriter<W> {
        fn len(&self) -> usize {
            self.central.len()
        }
    }

    async fn add(writer: &mut ZipWriter<Vec<u8>>, name: &str, level: u8, content: &[u8]) {
        writer.start_file(name, options(level)).await.unwrap();
        for chunk in content.chunks(7) {
            writer.write_chunk(chunk).await.unwrap();
        }
        writer.finish_file().await.unwrap();
    }

    /// Deterministic bytes that deflate only partly.
    fn noisy(len: usize) -> Vec<u8> {
        let mut state = 0x2545_F491_u32;
        (0..len)
            .map(|i| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                if i % 3 == 0 { b'a' } else { (state >> 24) as u8 }
            })
            .collect()
    }

    #[tokio::test]
    async fn archive_reads_back() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_directory("dist/", options(9)).await.unwrap();
        add(&mut writer, "dist/a.txt", 9, b"hello hello hello hello").await;
        add(&mut writer, "dist/b.bin", 0, b"stored bytes").await;
        add(&mut writer, "empty.txt", 5, b"").await;
        let size = writer.finish().await.unwrap();
        assert_eq!(writer.len(), 4);

        let bytes = writer.into_inner();
        assert_eq!(size, bytes.len() as u64);

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 4);
        assert!(archive.by_name("dist/").unwrap().is_dir());

        let mut content = String::new();
        let mut file = archive.by_name("dist/a.txt").unwrap();
        assert_eq!(file.compression(), zip::CompressionMethod::Deflated);
        assert_eq!(file.unix_mode(), Some(0o100640));
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello hello hello hello");
        drop(file);

        let mut content = Vec::new();
        let mut file = archive.by_name("dist/b.bin").unwrap();
        assert_eq!(file.compression(), zip::CompressionMethod::Stored);
        file.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"stored bytes");
        drop(file);

        assert_eq!(archive.by_name("empty.txt").unwrap().size(), 0);
    }

    #[tokio::test]
    async fn members_keep_start_order() {
        let mut writer = ZipWriter::new(Vec::new());
        add(&mut writer, "z.txt", 1, b"z").await;
        add(&mut writer, "a.txt", 1, b"a").await;
        writer.finish().await.unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(writer.into_inner())).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["z.txt", "a.txt"]);
    }

    #[tokio::test]
    async fn large_members_stream_with_data_descriptors() {
        let content = noisy(300 * 1024);
        for level in [0, 6] {
            let mut writer = ZipWriter::new(Vec::new());
            writer.start_file("big.bin", options(level)).await.unwrap();
            for chunk in content.chunks(64 * 1024) {
                writer.write_chunk(chunk).await.unwrap();
            }
            writer.finish_file().await.unwrap();
            add(&mut writer, "next.txt", level, b"after").await;
            writer.finish().await.unwrap();

            let bytes = writer.into_inner();
            let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
            assert_ne!(flags & FLAG_DATA_DESCRIPTOR, 0);
            // CRC and sizes are only known after the data
            assert_eq!(&bytes[14..26], &[0u8; 12]);

            let mut archive = zip::ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
            let mut file = archive.by_name("big.bin").unwrap();
            let descriptor_at =
                LocalFileHeader::SIZE + "big.bin".len() + file.compressed_size() as usize;
            let mut read = Vec::new();
            file.read_to_end(&mut read).unwrap();
            assert_eq!(read, content, "level {level}");
            drop(file);

            assert_eq!(&bytes[descriptor_at..descriptor_at + 4], DataDescriptor::SIGNATURE);
            let size = &bytes[descriptor_at + 12..descriptor_at + 16];
            assert_eq!(u32::from_le_bytes(size.try_into().unwrap()), content.len() as u32);

            let mut next = String::new();
            archive.by_name("next.txt").unwrap().read_to_string(&mut next).unwrap();
            assert_eq!(next, "after");
        }
    }

    #[tokio::test]
    async fn protocol_misuse_is_rejected() {
        let mut writer = ZipWriter::new(Vec::new());
        assert!(writer.write_chunk(b"x").await.is_err());
        assert!(writer.finish_file().await.is_err());
        assert!(writer.start_file("", options(9)).await.is_err());
        assert!(writer.start_file("/abs", options(9)).await.is_err());

        writer.start_file("a", options(9)).await.unwrap();
        assert!(writer.start_file("b", options(9)).await.is_err());
        assert!(writer.add_directory("d/", options(9)).await.is_err());
        assert!(writer.finish().await.is_err());
    }

    #[test]
    fn flags_follow_name_and_level() {
        assert_eq!(member_flags("a", &options(0)), 0);
        assert_eq!(member_flags("a", &options(9)), FLAG_DEFLATE_MAXIMUM);
        assert_eq!(member_flags("a", &options(1)), FLAG_DEFLATE_SUPER_FAST);
        assert_eq!(member_flags("a", &options(6)), 0);
        assert_eq!(member_flags("é", &options(0)), FLAG_UTF8);
    }
}
