//! Packing the permutations of a shader into one blob.
//!
//! The binary format is a 4-byte signature followed by records, with no index:
//!
//! ```text
//! "NVSP" { u32 key_len, u32 data_len, [u8; key_len] defines, [u8; data_len] payload }*
//! ```
//!
//! Lengths are little-endian. The text format renders the same bytes as a C array.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    naming::{symbol_name, with_suffix},
    options::Options,
    run_state::RunState,
};

/// Every blob starts with these bytes.
pub const BLOB_SIGNATURE: [u8; 4] = *b"NVSP";

/// Text blobs wrap to a new line after this many characters.
const TEXT_LINE_WIDTH: usize = 128;

/// One compiled permutation to put into a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub struct BlobEntry {
    /// Output path of the permutation without extension.
    pub permutation: PathBuf,
    /// Combined defines, the key of the entry in the blob.
    pub defines: String,
}

/// Entries grouped by the output path (without extension) of the blob they go into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub struct BlobGroups(BTreeMap<PathBuf, Vec<BlobEntry>>);

impl BlobGroups {
    /// Adds `entry` to the blob at `blob`.
    #[inline]
    pub fn insert(&mut self, blob: PathBuf, entry: BlobEntry) {
        self.0.entry(blob).or_default().push(entry);
    }

    /// Groups in path order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[BlobEntry])> {
        self.0
            .iter()
            .map(|(blob, entries)| (blob.as_path(), entries.as_slice()))
    }

    /// Entries of one blob.
    #[inline]
    #[must_use]
    pub fn get(&self, blob: &Path) -> Option<&[BlobEntry]> {
        self.0.get(blob).map(Vec::as_slice)
    }

    /// Number of blobs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no blobs.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What to do with a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupPlan {
    /// The single permutation without defines is already the blob's output.
    InPlace,
    /// The entries must be packed.
    Pack,
}

/// Checks that a group can be packed.
///
/// # Errors
/// If a group of several entries has one without defines: its output would be the blob itself.
#[inline]
pub fn validate_group(blob: &Path, entries: &[BlobEntry]) -> Result<GroupPlan, BlobError> {
    match entries {
        [single] if single.defines.is_empty() => Ok(GroupPlan::InPlace),
        _ if entries.iter().any(|entry| entry.defines.is_empty()) => {
            Err(BlobError::EmptyDefines(blob.to_path_buf()))
        }
        _ => Ok(GroupPlan::Pack),
    }
}

/// An error of the blob packer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub enum BlobError {
    /// A group mixes permutations with and without defines.
    #[error(
        "cannot create a blob for shader {} where some permutation(s) have no definitions",
        .0.display()
    )]
    EmptyDefines(PathBuf),
    /// The blob file couldn't be created.
    #[error("can't open output file {}: {source}", .file.display())]
    Create {
        /// The blob file.
        file: PathBuf,
        /// Source of the error.
        source: io::Error,
    },
    /// A compiled permutation couldn't be read.
    #[error("can't read compiled permutation {}: {source}", .file.display())]
    ReadPermutation {
        /// The permutation file.
        file: PathBuf,
        /// Source of the error.
        source: io::Error,
    },
    /// Writing into the blob failed.
    #[error("can't write output file {}: {source}", .file.display())]
    Write {
        /// The blob file.
        file: PathBuf,
        /// Source of the error.
        source: io::Error,
    },
    /// The data doesn't start with [`BLOB_SIGNATURE`].
    #[error("not a shader blob")]
    BadSignature,
    /// The data ends inside a record.
    #[error("shader blob is truncated at byte {0}")]
    Truncated(usize),
    /// A record key isn't UTF-8.
    #[error("key of the blob record at byte {0} is not UTF-8")]
    InvalidKey(usize),
}

/// Binary or C-array rendering of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BlobFormat {
    /// Raw bytes.
    Binary,
    /// A `const uint8_t` array in a header.
    Text,
}

/// Writes blob records in either format.
#[derive(Debug)]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub struct BlobWriter<W: Write> {
    inner: W,
    format: BlobFormat,
    /// Characters on the current text line.
    line_length: usize,
}

impl<W: Write> BlobWriter<W> {
    /// Starts a binary blob, writing its signature.
    ///
    /// # Errors
    /// Any IO error.
    #[inline]
    pub fn binary(inner: W) -> io::Result<Self> {
        let mut writer = Self {
            inner,
            format: BlobFormat::Binary,
            line_length: 0,
        };
        writer.write_bytes(&BLOB_SIGNATURE)?;
        Ok(writer)
    }

    /// Starts a text blob declaring the array `symbol`, writing its signature.
    ///
    /// # Errors
    /// Any IO error.
    #[inline]
    pub fn text(mut inner: W, symbol: &str) -> io::Result<Self> {
        write!(inner, "const uint8_t {symbol}[] = {{")?;
        let mut writer = Self {
            inner,
            format: BlobFormat::Text,
            // start the first byte on a fresh line
            line_length: TEXT_LINE_WIDTH + 1,
        };
        writer.write_bytes(&BLOB_SIGNATURE)?;
        Ok(writer)
    }

    /// Writes one record.
    ///
    /// # Errors
    /// Any IO error, or if the key or payload is 4 GiB or larger.
    #[inline]
    pub fn write_entry(&mut self, key: &str, payload: &[u8]) -> io::Result<()> {
        let key_len = record_len(key.len())?;
        let data_len = record_len(payload.len())?;
        self.write_bytes(&key_len.to_le_bytes())?;
        self.write_bytes(&data_len.to_le_bytes())?;
        self.write_bytes(key.as_bytes())?;
        self.write_bytes(payload)
    }

    /// Closes the array of a text blob and flushes.
    ///
    /// # Errors
    /// Any IO error.
    #[inline]
    pub fn finish(mut self) -> io::Result<W> {
        if self.format == BlobFormat::Text {
            self.inner.write_all(b"\n};\n")?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.format {
            BlobFormat::Binary => self.inner.write_all(bytes),
            BlobFormat::Text => {
                for byte in bytes {
                    if self.line_length > TEXT_LINE_WIDTH {
                        self.inner.write_all(b"\n    ")?;
                        self.line_length = 0;
                    }
                    write!(self.inner, "{byte}, ")?;
                    self.line_length += match byte {
                        0..=9 => 3,
                        10..=99 => 4,
                        _ => 5,
                    };
                }
                Ok(())
            }
        }
    }
}

fn record_len(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_err| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("blob record of {len} bytes is too large"),
        )
    })
}

/// Reads the records of a binary blob, in order.
///
/// # Errors
/// If the signature is wrong, the data is truncated or a key isn't UTF-8.
#[inline]
pub fn read_blob(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, BlobError> {
    let Some(mut rest) = bytes.strip_prefix(BLOB_SIGNATURE.as_slice()) else {
        return Err(BlobError::BadSignature);
    };

    let mut records = Vec::new();
    while !rest.is_empty() {
        let offset = bytes.len() - rest.len();
        let (key_len, data_len, body) = match rest {
            [k0, k1, k2, k3, d0, d1, d2, d3, body @ ..] => (
                u32::from_le_bytes([*k0, *k1, *k2, *k3]),
                u32::from_le_bytes([*d0, *d1, *d2, *d3]),
                body,
            ),
            _ => return Err(BlobError::Truncated(offset)),
        };
        let key_len = usize::try_from(key_len).map_err(|_err| BlobError::Truncated(offset))?;
        let data_len = usize::try_from(data_len).map_err(|_err| BlobError::Truncated(offset))?;
        let Some((key, body)) = body.split_at_checked(key_len) else {
            return Err(BlobError::Truncated(offset));
        };
        let Some((data, body)) = body.split_at_checked(data_len) else {
            return Err(BlobError::Truncated(offset));
        };
        let key = core::str::from_utf8(key).map_err(|_err| BlobError::InvalidKey(offset))?;
        records.push((key.to_owned(), data.to_vec()));
        rest = body;
    }
    Ok(records)
}

/// How the blob pass went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub struct BlobSummary {
    /// Blob files written.
    pub written: usize,
    /// Groups that failed, either validation or IO.
    pub failed: usize,
}

impl BlobSummary {
    /// Whether every group was packed.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Packs every group into the requested blob files.
///
/// Errors are reported through `state`. With continue-on-error the remaining groups are still
/// attempted; otherwise the first error is returned.
///
/// # Errors
/// The first failing group, unless continue-on-error is set.
#[inline]
pub fn pack_blobs(
    options: &Options,
    groups: &BlobGroups,
    state: &RunState,
) -> Result<BlobSummary, BlobError> {
    let mut summary = BlobSummary::default();
    for (blob, entries) in groups.iter() {
        match pack_group(options, blob, entries) {
            Ok(written) => summary.written += written,
            Err(error) => {
                state.report_error(&error);
                summary.failed += 1;
                if !state.continue_on_error() {
                    return Err(error);
                }
            }
        }
    }
    Ok(summary)
}

/// Returns the number of files written.
fn pack_group(options: &Options, blob: &Path, entries: &[BlobEntry]) -> Result<usize, BlobError> {
    if validate_group(blob, entries)? == GroupPlan::InPlace {
        log::debug!("{} needs no packing", blob.display());
        return Ok(0);
    }

    let extension = options.output_extension();
    let mut written = 0;
    if options.binary_blob {
        let file = with_suffix(blob, extension);
        write_blob_file(&file, entries, extension, BlobWriter::binary)?;
        written += 1;
    }
    if options.header_blob {
        let file = with_suffix(blob, &format!("{extension}.h"));
        let symbol = symbol_name(blob, options.platform);
        write_blob_file(&file, entries, extension, |inner| BlobWriter::text(inner, &symbol))?;
        written += 1;
    }

    if !options.binary {
        for entry in entries {
            let intermediate = with_suffix(&entry.permutation, extension);
            if let Err(error) = fs::remove_file(&intermediate) {
                log::warn!("can't remove {}: {error}", intermediate.display());
            }
        }
    }
    Ok(written)
}

fn write_blob_file(
    file: &Path,
    entries: &[BlobEntry],
    extension: &str,
    start: impl FnOnce(BufWriter<File>) -> io::Result<BlobWriter<BufWriter<File>>>,
) -> Result<(), BlobError> {
    let write_error = |source| BlobError::Write {
        file: file.to_path_buf(),
        source,
    };

    let created = File::create(file).map_err(|source| BlobError::Create {
        file: file.to_path_buf(),
        source,
    })?;
    let mut writer = start(BufWriter::new(created)).map_err(write_error)?;
    for entry in entries {
        let permutation = with_suffix(&entry.permutation, extension);
        let payload = fs::read(&permutation).map_err(|source| BlobError::ReadPermutation {
            file: permutation,
            source,
        })?;
        writer
            .write_entry(&entry.defines, &payload)
            .map_err(write_error)?;
    }
    writer.finish().map_err(write_error)?;
    log::debug!("wrote blob {}", file.display());
    Ok(())
}
