//! Binary persistence primitives and on-disk layout.
//!
//! Regions and networks are stored as compact little-endian records under
//! a storage root, one directory per seed:
//!
//! ```text
//! <root>/regions/<seed>/<x>x<y>.rr
//! <root>/networks/<seed>/<x>x<y>.rn
//! ```
//!
//! Angles and integrity are stored as fixed-point `i16` values with three
//! decimal places; readers divide by 1000 on load.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Error type for persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying IO failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The file exists but does not decode as a valid record.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

const REGION_DIR: &str = "regions";
const NETWORK_DIR: &str = "networks";
const REGION_EXT: &str = "rr";
const NETWORK_EXT: &str = "rn";

/// Path of a region file for the given seed and region coordinate.
pub fn region_path(root: &Path, seed: i64, x: i16, y: i16) -> PathBuf {
    root.join(REGION_DIR)
        .join(seed.to_string())
        .join(format!("{x}x{y}.{REGION_EXT}"))
}

/// Path of a network file for the given seed and origin coordinate.
pub fn network_path(root: &Path, seed: i64, x: i32, y: i32) -> PathBuf {
    root.join(NETWORK_DIR)
        .join(seed.to_string())
        .join(format!("{x}x{y}.{NETWORK_EXT}"))
}

/// Deletes all persisted regions and networks for every seed.
///
/// Coarse invalidation for when terrain-affecting configuration changes:
/// stored data for any seed would no longer match the terrain.
pub fn delete_all(root: &Path) -> StoreResult<()> {
    for dir in [REGION_DIR, NETWORK_DIR] {
        match fs::remove_dir_all(root.join(dir)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Little-endian record writer.
pub struct ByteWriter<W: Write> {
    inner: W,
}

impl ByteWriter<BufWriter<File>> {
    /// Creates the file (and its parent directories) for writing.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            inner: BufWriter::new(File::create(path)?),
        })
    }
}

impl<W: Write> ByteWriter<W> {
    /// Wraps an arbitrary writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_u8(&mut self, v: u8) -> io::Result<()> {
        self.inner.write_all(&[v])
    }

    pub fn write_i16(&mut self, v: i16) -> io::Result<()> {
        self.inner.write_all(&v.to_le_bytes())
    }

    pub fn write_u16(&mut self, v: u16) -> io::Result<()> {
        self.inner.write_all(&v.to_le_bytes())
    }

    pub fn write_i32(&mut self, v: i32) -> io::Result<()> {
        self.inner.write_all(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> io::Result<()> {
        self.inner.write_all(&v.to_le_bytes())
    }

    /// Writes a float as fixed-point with three decimal places.
    pub fn write_fixed(&mut self, v: f32) -> io::Result<()> {
        self.write_i16((v * 1000.0).round() as i16)
    }

    /// Flushes buffered output.
    pub fn finish(mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Little-endian record reader.
pub struct ByteReader<R: Read> {
    inner: R,
}

impl ByteReader<BufReader<File>> {
    /// Opens a file for reading.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            inner: BufReader::new(File::open(path)?),
        })
    }
}

impl<R: Read> ByteReader<R> {
    /// Wraps an arbitrary reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        let mut buf = [0; 2];
        self.inner.read_exact(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        let mut buf = [0; 2];
        self.inner.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads a fixed-point value back into a float.
    pub fn read_fixed(&mut self) -> io::Result<f32> {
        Ok(self.read_i16()? as f32 / 1000.0)
    }

    /// Reads a record count, rejecting values that cannot be valid.
    pub fn read_count(&mut self, what: &str) -> StoreResult<usize> {
        let n = self.read_i32()?;
        if !(0..=10_000_000).contains(&n) {
            return Err(StoreError::Corrupt(format!("bad {what} count: {n}")));
        }
        Ok(n as usize)
    }
}
