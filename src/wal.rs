use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Write one framed entry: `[u32 len][payload][u32 crc32]`, little-endian.
fn write_frame(out: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "wal entry too large"))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

/// Fill `buf` completely. `Ok(false)` means the file ended first.
fn fill(input: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match input.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

fn read_u32(input: &mut impl Read) -> io::Result<Option<u32>> {
    let mut buf = [0u8; 4];
    Ok(fill(input, &mut buf)?.then(|| u32::from_le_bytes(buf)))
}

/// Read the next intact entry. `None` at end of file or at the first
/// torn or corrupt frame.
fn read_frame(input: &mut impl Read) -> io::Result<Option<Event>> {
    let Some(len) = read_u32(input)? else {
        return Ok(None);
    };
    let mut payload = vec![0u8; len as usize];
    if !fill(input, &mut payload)? {
        return Ok(None);
    }
    match read_u32(input)? {
        Some(crc) if crc == crc32fast::hash(&payload) => {}
        _ => return Ok(None),
    }
    Ok(bincode::deserialize(&payload).ok())
}

/// Append-only log of room and booking creations.
///
/// Each entry is framed as `[u32 len][bincode Event][u32 crc32]`, where
/// `len` counts only the payload. A crash mid-write leaves a torn final
/// frame, which replay drops.
///
/// The catalog is create-only, so every entry stays live and the log is
/// never compacted.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends: u64,
}

impl Wal {
    /// Open `path` for appending, creating it if missing.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends: 0,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer an entry. Nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        write_frame(&mut self.writer, event)?;
        self.appends += 1;
        Ok(())
    }

    /// Push buffered entries to the file and fsync.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries appended through this handle since it was opened.
    pub fn appends(&self) -> u64 {
        self.appends
    }

    /// Every intact entry in `path`, in append order. A missing file is an
    /// empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let mut reader = match File::open(path) {
            Ok(f) => BufReader::new(f),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut events = Vec::new();
        while let Some(event) = read_frame(&mut reader)? {
            events.push(event);
        }
        Ok(events)
    }
}
