// Append-only record log.
//
// Frame layout: `[frame_len: u32][crc32: u32][id: u64][date: u32][record]`
// where `frame_len` counts the id and record bytes. The checksum covers the
// same span. Like the record payloads, frames are host-endian and not
// portable; the log is a single-machine recovery artifact.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::common::IdT;
use crate::error::Result;

use super::record::RecordSink;

const FRAME_HEADER: usize = 8; // frame_len + crc32
const ID_BYTES: usize = 12; // u64 id + u32 date

/// Counters reported by a replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: u64,
    pub skipped: u64,
}

/// Durable, append-only log of encoded records.
///
/// Appends are serialized by a mutex and flushed per record. Replay streams
/// frames to a callback; a corrupt frame is skipped (its length is still
/// trusted), a truncated tail ends the replay.
pub struct RecordLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl RecordLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        info!(path = %path.display(), "record log opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, id: IdT, record: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(FRAME_HEADER + ID_BYTES + record.len());
        frame.put_u32_ne((ID_BYTES + record.len()) as u32);

        let mut body = Vec::with_capacity(ID_BYTES + record.len());
        body.put_u64_ne(id.id);
        body.put_u32_ne(id.date);
        body.put_slice(record);

        frame.put_u32_ne(crc32fast::hash(&body));
        frame.extend_from_slice(&body);

        let mut file = self.file.lock();
        file.write_all(&frame)?;
        file.flush()?;
        Ok(())
    }

    /// Replays every frame through `on_record`. Callback failures count the
    /// record as skipped and the replay continues; only a truncated tail
    /// stops it.
    pub fn load(
        &self,
        mut on_record: impl FnMut(IdT, &[u8]) -> Result<()>,
    ) -> Result<LoadStats> {
        let mut bytes = Vec::new();
        File::open(&self.path)?.read_to_end(&mut bytes)?;
        let mut buf = bytes.as_slice();

        let mut stats = LoadStats::default();
        while buf.remaining() >= FRAME_HEADER {
            let frame_len = buf.get_u32_ne() as usize;
            let checksum = buf.get_u32_ne();
            if frame_len < ID_BYTES || buf.remaining() < frame_len {
                warn!("record log ends with a truncated frame; stopping replay");
                break;
            }
            let body = &buf[..frame_len];
            buf.advance(frame_len);

            if crc32fast::hash(body) != checksum {
                error!("record log frame failed its checksum; record skipped");
                stats.skipped += 1;
                continue;
            }

            let mut body = body;
            let id = IdT::new(body.get_u64_ne(), body.get_u32_ne());
            match on_record(id, body) {
                Ok(()) => stats.loaded += 1,
                Err(err) => {
                    error!(record = %id, %err, "record failed to restore; skipped");
                    stats.skipped += 1;
                }
            }
        }
        if buf.has_remaining() {
            warn!(trailing = buf.remaining(), "record log has trailing bytes");
        }
        info!(loaded = stats.loaded, skipped = stats.skipped, "record log replayed");
        Ok(stats)
    }
}

impl RecordSink for RecordLog {
    fn save(&self, id: IdT, record: &[u8]) {
        if let Err(err) = self.append(id, record) {
            error!(record = %id, %err, "record log append failed");
        }
    }
}
