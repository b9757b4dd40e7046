//! Append-only choice log of binary protobuf frames.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Strict append only; frames are never rewritten or reordered
//!   - fsync after every write
//!   - Sequence strictly increasing from 1 (validated on append and load)

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ceo_engine::events::ChoiceEnvelope;
use prost::Message;

use crate::error::RuntimeError;
use crate::proto_bridge::{choice_to_proto, proto_to_choice};
use crate::proto_types::ProtoChoiceEnvelope;

const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Append-only choice log backed by a binary file.
#[derive(Debug)]
pub struct ChoiceLog {
    path: PathBuf,
    last_sequence: u64,
}

impl ChoiceLog {
    /// Open or create a log. Existing frames are read once to find the
    /// last sequence number.
    pub fn open(path: &Path) -> Result<Self, RuntimeError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let last_sequence = if path.exists() {
            read_frames(path)?.last().map(|e| e.sequence).unwrap_or(0)
        } else {
            0
        };
        Ok(Self {
            path: path.to_path_buf(),
            last_sequence,
        })
    }

    pub fn append(&mut self, envelope: &ChoiceEnvelope) -> Result<(), RuntimeError> {
        let expected = self.last_sequence + 1;
        if envelope.sequence != expected {
            return Err(RuntimeError::SequenceViolation {
                expected,
                actual: envelope.sequence,
            });
        }

        let buf = choice_to_proto(envelope).encode_to_vec();
        let len = buf.len() as u32;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        {
            let mut writer = BufWriter::new(&mut file);
            writer.write_all(&len.to_le_bytes())?;
            writer.write_all(&buf)?;
            writer.flush()?;
        }
        file.sync_all()?;

        self.last_sequence = envelope.sequence;
        tracing::debug!(
            target: "ceo_runtime::choice_log",
            sequence = envelope.sequence,
            bytes = buf.len(),
            "choice.appended"
        );
        Ok(())
    }

    /// Every recorded choice, in sequence order.
    pub fn load_all(&self) -> Result<Vec<ChoiceEnvelope>, RuntimeError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_frames(&self.path)
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn corrupt(index: usize, reason: impl Into<String>) -> RuntimeError {
    RuntimeError::CorruptFrame {
        index,
        reason: reason.into(),
    }
}

/// Read up to a full length prefix. Returns how many bytes arrived before
/// end of file.
fn fill_prefix(reader: &mut impl Read, buf: &mut [u8; 4]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read every frame, checking lengths and the 1, 2, 3... sequence.
fn read_frames(path: &Path) -> Result<Vec<ChoiceEnvelope>, RuntimeError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut choices: Vec<ChoiceEnvelope> = Vec::new();
    let mut len_buf = [0u8; 4];

    loop {
        let index = choices.len();
        match fill_prefix(&mut reader, &mut len_buf)? {
            0 => break,
            4 => {}
            n => return Err(corrupt(index, format!("torn length prefix ({n} of 4 bytes)"))),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len == 0 || len > MAX_FRAME_LEN {
            return Err(corrupt(index, format!("invalid frame length {len}")));
        }
        let mut frame = vec![0u8; len];
        reader
            .read_exact(&mut frame)
            .map_err(|e| corrupt(index, format!("truncated frame: {e}")))?;

        let proto = ProtoChoiceEnvelope::decode(frame.as_slice())?;
        let envelope = proto_to_choice(&proto)?;
        let expected = index as u64 + 1;
        if envelope.sequence != expected {
            return Err(corrupt(
                index,
                format!("sequence {} where {expected} was expected", envelope.sequence),
            ));
        }
        choices.push(envelope);
    }

    Ok(choices)
}
