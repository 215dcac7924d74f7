//! Single-file model artifact.
//!
//! File format: model.bin
//!
//! Header (57 bytes):
//! - magic: [u8; 4] (`SREC`)
//! - version: u8 (1)
//! - rows: u64 (little-endian)
//! - payload_len: u64 (little-endian)
//! - fingerprint: [u8; 32] (SHA-256 of the body)
//! - checksum: u32 (CRC32 of the header bytes before it)
//!
//! Body:
//! - payload: JSON `{meta, corpus, vector_space, title_index}`, `payload_len` bytes
//! - matrix: `rows * rows` f32 cells (little-endian, row-major)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::corpus::Corpus;
use crate::engine::model::{Model, ModelMeta, FORMAT_VERSION};
use crate::engine::similarity::SimilarityMatrix;
use crate::engine::title_index::TitleIndex;
use crate::engine::vectorizer::VectorSpace;
use crate::errors::{Error, Result};
use crate::storage;

const MAGIC: &[u8; 4] = b"SREC";

/// magic(4) + version(1) + rows(8) + payload_len(8) + fingerprint(32) + checksum(4)
const HEADER_SIZE: usize = 57;

const CHECKSUM_OFFSET: usize = HEADER_SIZE - 4;

#[derive(Serialize)]
struct PayloadRef<'a> {
    meta: &'a ModelMeta,
    corpus: &'a Corpus,
    vector_space: &'a VectorSpace,
    title_index: &'a TitleIndex,
}

#[derive(Deserialize)]
struct Payload {
    meta: ModelMeta,
    corpus: Corpus,
    vector_space: VectorSpace,
    title_index: TitleIndex,
}

#[derive(Debug)]
struct Header {
    version: u8,
    rows: u64,
    payload_len: u64,
    fingerprint: [u8; 32],
}

/// Reads and writes the model artifact at a fixed path.
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist `model`.
    ///
    /// Uses atomic write: temp file in the same directory -> fsync -> rename.
    /// On failure the previous artifact, if any, is left as it was.
    pub fn save(&self, model: &Model) -> Result<()> {
        let bytes = encode(model)?;
        storage::write_atomic(&self.path, &bytes)?;

        log::info!(
            "saved model artifact to {} ({} bytes)",
            self.path.display(),
            bytes.len()
        );
        Ok(())
    }

    /// Read and fully validate the artifact.
    ///
    /// A missing file is an I/O error; anything unreadable after that is
    /// `CorruptArtifact`.
    pub fn load(&self) -> Result<Model> {
        let bytes = std::fs::read(&self.path)?;
        let model = decode(&bytes)?;

        log::info!(
            "loaded model artifact from {} ({} rows, built {})",
            self.path.display(),
            model.rows(),
            model.meta().built_at
        );
        Ok(model)
    }
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::CorruptArtifact(msg.into())
}

fn encode(model: &Model) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(&PayloadRef {
        meta: model.meta(),
        corpus: model.corpus(),
        vector_space: model.vector_space(),
        title_index: model.title_index(),
    })
    .map_err(|err| Error::BuildFailure(format!("cannot serialize model: {err}")))?;

    Ok(frame(model.rows() as u64, &payload, model.matrix().cells()))
}

/// Lay out header and body for already-serialized parts.
fn frame(rows: u64, payload: &[u8], cells: &[f32]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + cells.len() * 4);
    body.extend_from_slice(payload);
    for cell in cells {
        body.extend_from_slice(&cell.to_le_bytes());
    }

    let digest = fingerprint(&body);

    let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(&rows.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&digest);
    let checksum = crc32fast::hash(&bytes[..CHECKSUM_OFFSET]);
    bytes.extend_from_slice(&checksum.to_le_bytes());

    bytes.extend_from_slice(&body);
    bytes
}

fn fingerprint(body: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(body));
    out
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn read_header(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < HEADER_SIZE {
        return Err(corrupt(format!(
            "file is {} bytes, shorter than the header",
            bytes.len()
        )));
    }
    if &bytes[0..4] != MAGIC {
        return Err(corrupt("not a model artifact (bad magic)"));
    }

    let mut stored = [0u8; 4];
    stored.copy_from_slice(&bytes[CHECKSUM_OFFSET..HEADER_SIZE]);
    if u32::from_le_bytes(stored) != crc32fast::hash(&bytes[..CHECKSUM_OFFSET]) {
        return Err(corrupt("header checksum mismatch"));
    }

    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&bytes[21..53]);

    Ok(Header {
        version: bytes[4],
        rows: read_u64(bytes, 5),
        payload_len: read_u64(bytes, 13),
        fingerprint,
    })
}

fn decode(bytes: &[u8]) -> Result<Model> {
    let header = read_header(bytes)?;
    if header.version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "format version {} is not supported (expected {FORMAT_VERSION})",
            header.version
        )));
    }

    let body = &bytes[HEADER_SIZE..];
    let cell_bytes = header
        .rows
        .checked_mul(header.rows)
        .and_then(|cells| cells.checked_mul(4))
        .ok_or_else(|| corrupt(format!("row count {} overflows", header.rows)))?;
    let expected = header
        .payload_len
        .checked_add(cell_bytes)
        .ok_or_else(|| corrupt("payload length overflows"))?;
    if body.len() as u64 != expected {
        return Err(corrupt(format!(
            "body is {} bytes, header describes {expected}",
            body.len()
        )));
    }

    if fingerprint(body) != header.fingerprint {
        return Err(corrupt("body fingerprint mismatch"));
    }

    // lengths are bounded by body.len() from here on
    let payload_len = header.payload_len as usize;
    let rows = header.rows as usize;

    let payload: Payload = serde_json::from_slice(&body[..payload_len])
        .map_err(|err| corrupt(format!("cannot decode payload: {err}")))?;

    let cells = body[payload_len..]
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    let matrix = SimilarityMatrix::from_cells(rows, cells).map_err(corrupt)?;

    Model::from_parts(
        payload.meta,
        payload.corpus,
        payload.vector_space,
        matrix,
        payload.title_index,
    )
    .map_err(corrupt)
}
