//! Splits upload sources into bounded-size chunks.
//!
//! A [Chunker] flattens one or more sources (in-memory blobs, serialized
//! directory listings, local files) into a single lazy sequence of
//! [Chunk]s, restricted to a caller-supplied set of digests that still
//! need uploading. Sources outside that set are dropped entirely and
//! produce zero chunks.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use prost::Message;
use tokio::io::AsyncReadExt;

use crate::digests;
use crate::proto::{Digest, Directory};
use crate::tree::{InputDigestCache, InputFile};

/// Default upper bound on the bytes carried by one chunk, keeping
/// individual RPC messages well below common gRPC message size limits.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// One bounded slice of a source blob.
///
/// Chunks for a source are produced in strictly increasing, contiguous
/// offset order; the last one satisfies
/// `offset + data.len() == digest.size_bytes`.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub digest: Digest,
    pub offset: u64,
    pub data: Bytes,
}

#[derive(Debug)]
enum Source {
    Bytes { digest: Digest, data: Bytes },
    File { digest: Digest, path: PathBuf },
}

impl Source {
    fn digest(&self) -> &Digest {
        match self {
            Source::Bytes { digest, .. } => digest,
            Source::File { digest, .. } => digest,
        }
    }
}

#[derive(Debug)]
enum OpenKind {
    Bytes { data: Bytes, pos: usize },
    File { file: tokio::fs::File },
}

#[derive(Debug)]
struct OpenSource {
    digest: Digest,
    offset: u64,
    kind: OpenKind,
}

/// Configures the sources of a [Chunker].
#[derive(Default)]
pub struct ChunkerBuilder {
    sources: Vec<PendingSource>,
    needed: Option<HashSet<Digest>>,
    chunk_size: Option<usize>,
}

enum PendingSource {
    Ready(Source),
    /// A file whose digest is computed when the chunker is built.
    UnhashedFile(PathBuf),
}

impl ChunkerBuilder {
    /// Adds an in-memory blob; its digest is computed immediately.
    pub fn add_blob(mut self, data: Bytes) -> Self {
        let digest = digests::compute(&data);
        self.sources
            .push(PendingSource::Ready(Source::Bytes { digest, data }));
        self
    }

    /// Adds a serialized directory listing, treated as an in-memory blob.
    pub fn add_directory(self, directory: &Directory) -> Self {
        self.add_blob(directory.encode_to_vec().into())
    }

    /// Adds a local file. Its digest is computed (streaming) at
    /// [ChunkerBuilder::build] time.
    pub fn add_file(mut self, path: PathBuf) -> Self {
        self.sources.push(PendingSource::UnhashedFile(path));
        self
    }

    /// Adds a local file whose digest is already known, avoiding a read
    /// at build time.
    pub fn add_file_with_digest(mut self, path: PathBuf, digest: Digest) -> Self {
        self.sources
            .push(PendingSource::Ready(Source::File { digest, path }));
        self
    }

    /// Adds an input file resolved against the execution root, taking its
    /// digest from the externally maintained fingerprint cache.
    pub fn add_input(
        self,
        input: &InputFile,
        input_cache: &dyn InputDigestCache,
        exec_root: &Path,
    ) -> io::Result<Self> {
        let digest = input_cache.digest_for(input)?;
        Ok(self.add_file_with_digest(exec_root.join(&input.path), digest))
    }

    /// Restricts the chunker to sources whose digest is in `needed`;
    /// everything else is dropped and yields zero chunks.
    pub fn only_use_digests(mut self, needed: HashSet<Digest>) -> Self {
        self.needed = Some(needed);
        self
    }

    /// Overrides the per-chunk size bound (defaults to
    /// [DEFAULT_CHUNK_SIZE]).
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub async fn build(self) -> io::Result<Chunker> {
        let mut sources = VecDeque::with_capacity(self.sources.len());
        for pending in self.sources {
            let source = match pending {
                PendingSource::Ready(source) => source,
                PendingSource::UnhashedFile(path) => {
                    let digest = digests::compute_for_file(&path).await?;
                    Source::File { digest, path }
                }
            };
            if let Some(needed) = &self.needed {
                if !needed.contains(source.digest()) {
                    continue;
                }
            }
            sources.push_back(source);
        }
        Ok(Chunker {
            sources,
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            current: None,
        })
    }
}

/// A lazy, single-pass, non-restartable chunk sequence over a fixed list
/// of sources. Files are opened only when their first chunk is produced.
#[derive(Debug)]
pub struct Chunker {
    sources: VecDeque<Source>,
    chunk_size: usize,
    current: Option<OpenSource>,
}

impl Chunker {
    pub fn builder() -> ChunkerBuilder {
        ChunkerBuilder::default()
    }

    /// Produces the next chunk, moving on to the next source once the
    /// current one is exhausted. A source of size `S` yields
    /// `ceil(S / chunk_size)` chunks; in particular an empty source
    /// yields none.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Chunk>> {
        loop {
            match self.current.take() {
                None => match self.sources.pop_front() {
                    None => return Ok(None),
                    Some(source) => {
                        if source.digest().size_bytes == 0 {
                            continue;
                        }
                        self.current = Some(Self::open(source).await?);
                    }
                },
                Some(mut open) => {
                    let size = open.digest.size_bytes as u64;
                    let want = std::cmp::min(self.chunk_size as u64, size - open.offset) as usize;
                    let data = match &mut open.kind {
                        OpenKind::Bytes { data, pos } => {
                            let slice = data.slice(*pos..*pos + want);
                            *pos += want;
                            slice
                        }
                        OpenKind::File { file } => {
                            let mut buf = vec![0u8; want];
                            // UnexpectedEof here means the file shrank
                            // after its digest was taken.
                            file.read_exact(&mut buf).await?;
                            buf.into()
                        }
                    };
                    let chunk = Chunk {
                        digest: open.digest.clone(),
                        offset: open.offset,
                        data,
                    };
                    open.offset += want as u64;
                    if open.offset < size {
                        self.current = Some(open);
                    }
                    return Ok(Some(chunk));
                }
            }
        }
    }

    /// Abandons the remainder of the current source; the next call to
    /// [Chunker::next_chunk] begins the following source. Used to recover
    /// from a mid-stream transport error without re-deriving the whole
    /// chunk plan.
    pub fn skip_current_source(&mut self) {
        self.current = None;
    }

    async fn open(source: Source) -> io::Result<OpenSource> {
        Ok(match source {
            Source::Bytes { digest, data } => OpenSource {
                digest,
                offset: 0,
                kind: OpenKind::Bytes { data, pos: 0 },
            },
            Source::File { digest, path } => OpenSource {
                digest,
                offset: 0,
                kind: OpenKind::File {
                    file: tokio::fs::File::open(&path).await?,
                },
            },
        })
    }
}
