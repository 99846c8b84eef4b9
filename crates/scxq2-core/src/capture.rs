//! In-process capture service.
//!
//! The service is an explicit context object: whoever dispatches calls owns
//! it and passes it by reference. Streams live until [`CaptureService::reset`]
//! or [`CaptureService::reset_all`] is called at an epoch boundary.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scxq2_canonical::{ProofHash, SessionId};
use scxq2_journal::{Frame, FramePayload, HeaderPayload, TerminatorPayload, SPEC_VERSION};
use serde::Serialize;
use serde_json::Value;

use crate::chain::link;
use crate::errors::CoreError;

/// Names one stream. Cheap to clone; ordering follows creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamHandle {
    seq: u64,
    id: String,
}

impl StreamHandle {
    /// Stream id, `{session_id}:{counter}`.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Deep copy of one stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSnapshot {
    /// Stream id.
    pub stream_id: String,
    /// Whether the stream has been ended.
    pub closed: bool,
    /// Chain hash frozen by `end`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_hash: Option<ProofHash>,
    /// Frames in append order.
    pub frames: Vec<Frame>,
}

#[derive(Debug)]
struct Stream {
    id: String,
    frames: Vec<Frame>,
    next_tick: u32,
    next_call_id: u32,
    head: Option<ProofHash>,
    end_hash: Option<ProofHash>,
}

impl Stream {
    fn closed(&self) -> bool {
        self.end_hash.is_some()
    }

    fn append(&mut self, payload: FramePayload) -> Result<Frame, CoreError> {
        let chain = link(self.head, &payload)?;
        let frame = Frame {
            tick: self.next_tick,
            payload,
            chain: Some(chain),
        };
        self.next_tick = self.next_tick.saturating_add(1);
        self.head = Some(chain);
        self.frames.push(frame.clone());
        Ok(frame)
    }

    fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            stream_id: self.id.clone(),
            closed: self.closed(),
            end_hash: self.end_hash,
            frames: self.frames.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    counter: u64,
    streams: BTreeMap<u64, Arc<Mutex<Stream>>>,
}

/// Append-only, per-stream frame log.
///
/// Each stream has its own lock; the table lock is only held to look a
/// stream up, never while appending.
///
/// # Example
///
/// ```rust
/// use scxq2_canonical::SessionId;
/// use scxq2_core::CaptureService;
/// use scxq2_journal::{FramePayload, SeedPayload};
/// use serde_json::json;
///
/// let service = CaptureService::new(SessionId::parse("sess")?);
/// let stream = service.begin(json!({}))?;
/// assert_eq!(stream.id(), "sess:0");
///
/// service.capture(&stream, FramePayload::Seed(SeedPayload {
///     pack_hash: "h:00000001".into(),
///     seed: 7,
/// }))?;
/// let end_hash = service.end(&stream, json!({}))?;
///
/// let snapshot = service.export(&stream)?;
/// assert_eq!(snapshot.frames.len(), 3);
/// assert_eq!(snapshot.end_hash, end_hash);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct CaptureService {
    session_id: SessionId,
    table: Mutex<Table>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CaptureService {
    /// Creates an empty service for one session.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            table: Mutex::new(Table::default()),
        }
    }

    /// Session id used to derive stream ids.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Opens a stream and appends its header frame.
    ///
    /// A string `policy_hash` in `meta` is copied into the header.
    pub fn begin(&self, meta: Value) -> Result<StreamHandle, CoreError> {
        let (handle, stream) = {
            let mut table = lock(&self.table);
            let seq = table.counter;
            table.counter += 1;
            let id = format!("{}:{}", self.session_id, seq);
            let stream = Arc::new(Mutex::new(Stream {
                id: id.clone(),
                frames: Vec::new(),
                next_tick: 0,
                next_call_id: 0,
                head: None,
                end_hash: None,
            }));
            table.streams.insert(seq, Arc::clone(&stream));
            (StreamHandle { seq, id }, stream)
        };

        let policy_hash = meta
            .get("policy_hash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        lock(&stream).append(FramePayload::Header(HeaderPayload {
            spec_v: SPEC_VERSION.to_string(),
            stream_id: handle.id.clone(),
            policy_hash,
            meta,
        }))?;
        tracing::debug!(stream = %handle, "stream opened");
        Ok(handle)
    }

    fn stream(&self, handle: &StreamHandle) -> Result<Arc<Mutex<Stream>>, CoreError> {
        lock(&self.table)
            .streams
            .get(&handle.seq)
            .cloned()
            .ok_or_else(|| CoreError::UnknownStream(handle.id.clone()))
    }

    /// Looks up a retained stream by id.
    pub fn find(&self, stream_id: &str) -> Option<StreamHandle> {
        lock(&self.table).streams.iter().find_map(|(seq, stream)| {
            let id = lock(stream).id.clone();
            (id == stream_id).then_some(StreamHandle { seq: *seq, id })
        })
    }

    /// Handles of every retained stream, in creation order.
    pub fn handles(&self) -> Vec<StreamHandle> {
        lock(&self.table)
            .streams
            .iter()
            .map(|(seq, stream)| StreamHandle {
                seq: *seq,
                id: lock(stream).id.clone(),
            })
            .collect()
    }

    /// Handles of streams that have not been ended, in creation order.
    pub fn open_handles(&self) -> Vec<StreamHandle> {
        lock(&self.table)
            .streams
            .iter()
            .filter_map(|(seq, stream)| {
                let stream = lock(stream);
                (!stream.closed()).then(|| StreamHandle {
                    seq: *seq,
                    id: stream.id.clone(),
                })
            })
            .collect()
    }

    /// Appends a frame to one stream.
    ///
    /// Returns the appended frame, or `None` if the stream is closed.
    pub fn capture(
        &self,
        handle: &StreamHandle,
        payload: FramePayload,
    ) -> Result<Option<Frame>, CoreError> {
        let stream = self.stream(handle)?;
        let mut stream = lock(&stream);
        if stream.closed() {
            tracing::trace!(
                stream = %handle,
                kind = payload.kind().name(),
                "capture into closed stream ignored"
            );
            return Ok(None);
        }
        stream.append(payload).map(Some)
    }

    /// Appends the same frame to every open stream, in creation order.
    ///
    /// Returns the number of streams that received it.
    pub fn broadcast(&self, payload: FramePayload) -> Result<usize, CoreError> {
        let streams: Vec<Arc<Mutex<Stream>>> =
            lock(&self.table).streams.values().cloned().collect();
        let mut delivered = 0;
        for stream in streams {
            let mut stream = lock(&stream);
            if stream.closed() {
                continue;
            }
            stream.append(payload.clone())?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Allocates the next call id for a stream, starting at 1.
    pub fn next_call_id(&self, handle: &StreamHandle) -> Result<u32, CoreError> {
        let stream = self.stream(handle)?;
        let mut stream = lock(&stream);
        stream.next_call_id = stream.next_call_id.saturating_add(1);
        Ok(stream.next_call_id)
    }

    /// Appends the terminator, freezes the chain hash, and closes the stream.
    ///
    /// The frozen hash is the link over every frame before the terminator.
    /// Ending a closed stream is a no-op that returns the frozen hash.
    pub fn end(&self, handle: &StreamHandle, meta: Value) -> Result<Option<ProofHash>, CoreError> {
        let stream = self.stream(handle)?;
        let mut stream = lock(&stream);
        if stream.closed() {
            return Ok(stream.end_hash);
        }
        let final_hash = stream.head.unwrap_or(ProofHash::ZERO);
        let frame_count = u32::try_from(stream.frames.len()).unwrap_or(u32::MAX);
        stream.append(FramePayload::Terminator(TerminatorPayload {
            final_chain_hash: final_hash.to_string(),
            frame_count,
            meta,
        }))?;
        stream.end_hash = Some(final_hash);
        tracing::debug!(
            stream = %handle,
            frames = frame_count,
            end_hash = %final_hash,
            "stream closed"
        );
        Ok(Some(final_hash))
    }

    /// Deep copy of one stream.
    pub fn export(&self, handle: &StreamHandle) -> Result<StreamSnapshot, CoreError> {
        let stream = self.stream(handle)?;
        let snapshot = lock(&stream).snapshot();
        Ok(snapshot)
    }

    /// Deep copies of every retained stream, in creation order.
    pub fn export_all(&self) -> Vec<StreamSnapshot> {
        let streams: Vec<Arc<Mutex<Stream>>> =
            lock(&self.table).streams.values().cloned().collect();
        streams.iter().map(|s| lock(s).snapshot()).collect()
    }

    /// Drops one stream. Returns whether it was retained.
    pub fn reset(&self, handle: &StreamHandle) -> bool {
        let removed = lock(&self.table).streams.remove(&handle.seq).is_some();
        if removed {
            tracing::debug!(stream = %handle, "stream reset");
        }
        removed
    }

    /// Drops every stream. Stream ids are never reused afterwards.
    pub fn reset_all(&self) -> usize {
        let mut table = lock(&self.table);
        let count = table.streams.len();
        table.streams.clear();
        tracing::debug!(streams = count, "capture epoch reset");
        count
    }
}
