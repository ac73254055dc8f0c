//! Blocking-style consumer API over an [`AlcObjectReassembler`] (spec
//! §6): `alc_recv`, `alc_recv_any`, `alc_recv_to_temp`, `fdt_recv`.
//! "Blocking" here means an async task suspends on a [`tokio::sync::Notify`]
//! until a matching completion or the owning channel closes, mirroring the
//! original's thread-blocking receive calls without tying up an OS thread.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::sync::{Mutex, Notify};

use crate::error::Error;
use crate::object::{ObjectKind, Toi, FDT_TOI};
use crate::reassembler::{AlcObjectReassembler, IngestOutcome};
use atsc3_buffer::Telemetry;

pub type AlcRecvResult<T> = std::result::Result<T, Error>;

/// Maps an [`Error`] to the spec §6 return code: 0 success (not
/// representable here since success carries a payload), -1 session
/// closed, -2 incomplete at close, -3 malformed/other.
pub fn error_code(err: &Error) -> i32 {
    match err {
        Error::SessionClosed => -1,
        Error::Incomplete => -2,
        _ => -3,
    }
}

/// Owns the reassembly state for one ALC sub-flow and the synchronization
/// primitives consumer calls suspend on.
pub struct AlcStore {
    session_id: String,
    reassembler: Mutex<AlcObjectReassembler>,
    notify: Notify,
    closed: std::sync::atomic::AtomicBool,
}

impl AlcStore {
    pub fn new(session_id: impl Into<String>, telemetry: Telemetry) -> Self {
        Self {
            session_id: session_id.into(),
            reassembler: Mutex::new(AlcObjectReassembler::new(telemetry)),
            notify: Notify::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Feeds one raw ALC packet in. Wakes any suspended `alc_recv*` calls
    /// when it completes an object.
    pub async fn ingest(&self, packet: &[u8]) {
        let mut r = self.reassembler.lock().await;
        let outcome = r.ingest(packet);
        drop(r);
        if matches!(outcome, IngestOutcome::Completed(_)) {
            self.notify.notify_waiters();
        }
    }

    /// Marks the owning channel closed: sweeps incomplete objects and
    /// wakes every waiter so `alc_recv*` calls return `-1`/`-2`.
    pub async fn close_session(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut r = self.reassembler.lock().await;
        r.close_session_sweep();
        drop(r);
        self.notify.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Blocks until TOI `toi` completes or the session closes.
    pub async fn alc_recv(&self, toi: Toi) -> AlcRecvResult<Bytes> {
        loop {
            {
                let r = self.reassembler.lock().await;
                match r.object_state(toi) {
                    Some(crate::object::ObjectState::Completed) => {
                        return Ok(r.take_completed(toi).expect("completed object has payload"));
                    }
                    Some(crate::object::ObjectState::Incomplete) => return Err(Error::Incomplete),
                    _ => {}
                }
            }
            if self.is_closed() {
                return Err(Error::SessionClosed);
            }
            self.notify.notified().await;
        }
    }

    /// Blocks until any object completes; returns its TOI and payload.
    pub async fn alc_recv_any(&self) -> AlcRecvResult<(Toi, Bytes)> {
        loop {
            {
                let r = self.reassembler.lock().await;
                if let Some(toi) = r.first_completed_toi() {
                    return Ok((toi, r.take_completed(toi).expect("completed object has payload")));
                }
            }
            if self.is_closed() {
                return Err(Error::SessionClosed);
            }
            self.notify.notified().await;
        }
    }

    /// Like [`Self::alc_recv`] but spills the payload to a temp file,
    /// returning its path instead of holding the bytes in memory.
    pub async fn alc_recv_to_temp(&self, toi: Toi) -> AlcRecvResult<PathBuf> {
        let payload = self.alc_recv(toi).await?;
        let path = std::env::temp_dir().join(format!("{}-{toi}.bin", self.session_id));
        tokio::fs::write(&path, &payload)
            .await
            .map_err(|e| Error::TempFileIo(e.to_string()))?;
        Ok(path)
    }

    /// Blocks until the FDT Instance (the reserved-TOI object) completes.
    pub async fn fdt_recv(&self) -> AlcRecvResult<(Bytes, Option<String>, Option<u32>)> {
        loop {
            {
                let r = self.reassembler.lock().await;
                match r.object_state(FDT_TOI) {
                    Some(crate::object::ObjectState::Completed) => {
                        let (encoding, instance_id) = r
                            .fdt_metadata()
                            .unwrap_or((None, None));
                        return Ok((
                            r.take_completed(FDT_TOI).expect("completed FDT has payload"),
                            encoding,
                            instance_id,
                        ));
                    }
                    Some(crate::object::ObjectState::Incomplete) => return Err(Error::Incomplete),
                    _ => {}
                }
            }
            if self.is_closed() {
                return Err(Error::SessionClosed);
            }
            self.notify.notified().await;
        }
    }

    pub async fn object_exists(&self, toi: Toi, kind: ObjectKind) -> bool {
        self.reassembler.lock().await.object_exists(toi, kind).is_some()
    }
}
