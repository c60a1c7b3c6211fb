//! Stream adapter that hashes and counts bytes as they pass through.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use sha2::{Digest, Sha256};

#[derive(Debug, Default)]
struct DigestState {
    hasher: Sha256,
    bytes: u64,
}

/// Shared view of a [`HashingStream`]'s running digest.
///
/// The stream is usually moved into a blob store, so the caller keeps the
/// handle to read the result once the upload has returned.
#[derive(Debug, Clone, Default)]
pub struct DigestHandle {
    state: Arc<Mutex<DigestState>>,
}

impl DigestHandle {
    /// Hex SHA-256 of everything seen so far, and the byte count.
    pub fn finalize(&self) -> (String, u64) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let digest = state.hasher.clone().finalize();
        (hex::encode(digest), state.bytes)
    }
}

pin_project! {
    /// Wraps a byte stream, feeding every chunk into a SHA-256 digest.
    pub struct HashingStream<S> {
        #[pin]
        inner: S,
        handle: DigestHandle,
    }
}

impl<S> HashingStream<S> {
    /// Wrap `inner`, returning the stream and a handle to its digest.
    pub fn new(inner: S) -> (Self, DigestHandle) {
        let handle = DigestHandle::default();
        (
            Self {
                inner,
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl<S> Stream for HashingStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let mut state = this
                    .handle
                    .state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                state.hasher.update(&chunk);
                state.bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
