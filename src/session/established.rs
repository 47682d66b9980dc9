//! Post-handshake handoff
//!
//! Once C2 validates, the session stops speaking the handshake protocol and
//! hands the live stream to the application layer together with whatever
//! was read past the end of C2.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::session::SessionContext;

/// A connection whose handshake reached `Established`
///
/// Reading from it yields the leftover bytes first, then continues with the
/// underlying stream, so no byte sent after C2 is lost or duplicated.
#[derive(Debug)]
pub struct EstablishedConnection<S> {
    stream: S,
    buffered: Bytes,
    context: SessionContext,
}

impl<S> EstablishedConnection<S> {
    pub fn new(stream: S, buffered: Bytes, context: SessionContext) -> Self {
        Self {
            stream,
            buffered,
            context,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Bytes received after C2 that have not been read yet
    pub fn buffered(&self) -> &Bytes {
        &self.buffered
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Direct access to the stream; bypasses [`buffered`](Self::buffered)
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Split into stream, leftover bytes and context
    pub fn into_parts(self) -> (S, Bytes, SessionContext) {
        (self.stream, self.buffered, self.context)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for EstablishedConnection<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.buffered.is_empty() {
            let n = this.buffered.len().min(buf.remaining());
            let chunk = this.buffered.split_to(n);
            buf.put_slice(&chunk);
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.stream).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for EstablishedConnection<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}
