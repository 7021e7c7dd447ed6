//! Upload bodies
//!
//! An upload announces its size up front. [`ExactBody`] exposes exactly that
//! many bytes of the connection and turns an early EOF into an error, so a
//! client that disconnects mid-upload can never produce a truncated file that
//! storage believes is complete.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf, Take};

pub struct ExactBody<R> {
    inner: Take<R>,
}

impl<R: AsyncRead + Unpin> ExactBody<R> {
    pub fn new(reader: R, size: u64) -> Self {
        Self {
            inner: reader.take(size),
        }
    }

    /// Body bytes not yet read
    pub fn remaining(&self) -> u64 {
        self.inner.limit()
    }

    /// Read and discard whatever is left of the body.
    pub async fn drain(&mut self) -> io::Result<u64> {
        tokio::io::copy(self, &mut tokio::io::sink()).await
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ExactBody<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.inner).poll_read(cx, buf))?;

        let outstanding = self.inner.limit();
        if buf.filled().len() == before && buf.remaining() > 0 && outstanding > 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed with {outstanding} body bytes outstanding"),
            )));
        }

        Poll::Ready(Ok(()))
    }
}
