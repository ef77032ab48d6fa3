//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Transport abstraction over plain TCP and TLS streams
//!
//! The framing and session layers operate on [`ServerStream`] and never
//! learn which transport carried the bytes.

use pin_project_lite::pin_project;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

pin_project! {
    /// A byte stream accepted by a listener, plain or TLS.
    #[project = ServerStreamProj]
    pub enum ServerStream {
        /// Plain TCP
        Plain {
            #[pin]
            stream: TcpStream,
        },
        /// TLS over TCP, handshake already completed
        Tls {
            #[pin]
            stream: Box<tokio_rustls::server::TlsStream<TcpStream>>,
        },
    }
}

impl ServerStream {
    /// Wrap a plain TCP stream.
    pub fn plain(stream: TcpStream) -> Self {
        Self::Plain { stream }
    }

    /// Wrap a completed TLS stream.
    pub fn tls(stream: tokio_rustls::server::TlsStream<TcpStream>) -> Self {
        Self::Tls {
            stream: Box::new(stream),
        }
    }

    /// Remote socket address.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Plain { stream } => stream.peer_addr(),
            Self::Tls { stream } => stream.get_ref().0.peer_addr(),
        }
    }

    /// Local socket address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Plain { stream } => stream.local_addr(),
            Self::Tls { stream } => stream.get_ref().0.local_addr(),
        }
    }

    /// Whether the transport is encrypted.
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls { .. })
    }
}

impl AsyncRead for ServerStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            ServerStreamProj::Plain { stream } => stream.poll_read(cx, buf),
            ServerStreamProj::Tls { stream } => stream.poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ServerStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            ServerStreamProj::Plain { stream } => stream.poll_write(cx, buf),
            ServerStreamProj::Tls { stream } => stream.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            ServerStreamProj::Plain { stream } => stream.poll_flush(cx),
            ServerStreamProj::Tls { stream } => stream.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            ServerStreamProj::Plain { stream } => stream.poll_shutdown(cx),
            ServerStreamProj::Tls { stream } => stream.poll_shutdown(cx),
        }
    }
}
