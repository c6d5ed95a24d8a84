use crate::prelude::*;
use crate::error::Result;
use crate::omnik::packet::{
    Parser, ReplyFrame, MESSAGE_END, MESSAGE_HEADER_SIZE, MESSAGE_START, MESSAGE_STREAM_END,
};

use {
    bytes::{Buf, BytesMut},
    futures::{Stream, StreamExt},
    std::pin::Pin,
    std::task::{ready, Context, Poll},
    tokio::io::AsyncRead,
    tokio_util::codec::{Decoder, FramedRead},
};

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Decoded {
    Frame(ReplyFrame),
    // the inverter has nothing more to say in this burst
    EndOfBurst,
}

#[derive(Debug, Default)]
pub struct PacketDecoder {
    finished: bool,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Decoder for PacketDecoder {
    type Item = Decoded;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if self.finished {
            src.clear();
            return Ok(None);
        }

        let Some(&start) = src.first() else {
            return Ok(None);
        };

        if start == MESSAGE_STREAM_END {
            // More 0xFF usually follow; none of it is a frame.
            debug!("end of message burst, discarding {} buffered bytes", src.len());
            self.finished = true;
            src.clear();
            return Ok(Some(Decoded::EndOfBurst));
        }

        if start != MESSAGE_START {
            return Err(ProtocolError::MalformedFrame(format!(
                "invalid start byte {:#04x}",
                start
            )));
        }

        let Some(&length) = src.get(1) else {
            return Ok(None);
        };

        // start marker + length byte and the rest of the header + payload + end marker
        let frame_len = 1 + length as usize + MESSAGE_HEADER_SIZE + 1;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let end = src[frame_len - 1];
        if end != MESSAGE_END {
            return Err(ProtocolError::MalformedFrame(format!(
                "invalid end byte {:#04x}",
                end
            )));
        }

        src.advance(1);
        let body = src.split_to(frame_len - 2);
        src.advance(1);

        Parser::parse(&body).map(|frame| Some(Decoded::Frame(frame)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::MalformedFrame(format!(
                "stream ended with {} bytes of an incomplete frame",
                src.len()
            ))),
        }
    }
}

/// Frames read from one connection, in wire order.
///
/// Ends cleanly on the burst terminator or when the peer closes the
/// connection between frames. The first error is yielded once and then the
/// stream ends; it cannot be restarted.
pub struct MessageStream<R> {
    framed: FramedRead<R, PacketDecoder>,
    done: bool,
}

impl<R: AsyncRead + Unpin> MessageStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            framed: FramedRead::new(reader, PacketDecoder::new()),
            done: false,
        }
    }
}

impl<R: AsyncRead + Unpin> Stream for MessageStream<R> {
    type Item = Result<ReplyFrame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match ready!(this.framed.poll_next_unpin(cx)) {
            Some(Ok(Decoded::Frame(frame))) => Poll::Ready(Some(Ok(frame))),
            Some(Ok(Decoded::EndOfBurst)) | None => {
                this.done = true;
                Poll::Ready(None)
            }
            Some(Err(e)) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}
