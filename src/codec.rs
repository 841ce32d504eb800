use bytes::{
    Buf,
    BufMut,
    Bytes,
    BytesMut,
};
use clap::ValueEnum;
use serde::Deserialize;
use tokio::io::{
    AsyncRead,
    AsyncReadExt,
};
use tokio_stream::StreamExt;
use tokio_util::codec::{
    Decoder,
    Encoder,
    FramedRead,
};

use crate::{
    error::{
        DecodeError,
        ServerError,
    },
    model::Response,
};

/// Size of one socket read in `short-read` mode.
pub const READ_CHUNK: usize = 4096;

/// End of transmission; terminates a request in `eot` mode.
pub const EOT: u8 = 0x04;

/// How the end of a request is found on the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// Stop at EOF or at the first read shorter than `READ_CHUNK`.
    /// Compatible with existing clients; breaks on payloads that are an exact
    /// multiple of the chunk size or that arrive in slow pieces.
    #[default]
    ShortRead,
    /// Stop at an EOT byte or at EOF.
    Eot,
}

/// Decodes one EOT-terminated request and encodes the reply.
#[derive(Debug, Copy, Clone)]
pub struct JobCodec {
    finished: bool,
    max_len: usize,
}

impl JobCodec {
    pub fn new(max_len: usize) -> Self {
        Self {
            finished: false,
            max_len,
        }
    }
}

impl Decoder for JobCodec {
    type Error = ServerError;
    type Item = Bytes;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.finished {
            return Ok(None);
        }

        if let Some(i) = src.iter().position(|b| *b == EOT) {
            if i > self.max_len {
                return Err(DecodeError::TooLarge { limit: self.max_len }.into());
            }
            self.finished = true;

            let data = src.split_to(i).freeze();
            src.advance(1);

            return Ok(Some(data));
        }

        if src.len() > self.max_len {
            return Err(DecodeError::TooLarge { limit: self.max_len }.into());
        }

        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if self.finished || src.is_empty() {
            return Ok(None);
        }

        // Peer closed its write side without a terminator.
        self.finished = true;
        Ok(Some(src.split().freeze()))
    }
}

impl Encoder<Response> for JobCodec {
    type Error = ServerError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&item.to_bytes());
        Ok(())
    }
}

/// Read one request off `reader`. An empty result means the peer went away
/// without sending anything.
pub async fn read_request<R>(reader: &mut R, framing: Framing, max_len: usize) -> Result<Bytes, ServerError>
where
    R: AsyncRead + Unpin,
{
    match framing {
        Framing::ShortRead => read_short_chunks(reader, max_len).await,
        Framing::Eot => {
            let mut framed = FramedRead::with_capacity(reader, JobCodec::new(max_len), READ_CHUNK);
            match framed.next().await {
                Some(frame) => frame,
                None => Ok(Bytes::new()),
            }
        }
    }
}

async fn read_short_chunks<R>(reader: &mut R, max_len: usize) -> Result<Bytes, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut data = BytesMut::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if data.len() + n > max_len {
            return Err(DecodeError::TooLarge { limit: max_len }.into());
        }
        data.extend_from_slice(&chunk[..n]);
        if n < READ_CHUNK {
            break;
        }
    }

    Ok(data.freeze())
}
