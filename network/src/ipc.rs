//! Request/acknowledge framing between a supervisor and its mining processes.
//!
//! Frames are `len:u32 LE | bincode(payload)` over the child's stdin/stdout.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Raw Job container bytes
    NewJob(Vec<u8>),
    Pause,
    Stop,
    SendPass(String),
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::NewJob(_) => "NewJob",
            Request::Pause => "Pause",
            Request::Stop => "Stop",
            Request::SendPass(_) => "SendPass",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Ack(bool),
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("{0} was not acknowledged")]
    NotAcknowledged(&'static str),

    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for acknowledgement")]
    Timeout,
}

pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(msg)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(IpcError::FrameTooLarge(payload.len()));
    }
    writer.write_u32_le(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, IpcError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32_le().await? as usize;
    if len > MAX_FRAME_SIZE {
        return Err(IpcError::FrameTooLarge(len));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(bincode::deserialize(&buf)?)
}

/// Sends `request` and waits for its acknowledgement.
pub async fn call<W, R>(writer: &mut W, reader: &mut R, request: &Request) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    write_frame(writer, request).await?;
    match read_frame::<_, Response>(reader).await? {
        Response::Ack(true) => Ok(()),
        Response::Ack(false) => Err(IpcError::NotAcknowledged(request.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, &Request::SendPass("p9pass".into())).await.unwrap();
        write_frame(&mut a, &Request::Pause).await.unwrap();
        assert_eq!(read_frame::<_, Request>(&mut b).await.unwrap(), Request::SendPass("p9pass".into()));
        assert_eq!(read_frame::<_, Request>(&mut b).await.unwrap(), Request::Pause);
    }

    #[tokio::test]
    async fn test_call_maps_nack() {
        let (client, mut server) = tokio::io::duplex(1024);
        let responder = tokio::spawn(async move {
            let _: Request = read_frame(&mut server).await.unwrap();
            write_frame(&mut server, &Response::Ack(false)).await.unwrap();
            server
        });
        let (mut r, mut w) = tokio::io::split(client);
        let err = call(&mut w, &mut r, &Request::Stop).await.unwrap_err();
        assert!(matches!(err, IpcError::NotAcknowledged("Stop")));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32_le(u32::MAX).await.unwrap();
        assert!(matches!(read_frame::<_, Request>(&mut b).await, Err(IpcError::FrameTooLarge(_))));
    }
}
