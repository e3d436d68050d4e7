use std::io;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{
    assembler::{Frame, FrameAssembler},
    processor::CommandProcessor,
};

const READ_CHUNK: usize = 64;

/// At most one completed frame waits for the command task. The receiver
/// stops reading until that slot frees up, so no closed frame is lost.
pub const PENDING_FRAMES: usize = 1;

/// Feeds the byte stream through `assembler` until the peer hangs up or the
/// command task goes away.
pub async fn run_receiver<R>(
    mut reader: R,
    assembler: &mut FrameAssembler,
    frames: mpsc::Sender<Frame>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }

        let discarded_before = assembler.discarded();
        for frame in assembler.extend(&chunk[..read]) {
            if frames.send(frame).await.is_err() {
                return Ok(());
            }
        }
        if assembler.discarded() > discarded_before {
            debug!(
                "dropped oversized message ({} so far)",
                assembler.discarded()
            );
        }
    }
}

/// Answers every received frame, in arrival order, with exactly one response.
pub async fn run_responder<W>(
    writer: &mut W,
    processor: &CommandProcessor,
    mut frames: mpsc::Receiver<Frame>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = Vec::with_capacity(16);
    while let Some(frame) = frames.recv().await {
        match processor.process(frame.as_bytes(), &mut out) {
            Ok(command) => {
                if processor.store().verbose() {
                    info!("handled {:?}", command.kind());
                }
            }
            Err(err) => {
                if processor.store().verbose() {
                    warn!(
                        "rejected frame {:?}: {err}",
                        String::from_utf8_lossy(frame.as_bytes())
                    );
                }
            }
        }
        writer.write_all(&out).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Runs one link until the peer closes it. Frames that arrived before the
/// close are still answered.
pub async fn serve<S>(stream: S, processor: &CommandProcessor, rx_capacity: usize) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let (tx, rx) = mpsc::channel(PENDING_FRAMES);
    let mut assembler = FrameAssembler::new(rx_capacity);

    let receive = run_receiver(reader, &mut assembler, tx);
    let respond = run_responder(&mut writer, processor, rx);

    tokio::try_join!(receive, respond)?;
    writer.shutdown().await
}
