use crate::domain::ProgressEvent;
use crate::sse::ServerSentEvent;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::Receiver;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, warn};

/// Relays progress events as server-sent events until the batch drops its sender.
#[instrument(skip_all)]
pub async fn progress_listener<W>(rx: Receiver<ProgressEvent>, mut out: W)
where
    W: AsyncWrite + Unpin,
{
    let mut events = ReceiverStream::new(rx);
    let mut sequence = 0usize;
    while let Some(event) = events.next().await {
        sequence += 1;
        debug!(status = event.status(), "🔸 Progress: {:?}", event);

        let frame = match ServerSentEvent::data(&event).with_id(sequence).with_event(event.status()).to_frame() {
            Ok(frame) => frame,
            Err(error) => {
                warn!("⚠️ Unable to encode progress event: {}", error);
                continue;
            }
        };

        if let Err(error) = write_frame(&mut out, &frame).await {
            warn!("⚠️ Unable to write progress event: {}", error);
        }
    }
}

async fn write_frame<W>(out: &mut W, frame: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(frame.as_bytes()).await?;
    out.flush().await
}
