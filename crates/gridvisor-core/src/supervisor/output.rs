use std::path::PathBuf;

use futures::StreamExt;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::mpsc::Sender};

use crate::{process_manager::BoxStream, supervisor::SupervisorEvent};

/// Copy a foreground output stream to the service log and to the event channel.
///
/// The log keeps receiving output even after the event receiver is gone.
pub(crate) async fn follow_output(
    mut output: BoxStream<Vec<u8>>,
    service: String,
    log: PathBuf,
    tx: Sender<SupervisorEvent>,
) {
    let mut file = match OpenOptions::new().create(true).append(true).open(&log).await {
        Ok(file) => Some(file),
        Err(err) => {
            tracing::error!("Cannot open {}: {err}", log.display());
            None
        }
    };

    let mut forward = true;
    while let Some(chunk) = output.next().await {
        if let Some(f) = file.as_mut() {
            if let Err(err) = f.write_all(&chunk).await {
                tracing::error!("Failed to write to {}: {err}", log.display());
                file = None;
            }
        }

        if forward
            && tx
                .send(SupervisorEvent::Log {
                    service: service.clone(),
                    message: String::from_utf8_lossy(&chunk).into_owned(),
                })
                .await
                .is_err()
        {
            tracing::debug!("Event receiver closed, `{service}` output goes to the log only");
            forward = false;
        }
    }

    if let Some(mut f) = file {
        let _ = f.flush().await;
    }
}
