use std::process::Stdio;

use tokio::process::Command;

const OPENER: &str = if cfg!(target_os = "macos") {
    "open"
} else {
    "xdg-open"
};

/// Open `url` with the desktop's default handler.
///
/// # Errors
///
/// Returns an error if the opener cannot be started.
pub async fn open_url(url: &str) -> std::io::Result<()> {
    tracing::info!("Opening {url} in the browser");
    Command::new(OPENER)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

#[must_use]
pub fn dashboard_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/")
}
