//! Screen capture collaborator: an encoded frame of the primary monitor
//! on demand.

use std::io::Cursor;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::AgentError;

/// Supplies the observation side of the loop. A capture failure is a hard
/// stop for the current run.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// One encoded frame of the screen as it is right now.
    async fn capture(&self) -> Result<Vec<u8>, AgentError>;
}

/// Captures the primary monitor with `xcap` and encodes it as PNG.
pub struct XcapCapture;

#[async_trait]
impl ScreenCapture for XcapCapture {
    async fn capture(&self) -> Result<Vec<u8>, AgentError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AgentError::Capture(format!("failed to enumerate monitors: {e}")))?;

        let mut primary = None;
        for monitor in monitors {
            match monitor.is_primary() {
                Ok(true) => {
                    primary = Some(monitor);
                    break;
                }
                Ok(false) => continue,
                Err(e) => {
                    return Err(AgentError::Capture(format!(
                        "error checking monitor primary status: {e}"
                    )));
                }
            }
        }
        let primary = primary
            .ok_or_else(|| AgentError::Capture("no primary monitor found".to_string()))?;

        let image = primary
            .capture_image()
            .map_err(|e| AgentError::Capture(format!("failed to capture screen: {e}")))?;

        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| AgentError::Capture(format!("failed to encode frame: {e}")))?;

        debug!("captured frame: {} bytes", png.len());
        Ok(png)
    }
}
