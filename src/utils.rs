use std::time::Duration;

use tracing::warn;

/// Exit status used when the binary cannot re-execute itself and leaves the
/// restart to whatever launched it.
pub const RESTART_EXIT_CODE: i32 = 75;

// Detected capture device info
#[cfg(feature = "v4l2")]
#[derive(Debug, Clone)]
pub struct FoundDevice {
    pub path: String,
    pub format: crate::capture::PixelFormat,
}

/// Auto-detect best capture device, preferring MJPEG over raw formats
#[cfg(feature = "v4l2")]
pub fn auto_detect_device() -> color_eyre::Result<FoundDevice> {
    use crate::capture::v4l2::pixel_format;
    use crate::capture::PixelFormat;
    use color_eyre::eyre::eyre;
    use std::path::Path;
    use tracing::info;
    use v4l::{capability::Flags, video::Capture, Device};

    info!("Auto-detecting capture devices...");

    let mut fallback = None;
    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            continue;
        }
        let Ok(formats) = dev.enum_formats() else {
            continue;
        };

        for fmt in formats {
            match pixel_format(fmt.fourcc) {
                Some(PixelFormat::Jpeg) => {
                    info!("Found MJPEG device: {} - {}", path, caps.card);
                    return Ok(FoundDevice {
                        path,
                        format: PixelFormat::Jpeg,
                    });
                }
                Some(format) if fallback.is_none() => {
                    info!("Found {} device: {} - {}", format, path, caps.card);
                    fallback = Some(FoundDevice {
                        path: path.clone(),
                        format,
                    });
                }
                _ => {}
            }
        }
    }

    fallback.ok_or_else(|| eyre!("No suitable capture device found"))
}

/// Restart the process after a fatal startup failure.
///
/// Waits `delay`, then replaces the process image with a fresh copy of the
/// current binary. If that is impossible the process exits with
/// [`RESTART_EXIT_CODE`].
pub fn restart(delay: Duration) -> ! {
    warn!("Restarting in {} ms", delay.as_millis());
    std::thread::sleep(delay);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;

        match std::env::current_exe() {
            Ok(exe) => {
                let err = std::process::Command::new(exe)
                    .args(std::env::args_os().skip(1))
                    .exec();
                tracing::error!("Re-exec failed: {}", err);
            }
            Err(e) => tracing::error!("Cannot locate current executable: {}", e),
        }
    }

    std::process::exit(RESTART_EXIT_CODE)
}
