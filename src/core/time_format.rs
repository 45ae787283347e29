/// Formats a playback time for the slider label.
///
/// Wraps at 24 hours. Hours are only shown when non-zero.
pub fn format_timestamp(seconds: u64) -> String {
    let seconds = seconds % (24 * 3600);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours != 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// `position/duration` label shown on the seek slider.
pub fn format_progress(position: u64, duration: u64) -> String {
    format!("{}/{}", format_timestamp(position), format_timestamp(duration))
}
