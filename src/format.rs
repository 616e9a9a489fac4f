// Human-readable formatting for sizes, speeds, durations and torrent status lines

use crate::models::TorrentSnapshot;
use std::time::Duration;

const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

/// Format a byte count, e.g. `512 bytes` or `1.5 MiB`
pub fn humanize_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

pub fn humanize_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", humanize_size(bytes_per_sec))
}

/// Format a duration with its two most significant units
pub fn humanize_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (days, hours, minutes, seconds) = (
        secs / 86_400,
        secs % 86_400 / 3_600,
        secs % 3_600 / 60,
        secs % 60,
    );
    if days > 0 {
        format!("{} d {} h", days, hours)
    } else if hours > 0 {
        format!("{} h {} min", hours, minutes)
    } else if minutes > 0 {
        format!("{} min {} sec", minutes, seconds)
    } else {
        format!("{} sec", seconds)
    }
}

/// Transfer line: amount downloaded of the selection and share ratio
pub fn transfer_status(state: &TorrentSnapshot) -> String {
    let mut text = if state.downloaded_size < state.selected_size {
        format!(
            "{} of {}",
            humanize_size(state.downloaded_size),
            humanize_size(state.selected_size)
        )
    } else {
        format!("{} (complete)", humanize_size(state.selected_size))
    };
    text.push_str(&format!(", Ratio: {:.1}", state.ratio()));
    text
}

/// Activity line: paused, seeding or downloading with peers, speed and ETA
pub fn activity_status(state: &TorrentSnapshot) -> String {
    if state.paused {
        return "Paused".to_string();
    }

    if state.complete {
        let mut text = format!(
            "Uploading to {} of {} peers",
            state.uploading_peer_count, state.total_peer_count
        );
        if state.upload_speed > 0 {
            text.push_str(&format!(" on {}", humanize_speed(state.upload_speed)));
        }
        return text;
    }

    let mut text = format!(
        "Downloading from {} of {} peers",
        state.downloading_peer_count, state.total_peer_count
    );
    if state.download_speed > 0 {
        text.push_str(&format!(" on {}", humanize_speed(state.download_speed)));
    }
    if let Some(eta) = state.eta() {
        text.push_str(&format!(", {} remaining", humanize_time(eta)));
    }
    text
}

/// Progress in tenths of a percent, truncated like a 1000-step progress bar
pub fn progress_permille(state: &TorrentSnapshot) -> u32 {
    (state.progress.clamp(0.0, 1.0) * 1000.0).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TorrentId;

    fn snapshot() -> TorrentSnapshot {
        TorrentSnapshot {
            id: TorrentId::new([0; 20]),
            name: "debian.iso".to_string(),
            total_size: 4096,
            selected_size: 4096,
            downloaded_size: 1024,
            uploaded_size: 512,
            progress: 0.25,
            total_peer_count: 10,
            downloading_peer_count: 3,
            uploading_peer_count: 2,
            download_speed: 1024,
            upload_speed: 0,
            paused: false,
            complete: false,
            single_file_mode: true,
        }
    }

    #[test]
    fn test_humanize_size() {
        assert_eq!(humanize_size(0), "0 bytes");
        assert_eq!(humanize_size(1023), "1023 bytes");
        assert_eq!(humanize_size(1536), "1.5 KiB");
        assert_eq!(humanize_size(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn test_humanize_speed() {
        assert_eq!(humanize_speed(2048), "2.0 KiB/s");
    }

    #[test]
    fn test_humanize_time() {
        assert_eq!(humanize_time(Duration::from_secs(42)), "42 sec");
        assert_eq!(humanize_time(Duration::from_secs(125)), "2 min 5 sec");
        assert_eq!(humanize_time(Duration::from_secs(7260)), "2 h 1 min");
        assert_eq!(humanize_time(Duration::from_secs(90_000)), "1 d 1 h");
    }

    #[test]
    fn test_transfer_status() {
        let mut state = snapshot();
        assert_eq!(transfer_status(&state), "1.0 KiB of 4.0 KiB, Ratio: 0.5");

        state.downloaded_size = 4096;
        assert_eq!(transfer_status(&state), "4.0 KiB (complete), Ratio: 0.1");
    }

    #[test]
    fn test_activity_status() {
        let mut state = snapshot();
        assert_eq!(
            activity_status(&state),
            "Downloading from 3 of 10 peers on 1.0 KiB/s, 3 sec remaining"
        );

        state.complete = true;
        assert_eq!(activity_status(&state), "Uploading to 2 of 10 peers");

        state.paused = true;
        assert_eq!(activity_status(&state), "Paused");
    }

    #[test]
    fn test_progress_permille() {
        let mut state = snapshot();
        assert_eq!(progress_permille(&state), 250);
        state.progress = 1.5;
        assert_eq!(progress_permille(&state), 1000);
    }
}
