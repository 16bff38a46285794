/// Formats a whole-workout duration as HH:MM:SS.
pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Formats a rest countdown as M:SS.
pub fn format_countdown(total_seconds: u32) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_as_clock_time() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(125), "00:02:05");
        assert_eq!(format_duration(3_725), "01:02:05");
        assert_eq!(format_duration(-5), "00:00:00");
    }

    #[test]
    fn countdowns_render_minutes_and_seconds() {
        assert_eq!(format_countdown(90), "1:30");
        assert_eq!(format_countdown(5), "0:05");
    }
}
