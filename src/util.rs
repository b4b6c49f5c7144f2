pub fn format_mbps(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else if mbps.fract() == 0.0 {
        format!("{mbps:.0} Mbps")
    } else {
        format!("{mbps:.1} Mbps")
    }
}

pub fn format_percent(ratio: f64) -> String {
    format!("{:.0}%", (ratio * 100.0).clamp(0.0, 100.0))
}

/// Shortens `text` to at most `max_chars` characters, ending with an ellipsis when cut.
pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }

    let kept = text.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_switches_to_gbps() {
        assert_eq!(format_mbps(420.0), "420 Mbps");
        assert_eq!(format_mbps(2.5), "2.5 Mbps");
        assert_eq!(format_mbps(1000.0), "1.00 Gbps");
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(format_percent(0.574), "57%");
        assert_eq!(format_percent(3.0), "100%");
    }

    #[test]
    fn labels_are_cut_on_char_boundaries() {
        assert_eq!(truncate_label("core", 10), "core");
        assert_eq!(truncate_label("größenordnung", 5), "größ…");
    }
}
