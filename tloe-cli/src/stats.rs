//! Statistics display and formatting

use std::io::{self, Write};
use std::time::Duration;
use tloe_protocol::{CreditTracker, EndpointStats};

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Render per-channel credits as `c0=N c1=N ...`
pub fn format_credits(credits: &CreditTracker) -> String {
    credits
        .iter()
        .map(|(channel, credit)| format!("c{}={}", channel.as_raw(), credit))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display endpoint statistics
pub fn display_endpoint_stats(stats: &EndpointStats, credits: &CreditTracker, uptime: Duration) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ ENDPOINT STATISTICS                                         │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Uptime: {}", format_duration(uptime));
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ RECEIVE                                                     │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Delivered:       {}", stats.delivered);
    println!("│ Duplicates:      {}", stats.duplicates);
    println!("│ Out of sequence: {}", stats.out_of_sequence);
    println!("│ Malformed:       {}", stats.malformed);
    println!("│ Backpressure:    {}", stats.backpressure);
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ ACKNOWLEDGMENT                                              │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ ACK/NAK served:  {}", stats.acks);
    println!("│ ACKs flushed:    {}", stats.acks_flushed);
    println!("│ NAKs sent:       {}", stats.naks_sent);
    println!("│ Pending delay:   {}", stats.pending_delay);
    println!("│ Retransmitted:   {}", stats.retransmitted);
    println!("│ Credits:         {} (+{})", format_credits(credits), stats.credit_increments);
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// Display compact stats on one line (for continuous updates)
pub fn display_compact_stats(stats: &EndpointStats, delivered_bytes: u64, elapsed: Duration) {
    print!(
        "\r[{:8}] Delivered: {} ({}) | Dup: {} | OOS: {} | ACK: {} | NAK: {}         ",
        format_duration(elapsed),
        stats.delivered,
        format_bytes(delivered_bytes),
        stats.duplicates,
        stats.out_of_sequence,
        stats.acks_flushed,
        stats.naks_sent
    );

    let _ = io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tloe_protocol::Channel;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2.00 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 01m 01s");
    }

    #[test]
    fn test_format_credits() {
        let mut credits = CreditTracker::new(0);
        credits.increment(Channel::new(2).unwrap(), 5);
        assert_eq!(
            format_credits(&credits),
            "c0=0 c1=0 c2=5 c3=0 c4=0 c5=0 c6=0 c7=0"
        );
    }
}
