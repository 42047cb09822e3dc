use std::time::Instant;

use number_prefix::NumberPrefix;

use crate::progress::ByteNum;

#[must_use]
pub(crate) fn format_throughput(start_time: Instant, bytes: ByteNum, records: usize) -> String {
    let elapsed = start_time.elapsed().as_secs_f32();

    let rate = if elapsed > 0.0 {
        bytes.get() as f32 / elapsed
    } else {
        0.0
    };
    let rate_human = match NumberPrefix::decimal(rate) {
        NumberPrefix::Standalone(bytes) => format!("{:.0} B/s", bytes),
        NumberPrefix::Prefixed(prefix, n) => format!("{:.3} {}B/s", n, prefix),
    };

    format!(
        "{} records, {} in {:.2}s ({})",
        records,
        format_bytes(bytes),
        elapsed,
        rate_human,
    )
}

#[must_use]
pub(crate) fn format_bytes(bytes: ByteNum) -> String {
    match NumberPrefix::decimal(bytes.get() as f32) {
        NumberPrefix::Standalone(bytes) => format!("{} bytes", bytes),
        NumberPrefix::Prefixed(prefix, n) => format!("{:.2} {}B", n, prefix),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use crate::progress::ByteNum;
    use crate::stats::{format_bytes, format_throughput};

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(ByteNum::new(999)), "999 bytes");
        assert_eq!(format_bytes(ByteNum::new(1_500)), "1.50 kB");
        assert_eq!(format_bytes(ByteNum::new(2_000_000)), "2.00 MB");
    }

    #[test]
    fn test_format_throughput_mentions_records() {
        let text = format_throughput(Instant::now(), ByteNum::new(10), 3);

        assert!(text.starts_with("3 records, 10 bytes in "), "{}", text);
    }
}
