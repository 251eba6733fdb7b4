//! Value normalization for MIDI controls

/// Largest 7-bit MIDI data value
pub const MIDI_MAX: u8 = 127;

/// Map a CC value (0-127) linearly onto a 0-100 percentage, rounded
pub fn cc_to_percent(value: u8) -> f32 {
    (value.min(MIDI_MAX) as f32 / MIDI_MAX as f32 * 100.0).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cc_to_percent_endpoints() {
        assert_eq!(cc_to_percent(0), 0.0);
        assert_eq!(cc_to_percent(127), 100.0);
        // 64 / 127 * 100 = 50.39
        assert_eq!(cc_to_percent(64), 50.0);
        assert_eq!(cc_to_percent(1), 1.0);
    }

    #[test]
    fn test_out_of_range_values_saturate() {
        assert_eq!(cc_to_percent(200), 100.0);
    }
}
