//! Calibration of 4-bit WSI color codes into scaled data bytes.

use crate::error::{WsiError, WsiResult};

/// Number of physical values in a calibration table (colors 1..=15).
pub const NUM_VALUES: usize = 15;

/// Lookup from a WSI color code to a calibrated byte.
///
/// Entry 0 is the missing/bad data value and is always 0. Entries 1..=15
/// are `(value - bias) / scale` rounded and clamped to `1..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTable {
    entries: [u8; 16],
}

impl ColorTable {
    /// Builds the table from 15 physical values.
    ///
    /// # Errors
    ///
    /// Returns `WsiError::InvalidValueTable` unless `value_table` has
    /// exactly 15 entries.
    pub fn new(value_table: &[f64], scale: f64, bias: f64) -> WsiResult<Self> {
        if value_table.len() != NUM_VALUES {
            return Err(WsiError::InvalidValueTable(value_table.len()));
        }

        let mut entries = [0u8; 16];
        for (entry, value) in entries[1..].iter_mut().zip(value_table) {
            let scaled = ((value - bias) / scale + 0.5).floor();
            *entry = scaled.clamp(1.0, 255.0) as u8;
        }

        for (color, entry) in entries.iter().enumerate() {
            tracing::trace!("color table[{}] = {}", color, entry);
        }

        Ok(Self { entries })
    }

    /// Calibrated value for an effective color index. Colors of 16 and
    /// above are outside the table and map to 0.
    pub fn lookup(&self, color: u8) -> u8 {
        self.entries.get(color as usize).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> &[u8; 16] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dbz_table() -> Vec<f64> {
        (1..=15).map(|i| i as f64 * 5.0).collect()
    }

    #[test]
    fn test_scenario_entry() {
        let mut values = dbz_table();
        values[4] = 35.0;
        let table = ColorTable::new(&values, 0.5, -32.0).unwrap();
        assert_eq!(table.lookup(5), 134);
    }

    #[test]
    fn test_entry_zero_is_missing() {
        let table = ColorTable::new(&dbz_table(), 0.5, -32.0).unwrap();
        assert_eq!(table.lookup(0), 0);
        assert_eq!(table.entries()[0], 0);
    }

    #[test]
    fn test_clamps_low_and_high() {
        let mut values = dbz_table();
        values[0] = -100.0;
        values[1] = -32.0;
        values[14] = 500.0;
        let table = ColorTable::new(&values, 0.5, -32.0).unwrap();
        assert_eq!(table.lookup(1), 1);
        assert_eq!(table.lookup(2), 1);
        assert_eq!(table.lookup(15), 255);
    }

    #[test]
    fn test_out_of_table_color() {
        let table = ColorTable::new(&dbz_table(), 0.5, -32.0).unwrap();
        assert_eq!(table.lookup(16), 0);
        assert_eq!(table.lookup(255), 0);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = ColorTable::new(&[1.0; 14], 1.0, 0.0).unwrap_err();
        assert!(matches!(err, WsiError::InvalidValueTable(14)));
        assert!(ColorTable::new(&[1.0; 16], 1.0, 0.0).is_err());
    }
}
