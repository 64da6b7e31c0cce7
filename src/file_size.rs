use std::fmt;

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
const UNIT_SIZE: f64 = 1024.0;

/// A byte count scaled for display, e.g. `1.50 KB`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSize {
    value: f64,
    unit: &'static str,
}

impl From<u64> for FileSize {
    fn from(value: u64) -> Self {
        FileSize::from_bytes(value)
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.unit)
    }
}

impl FileSize {
    #[cfg(test)]
    pub fn get_unit(&self) -> &'static str {
        self.unit
    }

    /// Scaled value in [`FileSize::get_unit`]. Below `PB` it stays under
    /// 1024 even after rounding to the two displayed decimals.
    #[cfg(test)]
    pub fn get_value(&self) -> f64 {
        self.value
    }

    pub fn from_bytes(bytes: u64) -> FileSize {
        let mut value = bytes as f64;
        for &unit in &UNITS[..UNITS.len() - 1] {
            if round_cents(value) < UNIT_SIZE {
                return FileSize { value, unit };
            }
            value /= UNIT_SIZE;
        }
        FileSize {
            value,
            unit: UNITS[UNITS.len() - 1],
        }
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
