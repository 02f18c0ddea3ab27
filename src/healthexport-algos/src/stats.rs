use std::fmt;

/// Row accounting of one transform run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub rows: usize,
    pub rejected: usize,
    pub days: usize,
}

impl fmt::Display for TransformStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows, {} rejected, {} days",
            self.rows, self.rejected, self.days
        )
    }
}
