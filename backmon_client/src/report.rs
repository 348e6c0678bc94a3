//! Bookkeeping of non-fatal errors during a monitoring run.
//!
//! Single bad rows and failed batches are logged and counted instead of
//! aborting the run; the tally feeds the `backmon_metrics` self-report.

/// Counts of rows and batches that could not be written.
#[derive(Debug, Default)]
pub struct ErrorTally {
    dropped_rows: u64,
    failed_batches: u64,
    messages: Vec<String>,
}

impl ErrorTally {
    pub fn row_dropped(&mut self, message: impl Into<String>) {
        self.dropped_rows += 1;
        self.messages.push(message.into());
    }

    pub fn batch_failed(&mut self, message: impl Into<String>) {
        self.failed_batches += 1;
        self.messages.push(message.into());
    }

    pub fn dropped_rows(&self) -> u64 {
        self.dropped_rows
    }

    pub fn failed_batches(&self) -> u64 {
        self.failed_batches
    }

    pub fn error_count(&self) -> u64 {
        self.dropped_rows + self.failed_batches
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate() {
        let mut tally = ErrorTally::default();
        assert!(tally.is_clean());

        tally.row_dropped("bad timestamp");
        tally.row_dropped("no fields");
        tally.batch_failed("server unreachable");

        assert_eq!(tally.dropped_rows(), 2);
        assert_eq!(tally.failed_batches(), 1);
        assert_eq!(tally.error_count(), 3);
        assert_eq!(tally.messages().len(), 3);
        assert!(!tally.is_clean());
    }
}
