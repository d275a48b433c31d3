//! Context assembly from retrieved memories

use crate::memory::MemoryRecord;

/// Join memory contents with newlines, preserving retrieval order.
///
/// No deduplication, truncation or token budgeting happens here; an empty
/// slice yields an empty string, which providers treat as "no context".
pub fn build_context(records: &[MemoryRecord]) -> String {
    records
        .iter()
        .map(|record| record.memory.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_order_preserved() {
        let records = vec![
            MemoryRecord::new("2", "prefers dark mode"),
            MemoryRecord::new("1", "has a dog named Rex"),
        ];

        assert_eq!(
            build_context(&records),
            "prefers dark mode\nhas a dog named Rex"
        );
    }

    #[test]
    fn test_duplicates_kept() {
        let records = vec![MemoryRecord::new("a", "x"), MemoryRecord::new("b", "x")];
        assert_eq!(build_context(&records), "x\nx");
    }
}
