//! Byte-range planning for session parts

use std::ops::Range;

use crate::{PartSpec, SessionError};

/// Byte range of the source file assigned to one part.
///
/// `start..end` is half-open; ranges of consecutive parts touch without
/// overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub part_number: u32,
    pub start: u64,
    pub end: u64,
}

impl PartRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Range usable for slicing an in-memory buffer
    pub fn as_range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// Compute the byte range of every part from cumulative offsets.
///
/// Parts must be numbered 1..=n in sequence order and their sizes must sum
/// to `file_size`.
pub fn plan_parts(parts: &[PartSpec], file_size: u64) -> crate::Result<Vec<PartRange>> {
    let mut ranges = Vec::with_capacity(parts.len());
    let mut offset: u64 = 0;

    for (index, part) in parts.iter().enumerate() {
        let expected = index as u32 + 1;
        if part.part_number != expected {
            return Err(SessionError::PartOutOfSequence {
                expected,
                found: part.part_number,
            });
        }

        if part.upload_url.is_empty() {
            return Err(SessionError::MissingUploadUrl(part.part_number));
        }

        let end = offset.checked_add(part.size).ok_or(SessionError::SizeMismatch {
            parts: u64::MAX,
            file: file_size,
        })?;

        ranges.push(PartRange {
            part_number: part.part_number,
            start: offset,
            end,
        });
        offset = end;
    }

    if offset != file_size {
        return Err(SessionError::SizeMismatch {
            parts: offset,
            file: file_size,
        });
    }

    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn spec(part_number: u32, size: u64) -> PartSpec {
        PartSpec {
            part_number,
            size,
            upload_url: format!("http://store/part/{}", part_number),
        }
    }

    #[test]
    fn test_two_parts_of_three_mib() {
        let ranges = plan_parts(&[spec(1, 2 * MIB), spec(2, MIB)], 3 * MIB).unwrap();

        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].start, ranges[0].end), (0, 2_097_152));
        assert_eq!((ranges[1].start, ranges[1].end), (2_097_152, 3_145_728));
        assert_eq!(ranges[1].len(), MIB);
    }

    #[test]
    fn test_empty_file_has_no_ranges() {
        let ranges = plan_parts(&[], 0).unwrap();
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_zero_sized_part() {
        let ranges = plan_parts(&[spec(1, 4), spec(2, 0), spec(3, 2)], 6).unwrap();
        assert!(ranges[1].is_empty());
        assert_eq!(ranges[1].start, 4);
        assert_eq!(ranges[2].as_range(), 4..6);
    }

    #[test]
    fn test_size_mismatch() {
        let err = plan_parts(&[spec(1, 4), spec(2, 4)], 10).unwrap_err();
        assert_eq!(err, SessionError::SizeMismatch { parts: 8, file: 10 });

        assert!(plan_parts(&[], 1).is_err());
    }

    #[test]
    fn test_out_of_sequence_parts() {
        let err = plan_parts(&[spec(2, 4), spec(1, 4)], 8).unwrap_err();
        assert_eq!(err, SessionError::PartOutOfSequence { expected: 1, found: 2 });

        let err = plan_parts(&[spec(1, 4), spec(3, 4)], 8).unwrap_err();
        assert_eq!(err, SessionError::PartOutOfSequence { expected: 2, found: 3 });
    }

    #[test]
    fn test_missing_upload_url() {
        let mut part = spec(1, 4);
        part.upload_url.clear();
        assert_eq!(
            plan_parts(&[part], 4).unwrap_err(),
            SessionError::MissingUploadUrl(1)
        );
    }

    #[test]
    fn test_overflowing_sizes() {
        let err = plan_parts(&[spec(1, u64::MAX), spec(2, 1)], 0).unwrap_err();
        assert!(matches!(err, SessionError::SizeMismatch { .. }));
    }
}
