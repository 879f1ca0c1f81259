//! Size rounding.

/// Every chunk boundary and every payload pointer is aligned to this many
/// bytes.
///
/// 16 is the strictest fundamental alignment on the platforms we care about,
/// and it is also the size of a chunk header, so header plus aligned payload
/// is itself aligned.
pub const ALIGNMENT: usize = 16;

/// Round `value` up to the nearest multiple of `increment`.
///
/// Returns `None` on overflow.
pub fn round_up(value: usize, increment: usize) -> Option<usize> {
    if value == 0 {
        return Some(0);
    }
    ((value - 1) / increment).checked_add(1)?.checked_mul(increment)
}

/// Round `size` up to [`ALIGNMENT`].
///
/// This is idempotent: `align(align(n)) == align(n)`.
///
/// # Panics
///
/// Panics if the rounded value does not fit in a `usize`. Use
/// [`checked_align`] where the size comes from a caller.
pub fn align(size: usize) -> usize {
    checked_align(size).expect("size overflows when aligned")
}

/// Round `size` up to [`ALIGNMENT`], or `None` if that overflows.
pub fn checked_align(size: usize) -> Option<usize> {
    round_up(size, ALIGNMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_align() {
        let mut expected = 0;
        for size in 0..=(ALIGNMENT * 10) {
            if size > expected {
                expected += ALIGNMENT;
            }
            assert_eq!(expected, align(size), "align({})", size);
        }
    }

    #[test]
    fn test_align_idempotent() {
        for size in [0, 1, 15, 16, 17, 31, 4095, 4096, 4097] {
            assert_eq!(align(align(size)), align(size));
        }
    }

    #[test]
    fn test_round_up_pages() {
        assert_eq!(round_up(1, 4096), Some(4096));
        assert_eq!(round_up(4096, 4096), Some(4096));
        assert_eq!(round_up(4097, 4096), Some(8192));
    }

    #[test]
    fn test_overflow() {
        assert_eq!(checked_align(usize::MAX), None);
        assert_eq!(checked_align(usize::MAX - ALIGNMENT + 2), None);
        assert_eq!(
            checked_align(usize::MAX - ALIGNMENT + 1),
            Some(usize::MAX - ALIGNMENT + 1)
        );
    }
}
