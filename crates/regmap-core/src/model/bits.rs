//! Bit-level field layouts and extraction arithmetic.

use std::fmt;

use crate::ValidationErrorKind;

/// Mask covering the low `width` bits (saturating at 64).
#[must_use]
pub const fn low_mask(width: u32) -> u64 {
    if width >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Returns the low `width` bits of `raw`, unshifted.
#[must_use]
pub const fn low_bits(raw: u64, width: u32) -> u64 {
    raw & low_mask(width)
}

/// Gathers the listed source bits of `raw` into consecutive result bits.
///
/// `bits[i]` of the source lands in result bit `i`, so the list order defines
/// the output order. Indices past bit 63 read as zero.
#[must_use]
pub fn extract_bits(raw: u64, bits: &[u8]) -> u64 {
    bits.iter()
        .zip(0..u64::BITS)
        .fold(0, |acc, (&bit, position)| {
            let source = raw.checked_shr(u32::from(bit)).unwrap_or(0) & 1;
            acc | (source << position)
        })
}

/// Which bits of the owning register a field occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLayout {
    /// Explicit source bit indices; list order is result bit order.
    Bits(Vec<u8>),
    /// The low `n` bits of the register.
    Width(u8),
}

impl FieldLayout {
    /// Builds a layout from the two mutually exclusive description keys.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrorKind::AmbiguousLayout`] when both are set and
    /// [`ValidationErrorKind::MissingLayout`] when neither is.
    pub fn from_parts(
        bits: Option<Vec<u8>>,
        width: Option<u8>,
    ) -> Result<Self, ValidationErrorKind> {
        match (bits, width) {
            (Some(bits), None) => Ok(Self::Bits(bits)),
            (None, Some(width)) => Ok(Self::Width(width)),
            (Some(_), Some(_)) => Err(ValidationErrorKind::AmbiguousLayout),
            (None, None) => Err(ValidationErrorKind::MissingLayout),
        }
    }

    /// Number of bits in the extracted value.
    #[must_use]
    pub fn bit_count(&self) -> u32 {
        match self {
            Self::Bits(bits) => u32::try_from(bits.len()).unwrap_or(u32::MAX),
            Self::Width(width) => u32::from(*width),
        }
    }

    /// Extracts this field's value from a raw register value.
    #[must_use]
    pub fn extract(&self, raw: u64) -> u64 {
        match self {
            Self::Bits(bits) => extract_bits(raw, bits),
            Self::Width(width) => low_bits(raw, u32::from(*width)),
        }
    }

    /// Checks the layout against a register of `register_bits` bits.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found: an empty or repeating bit list,
    /// a bit outside the register, or a width of zero or wider than the register.
    pub fn validate(&self, register_bits: u32) -> Result<(), ValidationErrorKind> {
        match self {
            Self::Bits(bits) => {
                if bits.is_empty() {
                    return Err(ValidationErrorKind::EmptyBitList);
                }
                let mut seen = 0u64;
                for &bit in bits {
                    if u32::from(bit) >= register_bits.min(u64::BITS) {
                        return Err(ValidationErrorKind::BitOutOfRange { bit, register_bits });
                    }
                    if seen & (1 << bit) != 0 {
                        return Err(ValidationErrorKind::DuplicateBit { bit });
                    }
                    seen |= 1 << bit;
                }
                Ok(())
            }
            Self::Width(width) => {
                if *width == 0 || u32::from(*width) > register_bits {
                    Err(ValidationErrorKind::WidthOutOfRange {
                        width: *width,
                        register_bits,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Renders the bit-range suffix used in field addresses: `[3:0]`, `[0]` or `[1,0]`.
impl fmt::Display for FieldLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Width(0) => write!(f, "[]"),
            Self::Width(1) => write!(f, "[0]"),
            Self::Width(width) => write!(f, "[{}:0]", width - 1),
            Self::Bits(bits) => {
                let list = bits
                    .iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "[{list}]")
            }
        }
    }
}
