//! Byte-level helpers shared by the wire layer.
//!
//! Floats never travel as floats: the wire carries the IEEE-754 bit
//! pattern of an `f32` inside a big-endian `u32`, so both ends agree on
//! the exact value with no formatting or rounding involved.

/// The IEEE-754 bit pattern of `value`.
pub fn f32_to_bits(value: f32) -> u32 {
    value.to_bits()
}

/// The `f32` whose IEEE-754 bit pattern is `bits`.
pub fn f32_from_bits(bits: u32) -> f32 {
    f32::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_bitcast_roundtrip() {
        for value in [0.0f32, -0.0, 0.5, 1.0, 7.5, -3.25, f32::MIN, f32::MAX, 0.499] {
            let bits = f32_to_bits(value);
            let back = f32_from_bits(bits);
            assert_eq!(back.to_bits(), value.to_bits(), "roundtrip failed for {value}");
        }
    }

    #[test]
    fn test_f32_bitcast_is_exact() {
        // 1.0f32 is 0x3F800000; no formatting may sneak in.
        assert_eq!(f32_to_bits(1.0), 0x3F80_0000);
        assert_eq!(f32_from_bits(0x3F80_0000), 1.0);
    }
}
