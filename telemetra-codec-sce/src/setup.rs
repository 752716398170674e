// Telemetra
// Copyright (c) 2026 The Project Telemetra Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `setup` module builds the per-field decoder setup and provides the escape-symbol
//! policies.
//!
//! A [`DecoderSetup`] fixes everything one field's sample stream needs: the codeword primitive,
//! the escape policy, the validated parameters, and the codeword length cap. The escape policies
//! operate in the mapped (non-negative) value domain; unfolding back to signed residuals happens
//! in the sample pipeline.

use telemetra_core::errors::{corruption_error, invalid_parameter_error, Result};
use telemetra_core::io::BitReader;
use telemetra_core::util::bits::mask_lower_u32;

use crate::entity::{CmpMode, DataType};
use crate::golomb;

/// Codeword length cap for payloads of the hardware compressor.
pub const MAX_CW_LEN_HW: u32 = 16;
/// Codeword length cap for all software-compressed payloads.
pub const MAX_CW_LEN_SW: u32 = 32;

/// The smallest legal spillover threshold.
pub const MIN_SPILL: u32 = 2;

/// Codeword primitive chosen for a field's sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codeword {
    /// Pure unary code; the Golomb parameter is 1.
    Unary,
    /// Rice code; the Golomb parameter is a power of two.
    Rice,
    /// General Golomb code.
    Golomb,
    /// Fixed-width bit stuffing.
    Fixed,
}

/// Escape-symbol policy chosen for a field's sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// The codeword 0 escapes into an unencoded sample.
    Zero,
    /// Codewords at or above the spillover threshold carry the width of an unencoded sample.
    Multi,
    /// No escape mechanism (bit-stuffed streams).
    None,
}

/// Everything needed to decode one field's sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderSetup {
    pub codeword: Codeword,
    pub escape: Escape,
    /// The Golomb parameter, or the bit width of a stuffed stream.
    pub encoder_par1: u32,
    /// `floor(log2(encoder_par1))`.
    pub encoder_par2: u32,
    /// Golomb cutoff derived from `encoder_par1`.
    pub cutoff: u32,
    /// Spillover threshold.
    pub outlier: u32,
    /// Lossy rounding shift.
    pub lossy: u32,
    /// Bit width of the largest legal sample value of the field.
    pub max_data_bits: u32,
    /// Longest legal codeword in bits.
    pub max_cw_len: u32,
}

impl DecoderSetup {
    /// Validates the parameters of one field's stream and assembles its setup.
    pub fn new(
        cmp_mode: CmpMode,
        data_type: DataType,
        golomb_par: u32,
        spill: u32,
        round: u32,
        max_data_bits: u32,
    ) -> Result<DecoderSetup> {
        if golomb_par == 0 {
            return invalid_parameter_error("golomb parameter must be at least 1");
        }

        if max_data_bits == 0 || max_data_bits > u32::BITS {
            return invalid_parameter_error("max data bits outside [1, 32]");
        }

        if round >= u32::BITS {
            return invalid_parameter_error("lossy rounding shift too large");
        }

        let escape = match cmp_mode {
            CmpMode::ModelZero | CmpMode::DiffZero => Escape::Zero,
            CmpMode::ModelMulti | CmpMode::DiffMulti => Escape::Multi,
            CmpMode::Stuff => Escape::None,
            CmpMode::Raw => {
                return invalid_parameter_error("raw entities have no decoder setup");
            }
        };

        let codeword = match escape {
            Escape::None => Codeword::Fixed,
            _ if golomb_par == 1 => Codeword::Unary,
            _ if golomb_par.is_power_of_two() => Codeword::Rice,
            _ => Codeword::Golomb,
        };

        let max_cw_len = if data_type.is_hw_imagette() { MAX_CW_LEN_HW } else { MAX_CW_LEN_SW };

        if codeword == Codeword::Fixed && golomb_par > max_cw_len {
            return invalid_parameter_error("stuff bit width exceeds the codeword length cap");
        }

        if escape != Escape::None {
            if spill < MIN_SPILL {
                return invalid_parameter_error("spillover threshold too small");
            }
            if spill > mask_lower_u32(max_data_bits) {
                return invalid_parameter_error("spillover threshold exceeds max data bits");
            }
        }

        let (encoder_par2, cutoff) = golomb::golomb_pars(golomb_par);

        Ok(DecoderSetup {
            codeword,
            escape,
            encoder_par1: golomb_par,
            encoder_par2,
            cutoff,
            outlier: spill,
            lossy: round,
            max_data_bits,
            max_cw_len,
        })
    }
}

/// Decodes one plain codeword, enforcing the codeword length cap. This is the "normal" decode
/// the escape policies build on.
fn decode_codeword(setup: &DecoderSetup, bs: &mut BitReader<'_>) -> Result<u32> {
    let window = bs.peek_bits_max64();

    let (value, len) = match setup.codeword {
        Codeword::Unary => golomb::unary_decode(window),
        Codeword::Rice => golomb::rice_decode(window, setup.encoder_par2),
        Codeword::Golomb => {
            golomb::golomb_decode(window, setup.encoder_par1, setup.encoder_par2, setup.cutoff)
        }
        Codeword::Fixed => golomb::fixed_decode(window, setup.encoder_par1),
    };

    if len > setup.max_cw_len {
        return corruption_error("codeword exceeds the maximum codeword length");
    }

    bs.ignore_bits(u64::from(len))?;

    Ok(value)
}

/// Decodes one mapped sample value under the setup's escape policy.
pub fn decode_escaped_value(setup: &DecoderSetup, bs: &mut BitReader<'_>) -> Result<u32> {
    match setup.escape {
        Escape::Zero => decode_zero(setup, bs),
        Escape::Multi => decode_multi(setup, bs),
        Escape::None => decode_codeword(setup, bs),
    }
}

fn decode_zero(setup: &DecoderSetup, bs: &mut BitReader<'_>) -> Result<u32> {
    let decoded = decode_codeword(setup, bs)?;

    let value = if decoded == 0 {
        // Escape symbol: the mapped sample follows unencoded. Only zero (a sample that wrapped
        // to the top of the data range) or a value at or above the spillover threshold can have
        // been stored here.
        let unencoded = bs.read_bits_leq32(setup.max_data_bits)?;

        if unencoded != 0 && unencoded < setup.outlier {
            return corruption_error("unencoded sample below the spillover threshold");
        }

        unencoded
    }
    else {
        decoded
    };

    // Mapped samples are stored incremented by one so that zero is free to act as the escape
    // symbol. The decrement wraps, then truncates to the data width.
    Ok(value.wrapping_sub(1) & mask_lower_u32(setup.max_data_bits))
}

fn decode_multi(setup: &DecoderSetup, bs: &mut BitReader<'_>) -> Result<u32> {
    let decoded = decode_codeword(setup, bs)?;

    if decoded < setup.outlier {
        return Ok(decoded);
    }

    // Escape symbol: the codeword carries the width of the unencoded sample that follows.
    let width = 2 * (u64::from(decoded) - u64::from(setup.outlier) + 1);
    let max_width = (setup.max_data_bits + 1) & !1;

    if width > u64::from(max_width) {
        return corruption_error("escape follow-up width exceeds max data bits");
    }

    let width = width as u32;
    let unencoded = bs.read_bits_leq32(width)?;

    // The shortest follow-up codes the spillover threshold itself, so no set top bit is
    // expected there. Every longer follow-up must use one of its two top bits, or a shorter
    // form would have been coded.
    if width > 2 && (unencoded >> (width - 2)) == 0 {
        return corruption_error("escape follow-up has no top bit set");
    }

    Ok(unencoded.wrapping_add(setup.outlier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetra_core::errors::Error;

    fn setup(mode: CmpMode, golomb_par: u32, spill: u32, max_data_bits: u32) -> DecoderSetup {
        DecoderSetup::new(mode, DataType::Imagette, golomb_par, spill, 0, max_data_bits).unwrap()
    }

    #[test]
    fn verify_codeword_selection() {
        assert_eq!(setup(CmpMode::DiffZero, 1, 8, 16).codeword, Codeword::Unary);
        assert_eq!(setup(CmpMode::DiffZero, 4, 8, 16).codeword, Codeword::Rice);
        assert_eq!(setup(CmpMode::DiffZero, 3, 8, 16).codeword, Codeword::Golomb);
        assert_eq!(setup(CmpMode::Stuff, 16, 0, 16).codeword, Codeword::Fixed);

        let rice31 =
            DecoderSetup::new(CmpMode::DiffMulti, DataType::SFx, 1 << 31, 8, 0, 32).unwrap();
        assert_eq!(rice31.codeword, Codeword::Rice);
        assert_eq!(rice31.encoder_par2, 31);

        assert_eq!(setup(CmpMode::DiffZero, 3, 8, 16).cutoff, 1);
    }

    #[test]
    fn verify_setup_rejects_bad_parameters() {
        let new = |mode, par, spill, round, bits| {
            DecoderSetup::new(mode, DataType::Imagette, par, spill, round, bits)
        };

        assert!(new(CmpMode::DiffZero, 0, 8, 0, 16).is_err());
        assert!(new(CmpMode::DiffZero, 4, 8, 0, 0).is_err());
        assert!(new(CmpMode::DiffZero, 4, 8, 0, 33).is_err());
        assert!(new(CmpMode::DiffZero, 4, 8, 32, 16).is_err());
        assert!(new(CmpMode::Raw, 4, 8, 0, 16).is_err());
        assert!(new(CmpMode::DiffZero, 4, 1, 0, 16).is_err());
        assert!(new(CmpMode::DiffZero, 4, 0x1_0000, 0, 16).is_err());
        assert!(new(CmpMode::Stuff, 17, 0, 0, 16).is_err());
        assert!(new(CmpMode::Stuff, 16, 0, 0, 16).is_ok());
    }

    #[test]
    fn verify_hw_imagette_codeword_cap() {
        assert_eq!(setup(CmpMode::DiffZero, 1, 8, 16).max_cw_len, MAX_CW_LEN_HW);

        let fcam = DecoderSetup::new(CmpMode::DiffZero, DataType::FCamImagette, 1, 8, 0, 16);
        assert_eq!(fcam.unwrap().max_cw_len, MAX_CW_LEN_SW);

        let sfx = DecoderSetup::new(CmpMode::DiffZero, DataType::SFx, 1, 8, 0, 16);
        assert_eq!(sfx.unwrap().max_cw_len, MAX_CW_LEN_SW);
    }

    #[test]
    fn verify_zero_escape_stream() {
        // Spill 8 over 16-bit samples: 0 and 6 coded plainly, 0x4223 and 7 through escape
        // follow-ups, and a zero follow-up wrapping to the top of the data range.
        let stream = 0x8844_9fc0_0080_0000_u64.to_be_bytes();

        let setup = setup(CmpMode::DiffZero, 1, 8, 16);
        let mut bs = BitReader::new(&stream);

        let mut values = Vec::new();
        for _ in 0..5 {
            values.push(decode_escaped_value(&setup, &mut bs).unwrap());
        }

        assert_eq!(values, &[0, 0x4223, 6, 7, 0xffff]);
    }

    #[test]
    fn verify_multi_escape_stream() {
        // Six Golomb codewords (parameter 3) with spill 8 over 16-bit samples: 0, 1 and 7 coded
        // directly, 8 and 9 through the 2-bit follow-up (no top bit expected there), and 0x4223
        // through a 16-bit follow-up.
        let stream = 0x16b6_6df8_8436_0000_u64.to_be_bytes();

        let setup = setup(CmpMode::DiffMulti, 3, 8, 16);
        let mut bs = BitReader::new(&stream);

        let mut values = Vec::new();
        for _ in 0..6 {
            values.push(decode_escaped_value(&setup, &mut bs).unwrap());
        }

        assert_eq!(values, &[0, 1, 7, 8, 9, 0x4223]);
    }

    #[test]
    fn verify_codeword_length_cap_boundary() {
        let setup = setup(CmpMode::DiffZero, 1, 8, 16);

        // Fifteen leading ones: a 16-bit codeword, exactly at the cap.
        let stream = 0xfffe_0000_u32.to_be_bytes();
        let mut bs = BitReader::new(&stream);
        assert_eq!(decode_escaped_value(&setup, &mut bs).unwrap(), 14);

        // Sixteen leading ones: one bit over the cap.
        let stream = 0xffff_0000_u32.to_be_bytes();
        let mut bs = BitReader::new(&stream);
        assert_eq!(
            decode_escaped_value(&setup, &mut bs),
            Err(Error::CorruptionDetected("codeword exceeds the maximum codeword length"))
        );
    }

    #[test]
    fn verify_truncated_codeword_is_a_short_buffer() {
        let setup = setup(CmpMode::DiffZero, 1, 8, 16);

        // The terminating zero of the unary codeword lies past the end of the stream.
        let mut bs = BitReader::new(&[0x07]);
        bs.ignore_bits(5).unwrap();

        assert!(matches!(decode_escaped_value(&setup, &mut bs), Err(Error::ShortBuffer(_))));
        assert_eq!(bs.pos(), 5);
    }

    #[test]
    fn verify_zero_escape_rejects_small_follow_ups() {
        let setup = setup(CmpMode::DiffZero, 1, 8, 16);

        // Escape symbol followed by the unencoded value 5, which is below the threshold.
        let stream = 0x0002_8000_u32.to_be_bytes();
        let mut bs = BitReader::new(&stream);

        assert!(matches!(
            decode_escaped_value(&setup, &mut bs),
            Err(Error::CorruptionDetected(_))
        ));
    }

    #[test]
    fn verify_multi_escape_rejects_clear_top_bits() {
        let setup = setup(CmpMode::DiffMulti, 1, 8, 16);

        // Codeword 9 selects a 4-bit follow-up; 0b0011 leaves both top bits clear.
        let mut bw = telemetra_core::io::BitWriter::new();
        bw.write_bits_leq32(0x3fe, 10); // nine ones and the terminator: unary 9
        bw.write_bits_leq32(0b0011, 4);
        let stream = bw.finish();

        let mut bs = BitReader::new(&stream);
        assert_eq!(
            decode_escaped_value(&setup, &mut bs),
            Err(Error::CorruptionDetected("escape follow-up has no top bit set"))
        );
    }

    #[test]
    fn verify_multi_escape_rejects_oversized_widths() {
        let setup = DecoderSetup::new(CmpMode::DiffMulti, DataType::SFx, 1, 8, 0, 16).unwrap();

        // Codeword 16 would select an 18-bit follow-up, wider than the 16-bit data range.
        let mut bw = telemetra_core::io::BitWriter::new();
        bw.write_bits_leq32(0xffff, 16); // sixteen ones
        bw.write_bits_leq32(0, 3);
        let stream = bw.finish();

        let mut bs = BitReader::new(&stream);
        assert_eq!(
            decode_escaped_value(&setup, &mut bs),
            Err(Error::CorruptionDetected("escape follow-up width exceeds max data bits"))
        );
    }
}
