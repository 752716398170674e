// Telemetra
// Copyright (c) 2026 The Project Telemetra Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `residuals` module provides the bijection between signed residuals and non-negative
//! codewords, the lossy rounding helpers, and the model update blend.

use telemetra_core::util::bits::{mask_lower_u32, sign_extend_leq32_to_i32};

use crate::entity::MAX_MODEL_VALUE;

/// Folds a signed residual into a non-negative codeword, truncated to `max_data_bits`.
///
/// Non-negative residuals x map to 2x, negative residuals to 2|x| - 1.
#[inline]
pub fn map_to_pos(value: i32, max_data_bits: u32) -> u32 {
    let value = sign_extend_leq32_to_i32((value as u32) & mask_lower_u32(max_data_bits), max_data_bits);
    ((value << 1) ^ (value >> 31)) as u32 & mask_lower_u32(max_data_bits)
}

/// Unfolds a non-negative codeword back into a signed residual.
#[inline(always)]
pub fn remap(word: u32) -> i32 {
    // Input  => 0  1  2  3  4  5  6 ...
    // Output => 0 -1  1 -2  2 -3  3 ...
    //
    //  - If even: output = input / 2
    //  - If odd:  output = -(input + 1) / 2

    // Divide the input by 2 and convert to signed.
    let div2 = (word >> 1) as i32;

    // Using the LSB of the input, create a new signed integer that's either -1 or 0. XORing it
    // with div2 returns div2 for even inputs, and -div2 - 1 for odd inputs. The all-ones input
    // lands on i32::MIN instead of overflowing.
    let sign = -((word & 0x1) as i32);

    div2 ^ sign
}

/// Applies the lossy rounding a sample saw before encoding.
#[inline(always)]
pub fn round_fwd(value: u32, round: u32) -> u32 {
    debug_assert!(round < u32::BITS);
    value >> round
}

/// Reverses the lossy rounding, reconstructing the (quantized) sample.
#[inline(always)]
pub fn round_inv(value: u32, round: u32) -> u32 {
    debug_assert!(round < u32::BITS);
    value << round
}

/// Blends a decoded sample with its previous model into the model for the next decoding step.
///
/// A weight of 16 keeps the previous model; a weight of 0 replaces it with the sample. The
/// rounding round trip clears sample bits below the lossy shift so that both sides of the blend
/// live on the quantization grid.
#[inline]
pub fn update_model(sample: u32, model: u32, model_value: u8, round: u32) -> u32 {
    debug_assert!(model_value <= MAX_MODEL_VALUE);

    let weight = u64::from(model_value);
    let rounded = u64::from(round_inv(round_fwd(sample, round), round));

    ((rounded * (16 - weight) + u64::from(model) * weight) / 16) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_remap() {
        assert_eq!(remap(0), 0);
        assert_eq!(remap(1), -1);
        assert_eq!(remap(2), 1);
        assert_eq!(remap(3), -2);
        assert_eq!(remap(4), 2);
        assert_eq!(remap(5), -3);
        assert_eq!(remap(6), 3);

        assert_eq!(remap(u32::MAX), i32::MIN);
        assert_eq!(remap(u32::MAX) as u32, 0x8000_0000);
    }

    #[test]
    fn verify_map_to_pos_extremes() {
        assert_eq!(map_to_pos(i32::MIN, 32), u32::MAX);
        assert_eq!(map_to_pos(i32::MAX, 32), 0xffff_fffe);
        assert_eq!(map_to_pos(-1, 32), 1);
        assert_eq!(map_to_pos(0, 32), 0);
    }

    #[test]
    fn verify_map_remap_identity() {
        for width in [1u32, 2, 7, 8, 15, 16, 24, 31, 32] {
            let min = if width == 32 { i32::MIN } else { -(1 << (width - 1)) };
            let max = if width == 32 { i32::MAX } else { (1 << (width - 1)) - 1 };

            for value in [min, min + 1, -2, -1, 0, 1, 2, max - 1, max] {
                let value = value.clamp(min, max);
                assert_eq!(remap(map_to_pos(value, width)), value, "width = {}", width);
            }
        }
    }

    #[test]
    fn verify_model_update_weights() {
        // Full weight keeps the model, zero weight adopts the sample.
        assert_eq!(update_model(55, 123, 16, 0), 123);
        assert_eq!(update_model(55, 123, 0, 0), 55);

        // Intermediate weights blend with integer truncation.
        assert_eq!(update_model(10, 20, 8, 0), 15);
        assert_eq!(update_model(0xffff_ffff, 0xffff_ffff, 8, 0), 0xffff_ffff);

        // With lossy rounding the sample is snapped onto the quantization grid first.
        assert_eq!(update_model(0b1011, 0, 0, 2), 0b1000);
    }
}
