// Telemetra
// Copyright (c) 2026 The Project Telemetra Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `entity` module reads and writes the fixed-layout header of a science compression entity.

use telemetra_core::errors::{
    header_mismatch_error, invalid_parameter_error, short_buffer_error,
    unsupported_data_type_error, Result,
};

use crate::records;
use crate::records::SampleRecord;

/// Size of the generic entity header in bytes.
pub const GENERIC_HEADER_SIZE: usize = 32;
/// Size of an entity header for non-adaptive imagette data types.
pub const IMAGETTE_HEADER_SIZE: usize = GENERIC_HEADER_SIZE + 4;
/// Size of an entity header for adaptive imagette data types.
pub const IMAGETTE_ADAPTIVE_HEADER_SIZE: usize = GENERIC_HEADER_SIZE + 12;
/// Size of an entity header for all non-imagette data types.
pub const NON_IMAGETTE_HEADER_SIZE: usize = GENERIC_HEADER_SIZE + 32;

/// The largest weight a model may carry in the sample/model blend.
pub const MAX_MODEL_VALUE: u8 = 16;

/// Bit within the on-wire data type word flagging an uncompressed payload.
const RAW_BIT: u16 = 1 << 15;

/// `DataType` enumerates every science product an entity can carry.
///
/// The tag values are part of the wire format and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DataType {
    Unknown = 0,
    Imagette = 1,
    ImagetteAdaptive = 2,
    SatImagette = 3,
    SatImagetteAdaptive = 4,
    Offset = 5,
    Background = 6,
    Smearing = 7,
    SFx = 8,
    SFxEfx = 9,
    SFxNcob = 10,
    SFxEfxNcobEcob = 11,
    LFx = 12,
    LFxEfx = 13,
    LFxNcob = 14,
    LFxEfxNcobEcob = 15,
    FFx = 16,
    FFxEfx = 17,
    FFxNcob = 18,
    FFxEfxNcobEcob = 19,
    FCamImagette = 20,
    FCamImagetteAdaptive = 21,
    FCamOffset = 22,
    FCamBackground = 23,
}

impl DataType {
    /// Gets the `DataType` for a wire tag, or `None` when the tag is not assigned.
    pub fn from_tag(tag: u16) -> Option<DataType> {
        let data_type = match tag {
            0 => DataType::Unknown,
            1 => DataType::Imagette,
            2 => DataType::ImagetteAdaptive,
            3 => DataType::SatImagette,
            4 => DataType::SatImagetteAdaptive,
            5 => DataType::Offset,
            6 => DataType::Background,
            7 => DataType::Smearing,
            8 => DataType::SFx,
            9 => DataType::SFxEfx,
            10 => DataType::SFxNcob,
            11 => DataType::SFxEfxNcobEcob,
            12 => DataType::LFx,
            13 => DataType::LFxEfx,
            14 => DataType::LFxNcob,
            15 => DataType::LFxEfxNcobEcob,
            16 => DataType::FFx,
            17 => DataType::FFxEfx,
            18 => DataType::FFxNcob,
            19 => DataType::FFxEfxNcobEcob,
            20 => DataType::FCamImagette,
            21 => DataType::FCamImagetteAdaptive,
            22 => DataType::FCamOffset,
            23 => DataType::FCamBackground,
            _ => return None,
        };
        Some(data_type)
    }

    /// Gets the wire tag of the data type.
    #[inline(always)]
    pub fn tag(&self) -> u16 {
        *self as u16
    }

    /// Returns true for all imagette data types (single u16 samples, no collection header).
    pub fn is_imagette(&self) -> bool {
        matches!(
            *self,
            DataType::Imagette
                | DataType::ImagetteAdaptive
                | DataType::SatImagette
                | DataType::SatImagetteAdaptive
                | DataType::FCamImagette
                | DataType::FCamImagetteAdaptive
        )
    }

    /// Returns true for the imagette data types carrying adaptive parameter pairs.
    pub fn is_adaptive_imagette(&self) -> bool {
        matches!(
            *self,
            DataType::ImagetteAdaptive
                | DataType::SatImagetteAdaptive
                | DataType::FCamImagetteAdaptive
        )
    }

    /// Returns true for the four imagette data types the hardware compressor serves. Their
    /// codewords are capped at 16 bits.
    pub fn is_hw_imagette(&self) -> bool {
        matches!(
            *self,
            DataType::Imagette
                | DataType::ImagetteAdaptive
                | DataType::SatImagette
                | DataType::SatImagetteAdaptive
        )
    }

    /// Gets the size in bytes of one decoded sample record, or `None` for `Unknown`.
    pub fn sample_size(&self) -> Option<usize> {
        let size = match *self {
            DataType::Unknown => return None,
            DataType::Imagette
            | DataType::ImagetteAdaptive
            | DataType::SatImagette
            | DataType::SatImagetteAdaptive
            | DataType::FCamImagette
            | DataType::FCamImagetteAdaptive => records::IMAGETTE_SAMPLE_SIZE,
            DataType::Offset | DataType::FCamOffset => records::Offset::SIZE,
            DataType::Background | DataType::FCamBackground => records::Background::SIZE,
            DataType::Smearing => records::Smearing::SIZE,
            DataType::SFx => records::SFx::SIZE,
            DataType::SFxEfx => records::SFxEfx::SIZE,
            DataType::SFxNcob => records::SFxNcob::SIZE,
            DataType::SFxEfxNcobEcob => records::SFxEfxNcobEcob::SIZE,
            DataType::LFx => records::LFx::SIZE,
            DataType::LFxEfx => records::LFxEfx::SIZE,
            DataType::LFxNcob => records::LFxNcob::SIZE,
            DataType::LFxEfxNcobEcob => records::LFxEfxNcobEcob::SIZE,
            DataType::FFx => records::FFx::SIZE,
            DataType::FFxEfx => records::FFxEfx::SIZE,
            DataType::FFxNcob => records::FFxNcob::SIZE,
            DataType::FFxEfxNcobEcob => records::FFxEfxNcobEcob::SIZE,
        };
        Some(size)
    }

    /// Gets the total entity header size for this data type.
    pub fn header_size(&self) -> usize {
        if self.is_adaptive_imagette() {
            IMAGETTE_ADAPTIVE_HEADER_SIZE
        }
        else if self.is_imagette() {
            IMAGETTE_HEADER_SIZE
        }
        else {
            NON_IMAGETTE_HEADER_SIZE
        }
    }
}

/// `CmpMode` enumerates the compression modes an entity can be encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CmpMode {
    /// The payload is the uncompressed big-endian sample stream.
    Raw = 0,
    /// Model predictor with the zero-escape symbol mechanism.
    ModelZero = 1,
    /// Previous-sample predictor with the zero-escape symbol mechanism.
    DiffZero = 2,
    /// Model predictor with the multi-escape symbol mechanism.
    ModelMulti = 3,
    /// Previous-sample predictor with the multi-escape symbol mechanism.
    DiffMulti = 4,
    /// Samples are bit-stuffed at a fixed width, without prediction.
    Stuff = 5,
}

impl CmpMode {
    /// Gets the `CmpMode` for a wire value, or `None` when the value is not assigned.
    pub fn from_value(value: u8) -> Option<CmpMode> {
        let mode = match value {
            0 => CmpMode::Raw,
            1 => CmpMode::ModelZero,
            2 => CmpMode::DiffZero,
            3 => CmpMode::ModelMulti,
            4 => CmpMode::DiffMulti,
            5 => CmpMode::Stuff,
            _ => return None,
        };
        Some(mode)
    }

    /// Gets the wire value of the mode.
    #[inline(always)]
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Returns true when decoding in this mode blends samples with a caller-provided model.
    pub fn is_model(&self) -> bool {
        matches!(*self, CmpMode::ModelZero | CmpMode::ModelMulti)
    }

    /// Returns true for the raw (uncompressed) mode.
    pub fn is_raw(&self) -> bool {
        *self == CmpMode::Raw
    }
}

/// Primary Golomb parameter pair of an imagette entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImagettePars {
    pub spill: u16,
    pub golomb_par: u8,
}

/// One of the six (spillover, parameter) pairs of a non-imagette entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NonImagettePair {
    /// Spillover threshold, 24 bits on the wire.
    pub spill: u32,
    /// Golomb parameter (or stuff bit width), 16 bits on the wire.
    pub cmp_par: u16,
}

/// Index of one of the six non-imagette parameter pairs.
///
/// The binding of pairs to record fields is fixed per data-type family: the flux families use
/// pair 1 for exposure flags, 2 for flux, 3 for centre of brightness, 4 for extended flux, 5 for
/// extended centre of brightness, and 6 for the long-cadence variance fields; the auxiliary
/// science types use pair 1 for the mean, 2 for the variance, and 3 for the outlier pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpParId {
    Par1 = 0,
    Par2 = 1,
    Par3 = 2,
    Par4 = 3,
    Par5 = 4,
    Par6 = 5,
}

/// The data-type specific tail of an entity header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecificPars {
    Imagette(ImagettePars),
    ImagetteAdaptive { primary: ImagettePars, ap1: ImagettePars, ap2: ImagettePars },
    NonImagette([NonImagettePair; 6]),
}

impl SpecificPars {
    /// Gets the primary imagette parameter pair, or an error for non-imagette entities.
    pub fn imagette(&self) -> Result<ImagettePars> {
        match *self {
            SpecificPars::Imagette(pars) => Ok(pars),
            SpecificPars::ImagetteAdaptive { primary, .. } => Ok(primary),
            SpecificPars::NonImagette(_) => {
                invalid_parameter_error("imagette parameters requested from non-imagette header")
            }
        }
    }

    /// Gets a non-imagette parameter pair, or an error for imagette entities.
    pub fn pair(&self, id: CmpParId) -> Result<NonImagettePair> {
        match *self {
            SpecificPars::NonImagette(pairs) => Ok(pairs[id as usize]),
            _ => invalid_parameter_error("parameter pair requested from imagette header"),
        }
    }
}

/// The parsed entity header: every parameter needed to decode the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityHeader {
    /// Total entity size (header plus payload), 24 bits.
    pub entity_size: u32,
    /// Size of the decompressed data in bytes, 24 bits.
    pub original_size: u32,
    /// Coarse/fine timestamp of the first sample, 48 bits.
    pub start_timestamp: u64,
    /// Coarse/fine timestamp of the last sample, 48 bits.
    pub end_timestamp: u64,
    pub data_type: DataType,
    pub cmp_mode: CmpMode,
    /// Model weight in `[0, 16]` used by the model modes.
    pub model_value: u8,
    pub model_id: u16,
    pub model_counter: u8,
    /// Version selector into the max-used-bits table registry.
    pub max_used_bits_version: u8,
    /// Right shift applied to samples before encoding; 0 is lossless.
    pub lossy_round: u16,
    /// Size of the compressed payload in bytes, 24 bits.
    pub cmp_data_size: u32,
    pub pars: SpecificPars,
}

impl EntityHeader {
    /// Parses and validates an entity header from the start of `entity`.
    pub fn read(entity: &[u8]) -> Result<EntityHeader> {
        if entity.len() < GENERIC_HEADER_SIZE {
            return short_buffer_error("entity is smaller than the generic header");
        }

        let entity_size = read_be_u24(entity, 0);
        let original_size = read_be_u24(entity, 3);
        let start_timestamp = read_be_u48(entity, 6);
        let end_timestamp = read_be_u48(entity, 12);
        let data_type_word = read_be_u16(entity, 18);
        let cmp_mode_value = entity[20];
        let model_value = entity[21];
        let model_id = read_be_u16(entity, 22);
        let model_counter = entity[24];
        let max_used_bits_version = entity[25];
        let lossy_round = read_be_u16(entity, 26);
        let cmp_data_size = read_be_u24(entity, 28);

        let data_type = match DataType::from_tag(data_type_word & !RAW_BIT) {
            Some(DataType::Unknown) | None => {
                return unsupported_data_type_error("unknown data type tag");
            }
            Some(data_type) => data_type,
        };

        let cmp_mode = match CmpMode::from_value(cmp_mode_value) {
            Some(mode) => mode,
            None => return invalid_parameter_error("unknown compression mode"),
        };

        if (data_type_word & RAW_BIT != 0) != cmp_mode.is_raw() {
            return header_mismatch_error("raw bit disagrees with the compression mode");
        }

        if cmp_mode.is_model() && model_value > MAX_MODEL_VALUE {
            return header_mismatch_error("model weight exceeds 16");
        }

        let header_size = data_type.header_size();

        if entity.len() < header_size {
            return short_buffer_error("entity is smaller than its data type specific header");
        }

        let pars = if data_type.is_adaptive_imagette() {
            SpecificPars::ImagetteAdaptive {
                primary: read_imagette_pars(entity, GENERIC_HEADER_SIZE),
                ap1: read_imagette_pars(entity, GENERIC_HEADER_SIZE + 3),
                ap2: read_imagette_pars(entity, GENERIC_HEADER_SIZE + 6),
            }
        }
        else if data_type.is_imagette() {
            SpecificPars::Imagette(read_imagette_pars(entity, GENERIC_HEADER_SIZE))
        }
        else {
            let mut pairs = [NonImagettePair::default(); 6];
            for (i, pair) in pairs.iter_mut().enumerate() {
                *pair = read_non_imagette_pair(entity, GENERIC_HEADER_SIZE + 5 * i);
            }
            SpecificPars::NonImagette(pairs)
        };

        let header = EntityHeader {
            entity_size,
            original_size,
            start_timestamp,
            end_timestamp,
            data_type,
            cmp_mode,
            model_value,
            model_id,
            model_counter,
            max_used_bits_version,
            lossy_round,
            cmp_data_size,
            pars,
        };

        header.validate_sizes()?;

        Ok(header)
    }

    /// Serializes the header, enforcing the same invariants the parser does plus field width
    /// overflow checks.
    pub fn write(&self) -> Result<Vec<u8>> {
        self.validate_sizes()?;

        if self.data_type == DataType::Unknown {
            return unsupported_data_type_error("unknown data type tag");
        }

        if self.cmp_mode.is_model() && self.model_value > MAX_MODEL_VALUE {
            return header_mismatch_error("model weight exceeds 16");
        }

        if self.entity_size > 0x00ff_ffff
            || self.original_size > 0x00ff_ffff
            || self.cmp_data_size > 0x00ff_ffff
        {
            return invalid_parameter_error("size field exceeds 24 bits");
        }

        if self.start_timestamp > 0xffff_ffff_ffff || self.end_timestamp > 0xffff_ffff_ffff {
            return invalid_parameter_error("timestamp exceeds 48 bits");
        }

        let mut buf = Vec::with_capacity(self.data_type.header_size());

        write_be_u24(&mut buf, self.entity_size);
        write_be_u24(&mut buf, self.original_size);
        write_be_u48(&mut buf, self.start_timestamp);
        write_be_u48(&mut buf, self.end_timestamp);

        let mut data_type_word = self.data_type.tag();
        if self.cmp_mode.is_raw() {
            data_type_word |= RAW_BIT;
        }
        buf.extend_from_slice(&data_type_word.to_be_bytes());

        buf.push(self.cmp_mode.value());
        buf.push(self.model_value);
        buf.extend_from_slice(&self.model_id.to_be_bytes());
        buf.push(self.model_counter);
        buf.push(self.max_used_bits_version);
        buf.extend_from_slice(&self.lossy_round.to_be_bytes());
        write_be_u24(&mut buf, self.cmp_data_size);
        buf.push(0);

        match self.pars {
            SpecificPars::Imagette(pars) => {
                if !self.data_type.is_imagette() || self.data_type.is_adaptive_imagette() {
                    return header_mismatch_error("parameter pairs disagree with the data type");
                }
                write_imagette_pars(&mut buf, pars);
                buf.push(0);
            }
            SpecificPars::ImagetteAdaptive { primary, ap1, ap2 } => {
                if !self.data_type.is_adaptive_imagette() {
                    return header_mismatch_error("parameter pairs disagree with the data type");
                }
                write_imagette_pars(&mut buf, primary);
                write_imagette_pars(&mut buf, ap1);
                write_imagette_pars(&mut buf, ap2);
                buf.extend_from_slice(&[0; 3]);
            }
            SpecificPars::NonImagette(pairs) => {
                if self.data_type.is_imagette() {
                    return header_mismatch_error("parameter pairs disagree with the data type");
                }
                for pair in &pairs {
                    if pair.spill > 0x00ff_ffff {
                        return invalid_parameter_error("spillover threshold exceeds 24 bits");
                    }
                    write_be_u24(&mut buf, pair.spill);
                    buf.extend_from_slice(&pair.cmp_par.to_be_bytes());
                }
                buf.extend_from_slice(&[0; 2]);
            }
        }

        debug_assert_eq!(buf.len(), self.data_type.header_size());

        Ok(buf)
    }

    /// Gets the number of sample records the decompressed data holds.
    pub fn samples(&self) -> usize {
        // Divisibility is checked on read/write, so the division here is exact.
        let sample_size = self.data_type.sample_size().unwrap_or(1);
        if self.data_type.is_imagette() {
            self.original_size as usize / sample_size
        }
        else {
            (self.original_size as usize - records::COLLECTION_HEADER_SIZE) / sample_size
        }
    }

    /// Borrows the compressed payload out of the full entity buffer.
    pub fn payload<'a>(&self, entity: &'a [u8]) -> Result<&'a [u8]> {
        let header_size = self.data_type.header_size();

        if u64::from(self.entity_size) < (header_size as u64) + u64::from(self.cmp_data_size) {
            return header_mismatch_error("compressed data does not fit the declared entity size");
        }

        if entity.len() < header_size + self.cmp_data_size as usize {
            return short_buffer_error("entity buffer is smaller than the declared payload");
        }

        Ok(&entity[header_size..header_size + self.cmp_data_size as usize])
    }

    fn validate_sizes(&self) -> Result<()> {
        let sample_size = match self.data_type.sample_size() {
            Some(size) => size as u32,
            None => return unsupported_data_type_error("unknown data type tag"),
        };

        if self.data_type.is_imagette() {
            if self.original_size % sample_size != 0 {
                return header_mismatch_error("original size is not a whole number of samples");
            }
        }
        else {
            let collection = records::COLLECTION_HEADER_SIZE as u32;
            if self.original_size < collection
                || (self.original_size - collection) % sample_size != 0
            {
                return header_mismatch_error("original size is not a whole number of samples");
            }

            if self.cmp_data_size < collection {
                return header_mismatch_error("payload is smaller than the collection header");
            }
        }

        if self.cmp_mode.is_raw() {
            if self.cmp_data_size != self.original_size {
                return header_mismatch_error("raw payload size disagrees with the original size");
            }
        }
        else if self.cmp_data_size % 4 != 0 {
            return header_mismatch_error("compressed data size is not a whole number of words");
        }

        Ok(())
    }
}

fn read_be_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

fn read_be_u24(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([0, buf[off], buf[off + 1], buf[off + 2]])
}

fn read_be_u48(buf: &[u8], off: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[2..8].copy_from_slice(&buf[off..off + 6]);
    u64::from_be_bytes(bytes)
}

fn read_imagette_pars(buf: &[u8], off: usize) -> ImagettePars {
    ImagettePars { spill: read_be_u16(buf, off), golomb_par: buf[off + 2] }
}

fn read_non_imagette_pair(buf: &[u8], off: usize) -> NonImagettePair {
    NonImagettePair { spill: read_be_u24(buf, off), cmp_par: read_be_u16(buf, off + 3) }
}

fn write_be_u24(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes()[1..4]);
}

fn write_be_u48(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes()[2..8]);
}

fn write_imagette_pars(buf: &mut Vec<u8>, pars: ImagettePars) {
    buf.extend_from_slice(&pars.spill.to_be_bytes());
    buf.push(pars.golomb_par);
}
