// Telemetra
// Copyright (c) 2026 The Project Telemetra Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `decoder` module assembles decoded sample records from the compressed payload and
//! provides the public decompression entry points.

use log::{debug, warn};

use telemetra_core::errors::{
    invalid_parameter_error, model_required_error, short_buffer_error, Result,
};
use telemetra_core::io::BitReader;
use telemetra_core::util::bits::mask_lower_u32;

use crate::entity::{CmpMode, CmpParId, DataType, EntityHeader, MAX_MODEL_VALUE};
use crate::maxbits::{self, MaxUsedBits, MAX_USED_BITS_SAFE};
use crate::records::{
    Background, Endian, FFx, FFxEfx, FFxEfxNcobEcob, FFxNcob, FieldReader, FieldWriter, LFx,
    LFxEfx, LFxEfxNcobEcob, LFxNcob, Offset, SFx, SFxEfx, SFxEfxNcobEcob, SFxNcob, SampleRecord,
    Smearing, COLLECTION_HEADER_SIZE, IMAGETTE_SAMPLE_SIZE,
};
use crate::residuals::{remap, round_fwd, round_inv, update_model};
use crate::setup::{decode_escaped_value, DecoderSetup, Escape};

// Parameter pair assignment of the flux record families.
const PAIR_EXP_FLAGS: CmpParId = CmpParId::Par1;
const PAIR_FX: CmpParId = CmpParId::Par2;
const PAIR_NCOB: CmpParId = CmpParId::Par3;
const PAIR_EFX: CmpParId = CmpParId::Par4;
const PAIR_ECOB: CmpParId = CmpParId::Par5;
const PAIR_VARIANCE: CmpParId = CmpParId::Par6;

// Parameter pair assignment of the auxiliary science types.
const PAIR_MEAN: CmpParId = CmpParId::Par1;
const PAIR_AUX_VARIANCE: CmpParId = CmpParId::Par2;
const PAIR_OUTLIER_PIXELS: CmpParId = CmpParId::Par3;

/// The decoding parameters of a hardware-compressed payload, standing in for the entity header
/// the hardware compressor does not emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RdcuInfo {
    pub cmp_mode: CmpMode,
    pub golomb_par: u32,
    pub spill: u32,
    pub model_value: u8,
    pub round: u32,
    /// Number of 16-bit imagette samples the payload decodes to.
    pub samples: usize,
}

/// Gets the decompressed size in bytes of an entity without decoding it.
///
/// This is the probe half of two-phase allocation: size the output buffer here, then call
/// [`decompress`].
pub fn decompressed_size(entity: &[u8]) -> Result<usize> {
    let header = EntityHeader::read(entity)?;

    resolve_max_used_bits(&header)?;
    header.payload(entity)?;

    Ok(header.original_size as usize)
}

/// Decompresses one entity into `output`, returning the number of bytes decoded.
///
/// The model modes read the previous decompressed data out of `model_in` and, when `model_out`
/// is given, store the updated model there. Passing `None` for `output` only probes the
/// decompressed size, exactly like [`decompressed_size`]. On an error the contents of `output`
/// past the last successful sample are unspecified, but nothing is ever written past
/// `original_size` bytes.
pub fn decompress(
    entity: &[u8],
    model_in: Option<&[u8]>,
    mut model_out: Option<&mut [u8]>,
    output: Option<&mut [u8]>,
) -> Result<usize> {
    let header = EntityHeader::read(entity)?;
    let widths = resolve_max_used_bits(&header)?;
    let payload = header.payload(entity)?;

    let size = header.original_size as usize;

    debug!(
        "decompressing a {:?} entity: mode {:?}, {} samples, {} payload bytes",
        header.data_type,
        header.cmp_mode,
        header.samples(),
        payload.len()
    );

    let output = match output {
        Some(output) => output,
        None => return Ok(size),
    };

    if output.len() < size {
        return invalid_parameter_error("output buffer too small for the decompressed data");
    }
    let output = &mut output[..size];

    let model_in = if header.cmp_mode.is_model() {
        let model = match model_in {
            Some(model) => model,
            None => return model_required_error(),
        };

        if model.len() != size {
            return invalid_parameter_error("model buffer size disagrees with the original size");
        }

        if let Some(ref model_out) = model_out {
            if model_out.len() < size {
                return invalid_parameter_error("updated-model buffer too small");
            }
        }

        Some(model)
    }
    else {
        None
    };

    if header.cmp_mode.is_raw() {
        decompress_raw(&header, payload, output);
        return Ok(size);
    }

    let leftover = if header.data_type.is_imagette() {
        let pars = header.pars.imagette()?;

        let setup = DecoderSetup::new(
            header.cmp_mode,
            header.data_type,
            u32::from(pars.golomb_par),
            u32::from(pars.spill),
            u32::from(header.lossy_round),
            imagette_max_data_bits(header.data_type, &widths),
        )?;

        let mut bs = BitReader::new(payload);

        decompress_imagette_stream(
            &setup,
            header.cmp_mode,
            header.model_value,
            header.samples(),
            &mut bs,
            model_in,
            model_out.as_deref_mut(),
            output,
        )?;

        bs.bits_left()
    }
    else {
        // The collection header is not compressed: copy it verbatim to the output (and the
        // updated model), then decode the record stream that follows it.
        output[..COLLECTION_HEADER_SIZE].copy_from_slice(&payload[..COLLECTION_HEADER_SIZE]);

        if let Some(model_out) = model_out.as_deref_mut() {
            model_out[..COLLECTION_HEADER_SIZE]
                .copy_from_slice(&payload[..COLLECTION_HEADER_SIZE]);
        }

        let mut bs = BitReader::new(&payload[COLLECTION_HEADER_SIZE..]);

        let out = &mut output[COLLECTION_HEADER_SIZE..];
        let model_in = model_in.map(|model| &model[COLLECTION_HEADER_SIZE..]);
        let mut model_out =
            model_out.as_deref_mut().map(|model| &mut model[COLLECTION_HEADER_SIZE..size]);

        let h = &header;
        let w = &widths;
        let bs_ref = &mut bs;
        let model_out = model_out.as_deref_mut();

        match header.data_type {
            DataType::Offset => {
                decompress_offset(h, bs_ref, out, model_in, model_out, w.nc_offset_mean, w.nc_offset_variance)?
            }
            DataType::FCamOffset => {
                decompress_offset(h, bs_ref, out, model_in, model_out, w.fc_offset_mean, w.fc_offset_variance)?
            }
            DataType::Background => decompress_background(
                h, bs_ref, out, model_in, model_out,
                w.nc_background_mean, w.nc_background_variance, w.nc_background_outlier_pixels,
            )?,
            DataType::FCamBackground => decompress_background(
                h, bs_ref, out, model_in, model_out,
                w.fc_background_mean, w.fc_background_variance, w.fc_background_outlier_pixels,
            )?,
            DataType::Smearing => decompress_smearing(h, w, bs_ref, out, model_in, model_out)?,
            DataType::SFx => decompress_s_fx(h, w, bs_ref, out, model_in, model_out)?,
            DataType::SFxEfx => decompress_s_fx_efx(h, w, bs_ref, out, model_in, model_out)?,
            DataType::SFxNcob => decompress_s_fx_ncob(h, w, bs_ref, out, model_in, model_out)?,
            DataType::SFxEfxNcobEcob => {
                decompress_s_fx_efx_ncob_ecob(h, w, bs_ref, out, model_in, model_out)?
            }
            DataType::FFx => decompress_f_fx(h, w, bs_ref, out, model_in, model_out)?,
            DataType::FFxEfx => decompress_f_fx_efx(h, w, bs_ref, out, model_in, model_out)?,
            DataType::FFxNcob => decompress_f_fx_ncob(h, w, bs_ref, out, model_in, model_out)?,
            DataType::FFxEfxNcobEcob => {
                decompress_f_fx_efx_ncob_ecob(h, w, bs_ref, out, model_in, model_out)?
            }
            DataType::LFx => decompress_l_fx(h, w, bs_ref, out, model_in, model_out)?,
            DataType::LFxEfx => decompress_l_fx_efx(h, w, bs_ref, out, model_in, model_out)?,
            DataType::LFxNcob => decompress_l_fx_ncob(h, w, bs_ref, out, model_in, model_out)?,
            DataType::LFxEfxNcobEcob => {
                decompress_l_fx_efx_ncob_ecob(h, w, bs_ref, out, model_in, model_out)?
            }
            // Imagette types took the branch above; Unknown never passes header parsing.
            _ => unreachable!(),
        }

        bs.bits_left()
    };

    // Up to 31 bits of padding in the final payload word are expected; anything more points at
    // a sample count disagreeing with the compressed stream.
    if leftover >= 32 {
        warn!("{} unused payload bits after the last sample", leftover);
    }

    Ok(size)
}

/// Decompresses a payload produced by the hardware compressor, which emits no entity header.
///
/// `info` supplies the parameters the header would have carried. Given identical parameters this
/// path is bit-compatible with [`decompress`] on an imagette entity. Passing `None` for
/// `output` only probes the decompressed size.
pub fn decompress_rdcu(
    cmp_data: &[u8],
    info: &RdcuInfo,
    model_in: Option<&[u8]>,
    mut model_out: Option<&mut [u8]>,
    output: Option<&mut [u8]>,
) -> Result<usize> {
    let size = info.samples * IMAGETTE_SAMPLE_SIZE;

    let output = match output {
        Some(output) => output,
        None => return Ok(size),
    };

    if output.len() < size {
        return invalid_parameter_error("output buffer too small for the decompressed data");
    }
    let output = &mut output[..size];

    if info.cmp_mode.is_model() {
        if info.model_value > MAX_MODEL_VALUE {
            return invalid_parameter_error("model weight exceeds 16");
        }

        match model_in {
            Some(model) if model.len() != size => {
                return invalid_parameter_error("model buffer size disagrees with the sample count");
            }
            Some(_) => (),
            None => return model_required_error(),
        }

        if let Some(ref model_out) = model_out {
            if model_out.len() < size {
                return invalid_parameter_error("updated-model buffer too small");
            }
        }
    }

    if info.cmp_mode.is_raw() {
        if cmp_data.len() < size {
            return short_buffer_error("raw payload smaller than the sample stream");
        }
        copy_raw_imagettes(&cmp_data[..size], output);
        return Ok(size);
    }

    // The hardware compressor serves 16-bit imagettes only; the conservative width table is
    // authoritative for it.
    let setup = DecoderSetup::new(
        info.cmp_mode,
        DataType::Imagette,
        info.golomb_par,
        info.spill,
        info.round,
        MAX_USED_BITS_SAFE.nc_imagette,
    )?;

    let mut bs = BitReader::new(cmp_data);

    decompress_imagette_stream(
        &setup,
        info.cmp_mode,
        info.model_value,
        info.samples,
        &mut bs,
        model_in,
        model_out.as_deref_mut(),
        output,
    )?;

    Ok(size)
}

fn resolve_max_used_bits(header: &EntityHeader) -> Result<MaxUsedBits> {
    match maxbits::registry().get(header.max_used_bits_version) {
        Some(widths) => Ok(widths),
        None => invalid_parameter_error("unknown max used bits version"),
    }
}

fn imagette_max_data_bits(data_type: DataType, widths: &MaxUsedBits) -> u32 {
    match data_type {
        DataType::SatImagette | DataType::SatImagetteAdaptive => widths.saturated_imagette,
        DataType::FCamImagette | DataType::FCamImagetteAdaptive => widths.fc_imagette,
        _ => widths.nc_imagette,
    }
}

/// Decodes one sample of one field: escape-decode the codeword, unfold the residual, blend in
/// the model, truncate to the field width, and undo the lossy rounding.
fn decode_sample(setup: &DecoderSetup, bs: &mut BitReader<'_>, model: u32) -> Result<u32> {
    let value = decode_escaped_value(setup, bs)?;

    if setup.escape == Escape::None {
        // Bit-stuffed samples carry no residual mapping and no model.
        return Ok(round_inv(value, setup.lossy));
    }

    let residual = remap(value) as u32;

    // The residual add is meant to wrap; the truncation below folds it into the field width.
    let sample =
        residual.wrapping_add(round_fwd(model, setup.lossy)) & mask_lower_u32(setup.max_data_bits);

    Ok(round_inv(sample, setup.lossy))
}

fn read_ne_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_ne_bytes([buf[off], buf[off + 1]])
}

fn write_ne_u16(buf: &mut [u8], off: usize, value: u16) {
    buf[off..off + 2].copy_from_slice(&value.to_ne_bytes());
}

/// Decodes a stream of bare u16 imagette samples. Shared between the imagette entity types and
/// the hardware-compressor path.
#[allow(clippy::too_many_arguments)]
fn decompress_imagette_stream(
    setup: &DecoderSetup,
    mode: CmpMode,
    model_value: u8,
    samples: usize,
    bs: &mut BitReader<'_>,
    model_in: Option<&[u8]>,
    mut model_out: Option<&mut [u8]>,
    output: &mut [u8],
) -> Result<()> {
    if samples == 0 {
        return Ok(());
    }

    if mode.is_model() {
        let model_buf = match model_in {
            Some(model_buf) => model_buf,
            None => return model_required_error(),
        };

        let mut model = u32::from(read_ne_u16(model_buf, 0));

        for i in 0..samples {
            let sample = decode_sample(setup, bs, model)?;

            write_ne_u16(output, 2 * i, sample as u16);

            let updated = update_model(sample, model, model_value, setup.lossy);
            if let Some(model_out) = model_out.as_deref_mut() {
                write_ne_u16(model_out, 2 * i, updated as u16);
            }

            if i + 1 < samples {
                model = u32::from(read_ne_u16(model_buf, 2 * (i + 1)));
            }
        }
    }
    else {
        // Without a model the previous decoded sample is the predictor.
        let mut model = 0u32;

        for i in 0..samples {
            let sample = decode_sample(setup, bs, model)?;

            write_ne_u16(output, 2 * i, sample as u16);

            model = sample;
        }
    }

    Ok(())
}

fn read_record<R: SampleRecord>(buf: &[u8], index: usize) -> R {
    R::read(&mut FieldReader::new(&buf[index * R::SIZE..], Endian::Native))
}

fn write_record<R: SampleRecord>(buf: &mut [u8], index: usize, record: &R) {
    record.write(&mut FieldWriter::new(&mut buf[index * R::SIZE..], Endian::Native));
}

/// The shared record-stream skeleton: prime the model, decode record by record, and interleave
/// the model updates. `decode` assembles one record from the bit stream against its model;
/// `update` blends a decoded record into the model for the next step, field by field.
fn decode_records<R, D, U>(
    header: &EntityHeader,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    mut model_out: Option<&mut [u8]>,
    mut decode: D,
    update: U,
) -> Result<()>
where
    R: SampleRecord,
    D: FnMut(&mut BitReader<'_>, &R) -> Result<R>,
    U: Fn(&R, &R, u8, u32) -> R,
{
    let samples = header.samples();

    if samples == 0 {
        return Ok(());
    }

    if header.cmp_mode.is_model() {
        let model_buf = match model_in {
            Some(model_buf) => model_buf,
            None => return model_required_error(),
        };

        let round = u32::from(header.lossy_round);
        let mut model = read_record::<R>(model_buf, 0);

        for i in 0..samples {
            let record = decode(bs, &model)?;

            write_record(out, i, &record);

            let updated = update(&record, &model, header.model_value, round);
            if let Some(model_out) = model_out.as_deref_mut() {
                write_record(model_out, i, &updated);
            }

            if i + 1 < samples {
                model = read_record::<R>(model_buf, i + 1);
            }
        }
    }
    else {
        let mut model = R::default();

        for i in 0..samples {
            let record = decode(bs, &model)?;

            write_record(out, i, &record);

            model = record;
        }
    }

    Ok(())
}

fn pair_setup(header: &EntityHeader, id: CmpParId, max_data_bits: u32) -> Result<DecoderSetup> {
    let pair = header.pars.pair(id)?;

    DecoderSetup::new(
        header.cmp_mode,
        header.data_type,
        u32::from(pair.cmp_par),
        pair.spill,
        u32::from(header.lossy_round),
        max_data_bits,
    )
}

fn decompress_offset(
    header: &EntityHeader,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
    mean_bits: u32,
    variance_bits: u32,
) -> Result<()> {
    let s_mean = pair_setup(header, PAIR_MEAN, mean_bits)?;
    let s_variance = pair_setup(header, PAIR_AUX_VARIANCE, variance_bits)?;

    decode_records::<Offset, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(Offset {
                mean: decode_sample(&s_mean, bs, model.mean)?,
                variance: decode_sample(&s_variance, bs, model.variance)?,
            })
        },
        |record, model, weight, round| Offset {
            mean: update_model(record.mean, model.mean, weight, round),
            variance: update_model(record.variance, model.variance, weight, round),
        },
    )
}

#[allow(clippy::too_many_arguments)]
fn decompress_background(
    header: &EntityHeader,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
    mean_bits: u32,
    variance_bits: u32,
    outlier_pixel_bits: u32,
) -> Result<()> {
    let s_mean = pair_setup(header, PAIR_MEAN, mean_bits)?;
    let s_variance = pair_setup(header, PAIR_AUX_VARIANCE, variance_bits)?;
    let s_outlier_pixels = pair_setup(header, PAIR_OUTLIER_PIXELS, outlier_pixel_bits)?;

    decode_records::<Background, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(Background {
                mean: decode_sample(&s_mean, bs, model.mean)?,
                variance: decode_sample(&s_variance, bs, model.variance)?,
                outlier_pixels: decode_sample(
                    &s_outlier_pixels,
                    bs,
                    u32::from(model.outlier_pixels),
                )? as u16,
            })
        },
        |record, model, weight, round| Background {
            mean: update_model(record.mean, model.mean, weight, round),
            variance: update_model(record.variance, model.variance, weight, round),
            outlier_pixels: update_model(
                u32::from(record.outlier_pixels),
                u32::from(model.outlier_pixels),
                weight,
                round,
            ) as u16,
        },
    )
}

fn decompress_smearing(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_mean = pair_setup(header, PAIR_MEAN, widths.smearing_mean)?;
    let s_variance_mean = pair_setup(header, PAIR_AUX_VARIANCE, widths.smearing_variance_mean)?;
    let s_outlier_pixels = pair_setup(header, PAIR_OUTLIER_PIXELS, widths.smearing_outlier_pixels)?;

    decode_records::<Smearing, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(Smearing {
                mean: decode_sample(&s_mean, bs, model.mean)?,
                variance_mean: decode_sample(&s_variance_mean, bs, model.variance_mean)?,
                outlier_pixels: decode_sample(
                    &s_outlier_pixels,
                    bs,
                    u32::from(model.outlier_pixels),
                )? as u16,
            })
        },
        |record, model, weight, round| Smearing {
            mean: update_model(record.mean, model.mean, weight, round),
            variance_mean: update_model(record.variance_mean, model.variance_mean, weight, round),
            outlier_pixels: update_model(
                u32::from(record.outlier_pixels),
                u32::from(model.outlier_pixels),
                weight,
                round,
            ) as u16,
        },
    )
}

fn decompress_s_fx(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_exp_flags = pair_setup(header, PAIR_EXP_FLAGS, widths.s_exp_flags)?;
    let s_fx = pair_setup(header, PAIR_FX, widths.s_fx)?;

    decode_records::<SFx, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(SFx {
                exp_flags: decode_sample(&s_exp_flags, bs, u32::from(model.exp_flags))? as u8,
                fx: decode_sample(&s_fx, bs, model.fx)?,
            })
        },
        |record, model, weight, round| SFx {
            exp_flags: update_model(
                u32::from(record.exp_flags),
                u32::from(model.exp_flags),
                weight,
                round,
            ) as u8,
            fx: update_model(record.fx, model.fx, weight, round),
        },
    )
}

fn decompress_s_fx_efx(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_exp_flags = pair_setup(header, PAIR_EXP_FLAGS, widths.s_exp_flags)?;
    let s_fx = pair_setup(header, PAIR_FX, widths.s_fx)?;
    let s_efx = pair_setup(header, PAIR_EFX, widths.s_efx)?;

    decode_records::<SFxEfx, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(SFxEfx {
                exp_flags: decode_sample(&s_exp_flags, bs, u32::from(model.exp_flags))? as u8,
                fx: decode_sample(&s_fx, bs, model.fx)?,
                efx: decode_sample(&s_efx, bs, model.efx)?,
            })
        },
        |record, model, weight, round| SFxEfx {
            exp_flags: update_model(
                u32::from(record.exp_flags),
                u32::from(model.exp_flags),
                weight,
                round,
            ) as u8,
            fx: update_model(record.fx, model.fx, weight, round),
            efx: update_model(record.efx, model.efx, weight, round),
        },
    )
}

fn decompress_s_fx_ncob(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_exp_flags = pair_setup(header, PAIR_EXP_FLAGS, widths.s_exp_flags)?;
    let s_fx = pair_setup(header, PAIR_FX, widths.s_fx)?;
    let s_ncob = pair_setup(header, PAIR_NCOB, widths.s_ncob)?;

    decode_records::<SFxNcob, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(SFxNcob {
                exp_flags: decode_sample(&s_exp_flags, bs, u32::from(model.exp_flags))? as u8,
                fx: decode_sample(&s_fx, bs, model.fx)?,
                ncob_x: decode_sample(&s_ncob, bs, model.ncob_x)?,
                ncob_y: decode_sample(&s_ncob, bs, model.ncob_y)?,
            })
        },
        |record, model, weight, round| SFxNcob {
            exp_flags: update_model(
                u32::from(record.exp_flags),
                u32::from(model.exp_flags),
                weight,
                round,
            ) as u8,
            fx: update_model(record.fx, model.fx, weight, round),
            ncob_x: update_model(record.ncob_x, model.ncob_x, weight, round),
            ncob_y: update_model(record.ncob_y, model.ncob_y, weight, round),
        },
    )
}

fn decompress_s_fx_efx_ncob_ecob(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_exp_flags = pair_setup(header, PAIR_EXP_FLAGS, widths.s_exp_flags)?;
    let s_fx = pair_setup(header, PAIR_FX, widths.s_fx)?;
    let s_ncob = pair_setup(header, PAIR_NCOB, widths.s_ncob)?;
    let s_efx = pair_setup(header, PAIR_EFX, widths.s_efx)?;
    let s_ecob = pair_setup(header, PAIR_ECOB, widths.s_ecob)?;

    decode_records::<SFxEfxNcobEcob, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(SFxEfxNcobEcob {
                exp_flags: decode_sample(&s_exp_flags, bs, u32::from(model.exp_flags))? as u8,
                fx: decode_sample(&s_fx, bs, model.fx)?,
                ncob_x: decode_sample(&s_ncob, bs, model.ncob_x)?,
                ncob_y: decode_sample(&s_ncob, bs, model.ncob_y)?,
                efx: decode_sample(&s_efx, bs, model.efx)?,
                ecob_x: decode_sample(&s_ecob, bs, model.ecob_x)?,
                ecob_y: decode_sample(&s_ecob, bs, model.ecob_y)?,
            })
        },
        |record, model, weight, round| SFxEfxNcobEcob {
            exp_flags: update_model(
                u32::from(record.exp_flags),
                u32::from(model.exp_flags),
                weight,
                round,
            ) as u8,
            fx: update_model(record.fx, model.fx, weight, round),
            ncob_x: update_model(record.ncob_x, model.ncob_x, weight, round),
            ncob_y: update_model(record.ncob_y, model.ncob_y, weight, round),
            efx: update_model(record.efx, model.efx, weight, round),
            ecob_x: update_model(record.ecob_x, model.ecob_x, weight, round),
            ecob_y: update_model(record.ecob_y, model.ecob_y, weight, round),
        },
    )
}

fn decompress_f_fx(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_fx = pair_setup(header, PAIR_FX, widths.f_fx)?;

    decode_records::<FFx, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| Ok(FFx { fx: decode_sample(&s_fx, bs, model.fx)? }),
        |record, model, weight, round| FFx {
            fx: update_model(record.fx, model.fx, weight, round),
        },
    )
}

fn decompress_f_fx_efx(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_fx = pair_setup(header, PAIR_FX, widths.f_fx)?;
    let s_efx = pair_setup(header, PAIR_EFX, widths.f_efx)?;

    decode_records::<FFxEfx, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(FFxEfx {
                fx: decode_sample(&s_fx, bs, model.fx)?,
                efx: decode_sample(&s_efx, bs, model.efx)?,
            })
        },
        |record, model, weight, round| FFxEfx {
            fx: update_model(record.fx, model.fx, weight, round),
            efx: update_model(record.efx, model.efx, weight, round),
        },
    )
}

fn decompress_f_fx_ncob(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_fx = pair_setup(header, PAIR_FX, widths.f_fx)?;
    let s_ncob = pair_setup(header, PAIR_NCOB, widths.f_ncob)?;

    decode_records::<FFxNcob, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(FFxNcob {
                fx: decode_sample(&s_fx, bs, model.fx)?,
                ncob_x: decode_sample(&s_ncob, bs, model.ncob_x)?,
                ncob_y: decode_sample(&s_ncob, bs, model.ncob_y)?,
            })
        },
        |record, model, weight, round| FFxNcob {
            fx: update_model(record.fx, model.fx, weight, round),
            ncob_x: update_model(record.ncob_x, model.ncob_x, weight, round),
            ncob_y: update_model(record.ncob_y, model.ncob_y, weight, round),
        },
    )
}

fn decompress_f_fx_efx_ncob_ecob(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_fx = pair_setup(header, PAIR_FX, widths.f_fx)?;
    let s_ncob = pair_setup(header, PAIR_NCOB, widths.f_ncob)?;
    let s_efx = pair_setup(header, PAIR_EFX, widths.f_efx)?;
    let s_ecob = pair_setup(header, PAIR_ECOB, widths.f_ecob)?;

    decode_records::<FFxEfxNcobEcob, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(FFxEfxNcobEcob {
                fx: decode_sample(&s_fx, bs, model.fx)?,
                ncob_x: decode_sample(&s_ncob, bs, model.ncob_x)?,
                ncob_y: decode_sample(&s_ncob, bs, model.ncob_y)?,
                efx: decode_sample(&s_efx, bs, model.efx)?,
                ecob_x: decode_sample(&s_ecob, bs, model.ecob_x)?,
                ecob_y: decode_sample(&s_ecob, bs, model.ecob_y)?,
            })
        },
        |record, model, weight, round| FFxEfxNcobEcob {
            fx: update_model(record.fx, model.fx, weight, round),
            ncob_x: update_model(record.ncob_x, model.ncob_x, weight, round),
            ncob_y: update_model(record.ncob_y, model.ncob_y, weight, round),
            efx: update_model(record.efx, model.efx, weight, round),
            ecob_x: update_model(record.ecob_x, model.ecob_x, weight, round),
            ecob_y: update_model(record.ecob_y, model.ecob_y, weight, round),
        },
    )
}

fn decompress_l_fx(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_exp_flags = pair_setup(header, PAIR_EXP_FLAGS, widths.l_exp_flags)?;
    let s_fx = pair_setup(header, PAIR_FX, widths.l_fx)?;
    let s_fx_variance = pair_setup(header, PAIR_VARIANCE, widths.l_fx_variance)?;

    decode_records::<LFx, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(LFx {
                exp_flags: decode_sample(&s_exp_flags, bs, model.exp_flags)?,
                fx: decode_sample(&s_fx, bs, model.fx)?,
                fx_variance: decode_sample(&s_fx_variance, bs, model.fx_variance)?,
            })
        },
        |record, model, weight, round| LFx {
            exp_flags: update_model(record.exp_flags, model.exp_flags, weight, round),
            fx: update_model(record.fx, model.fx, weight, round),
            fx_variance: update_model(record.fx_variance, model.fx_variance, weight, round),
        },
    )
}

fn decompress_l_fx_efx(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_exp_flags = pair_setup(header, PAIR_EXP_FLAGS, widths.l_exp_flags)?;
    let s_fx = pair_setup(header, PAIR_FX, widths.l_fx)?;
    let s_efx = pair_setup(header, PAIR_EFX, widths.l_efx)?;
    let s_fx_variance = pair_setup(header, PAIR_VARIANCE, widths.l_fx_variance)?;

    decode_records::<LFxEfx, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(LFxEfx {
                exp_flags: decode_sample(&s_exp_flags, bs, model.exp_flags)?,
                fx: decode_sample(&s_fx, bs, model.fx)?,
                efx: decode_sample(&s_efx, bs, model.efx)?,
                fx_variance: decode_sample(&s_fx_variance, bs, model.fx_variance)?,
            })
        },
        |record, model, weight, round| LFxEfx {
            exp_flags: update_model(record.exp_flags, model.exp_flags, weight, round),
            fx: update_model(record.fx, model.fx, weight, round),
            efx: update_model(record.efx, model.efx, weight, round),
            fx_variance: update_model(record.fx_variance, model.fx_variance, weight, round),
        },
    )
}

fn decompress_l_fx_ncob(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_exp_flags = pair_setup(header, PAIR_EXP_FLAGS, widths.l_exp_flags)?;
    let s_fx = pair_setup(header, PAIR_FX, widths.l_fx)?;
    let s_ncob = pair_setup(header, PAIR_NCOB, widths.l_ncob)?;
    let s_fx_variance = pair_setup(header, PAIR_VARIANCE, widths.l_fx_variance)?;
    let s_cob_variance = pair_setup(header, PAIR_VARIANCE, widths.l_cob_variance)?;

    decode_records::<LFxNcob, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(LFxNcob {
                exp_flags: decode_sample(&s_exp_flags, bs, model.exp_flags)?,
                fx: decode_sample(&s_fx, bs, model.fx)?,
                ncob_x: decode_sample(&s_ncob, bs, model.ncob_x)?,
                ncob_y: decode_sample(&s_ncob, bs, model.ncob_y)?,
                fx_variance: decode_sample(&s_fx_variance, bs, model.fx_variance)?,
                cob_x_variance: decode_sample(&s_cob_variance, bs, model.cob_x_variance)?,
                cob_y_variance: decode_sample(&s_cob_variance, bs, model.cob_y_variance)?,
            })
        },
        |record, model, weight, round| LFxNcob {
            exp_flags: update_model(record.exp_flags, model.exp_flags, weight, round),
            fx: update_model(record.fx, model.fx, weight, round),
            ncob_x: update_model(record.ncob_x, model.ncob_x, weight, round),
            ncob_y: update_model(record.ncob_y, model.ncob_y, weight, round),
            fx_variance: update_model(record.fx_variance, model.fx_variance, weight, round),
            cob_x_variance: update_model(record.cob_x_variance, model.cob_x_variance, weight, round),
            cob_y_variance: update_model(record.cob_y_variance, model.cob_y_variance, weight, round),
        },
    )
}

fn decompress_l_fx_efx_ncob_ecob(
    header: &EntityHeader,
    widths: &MaxUsedBits,
    bs: &mut BitReader<'_>,
    out: &mut [u8],
    model_in: Option<&[u8]>,
    model_out: Option<&mut [u8]>,
) -> Result<()> {
    let s_exp_flags = pair_setup(header, PAIR_EXP_FLAGS, widths.l_exp_flags)?;
    let s_fx = pair_setup(header, PAIR_FX, widths.l_fx)?;
    let s_ncob = pair_setup(header, PAIR_NCOB, widths.l_ncob)?;
    let s_efx = pair_setup(header, PAIR_EFX, widths.l_efx)?;
    let s_ecob = pair_setup(header, PAIR_ECOB, widths.l_ecob)?;
    let s_fx_variance = pair_setup(header, PAIR_VARIANCE, widths.l_fx_variance)?;
    let s_cob_variance = pair_setup(header, PAIR_VARIANCE, widths.l_cob_variance)?;

    decode_records::<LFxEfxNcobEcob, _, _>(
        header,
        bs,
        out,
        model_in,
        model_out,
        |bs, model| {
            Ok(LFxEfxNcobEcob {
                exp_flags: decode_sample(&s_exp_flags, bs, model.exp_flags)?,
                fx: decode_sample(&s_fx, bs, model.fx)?,
                ncob_x: decode_sample(&s_ncob, bs, model.ncob_x)?,
                ncob_y: decode_sample(&s_ncob, bs, model.ncob_y)?,
                efx: decode_sample(&s_efx, bs, model.efx)?,
                ecob_x: decode_sample(&s_ecob, bs, model.ecob_x)?,
                ecob_y: decode_sample(&s_ecob, bs, model.ecob_y)?,
                fx_variance: decode_sample(&s_fx_variance, bs, model.fx_variance)?,
                cob_x_variance: decode_sample(&s_cob_variance, bs, model.cob_x_variance)?,
                cob_y_variance: decode_sample(&s_cob_variance, bs, model.cob_y_variance)?,
            })
        },
        |record, model, weight, round| LFxEfxNcobEcob {
            exp_flags: update_model(record.exp_flags, model.exp_flags, weight, round),
            fx: update_model(record.fx, model.fx, weight, round),
            ncob_x: update_model(record.ncob_x, model.ncob_x, weight, round),
            ncob_y: update_model(record.ncob_y, model.ncob_y, weight, round),
            efx: update_model(record.efx, model.efx, weight, round),
            ecob_x: update_model(record.ecob_x, model.ecob_x, weight, round),
            ecob_y: update_model(record.ecob_y, model.ecob_y, weight, round),
            fx_variance: update_model(record.fx_variance, model.fx_variance, weight, round),
            cob_x_variance: update_model(record.cob_x_variance, model.cob_x_variance, weight, round),
            cob_y_variance: update_model(record.cob_y_variance, model.cob_y_variance, weight, round),
        },
    )
}

/// Copies a raw big-endian imagette payload into the output in host order.
fn copy_raw_imagettes(payload: &[u8], output: &mut [u8]) {
    for (src, dst) in payload.chunks_exact(2).zip(output.chunks_exact_mut(2)) {
        let sample = u16::from_be_bytes([src[0], src[1]]);
        dst.copy_from_slice(&sample.to_ne_bytes());
    }
}

fn convert_raw_records<R: SampleRecord>(payload: &[u8], output: &mut [u8], samples: usize) {
    let mut reader = FieldReader::new(payload, Endian::Big);
    let mut writer = FieldWriter::new(output, Endian::Native);

    for _ in 0..samples {
        R::read(&mut reader).write(&mut writer);
    }
}

/// Raw mode short-circuits entropy decoding: the payload holds the big-endian sample records
/// themselves, which only need the big-endian-to-host fixup.
fn decompress_raw(header: &EntityHeader, payload: &[u8], output: &mut [u8]) {
    if header.data_type.is_imagette() {
        copy_raw_imagettes(payload, output);
        return;
    }

    output[..COLLECTION_HEADER_SIZE].copy_from_slice(&payload[..COLLECTION_HEADER_SIZE]);

    let samples = header.samples();
    let src = &payload[COLLECTION_HEADER_SIZE..];
    let dst = &mut output[COLLECTION_HEADER_SIZE..];

    match header.data_type {
        DataType::Offset | DataType::FCamOffset => convert_raw_records::<Offset>(src, dst, samples),
        DataType::Background | DataType::FCamBackground => {
            convert_raw_records::<Background>(src, dst, samples)
        }
        DataType::Smearing => convert_raw_records::<Smearing>(src, dst, samples),
        DataType::SFx => convert_raw_records::<SFx>(src, dst, samples),
        DataType::SFxEfx => convert_raw_records::<SFxEfx>(src, dst, samples),
        DataType::SFxNcob => convert_raw_records::<SFxNcob>(src, dst, samples),
        DataType::SFxEfxNcobEcob => convert_raw_records::<SFxEfxNcobEcob>(src, dst, samples),
        DataType::FFx => convert_raw_records::<FFx>(src, dst, samples),
        DataType::FFxEfx => convert_raw_records::<FFxEfx>(src, dst, samples),
        DataType::FFxNcob => convert_raw_records::<FFxNcob>(src, dst, samples),
        DataType::FFxEfxNcobEcob => convert_raw_records::<FFxEfxNcobEcob>(src, dst, samples),
        DataType::LFx => convert_raw_records::<LFx>(src, dst, samples),
        DataType::LFxEfx => convert_raw_records::<LFxEfx>(src, dst, samples),
        DataType::LFxNcob => convert_raw_records::<LFxNcob>(src, dst, samples),
        DataType::LFxEfxNcobEcob => convert_raw_records::<LFxEfxNcobEcob>(src, dst, samples),
        // Imagette types took the early return; Unknown never passes header parsing.
        _ => unreachable!(),
    }
}
