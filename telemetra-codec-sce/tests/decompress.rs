// Telemetra
// Copyright (c) 2026 The Project Telemetra Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end decompression of complete entities.

use telemetra_codec_sce::entity::{
    CmpMode, DataType, EntityHeader, ImagettePars, NonImagettePair, SpecificPars,
    IMAGETTE_HEADER_SIZE, NON_IMAGETTE_HEADER_SIZE,
};
use telemetra_codec_sce::maxbits::{self, MAX_USED_BITS_SAFE};
use telemetra_codec_sce::records::{
    Endian, FieldReader, FieldWriter, SFx, SampleRecord, COLLECTION_HEADER_SIZE,
};
use telemetra_codec_sce::{decompress, decompressed_size};
use telemetra_core::errors::Error;

fn build_entity(header: &EntityHeader, payload: &[u8]) -> Vec<u8> {
    let mut entity = header.write().unwrap();
    entity.extend_from_slice(payload);
    entity
}

fn imagette_header(cmp_mode: CmpMode, original_size: u32, cmp_data_size: u32) -> EntityHeader {
    EntityHeader {
        entity_size: IMAGETTE_HEADER_SIZE as u32 + cmp_data_size,
        original_size,
        start_timestamp: 0x0000_0001_0000,
        end_timestamp: 0x0000_0002_0000,
        data_type: DataType::Imagette,
        cmp_mode,
        model_value: 16,
        model_id: 0x1701,
        model_counter: 1,
        max_used_bits_version: 1,
        lossy_round: 0,
        cmp_data_size,
        pars: SpecificPars::Imagette(ImagettePars { spill: 8, golomb_par: 1 }),
    }
}

fn ne_samples(buf: &[u8]) -> Vec<u16> {
    buf.chunks_exact(2).map(|c| u16::from_ne_bytes([c[0], c[1]])).collect()
}

#[test]
fn verify_raw_imagette_round_trip() {
    let samples: [u16; 7] =
        [0, 1, 2, 0x42, i16::MIN as u16, i16::MAX as u16, u16::MAX];

    let payload: Vec<u8> = samples.iter().flat_map(|s| s.to_be_bytes()).collect();

    let header = imagette_header(CmpMode::Raw, 14, 14);
    let entity = build_entity(&header, &payload);

    assert_eq!(decompressed_size(&entity).unwrap(), 14);
    // Probing through the decompression entry point must agree.
    assert_eq!(decompress(&entity, None, None, None).unwrap(), 14);

    let mut output = [0u8; 14];
    assert_eq!(decompress(&entity, None, None, Some(&mut output)).unwrap(), 14);

    assert_eq!(ne_samples(&output), &samples);
}

#[test]
fn verify_model_zero_imagette_entity() {
    // Three unary codewords carrying the mapped residual 0: each decoded sample is its model,
    // and at full weight the updated model is unchanged.
    let payload = [0xa8, 0x00, 0x00, 0x00];

    let header = imagette_header(CmpMode::ModelZero, 6, 4);
    let entity = build_entity(&header, &payload);

    let model: Vec<u8> = [1u16, 2, 3].iter().flat_map(|s| s.to_ne_bytes()).collect();

    let mut output = [0u8; 6];
    let mut updated = [0u8; 6];

    let size =
        decompress(&entity, Some(&model), Some(&mut updated), Some(&mut output)).unwrap();

    assert_eq!(size, 6);
    assert_eq!(ne_samples(&output), &[1, 2, 3]);
    assert_eq!(updated, model.as_slice());
}

#[test]
fn verify_model_zero_requires_a_model() {
    let payload = [0xa8, 0x00, 0x00, 0x00];
    let header = imagette_header(CmpMode::ModelZero, 6, 4);
    let entity = build_entity(&header, &payload);

    let mut output = [0u8; 6];

    assert_eq!(
        decompress(&entity, None, None, Some(&mut output)),
        Err(Error::ModelRequired)
    );
}

#[test]
fn verify_lossy_imagette_reconstruction() {
    // One zero residual against the model 4 under a rounding shift of 1: the reconstruction
    // lands back on the quantization grid.
    let payload = [0x80, 0x00, 0x00, 0x00];

    let mut header = imagette_header(CmpMode::ModelZero, 2, 4);
    header.lossy_round = 1;

    let entity = build_entity(&header, &payload);

    let model = 4u16.to_ne_bytes();
    let mut output = [0u8; 2];
    let mut updated = [0u8; 2];

    decompress(&entity, Some(&model), Some(&mut updated), Some(&mut output)).unwrap();

    assert_eq!(ne_samples(&output), &[4]);
    assert_eq!(updated, model);
}

#[test]
fn verify_truncated_entity_is_a_short_buffer() {
    let payload = [0xa8, 0x00, 0x00, 0x00];
    let header = imagette_header(CmpMode::DiffZero, 6, 4);
    let entity = build_entity(&header, &payload);

    assert!(matches!(decompressed_size(&entity[..entity.len() - 1]), Err(Error::ShortBuffer(_))));

    let mut output = [0u8; 6];
    assert!(matches!(
        decompress(&entity[..entity.len() - 2], None, None, Some(&mut output)),
        Err(Error::ShortBuffer(_))
    ));
}

fn s_fx_header(cmp_mode: CmpMode, samples: u32, cmp_data_size: u32) -> EntityHeader {
    let mut pairs = [NonImagettePair::default(); 6];
    // Exposure flags are a two-bit field in table version 1.
    pairs[0] = NonImagettePair { spill: 2, cmp_par: 1 };
    pairs[1] = NonImagettePair { spill: 8, cmp_par: 1 };

    EntityHeader {
        entity_size: NON_IMAGETTE_HEADER_SIZE as u32 + cmp_data_size,
        original_size: COLLECTION_HEADER_SIZE as u32 + samples * SFx::SIZE as u32,
        start_timestamp: 0,
        end_timestamp: 0,
        data_type: DataType::SFx,
        cmp_mode,
        model_value: 16,
        model_id: 0,
        model_counter: 0,
        max_used_bits_version: 1,
        lossy_round: 0,
        cmp_data_size,
        pars: SpecificPars::NonImagette(pairs),
    }
}

const COLLECTION_HEADER: [u8; COLLECTION_HEADER_SIZE] =
    [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c];

#[test]
fn verify_diff_zero_s_fx_entity() {
    // Two all-zero records: four unary codewords carrying the mapped residual 0.
    let mut payload = COLLECTION_HEADER.to_vec();
    payload.extend_from_slice(&[0xaa, 0x00, 0x00, 0x00]);

    let header = s_fx_header(CmpMode::DiffZero, 2, payload.len() as u32);
    let entity = build_entity(&header, &payload);

    let size = header.original_size as usize;
    assert_eq!(decompressed_size(&entity).unwrap(), size);

    let mut output = vec![0u8; size];
    assert_eq!(decompress(&entity, None, None, Some(&mut output)).unwrap(), size);

    // The collection header is copied verbatim; the records decode to all zero.
    assert_eq!(&output[..COLLECTION_HEADER_SIZE], &COLLECTION_HEADER);

    let mut reader = FieldReader::new(&output[COLLECTION_HEADER_SIZE..], Endian::Native);
    assert_eq!(SFx::read(&mut reader), SFx::default());
    assert_eq!(SFx::read(&mut reader), SFx::default());
}

#[test]
fn verify_raw_s_fx_round_trip() {
    let records =
        [SFx { exp_flags: 1, fx: 0x0102_0304 }, SFx { exp_flags: 0xff, fx: 0xdead_beef }];

    let mut payload = COLLECTION_HEADER.to_vec();
    payload.resize(COLLECTION_HEADER_SIZE + 2 * SFx::SIZE, 0);
    {
        let mut writer =
            FieldWriter::new(&mut payload[COLLECTION_HEADER_SIZE..], Endian::Big);
        records[0].write(&mut writer);
        records[1].write(&mut writer);
    }

    let header = s_fx_header(CmpMode::Raw, 2, payload.len() as u32);
    let entity = build_entity(&header, &payload);

    let size = header.original_size as usize;
    let mut output = vec![0u8; size];
    decompress(&entity, None, None, Some(&mut output)).unwrap();

    assert_eq!(&output[..COLLECTION_HEADER_SIZE], &COLLECTION_HEADER);

    let mut reader = FieldReader::new(&output[COLLECTION_HEADER_SIZE..], Endian::Native);
    assert_eq!(SFx::read(&mut reader), records[0]);
    assert_eq!(SFx::read(&mut reader), records[1]);
}

#[test]
fn verify_model_zero_s_fx_entity_updates_the_model() {
    // One record decoded against a model record, with zero residuals on both fields.
    let mut payload = COLLECTION_HEADER.to_vec();
    payload.extend_from_slice(&[0xa0, 0x00, 0x00, 0x00]);

    let mut header = s_fx_header(CmpMode::ModelZero, 1, payload.len() as u32);
    // A weight of zero replaces the model with the decoded record.
    header.model_value = 0;

    let entity = build_entity(&header, &payload);

    let model_record = SFx { exp_flags: 2, fx: 0x0001_0203 };
    let mut model = vec![0u8; header.original_size as usize];
    model_record
        .write(&mut FieldWriter::new(&mut model[COLLECTION_HEADER_SIZE..], Endian::Native));

    let mut output = vec![0u8; header.original_size as usize];
    let mut updated = vec![0u8; header.original_size as usize];

    decompress(&entity, Some(&model), Some(&mut updated), Some(&mut output)).unwrap();

    let mut reader = FieldReader::new(&output[COLLECTION_HEADER_SIZE..], Endian::Native);
    assert_eq!(SFx::read(&mut reader), model_record);

    // The updated model adopted the decoded record, and its collection header was copied from
    // the entity payload.
    assert_eq!(&updated[..COLLECTION_HEADER_SIZE], &COLLECTION_HEADER);
    let mut reader = FieldReader::new(&updated[COLLECTION_HEADER_SIZE..], Endian::Native);
    assert_eq!(SFx::read(&mut reader), model_record);
}

#[test]
fn verify_user_registered_width_tables() {
    let mut table = MAX_USED_BITS_SAFE;
    table.version = 40;

    maxbits::registry().register(table).unwrap();

    let payload = [0xa8, 0x00, 0x00, 0x00];
    let mut header = imagette_header(CmpMode::DiffZero, 6, 4);
    header.max_used_bits_version = 40;

    let entity = build_entity(&header, &payload);

    let mut output = [0u8; 6];
    assert!(decompress(&entity, None, None, Some(&mut output)).is_ok());

    maxbits::registry().clear();

    assert_eq!(
        decompress(&entity, None, None, Some(&mut output)),
        Err(Error::InvalidParameter("unknown max used bits version"))
    );
}
