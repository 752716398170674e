// Telemetra
// Copyright (c) 2026 The Project Telemetra Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A decoder for science compression entities (SCE): the self-describing compressed packets
//! scientific instruments downlink their imagettes, flux, centre-of-brightness and auxiliary
//! science products in.
//!
//! An entity is a fixed-layout big-endian header followed by a compressed bit stream of Golomb,
//! Rice, or fixed-width codewords with an escape mechanism for outliers. Decoding reconstructs
//! the original sample records bit-exactly (or within the declared rounding in lossy mode), and
//! in the model modes additionally produces the updated model the next entity of the stream will
//! be decoded against.
//!
//! The usual flow is two-phase: size the output buffer with [`decompressed_size`], then decode
//! with [`decompress`]. Payloads of the hardware compressor, which carry no entity header, go
//! through [`decompress_rdcu`] instead.

mod decoder;

pub mod entity;
pub mod golomb;
pub mod maxbits;
pub mod records;
pub mod residuals;
pub mod setup;

pub use decoder::{decompress, decompress_rdcu, decompressed_size, RdcuInfo};
