// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Combining consecutive holding registers into a single value.
//!
//! The first register carries the most significant 16 bits and the
//! last register the least significant 16 bits. The result is
//! interpreted as a two's complement integer over `16 * count` bits.

use byteorder::{BigEndian, ByteOrder as _};
use smallvec::SmallVec;

use crate::{Error, Result, Word};

/// The maximum number of registers that fit into a combined value.
pub const MAX_REGISTERS: usize = 4;

const WORD_SIZE: usize = 2;

pub(crate) fn check_count(count: usize) -> Result<()> {
    if (1..=MAX_REGISTERS).contains(&count) {
        Ok(())
    } else {
        Err(Error::InvalidRegisterCount(count))
    }
}

/// Combine 1 to 4 registers into a sign-extended integer.
pub fn combine_registers(words: &[Word]) -> Result<i64> {
    check_count(words.len())?;
    let mut buf = [0u8; MAX_REGISTERS * WORD_SIZE];
    let len = words.len() * WORD_SIZE;
    BigEndian::write_u16_into(words, &mut buf[..len]);
    // Sign extension from the most significant bit of the first word
    Ok(BigEndian::read_int(&buf[..len], len))
}

/// Split the lower `16 * count` bits of `value` into big-endian registers.
///
/// This is the inverse of [`combine_registers()`] for every value that
/// is representable in `16 * count` bits.
pub fn split_registers(value: i64, count: usize) -> Result<SmallVec<[Word; MAX_REGISTERS]>> {
    check_count(count)?;
    let len = count * WORD_SIZE;
    let mut buf = [0u8; MAX_REGISTERS * WORD_SIZE];
    // Bits above `16 * count` are discarded
    BigEndian::write_int(&mut buf[..len], value, len);
    Ok(buf[..len]
        .chunks_exact(WORD_SIZE)
        .map(BigEndian::read_u16)
        .collect())
}
