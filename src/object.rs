/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The object-file codec. Layout, all big-endian:
//!
//! ```text
//! offset 0..3   ASCII "CASL"
//! offset 4..5   entry point
//! offset 6..15  reserved, zero
//! offset 16..   image words, starting at address 0
//! ```

use crate::errors::ObjectError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 4] = b"CASL";
const RESERVED: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFile {
    pub entry: u16,
    pub words: Vec<u16>,
}

pub fn read<R: Read>(reader: &mut R) -> Result<ObjectFile, ObjectError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(ObjectError::BadMagic);
    }

    let entry = reader.read_u16::<BigEndian>()?;
    let mut reserved = [0u8; RESERVED];
    reader.read_exact(&mut reserved)?;

    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    if body.len() % 2 != 0 {
        return Err(ObjectError::Truncated);
    }

    let words = body
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    Ok(ObjectFile { entry, words })
}

pub fn write<W: Write>(writer: &mut W, object: &ObjectFile) -> Result<(), ObjectError> {
    writer.write_all(MAGIC)?;
    writer.write_u16::<BigEndian>(object.entry)?;
    writer.write_all(&[0u8; RESERVED])?;
    for word in &object.words {
        writer.write_u16::<BigEndian>(*word)?;
    }
    Ok(())
}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<ObjectFile, ObjectError> {
    read(&mut BufReader::new(File::open(path)?))
}

pub fn write_file<P: AsRef<Path>>(path: P, object: &ObjectFile) -> Result<(), ObjectError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer, object)?;
    writer.flush()?;
    Ok(())
}
