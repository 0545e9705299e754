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

//! The MZ/EXE loader (spec section 6, "External Interfaces"). Out of the
//! core pipeline's scope per spec section 1 as an algorithm, but its
//! *output* — the flat memory image, the memory-type bitmap, and the
//! resolved entry point — is the scanner/flow-follower's input, so its
//! interface contract lives here. Grounded on `frontend.c`'s `LoadImage`.

use crate::errors::DccError;

/// Bytes of a 256-byte PSP emulated ahead of the load image.
pub const PSP_SIZE: usize = 256;

/// Fixed relocation delta biasing every segment constant in the image
/// (spec section 6, `EXE_RELOCATION`).
pub const RELOCATION_DELTA: u16 = 0x10;

/// Per-byte classification in the 2-bit memory map (spec section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[repr(u8)]
pub enum ByteClass {
    Unknown = 0,
    Data = 1,
    Code = 2,
    Impure = 3,
}

/// A `(offset, segment)` pair from the EXE's relocation table, already
/// converted to a flat image offset (`relocTable[i]` in the original,
/// post `LH(buf) + ((seg + EXE_RELOCATION) << 4)`).
pub type RelocEntry = u32;

#[derive(Debug, Clone)]
pub struct LoadedProgram {
    pub image: Vec<u8>,
    /// One `ByteClass` per byte, stored one-per-entry for simplicity
    /// (the original packs 4 per byte; the invariant — classify every
    /// image offset — is what downstream passes rely on, not the
    /// packing).
    pub map: Vec<ByteClass>,
    pub reloc_table: Vec<RelocEntry>,
    pub is_com: bool,
    pub init_cs: u16,
    pub init_ip: u16,
    pub init_ss: u16,
    pub init_sp: u16,
}

impl LoadedProgram {
    pub fn entry_offset(&self) -> u32 {
        ((self.init_cs as u32) << 4) + self.init_ip as u32
    }

    pub fn classify(&mut self, offset: u32, class: ByteClass) {
        if let Some(slot) = self.map.get_mut(offset as usize) {
            // IMPURE once a byte has been seen as both code and data.
            *slot = match (*slot, class) {
                (ByteClass::Unknown, c) => c,
                (a, b) if a == b => a,
                (ByteClass::Code, ByteClass::Data) | (ByteClass::Data, ByteClass::Code) => ByteClass::Impure,
                (ByteClass::Impure, _) => ByteClass::Impure,
                (_, c) => c,
            };
        }
    }

    pub fn is_relocated(&self, file_offset: u32) -> bool {
        self.reloc_table.contains(&file_offset)
    }
}

fn le16(b: &[u8], off: usize) -> u16 {
    b[off] as u16 | ((b[off + 1] as u16) << 8)
}

/// Parses an MZ/EXE (or raw `.COM`) image and produces the flat,
/// PSP-prefixed load image the rest of the pipeline operates on.
pub fn load(bytes: &[u8], filename: &str) -> Result<LoadedProgram, DccError> {
    if bytes.len() < 2 {
        return Err(DccError::CannotReadFile(filename.to_string()));
    }
    let is_com = !(bytes[0] == b'M' && bytes[1] == b'Z') && !(bytes[0] == b'Z' && bytes[1] == b'M');

    let (body, init_cs, init_ip, init_ss, init_sp, reloc_table);
    if is_com {
        body = bytes.to_vec();
        init_cs = 0;
        init_ip = 0x100;
        init_ss = 0;
        init_sp = 0xFFFE;
        reloc_table = Vec::new();
    } else {
        if bytes.len() < 28 {
            return Err(DccError::CannotReadFile(filename.to_string()));
        }
        let last_page_size = le16(bytes, 2);
        let num_pages = le16(bytes, 4);
        let num_reloc = le16(bytes, 6);
        let num_para_header = le16(bytes, 8);
        let init_ss_raw = le16(bytes, 14);
        let init_sp_raw = le16(bytes, 16);
        let reloc_tab_offset = le16(bytes, 24);
        let init_ip_raw = le16(bytes, 20);
        let init_cs_raw = le16(bytes, 22);

        if reloc_tab_offset == 0x40 {
            return Err(DccError::UnsupportedNewExeFormat);
        }

        let mut cb = num_pages as i64 * 512 - num_para_header as i64 * 16;
        if last_page_size != 0 {
            cb -= 512 - last_page_size as i64;
        }
        if cb < 0 {
            return Err(DccError::CannotReadFile(filename.to_string()));
        }
        let cb = cb as usize;

        init_cs = init_cs_raw.wrapping_add(RELOCATION_DELTA);
        init_ip = init_ip_raw;
        init_ss = init_ss_raw.wrapping_add(RELOCATION_DELTA);
        init_sp = init_sp_raw;

        let mut table = Vec::with_capacity(num_reloc as usize);
        let reloc_base = reloc_tab_offset as usize;
        for i in 0..num_reloc as usize {
            let entry_off = reloc_base + i * 4;
            if entry_off + 4 > bytes.len() {
                return Err(DccError::CannotReadFile(filename.to_string()));
            }
            let off = le16(bytes, entry_off) as u32;
            let seg = le16(bytes, entry_off + 2) as u32;
            table.push(off + ((seg + RELOCATION_DELTA as u32) << 4));
        }
        reloc_table = table;

        let image_start = num_para_header as usize * 16;
        if image_start + cb > bytes.len() {
            return Err(DccError::CannotReadFile(filename.to_string()));
        }
        body = bytes[image_start..image_start + cb].to_vec();
    }

    let mut image = vec![0u8; PSP_SIZE + body.len()];
    image[0] = 0xCD;
    image[1] = 0x20; // emulated INT 20h at the PSP's start
    image[PSP_SIZE..].copy_from_slice(&body);

    let mut prog = LoadedProgram {
        map: vec![ByteClass::Unknown; image.len()],
        image,
        reloc_table,
        is_com,
        init_cs,
        init_ip,
        init_ss,
        init_sp,
    };

    // Relocate segment constants found in the load image (the PSP-biased
    // relocation entries point past the PSP already, per the original's
    // `EXE_RELOCATION`-added offsets).
    for &off in &prog.reloc_table.clone() {
        let off = off as usize + PSP_SIZE;
        if off + 2 <= prog.image.len() {
            let w = le16(&prog.image, off).wrapping_add(RELOCATION_DELTA);
            prog.image[off] = (w & 0xFF) as u8;
            prog.image[off + 1] = ((w >> 8) & 0xFF) as u8;
        }
    }

    Ok(prog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_exe(image: &[u8], init_cs: u16, init_ip: u16) -> Vec<u8> {
        let mut h = vec![0u8; 28];
        h[0] = b'M';
        h[1] = b'Z';
        let num_pages = (image.len() as u16).div_ceil(512).max(1);
        let last_page = (image.len() % 512) as u16;
        h[2] = (last_page & 0xFF) as u8;
        h[3] = (last_page >> 8) as u8;
        h[4] = (num_pages & 0xFF) as u8;
        h[5] = (num_pages >> 8) as u8;
        h[8] = 2; // numParaHeader (2 paragraphs = 32-byte header, rounded up)
        h[9] = 0;
        h[20] = (init_ip & 0xFF) as u8;
        h[21] = (init_ip >> 8) as u8;
        h[22] = (init_cs & 0xFF) as u8;
        h[23] = (init_cs >> 8) as u8;
        h[24] = 0x1C;
        h[25] = 0;

        let mut out = h;
        out.resize(32, 0);
        out.extend_from_slice(image);
        out
    }

    #[test]
    fn com_file_gets_standard_entry_point() {
        let bytes = vec![0x90, 0xC3];
        let prog = load(&bytes, "t.com").unwrap();
        assert!(prog.is_com);
        assert_eq!(prog.init_cs, 0);
        assert_eq!(prog.init_ip, 0x100);
        assert_eq!(prog.entry_offset(), 0x100);
        assert_eq!(prog.image.len(), PSP_SIZE + bytes.len());
        assert_eq!(&prog.image[0..2], &[0xCD, 0x20]);
    }

    #[test]
    fn exe_file_biases_segments_by_relocation_delta() {
        let bytes = minimal_exe(&[0x90, 0xC3], 0, 0);
        let prog = load(&bytes, "t.exe").unwrap();
        assert!(!prog.is_com);
        assert_eq!(prog.init_cs, RELOCATION_DELTA);
    }

    #[test]
    fn new_exe_format_is_refused() {
        let mut bytes = minimal_exe(&[0x90], 0, 0);
        bytes[24] = 0x40;
        bytes[25] = 0x00;
        let err = load(&bytes, "t.exe").unwrap_err();
        assert!(matches!(err, DccError::UnsupportedNewExeFormat));
    }

    #[test]
    fn classify_marks_impure_on_conflicting_use() {
        let bytes = vec![0x90u8, 0xC3];
        let mut prog = load(&bytes, "t.com").unwrap();
        prog.classify(PSP_SIZE as u32, ByteClass::Code);
        prog.classify(PSP_SIZE as u32, ByteClass::Data);
        assert_eq!(prog.map[PSP_SIZE], ByteClass::Impure);
    }
}
