//! Embedded icon extraction for Windows executables.
//!
//! Walks the MZ stub, the PE signature and the COFF section table by hand,
//! then scans any resource (`.rsrc`) section for an embedded PNG and decodes
//! the bytes between the PNG signature and the IEND chunk marker. Anything
//! malformed, truncated or icon-less comes back as `None`; the reasons are
//! only ever logged.
//!
//! Two deliberate quirks of the scan are kept: the PNG signature is looked
//! for on fixed 8 byte strides from the section's raw data pointer (a PNG at
//! an unaligned offset is missed), and the scan's upper bound is the end of
//! the buffer rather than the section's `SizeOfRawData`.

use std::ops::Range;

use image::DynamicImage;
use log::debug;

const MZ_SIGNATURE: [u8; 2] = *b"MZ";
const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const IEND: [u8; 4] = *b"IEND";

/// Offset of the `e_lfanew` field in the MZ stub.
const PE_OFFSET_FIELD: usize = 0x3C;
/// PE signature plus the fixed COFF file header.
const COFF_HEADER_SIZE: usize = 4 + 20;
/// Section table entries are always exactly 40 bytes long.
const SECTION_ENTRY_SIZE: usize = 40;

#[derive(Debug, Clone, Copy)]
struct CoffHeader {
    number_of_sections: u16,
    size_of_optional_header: u16,
}

impl CoffHeader {
    // Both fields are 16 bits wide on disk and are read in full.
    fn parse(data: &[u8], pe_offset: usize) -> Option<CoffHeader> {
        let base = pe_offset.checked_add(4)?;
        Some(CoffHeader {
            number_of_sections: read_u16(data, base.checked_add(2)?)?,
            size_of_optional_header: read_u16(data, base.checked_add(16)?)?,
        })
    }

    fn section_table_offset(self, pe_offset: usize) -> Option<usize> {
        pe_offset
            .checked_add(COFF_HEADER_SIZE)?
            .checked_add(usize::from(self.size_of_optional_header))
    }
}

#[derive(Debug)]
struct SectionHeader {
    name: String,
    size_of_raw_data: u32,
    pointer_to_raw_data: u32,
}

impl SectionHeader {
    fn parse(data: &[u8], entry_offset: usize) -> Option<SectionHeader> {
        // Name is UTF-8 per the COFF spec, NUL padded. A name that fails to
        // decode marks the whole image noncompliant.
        let name_bytes = data.get(entry_offset..entry_offset.checked_add(8)?)?;
        let name = std::str::from_utf8(name_bytes).ok()?.to_owned();

        Some(SectionHeader {
            name,
            size_of_raw_data: read_u32(data, entry_offset.checked_add(16)?)?,
            pointer_to_raw_data: read_u32(data, entry_offset.checked_add(20)?)?,
        })
    }

    fn display_name(&self) -> &str {
        self.name.trim_end_matches('\0')
    }
}

/// Extracts an embedded PNG icon from the raw bytes of a Windows executable.
///
/// Returns `None` for anything that is not a PE image, carries no resource
/// section, or embeds no decodable PNG. Malformed and truncated input is
/// never an error, only an absence.
#[must_use]
pub fn extract_icon(data: &[u8]) -> Option<DynamicImage> {
    extract(data).map(|(image, _)| image)
}

fn extract(data: &[u8]) -> Option<(DynamicImage, Range<usize>)> {
    if data.get(..2)? != MZ_SIGNATURE.as_slice() {
        debug!("not an MZ executable");
        return None;
    }

    let pe_offset = usize::try_from(read_u32(data, PE_OFFSET_FIELD)?).ok()?;
    if data.get(pe_offset..pe_offset.checked_add(4)?)? != PE_SIGNATURE.as_slice() {
        debug!("no PE signature at {pe_offset:#x}");
        return None;
    }

    let header = CoffHeader::parse(data, pe_offset)?;
    debug!(
        "{} sections, optional header is {} bytes long",
        header.number_of_sections, header.size_of_optional_header
    );

    let table = header.section_table_offset(pe_offset)?;
    for index in 0..usize::from(header.number_of_sections) {
        let section = SectionHeader::parse(data, table.checked_add(index * SECTION_ENTRY_SIZE)?)?;
        debug!(
            "section {} ({} bytes) starts at {:#x}",
            section.display_name(),
            section.size_of_raw_data,
            section.pointer_to_raw_data
        );

        if !section.name.contains(".rsrc") {
            continue;
        }

        let Some(range) = scan_for_png(data, usize::try_from(section.pointer_to_raw_data).ok()?)
        else {
            debug!("no embedded png in section {}", section.display_name());
            continue;
        };

        match image::load_from_memory(&data[range.clone()]) {
            Ok(image) => return Some((image, range)),
            Err(err) => debug!("candidate png at {:#x} failed to decode: {err}", range.start),
        }
    }

    None
}

// The signature search moves in 8 byte strides from the section start, the
// IEND search in 4 byte strides from the signature. The returned range covers
// the signature through the IEND chunk type, excluding the trailing CRC.
fn scan_for_png(data: &[u8], section_start: usize) -> Option<Range<usize>> {
    let mut offset = section_start;
    while data.get(offset..offset.checked_add(8)?)? != PNG_SIGNATURE.as_slice() {
        offset += 8;
    }

    let start = offset;
    debug!("found png signature at {start:#x}");

    loop {
        offset += 4;
        if data.get(offset..offset.checked_add(4)?)? == IEND.as_slice() {
            break;
        }
    }

    debug!("found png end at {:#x}", offset + 4);
    Some(start..offset + 4)
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes(bytes.try_into().ok()?))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    // A 1x1 red RGB image with a stored deflate block. The IEND chunk type
    // sits 64 bytes past the signature, reachable by the 4 byte stride.
    const PNG: [u8; 72] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0F, 0x49, 0x44, 0x41, 0x54, 0x78, 0x01, 0x01, 0x04,
        0x00, 0xFB, 0xFF, 0x00, 0xFF, 0x00, 0x00, 0x03, 0x01, 0x01, 0x00, 0x8D, 0x1D, 0xE5, 0x82,
        0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];
    const IEND_TEXT_OFFSET: usize = 64;

    const PE_OFFSET: u32 = 0x80;
    const SECTION_DATA_OFFSET: u32 = 0x200;

    /// Builds an image with the given optional header size and sections,
    /// each given as (name, raw data offset, raw data).
    fn build_exe(opt_header_size: u16, sections: &[(&[u8; 8], u32, &[u8])]) -> Vec<u8> {
        let mut exe = Vec::new();
        exe.extend_from_slice(b"MZ");
        exe.resize(0x3C, 0);
        exe.extend_from_slice(&PE_OFFSET.to_le_bytes());
        exe.resize(PE_OFFSET as usize, 0);

        exe.extend_from_slice(b"PE\0\0");
        exe.extend_from_slice(&0x8664u16.to_le_bytes()); // Machine
        exe.extend_from_slice(&u16::try_from(sections.len()).unwrap().to_le_bytes());
        exe.extend_from_slice(&[0; 12]); // timestamp, symbol table pointer, symbol count
        exe.extend_from_slice(&opt_header_size.to_le_bytes());
        exe.extend_from_slice(&0u16.to_le_bytes()); // Characteristics
        exe.resize(exe.len() + usize::from(opt_header_size), 0);

        for (name, data_offset, data) in sections {
            exe.extend_from_slice(*name);
            exe.extend_from_slice(&[0; 8]); // VirtualSize, VirtualAddress
            exe.extend_from_slice(&u32::try_from(data.len()).unwrap().to_le_bytes());
            exe.extend_from_slice(&data_offset.to_le_bytes());
            exe.extend_from_slice(&[0; 16]);
        }

        for (_, data_offset, data) in sections {
            let data_offset = *data_offset as usize;
            if exe.len() < data_offset + data.len() {
                exe.resize(data_offset + data.len(), 0);
            }
            exe[data_offset..data_offset + data.len()].copy_from_slice(data);
        }

        exe
    }

    fn exe_with_png_at(offset_in_section: usize) -> Vec<u8> {
        let mut section = vec![0u8; offset_in_section];
        section.extend_from_slice(&PNG);
        build_exe(0, &[(b".rsrc\0\0\0", SECTION_DATA_OFFSET, &section)])
    }

    #[test]
    fn short_buffers_have_no_icon() {
        assert!(extract_icon(&[]).is_none());
        assert!(extract_icon(b"M").is_none());
        assert!(extract_icon(b"MZ").is_none());
    }

    #[test]
    fn non_mz_buffers_have_no_icon() {
        let mut exe = exe_with_png_at(0);
        exe[0] = b'Z';
        assert!(extract_icon(&exe).is_none());
    }

    #[test]
    fn missing_pe_signature_has_no_icon() {
        let mut exe = exe_with_png_at(0);
        exe[PE_OFFSET as usize] = b'X';
        assert!(extract_icon(&exe).is_none());
    }

    #[test]
    fn zero_sections_have_no_icon() {
        let exe = build_exe(0, &[]);
        assert!(extract_icon(&exe).is_none());
    }

    #[test]
    fn png_at_section_start_decodes() {
        let image = extract_icon(&exe_with_png_at(0)).unwrap();
        assert_eq!(image.dimensions(), (1, 1));
    }

    #[test]
    fn png_at_aligned_offset_decodes() {
        let image = extract_icon(&exe_with_png_at(16)).unwrap();
        assert_eq!(image.dimensions(), (1, 1));
    }

    #[test]
    fn extracted_span_covers_signature_through_iend_marker() {
        let exe = exe_with_png_at(16);
        let (_, range) = extract(&exe).unwrap();
        let start = SECTION_DATA_OFFSET as usize + 16;
        assert_eq!(range, start..start + IEND_TEXT_OFFSET + 4);
        assert_eq!(&exe[range.start..range.start + 8], PNG_SIGNATURE.as_slice());
        assert_eq!(&exe[range.end - 4..range.end], IEND.as_slice());
    }

    #[test]
    fn png_off_the_stride_is_missed() {
        assert!(extract_icon(&exe_with_png_at(3)).is_none());
    }

    #[test]
    fn corrupted_png_signature_has_no_icon() {
        let mut exe = exe_with_png_at(0);
        exe[SECTION_DATA_OFFSET as usize + 1] ^= 0x01;
        assert!(extract_icon(&exe).is_none());
    }

    #[test]
    fn undecodable_candidate_has_no_icon() {
        // Signature and IEND intact, IHDR corrupted: the scan finds a span
        // but the decode fails.
        let mut exe = exe_with_png_at(0);
        exe[SECTION_DATA_OFFSET as usize + 24] = 0x07;
        assert!(extract_icon(&exe).is_none());
    }

    #[test]
    fn non_resource_sections_are_not_scanned() {
        let mut section = Vec::new();
        section.extend_from_slice(&PNG);
        let exe = build_exe(0, &[(b".text\0\0\0", SECTION_DATA_OFFSET, &section)]);
        assert!(extract_icon(&exe).is_none());
    }

    #[test]
    fn resource_sections_match_by_substring() {
        let mut section = Vec::new();
        section.extend_from_slice(&PNG);
        let exe = build_exe(0, &[(b".rsrc2\0\0", SECTION_DATA_OFFSET, &section)]);
        assert!(extract_icon(&exe).is_some());
    }

    #[test]
    fn later_sections_are_tried_after_a_failed_decode() {
        let mut broken = Vec::new();
        broken.extend_from_slice(&PNG);
        broken[24] = 0x07; // undecodable, scan still matches
        let exe = build_exe(
            0,
            &[
                (b".rsrc\0\0\0", SECTION_DATA_OFFSET, &broken),
                (b".rsrc2\0\0", 0x400, &PNG),
            ],
        );
        let (image, range) = extract(&exe).unwrap();
        assert_eq!(image.dimensions(), (1, 1));
        assert_eq!(range.start, 0x400);
    }

    #[test]
    fn section_table_past_a_large_optional_header_is_found() {
        // A 264 byte optional header only works with the full 16-bit
        // SizeOfOptionalHeader field.
        let exe = build_exe(264, &[(b".rsrc\0\0\0", SECTION_DATA_OFFSET, &PNG)]);
        assert!(extract_icon(&exe).is_some());
    }

    #[test]
    fn invalid_section_name_encoding_aborts_the_parse() {
        let exe = build_exe(
            0,
            &[
                (&[0xFF; 8], SECTION_DATA_OFFSET, &[]),
                (b".rsrc\0\0\0", 0x400, &PNG),
            ],
        );
        assert!(extract_icon(&exe).is_none());
    }

    #[test]
    fn truncated_section_table_has_no_icon() {
        let exe = exe_with_png_at(0);
        let table_start = PE_OFFSET as usize + COFF_HEADER_SIZE;
        assert!(extract_icon(&exe[..table_start + 10]).is_none());
    }

    #[test]
    fn missing_iend_marker_has_no_icon() {
        let exe = exe_with_png_at(0);
        // cut the buffer before the IEND chunk type
        let cut = SECTION_DATA_OFFSET as usize + IEND_TEXT_OFFSET - 4;
        assert!(extract_icon(&exe[..cut]).is_none());
    }

    #[test]
    fn extraction_is_idempotent() {
        let exe = exe_with_png_at(16);
        let first = extract(&exe).unwrap();
        let second = extract(&exe).unwrap();
        assert_eq!(first.1, second.1);
        assert_eq!(first.0.dimensions(), second.0.dimensions());
    }
}
