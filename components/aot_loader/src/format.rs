//! On-disk layout constants and fixed-size records.
//!
//! ```text
//! [0..8)   container magic
//! [8..12)  symbol count (u32 LE)
//!          per symbol: name length (u8), name bytes, file offset (u64 LE)
//! payload: [aot .. aot_end)   metadata region
//!          [aot_end .. code)  data section (u64 LE words)
//!          [code .. code_end) code region
//! ```
//!
//! All integers are little-endian. Offsets inside the metadata region are
//! relative to `aot`; method code offsets are relative to `code`.

use xxhash_rust::xxh3::xxh3_64;

/// Container magic at the start of every image file
pub const CONTAINER_MAGIC: [u8; 8] = *b"TVMIMG\0\x01";

/// Metadata header magic, "AOT1" little-endian
pub const IMAGE_MAGIC: u32 = 0x3154_4F41;

/// Metadata format version this loader reads
pub const IMAGE_VERSION: u32 = 1;

/// Start of the metadata region
pub const SYM_AOT: &str = "aot";
/// End of the metadata region, start of the data section
pub const SYM_AOT_END: &str = "aot_end";
/// Start of the code region, end of the data section
pub const SYM_CODE: &str = "code";
/// End of the code region
pub const SYM_CODE_END: &str = "code_end";

/// Size of [`ImageHeader`] on disk
pub const HEADER_SIZE: usize = 40;
/// Size of [`ClassHeader`] on disk
pub const CLASS_HEADER_SIZE: usize = 20;
/// Size of [`MethodHeader`] on disk
pub const METHOD_HEADER_SIZE: usize = 12;

/// Checksum of the properties compiled code depends on.
///
/// An image built by a process with a different checksum is rejected unless
/// it is only being dumped.
pub fn environment_checksum() -> u64 {
    let environment = format!(
        "{}-{}-{}-v{}",
        std::env::consts::ARCH,
        std::env::consts::OS,
        usize::BITS,
        IMAGE_VERSION
    );
    xxh3_64(environment.as_bytes())
}

/// Metadata header at the start of the `aot` region
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ImageHeader {
    /// [`IMAGE_MAGIC`]
    pub magic: u32,
    /// Format version
    pub version: u32,
    /// Build environment checksum
    pub environment_checksum: u64,
    /// Collector tag the code was generated for
    pub gc_kind: u32,
    /// Entries in the class table
    pub class_count: u32,
    /// Offset of the class table
    pub class_table_offset: u32,
    /// Entries in the method table
    pub method_count: u32,
    /// Offset of the method table
    pub method_table_offset: u32,
    /// Reserved, zero
    pub reserved: u32,
}

impl ImageHeader {
    pub(crate) fn parse(bytes: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(bytes);
        Some(Self {
            magic: reader.u32()?,
            version: reader.u32()?,
            environment_checksum: reader.u64()?,
            gc_kind: reader.u32()?,
            class_count: reader.u32()?,
            class_table_offset: reader.u32()?,
            method_count: reader.u32()?,
            method_table_offset: reader.u32()?,
            reserved: reader.u32()?,
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.environment_checksum.to_le_bytes());
        for field in [
            self.gc_kind,
            self.class_count,
            self.class_table_offset,
            self.method_count,
            self.method_table_offset,
            self.reserved,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
}

/// One entry of the class table
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ClassHeader {
    /// Class id; the table is sorted by it
    pub class_id: u32,
    /// Compiled methods of the class
    pub method_count: u32,
    /// Offset of the class's first method header
    pub methods_offset: u32,
    /// Offset of the method presence bitmap
    pub bitmap_offset: u32,
    /// Bits in the bitmap, one per method index
    pub bitmap_bits: u32,
}

impl ClassHeader {
    pub(crate) fn parse(bytes: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(bytes);
        Some(Self {
            class_id: reader.u32()?,
            method_count: reader.u32()?,
            methods_offset: reader.u32()?,
            bitmap_offset: reader.u32()?,
            bitmap_bits: reader.u32()?,
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        for field in [
            self.class_id,
            self.method_count,
            self.methods_offset,
            self.bitmap_offset,
            self.bitmap_bits,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
}

/// One entry of the method table
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MethodHeader {
    /// Method id
    pub method_id: u32,
    /// Offset of the code relative to `code`
    pub code_offset: u32,
    /// Size of the code in bytes
    pub code_size: u32,
}

impl MethodHeader {
    pub(crate) fn parse(bytes: &[u8]) -> Option<Self> {
        let mut reader = Reader::new(bytes);
        Some(Self {
            method_id: reader.u32()?,
            code_offset: reader.u32()?,
            code_size: reader.u32()?,
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        for field in [self.method_id, self.code_offset, self.code_size] {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
}

/// Bounds-checked little-endian cursor
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    pub(crate) fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub(crate) fn u32(&mut self) -> Option<u32> {
        self.take(4)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
    }

    pub(crate) fn u64(&mut self) -> Option<u64> {
        self.take(8)
            .and_then(|b| b.try_into().ok())
            .map(u64::from_le_bytes)
    }
}
