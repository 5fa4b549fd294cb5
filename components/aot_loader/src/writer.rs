//! Producing image files.
//!
//! The writer lays out exactly what the loader reads. Its `with_*` overrides
//! exist so broken images can be produced on purpose.

use crate::container::SymbolTable;
use crate::format::{
    environment_checksum, ClassHeader, ImageHeader, MethodHeader, CLASS_HEADER_SIZE, HEADER_SIZE,
    IMAGE_MAGIC, IMAGE_VERSION, METHOD_HEADER_SIZE, SYM_AOT, SYM_AOT_END, SYM_CODE, SYM_CODE_END,
};
use crate::slots::SlotKind;
use core_types::{ClassId, GcKind, IntrinsicId, MethodId};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Payload value slots carry before the runtime initializes them
pub const UNINITIALIZED_SLOT_WORD: u64 = 0xFEED_0000;

/// Builds an image file
#[derive(Debug, Clone)]
pub struct ImageWriter {
    magic: u32,
    version: u32,
    checksum: u64,
    gc_tag: u32,
    classes: BTreeMap<u32, BTreeMap<u32, (MethodId, Vec<u8>)>>,
    slots: Vec<(SlotKind, u64)>,
    symbol_overrides: Vec<(&'static str, Option<u64>)>,
}

impl ImageWriter {
    /// Writer for an image matching the current environment
    pub fn new(gc_kind: GcKind) -> Self {
        Self {
            magic: IMAGE_MAGIC,
            version: IMAGE_VERSION,
            checksum: environment_checksum(),
            gc_tag: gc_kind.tag(),
            classes: BTreeMap::new(),
            slots: Vec::new(),
            symbol_overrides: Vec::new(),
        }
    }

    /// Add compiled code for the method at `index` of `class`
    pub fn add_method(&mut self, class: ClassId, index: u32, method: MethodId, code: Vec<u8>) -> &mut Self {
        self.classes
            .entry(class.as_u32())
            .or_default()
            .insert(index, (method, code));
        self
    }

    /// Append a slot table entry
    pub fn add_slot(&mut self, kind: SlotKind, id: u64) -> &mut Self {
        self.slots.push((kind, id));
        self
    }

    /// Record a different header magic
    pub fn with_magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    /// Record a different format version
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Record a different environment checksum
    pub fn with_checksum(mut self, checksum: u64) -> Self {
        self.checksum = checksum;
        self
    }

    /// Record a raw collector tag
    pub fn with_gc_tag(mut self, tag: u32) -> Self {
        self.gc_tag = tag;
        self
    }

    /// Record a class with no compiled methods
    pub fn with_empty_class(mut self, class: ClassId) -> Self {
        self.classes.entry(class.as_u32()).or_default();
        self
    }

    /// Force a symbol's value, or drop it with `None`
    pub fn with_symbol(mut self, name: &'static str, value: Option<u64>) -> Self {
        self.symbol_overrides.push((name, value));
        self
    }

    /// Number of methods added so far
    pub fn method_count(&self) -> usize {
        self.classes.values().map(BTreeMap::len).sum()
    }

    /// Serialize the image
    pub fn to_bytes(&self) -> Vec<u8> {
        let (metadata, code) = self.metadata_and_code();
        let data = self.data_words();

        let mut symbols = SymbolTable::new();
        for name in [SYM_AOT, SYM_AOT_END, SYM_CODE, SYM_CODE_END] {
            symbols.insert(name, 0);
        }
        self.apply_overrides(&mut symbols);
        let aot = symbols.encoded_len().next_multiple_of(8);
        let aot_end = aot + metadata.len();
        let code_start = aot_end + data.len() * 8;
        let code_end = code_start + code.len();

        symbols.insert(SYM_AOT, aot as u64);
        symbols.insert(SYM_AOT_END, aot_end as u64);
        symbols.insert(SYM_CODE, code_start as u64);
        symbols.insert(SYM_CODE_END, code_end as u64);
        self.apply_overrides(&mut symbols);

        let mut out = Vec::with_capacity(code_end);
        symbols.write(&mut out);
        out.resize(aot, 0);
        out.extend_from_slice(&metadata);
        for word in &data {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&code);
        out
    }

    /// Serialize the image to a file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.to_bytes())
    }

    fn apply_overrides(&self, symbols: &mut SymbolTable) {
        for (name, value) in &self.symbol_overrides {
            match value {
                Some(value) => symbols.insert(*name, *value),
                None => symbols.remove(name),
            }
        }
    }

    fn metadata_and_code(&self) -> (Vec<u8>, Vec<u8>) {
        let class_count = self.classes.len();
        let method_count = self.method_count();
        let class_table_offset = HEADER_SIZE;
        let method_table_offset = class_table_offset + class_count * CLASS_HEADER_SIZE;
        let mut bitmap_offset = method_table_offset + method_count * METHOD_HEADER_SIZE;

        let mut class_table = Vec::new();
        let mut method_table = Vec::new();
        let mut bitmaps = Vec::new();
        let mut code = Vec::new();
        let mut methods_offset = method_table_offset;

        for (class_id, methods) in &self.classes {
            let bitmap_bits = methods.keys().next_back().map_or(0, |last| last + 1);
            let mut bitmap = vec![0u8; (bitmap_bits as usize).div_ceil(8)];
            for (index, (method_id, bytes)) in methods {
                bitmap[(index / 8) as usize] |= 1 << (index % 8);
                MethodHeader {
                    method_id: method_id.as_u32(),
                    code_offset: code.len() as u32,
                    code_size: bytes.len() as u32,
                }
                .write(&mut method_table);
                code.extend_from_slice(bytes);
            }
            ClassHeader {
                class_id: *class_id,
                method_count: methods.len() as u32,
                methods_offset: methods_offset as u32,
                bitmap_offset: bitmap_offset as u32,
                bitmap_bits,
            }
            .write(&mut class_table);
            methods_offset += methods.len() * METHOD_HEADER_SIZE;
            bitmap_offset += bitmap.len();
            bitmaps.extend_from_slice(&bitmap);
        }

        let mut metadata = Vec::new();
        ImageHeader {
            magic: self.magic,
            version: self.version,
            environment_checksum: self.checksum,
            gc_kind: self.gc_tag,
            class_count: class_count as u32,
            class_table_offset: class_table_offset as u32,
            method_count: method_count as u32,
            method_table_offset: method_table_offset as u32,
            reserved: 0,
        }
        .write(&mut metadata);
        metadata.extend_from_slice(&class_table);
        metadata.extend_from_slice(&method_table);
        metadata.extend_from_slice(&bitmaps);
        let padded = metadata.len().next_multiple_of(8);
        metadata.resize(padded, 0);
        (metadata, code)
    }

    fn data_words(&self) -> Vec<u64> {
        // Built top-down, then flipped so the first slot sits just below the
        // intrinsic table
        let mut downward = Vec::new();
        for (kind, id) in &self.slots {
            downward.push(kind.tag(*id));
            for word in 0..kind.payload_words() {
                downward.push(UNINITIALIZED_SLOT_WORD | word as u64);
            }
        }
        downward.push(0);
        downward.reverse();
        downward.extend(std::iter::repeat(0).take(IntrinsicId::COUNT));
        downward
    }
}
