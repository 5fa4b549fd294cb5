//! Loaded AOT images.

use crate::container::{Regions, SymbolTable};
use crate::error::LoadError;
use crate::format::{
    environment_checksum, ClassHeader, ImageHeader, MethodHeader, CLASS_HEADER_SIZE, HEADER_SIZE,
    IMAGE_MAGIC, IMAGE_VERSION, METHOD_HEADER_SIZE,
};
use crate::slots::{self, RuntimeBindings, SlotEntry};
use core_types::{ClassId, GcKind, IntrinsicId, MethodId};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Location of one method's compiled code inside the code region
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CodeSpan {
    /// Method the code belongs to
    pub method_id: MethodId,
    /// Offset relative to the start of the code region
    pub offset: usize,
    /// Size in bytes
    pub size: usize,
}

/// Compiled methods of one class
#[derive(Debug, Clone)]
pub struct AotClass {
    header: ClassHeader,
    bitmap: Vec<u8>,
    methods: Vec<MethodHeader>,
}

impl AotClass {
    /// Class id
    pub fn class_id(&self) -> ClassId {
        ClassId(self.header.class_id)
    }

    /// Raw class header
    pub fn header(&self) -> &ClassHeader {
        &self.header
    }

    /// Method headers in method-index order
    pub fn methods(&self) -> &[MethodHeader] {
        &self.methods
    }

    /// Whether the method at `index` was compiled into the image
    pub fn has_method(&self, index: u32) -> bool {
        index < self.header.bitmap_bits
            && self.bitmap[(index / 8) as usize] & (1 << (index % 8)) != 0
    }

    /// Locate the compiled code of the method at `index` in the class.
    ///
    /// `None` means the method was not compiled ahead of time and must be
    /// interpreted. A set bit's method header is found at the ordinal given
    /// by the number of set bits below it.
    pub fn find_method_code(&self, index: u32) -> Option<CodeSpan> {
        if !self.has_method(index) {
            return None;
        }
        let byte = (index / 8) as usize;
        let below_in_byte = self.bitmap[byte] & ((1u8 << (index % 8)) - 1);
        let ordinal = self.bitmap[..byte]
            .iter()
            .map(|b| b.count_ones())
            .sum::<u32>()
            + below_in_byte.count_ones();
        let method = self.methods.get(ordinal as usize)?;
        Some(CodeSpan {
            method_id: MethodId(method.method_id),
            offset: method.code_offset as usize,
            size: method.code_size as usize,
        })
    }
}

/// A loaded image.
///
/// The data section is copied out of the file into words so it can be
/// patched through `&mut self`; once wrapped in an `Arc` the image is
/// read-only.
#[derive(Debug)]
pub struct AotImage {
    path: PathBuf,
    bytes: Vec<u8>,
    regions: Regions,
    header: ImageHeader,
    classes: Vec<AotClass>,
    data: Vec<u64>,
    slots_initialized: bool,
    intrinsics_patched: bool,
}

impl AotImage {
    /// Load and validate an image file.
    ///
    /// With `for_dump` the environment checksum and collector kind are not
    /// checked, so tooling can inspect images built elsewhere.
    pub fn open(
        path: impl AsRef<Path>,
        expected_gc_kind: GcKind,
        for_dump: bool,
    ) -> Result<AotImage, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let image = Self::from_bytes(bytes, expected_gc_kind, for_dump)?;
        info!(
            path = %path.display(),
            classes = image.classes.len(),
            "loaded AOT image"
        );
        Ok(AotImage {
            path: path.to_path_buf(),
            ..image
        })
    }

    /// Load and validate an image already in memory
    pub fn from_bytes(
        bytes: Vec<u8>,
        expected_gc_kind: GcKind,
        for_dump: bool,
    ) -> Result<AotImage, LoadError> {
        let symbols = SymbolTable::parse(&bytes)?;
        let regions = Regions::resolve(&symbols, bytes.len())?;
        let metadata = &bytes[regions.aot..regions.aot_end];

        let header = ImageHeader::parse(metadata)
            .ok_or_else(|| LoadError::malformed("metadata region too small for header"))?;
        if header.magic != IMAGE_MAGIC {
            return Err(LoadError::BadMagic {
                found: header.magic,
            });
        }
        if header.version != IMAGE_VERSION {
            return Err(LoadError::UnsupportedVersion {
                found: header.version,
                expected: IMAGE_VERSION,
            });
        }
        if !for_dump {
            let runtime = environment_checksum();
            if header.environment_checksum != runtime {
                return Err(LoadError::ChecksumMismatch {
                    image: header.environment_checksum,
                    runtime,
                });
            }
            if header.gc_kind != expected_gc_kind.tag() {
                let image = GcKind::from_tag(header.gc_kind)
                    .map(|kind| kind.name().to_string())
                    .unwrap_or_else(|| format!("unknown({})", header.gc_kind));
                return Err(LoadError::GcKindMismatch {
                    image,
                    runtime: expected_gc_kind.name().to_string(),
                });
            }
        }

        let code_len = regions.code_end - regions.code;
        let classes = parse_classes(metadata, &header, code_len)?;
        let data = parse_data(&bytes[regions.aot_end..regions.code])?;
        debug!(
            classes = classes.len(),
            data_words = data.len(),
            code_bytes = code_len,
            "validated AOT image"
        );

        Ok(AotImage {
            path: PathBuf::new(),
            bytes,
            regions,
            header,
            classes,
            data,
            slots_initialized: false,
            intrinsics_patched: false,
        })
    }

    /// File the image was loaded from; empty for in-memory images
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata header
    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    /// Resolved region boundaries
    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    /// Class table, sorted by class id
    pub fn classes(&self) -> &[AotClass] {
        &self.classes
    }

    /// Look up a class by id
    pub fn get_class(&self, class_id: ClassId) -> Option<&AotClass> {
        let index = self
            .classes
            .binary_search_by_key(&class_id.as_u32(), |c| c.header.class_id)
            .ok()?;
        self.classes.get(index)
    }

    /// Bytes of the code region covered by `span`
    pub fn code(&self, span: &CodeSpan) -> &[u8] {
        let start = self.regions.code + span.offset;
        &self.bytes[start..start + span.size]
    }

    /// Data section words
    pub fn data_words(&self) -> &[u64] {
        &self.data
    }

    /// Patch every slot of the slot table to its initial value.
    ///
    /// Must run before any compiled entry of the image executes. Returns the
    /// number of slots processed.
    pub fn initialize_slot_table(&mut self, bindings: &dyn RuntimeBindings) -> Result<usize, LoadError> {
        let count = slots::initialize(&mut self.data, bindings)?;
        self.slots_initialized = true;
        debug!(slots = count, "initialized AOT slot table");
        Ok(count)
    }

    /// Write one address per intrinsic into the intrinsic table
    pub fn patch_intrinsic_table(&mut self, bindings: &dyn RuntimeBindings) {
        let base = self.data.len() - IntrinsicId::COUNT;
        for id in IntrinsicId::ALL {
            self.data[base + id.index()] = bindings.intrinsic_address(id);
        }
        self.intrinsics_patched = true;
    }

    /// Current intrinsic table entry
    pub fn intrinsic_address(&self, id: IntrinsicId) -> u64 {
        self.data[self.data.len() - IntrinsicId::COUNT + id.index()]
    }

    /// The whole intrinsic table, in `IntrinsicId` order
    pub fn intrinsic_table(&self) -> &[u64] {
        &self.data[self.data.len() - IntrinsicId::COUNT..]
    }

    /// Decoded read-only view of the slot table
    pub fn slots(&self) -> Result<Vec<SlotEntry>, LoadError> {
        slots::decode(&self.data)
    }

    /// Whether both the slot table and the intrinsic table have been patched
    pub fn is_patched(&self) -> bool {
        self.slots_initialized && self.intrinsics_patched
    }
}

fn parse_classes(
    metadata: &[u8],
    header: &ImageHeader,
    code_len: usize,
) -> Result<Vec<AotClass>, LoadError> {
    let table = region(
        metadata,
        header.class_table_offset,
        header.class_count as usize * CLASS_HEADER_SIZE,
        "class table",
    )?;
    if (header.class_table_offset as usize) < HEADER_SIZE {
        return Err(LoadError::malformed("class table overlaps header"));
    }

    let mut classes = Vec::with_capacity(header.class_count as usize);
    let mut total_methods = 0usize;
    for chunk in table.chunks_exact(CLASS_HEADER_SIZE) {
        let class = ClassHeader::parse(chunk)
            .ok_or_else(|| LoadError::malformed("truncated class header"))?;
        if class.method_count == 0 {
            return Err(LoadError::malformed(format!(
                "class {} has no compiled methods",
                class.class_id
            )));
        }
        if let Some(previous) = classes.last().map(|c: &AotClass| c.header.class_id) {
            if previous >= class.class_id {
                return Err(LoadError::malformed("class table not sorted by class id"));
            }
        }
        let bitmap = region(
            metadata,
            class.bitmap_offset,
            (class.bitmap_bits as usize).div_ceil(8),
            "method bitmap",
        )?
        .to_vec();
        let set_bits: u32 = bitmap.iter().map(|b| b.count_ones()).sum();
        if set_bits != class.method_count {
            return Err(LoadError::malformed(format!(
                "class {} bitmap has {} bits set for {} methods",
                class.class_id, set_bits, class.method_count
            )));
        }
        let method_bytes = region(
            metadata,
            class.methods_offset,
            class.method_count as usize * METHOD_HEADER_SIZE,
            "method headers",
        )?;
        let mut methods = Vec::with_capacity(class.method_count as usize);
        for chunk in method_bytes.chunks_exact(METHOD_HEADER_SIZE) {
            let method = MethodHeader::parse(chunk)
                .ok_or_else(|| LoadError::malformed("truncated method header"))?;
            let end = method.code_offset as usize + method.code_size as usize;
            if end > code_len {
                return Err(LoadError::malformed(format!(
                    "code of method {} out of bounds",
                    method.method_id
                )));
            }
            methods.push(method);
        }
        total_methods += methods.len();
        classes.push(AotClass {
            header: class,
            bitmap,
            methods,
        });
    }
    if total_methods != header.method_count as usize {
        return Err(LoadError::malformed(format!(
            "header declares {} methods, classes hold {}",
            header.method_count, total_methods
        )));
    }
    Ok(classes)
}

fn region<'a>(metadata: &'a [u8], offset: u32, len: usize, what: &str) -> Result<&'a [u8], LoadError> {
    let start = offset as usize;
    start
        .checked_add(len)
        .and_then(|end| metadata.get(start..end))
        .ok_or_else(|| LoadError::malformed(format!("{} out of bounds", what)))
}

fn parse_data(section: &[u8]) -> Result<Vec<u64>, LoadError> {
    if section.len() % 8 != 0 {
        return Err(LoadError::malformed("data section is not word aligned"));
    }
    let words: Vec<u64> = section
        .chunks_exact(8)
        .map(|w| {
            let mut word = [0u8; 8];
            word.copy_from_slice(w);
            u64::from_le_bytes(word)
        })
        .collect();
    if slots::first_tag_index(words.len()).is_none() {
        return Err(LoadError::malformed(
            "data section too small for intrinsic table",
        ));
    }
    Ok(words)
}
