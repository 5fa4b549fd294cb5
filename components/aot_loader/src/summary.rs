//! Serializable description of a loaded image, for tooling.

use crate::container::Regions;
use crate::error::LoadError;
use crate::format::{environment_checksum, ImageHeader};
use crate::image::AotImage;
use crate::slots::SlotEntry;
use core_types::{GcKind, IntrinsicId};
use serde::Serialize;

/// One compiled method
#[derive(Debug, Clone, Serialize)]
pub struct MethodSummary {
    /// Index of the method in its class
    pub index: u32,
    /// Method id
    pub method_id: u32,
    /// Code offset relative to the code region
    pub code_offset: usize,
    /// Code size in bytes
    pub code_size: usize,
}

/// One class
#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    /// Class id
    pub class_id: u32,
    /// Compiled methods by index
    pub methods: Vec<MethodSummary>,
}

/// Everything `inspect` prints
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    /// Source file
    pub path: String,
    /// Metadata header
    pub header: ImageHeader,
    /// Region boundaries
    pub regions: Regions,
    /// Collector name, if the tag is known
    pub gc_kind: Option<&'static str>,
    /// Whether this process could execute the image
    pub checksum_matches: bool,
    /// Classes in id order
    pub classes: Vec<ClassSummary>,
    /// Decoded slot table
    pub slots: Vec<SlotEntry>,
    /// Intrinsic table as `(name, address)`
    pub intrinsics: Vec<(&'static str, u64)>,
}

impl AotImage {
    /// Describe the image
    pub fn summary(&self) -> Result<ImageSummary, LoadError> {
        let classes = self
            .classes()
            .iter()
            .map(|class| ClassSummary {
                class_id: class.class_id().as_u32(),
                methods: (0..class.header().bitmap_bits)
                    .filter_map(|index| {
                        class.find_method_code(index).map(|span| MethodSummary {
                            index,
                            method_id: span.method_id.as_u32(),
                            code_offset: span.offset,
                            code_size: span.size,
                        })
                    })
                    .collect(),
            })
            .collect();
        Ok(ImageSummary {
            path: self.path().display().to_string(),
            header: *self.header(),
            regions: *self.regions(),
            gc_kind: GcKind::from_tag(self.header().gc_kind).map(GcKind::name),
            checksum_matches: self.header().environment_checksum == environment_checksum(),
            classes,
            slots: self.slots()?,
            intrinsics: IntrinsicId::ALL
                .iter()
                .map(|id| (id.name(), self.intrinsic_address(*id)))
                .collect(),
        })
    }
}
