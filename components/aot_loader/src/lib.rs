//! Ahead-of-time compiled code images
//!
//! An image bundles compiled method bodies with the metadata needed to find
//! them and a data section the runtime patches before the code first runs.
//!
//! # Loading
//!
//! [`AotImage::open`] validates, in order, the container and its exported
//! symbols, the metadata header (magic and version) and, unless the image is
//! only being dumped, the build environment checksum and the collector kind.
//! The runtime then patches the image through `&mut` with
//! [`AotImage::initialize_slot_table`] and [`AotImage::patch_intrinsic_table`]
//! before sharing it.
//!
//! # Example
//!
//! ```
//! use aot_loader::{AotImage, ImageWriter};
//! use core_types::{ClassId, GcKind, MethodId};
//!
//! let mut writer = ImageWriter::new(GcKind::Generational);
//! writer.add_method(ClassId(20), 2, MethodId(7), vec![0xC3]);
//!
//! let image = AotImage::from_bytes(writer.to_bytes(), GcKind::Generational, false).unwrap();
//! let class = image.get_class(ClassId(20)).unwrap();
//! assert!(class.find_method_code(0).is_none());
//! assert_eq!(class.find_method_code(2).unwrap().method_id, MethodId(7));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;
pub mod error;
pub mod format;
pub mod image;
pub mod slots;
pub mod summary;
pub mod writer;

pub use container::{Regions, SymbolTable};
pub use error::LoadError;
pub use format::{environment_checksum, ClassHeader, ImageHeader, MethodHeader};
pub use image::{AotClass, AotImage, CodeSpan};
pub use slots::{RuntimeBindings, SlotEntry, SlotKind};
pub use summary::{ClassSummary, ImageSummary, MethodSummary};
pub use writer::{ImageWriter, UNINITIALIZED_SLOT_WORD};
