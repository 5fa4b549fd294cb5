//! Loaded AOT images
//!
//! Images are opened and patched once at runtime creation, then shared
//! read-only. Compilation tasks consult them before invoking the compiler;
//! a method an image does not carry is compiled as usual.

use crate::bindings::EngineBindings;
use crate::class_linker::{ClassLinker, LinkerResolver};
use crate::error::VmError;
use crate::method::Method;
use crate::options::RuntimeOptions;
use aot_loader::{AotImage, ImageWriter, LoadError, SlotKind};
use core_types::{DefaultBarrierSet, GcKind};
use jit_compiler::{
    codec, BaselineJIT, CompileError, CompileRequest, CompiledCode, Deoptimizer, MOp, MemoryStats,
    TaskArenas,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct LoadedImage {
    image: AotImage,
    intrinsics: Arc<[u64]>,
}

/// The runtime's loaded images
#[derive(Default)]
pub struct AotManager {
    images: Vec<LoadedImage>,
}

impl AotManager {
    /// Open and patch every image in `paths`.
    ///
    /// An image that fails to load is logged and skipped; the runtime runs
    /// without it.
    pub fn load<P: AsRef<Path>>(paths: &[P], gc_kind: GcKind) -> Self {
        let mut manager = Self::default();
        for path in paths {
            let path = path.as_ref();
            let added = AotImage::open(path, gc_kind, false).and_then(|image| manager.add_image(image));
            if let Err(error) = added {
                warn!(path = %path.display(), %error, "skipping AOT image");
            }
        }
        manager
    }

    /// Patch `image` and make its code available
    pub fn add_image(&mut self, mut image: AotImage) -> Result<(), LoadError> {
        let slots = image.initialize_slot_table(&EngineBindings)?;
        image.patch_intrinsic_table(&EngineBindings);
        // Patching is complete before any thread can reach the image's code
        fence(Ordering::SeqCst);
        let intrinsics: Arc<[u64]> = Arc::from(image.intrinsic_table());
        debug!(
            path = %image.path().display(),
            classes = image.classes().len(),
            slots,
            "AOT image ready"
        );
        self.images.push(LoadedImage { image, intrinsics });
        Ok(())
    }

    /// Number of loaded images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Loaded images, in load order
    pub fn images(&self) -> impl Iterator<Item = &AotImage> {
        self.images.iter().map(|loaded| &loaded.image)
    }

    /// Precompiled code for `method`, from the first image that has it
    pub fn lookup(&self, method: &Method) -> Option<CompiledCode> {
        for loaded in &self.images {
            let Some(span) = loaded
                .image
                .get_class(method.class())
                .and_then(|class| class.find_method_code(method.index_in_class()))
            else {
                continue;
            };
            if span.method_id != method.id() {
                warn!(
                    expected = %method.id(),
                    found = %span.method_id,
                    "AOT image disagrees about method layout"
                );
                continue;
            }
            match codec::decode(loaded.image.code(&span)) {
                Ok(mut code) if code.method == method.id() => {
                    code.set_intrinsic_table(Arc::clone(&loaded.intrinsics));
                    debug!(method = %method.id(), "using AOT code");
                    return Some(code);
                }
                Ok(code) => {
                    warn!(expected = %method.id(), found = %code.method, "AOT body belongs to another method");
                }
                Err(error) => {
                    warn!(method = %method.id(), %error, "undecodable AOT body");
                }
            }
        }
        None
    }
}

fn slot_for(op: &MOp) -> Option<(SlotKind, u64)> {
    match op {
        MOp::CallStatic { method, .. } => Some((SlotKind::Plt, method.as_u32() as u64)),
        MOp::CallVirtual { method, .. } | MOp::CallGuarded { method, .. } => {
            Some((SlotKind::VtableIndex, method.as_u32() as u64))
        }
        MOp::NewObject { class } | MOp::CheckCast { class, .. } => {
            Some((SlotKind::Class, class.as_u32() as u64))
        }
        _ => None,
    }
}

/// Compile every method `linker` knows into an image.
///
/// Compilation is unprofiled. Methods the compiler refuses (empty or over
/// the size limit) are left out and will be interpreted; any other
/// failure aborts the build.
pub fn build_image(linker: &dyn ClassLinker, options: &RuntimeOptions) -> Result<ImageWriter, VmError> {
    let jit = BaselineJIT::new(options.compiler_config());
    let memory = Arc::new(MemoryStats::new(options.arena_budget));
    let history = Deoptimizer::with_max_count(options.max_deopts);
    let barriers = DefaultBarrierSet::new(options.gc_kind);
    let resolver = LinkerResolver(linker);
    let mut writer = ImageWriter::new(options.gc_kind);
    let mut slots = HashSet::new();

    for method in linker.methods() {
        let request = CompileRequest {
            method: method.id(),
            chunk: method.chunk(),
            profile: None,
            history: &history,
            osr_pc: None,
            barriers: &barriers,
            resolver: &resolver,
        };
        let compiled = TaskArenas::allocate(&memory, options.arena_size).and_then(|mut arenas| {
            let compiled = jit.compile(&request, &mut arenas);
            arenas.release();
            compiled
        });
        let code = match compiled {
            Ok(code) => code,
            Err(error @ (CompileError::EmptyMethod | CompileError::TooLarge { .. })) => {
                warn!(method = %method.id(), %error, "left out of image");
                continue;
            }
            Err(source) => {
                return Err(VmError::Compile {
                    method: method.id(),
                    source,
                })
            }
        };
        for slot in code.ops.iter().filter_map(slot_for) {
            if slots.insert(slot) {
                writer.add_slot(slot.0, slot.1);
            }
        }
        writer.add_method(
            method.class(),
            method.index_in_class(),
            method.id(),
            codec::encode(&code)?,
        );
    }
    info!(
        methods = writer.method_count(),
        slots = slots.len(),
        gc = %options.gc_kind,
        "built AOT image"
    );
    Ok(writer)
}
