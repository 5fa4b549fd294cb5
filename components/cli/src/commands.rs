//! Subcommand implementations
//!
//! Each returns the text to print, so the binary stays a thin dispatcher and
//! tests can check output without spawning a process.

use crate::demo::{demo_program, run_demo};
use crate::error::CliResult;
use aot_loader::{AotImage, ImageSummary};
use execution_engine::{build_image, RuntimeOptions};
use std::fmt::Write;
use std::path::Path;
use tracing::info;

/// Describe the image at `path`.
///
/// The image is opened in dump mode, so images built for another collector
/// or another build of the runtime can still be inspected.
pub fn inspect(path: &Path, options: &RuntimeOptions, json: bool) -> CliResult<String> {
    let summary = AotImage::open(path, options.gc_kind, true)?.summary()?;
    if json {
        return Ok(serde_json::to_string_pretty(&summary)?);
    }
    Ok(render_summary(&summary))
}

fn render_summary(summary: &ImageSummary) -> String {
    let mut out = String::new();
    let header = &summary.header;
    // Writing to a String cannot fail
    let _ = writeln!(out, "image:     {}", summary.path);
    let _ = writeln!(out, "version:   {}", header.version);
    let _ = writeln!(
        out,
        "collector: {}",
        summary.gc_kind.unwrap_or("unknown")
    );
    let _ = writeln!(
        out,
        "checksum:  {:#018x} ({})",
        header.environment_checksum,
        if summary.checksum_matches { "matches" } else { "foreign build" }
    );
    let _ = writeln!(
        out,
        "regions:   aot {:#x}..{:#x}, code {:#x}..{:#x}",
        summary.regions.aot, summary.regions.aot_end, summary.regions.code, summary.regions.code_end
    );
    let _ = writeln!(out, "\nclasses ({}):", summary.classes.len());
    for class in &summary.classes {
        let _ = writeln!(out, "  class#{} ({} methods)", class.class_id, class.methods.len());
        for method in &class.methods {
            let _ = writeln!(
                out,
                "    [{}] method#{} @ {:#x}, {} bytes",
                method.index, method.method_id, method.code_offset, method.code_size
            );
        }
    }
    let _ = writeln!(out, "\nslots ({}):", summary.slots.len());
    for slot in &summary.slots {
        let _ = writeln!(out, "  {:?} {}", slot.kind, slot.id);
    }
    let _ = writeln!(out, "\nintrinsics:");
    for (name, address) in &summary.intrinsics {
        let _ = writeln!(out, "  {:<10} {:#x}", name, address);
    }
    out
}

/// AOT-compile the demo program into `out`
pub fn build_demo_image(out: &Path, options: &RuntimeOptions) -> CliResult<String> {
    let writer = build_image(&demo_program()?, options)?;
    writer.write_to_file(out)?;
    info!(path = %out.display(), methods = writer.method_count(), "wrote image");
    Ok(format!(
        "wrote {} methods to {}\n",
        writer.method_count(),
        out.display()
    ))
}

/// Run the demo and render its report
pub fn demo(
    mut options: RuntimeOptions,
    iterations: u32,
    no_jit: bool,
    image: Option<&Path>,
    json: bool,
) -> CliResult<String> {
    if no_jit {
        options = options.with_jit(false);
    }
    if let Some(image) = image {
        options = options.with_aot_file(image);
    }
    let report = run_demo(options, iterations)?;
    if json {
        Ok(serde_json::to_string_pretty(&report)?)
    } else {
        Ok(report.to_text())
    }
}
