//! Runtime intrinsics and the addresses handed to AOT images
//!
//! Compiled code from an image calls intrinsics through the image's patched
//! intrinsic table. The portable compiled tier has no machine addresses, so
//! the runtime hands out stable address tokens and maps them back to
//! functions at the call.

use aot_loader::RuntimeBindings;
use core_types::{ArithFault, IntrinsicId, Value};

/// Signature of every intrinsic
pub type IntrinsicFn = fn(&[i64]) -> Result<i64, ArithFault>;

/// Address token of the static-call resolver stub
pub const PLT_RESOLVER_STUB: u64 = 0x7000_0010;
/// Address token of the virtual-call resolver stub
pub const VIRTUAL_RESOLVER_STUB: u64 = 0x7000_0020;
/// Address token of the first intrinsic; the rest follow at `INTRINSIC_STRIDE`
pub const INTRINSIC_BASE: u64 = 0x7100_0000;
/// Distance between intrinsic address tokens
pub const INTRINSIC_STRIDE: u64 = 0x10;

fn abs_i64(args: &[i64]) -> Result<i64, ArithFault> {
    Ok(args[0].wrapping_abs())
}

fn min_i64(args: &[i64]) -> Result<i64, ArithFault> {
    Ok(args[0].min(args[1]))
}

fn max_i64(args: &[i64]) -> Result<i64, ArithFault> {
    Ok(args[0].max(args[1]))
}

fn clamp_i64(args: &[i64]) -> Result<i64, ArithFault> {
    Ok(args[0].max(args[1]).min(args[2]))
}

fn popcount(args: &[i64]) -> Result<i64, ArithFault> {
    Ok(args[0].count_ones() as i64)
}

// Negative exponents have no integer result.
fn pow_i64(args: &[i64]) -> Result<i64, ArithFault> {
    let exponent = u32::try_from(args[1].min(u32::MAX as i64))
        .map_err(|_| ArithFault::DivideByZero)?;
    Ok(args[0].wrapping_pow(exponent))
}

/// Function implementing an intrinsic
pub fn intrinsic_fn(id: IntrinsicId) -> IntrinsicFn {
    match id {
        IntrinsicId::AbsI64 => abs_i64,
        IntrinsicId::MinI64 => min_i64,
        IntrinsicId::MaxI64 => max_i64,
        IntrinsicId::ClampI64 => clamp_i64,
        IntrinsicId::PopCount => popcount,
        IntrinsicId::PowI64 => pow_i64,
    }
}

/// Address token of an intrinsic
pub fn intrinsic_address(id: IntrinsicId) -> u64 {
    INTRINSIC_BASE + id.index() as u64 * INTRINSIC_STRIDE
}

/// Intrinsic behind an address token
pub fn intrinsic_at(address: u64) -> Option<IntrinsicId> {
    let offset = address.checked_sub(INTRINSIC_BASE)?;
    if offset % INTRINSIC_STRIDE != 0 {
        return None;
    }
    IntrinsicId::ALL
        .get((offset / INTRINSIC_STRIDE) as usize)
        .copied()
}

/// Apply an intrinsic to managed values.
///
/// `Err(None)` means the argument count is wrong.
pub fn call_intrinsic(id: IntrinsicId, args: &[Value]) -> Result<Value, Option<ArithFault>> {
    if args.len() != id.arity() {
        return Err(None);
    }
    let mut ints = [0i64; 3];
    for (slot, value) in ints.iter_mut().zip(args) {
        *slot = value.as_int().ok_or(Some(ArithFault::NotAnInteger))?;
    }
    intrinsic_fn(id)(&ints[..args.len()])
        .map(Value::Int)
        .map_err(Some)
}

/// Addresses the engine patches into loaded images
#[derive(Debug, Default, Clone, Copy)]
pub struct EngineBindings;

impl RuntimeBindings for EngineBindings {
    fn plt_resolver_stub(&self) -> u64 {
        PLT_RESOLVER_STUB
    }

    fn virtual_resolver_stub(&self) -> u64 {
        VIRTUAL_RESOLVER_STUB
    }

    fn intrinsic_address(&self, id: IntrinsicId) -> u64 {
        intrinsic_address(id)
    }
}
