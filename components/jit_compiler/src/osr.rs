//! On-Stack Replacement (OSR) support
//!
//! OSR allows transitioning between execution tiers while code is running:
//! - Enter compiled code from a running interpreter frame at a loop header
//! - Rebuild an interpreter frame from a compiled frame when deoptimizing
//!
//! Both directions go through the same [`FrameMapping`].

use crate::code::{Const, Slot};
use crate::deopt::InterpreterState;
use crate::error::CompileError;
use core_types::Value;
use serde::{Deserialize, Serialize};

/// Location of a bytecode register in a compiled frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterLocation {
    /// Register lives in a slot
    Stack(Slot),
    /// Register is never touched by the method; its value is this constant
    Constant(Const),
}

/// Frame mapping between interpreter and compiled frames
///
/// Maps every interpreter register to its compiled location.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameMapping {
    /// Location of each interpreter register, by register index
    pub register_map: Vec<RegisterLocation>,
    /// Slot count of the compiled frame
    pub native_frame_size: usize,
    /// Register count of the interpreter frame
    pub interpreter_frame_size: usize,
}

impl FrameMapping {
    /// Create a new frame mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a register mapping
    pub fn add_register(&mut self, location: RegisterLocation) {
        self.register_map.push(location);
    }

    /// Set the native frame size
    pub fn set_native_frame_size(&mut self, size: usize) {
        self.native_frame_size = size;
    }

    /// Set the interpreter frame size
    pub fn set_interpreter_frame_size(&mut self, size: usize) {
        self.interpreter_frame_size = size;
    }

    /// Build a compiled slot array from interpreter state
    pub fn to_slots(&self, accumulator: Value, registers: &[Value]) -> Vec<Value> {
        let mut slots = vec![Value::Null; self.native_frame_size];
        slots[Slot::ACC.index()] = accumulator;
        for (location, value) in self.register_map.iter().zip(registers) {
            if let RegisterLocation::Stack(slot) = location {
                slots[slot.index()] = *value;
            }
        }
        slots
    }

    /// Rebuild interpreter registers from a compiled slot array
    pub fn to_registers(&self, slots: &[Value]) -> Vec<Value> {
        self.register_map
            .iter()
            .map(|location| match location {
                RegisterLocation::Stack(slot) => slots[slot.index()],
                RegisterLocation::Constant(value) => value.value(),
            })
            .collect()
    }

    /// Place call arguments into a fresh compiled frame
    pub fn entry_slots(&self, args: &[Value]) -> Vec<Value> {
        self.to_slots(Value::Null, args)
    }
}

/// On-Stack Replacement entry point
///
/// Represents a loop header where execution can transition from the
/// interpreter into compiled code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OSREntry {
    /// Offset in bytecode where OSR can occur
    pub bytecode_offset: u32,
    /// Offset in compiled code for this entry point
    pub native_offset: u32,
}

impl OSREntry {
    /// Create a new OSR entry
    pub fn new(bytecode_offset: u32, native_offset: u32) -> Self {
        Self {
            bytecode_offset,
            native_offset,
        }
    }

    /// Enter compiled code at this OSR point.
    ///
    /// Returns the slot array and pc to resume the compiled frame with.
    pub fn enter_at(
        &self,
        mapping: &FrameMapping,
        state: &InterpreterState,
    ) -> Result<(Vec<Value>, u32), CompileError> {
        if state.pc != self.bytecode_offset {
            return Err(CompileError::NoOsrEntry(state.pc));
        }
        if state.registers.len() != mapping.interpreter_frame_size {
            return Err(CompileError::Backend(format!(
                "frame mapping covers {} registers, frame has {}",
                mapping.interpreter_frame_size,
                state.registers.len()
            )));
        }
        let slots = mapping.to_slots(state.accumulator, &state.registers);
        Ok((slots, self.native_offset))
    }
}
