//! The bytecode instruction set.

use num_derive::{FromPrimitive, ToPrimitive};

/// One VM instruction. Each variant corresponds to exactly one opcode byte;
/// operands (if any) follow as additional bytes in the chunk's code stream.
///
/// **NOTE:** the numeric order of these variants is the wire format of
/// compiled chunks; reordering them changes nothing within a single build
/// (chunks are never persisted across builds here), but keep new opcodes
/// appended at the end out of habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum OpCode {
  Constant,
  Nil,
  True,
  False,
  Pop,
  GetLocal,
  SetLocal,
  GetGlobal,
  SetGlobal,
  DefineGlobal,
  GetUpvalue,
  SetUpvalue,
  GetProperty,
  SetProperty,
  GetSuper,
  Equal,
  Greater,
  Less,
  Add,
  Subtract,
  Multiply,
  Divide,
  Not,
  Negate,
  Print,
  Jump,
  JumpIfFalse,
  Loop,
  Call,
  Invoke,
  SuperInvoke,
  Closure,
  CloseUpvalue,
  Return,
  Class,
  Inherit,
  Method,
}

#[cfg(test)]
mod tests {
  use super::*;
  use num_traits::{FromPrimitive, ToPrimitive};

  #[test]
  fn every_opcode_round_trips_through_its_byte() {
    for byte in 0u8..=(OpCode::Method.to_u8().unwrap()) {
      let op = OpCode::from_u8(byte).expect("byte in range must decode");
      assert_eq!(op.to_u8().unwrap(), byte);
    }
  }

  #[test]
  fn out_of_range_byte_does_not_decode() {
    let max = OpCode::Method.to_u8().unwrap();
    assert!(OpCode::from_u8(max + 1).is_none());
  }
}
