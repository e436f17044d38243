//! Bytecode instruction encoding and opcodes.
//!
//! Instructions are 32-bit words: 8-bit opcode + 24-bit operand. Depending
//! on the opcode the operand is a signed jump offset relative to the
//! instruction itself, or an index into one of the program's constant
//! tables.

/// Opcode constants (8-bit)
pub mod op {
    // Input matching (operand: table index)
    pub const ANY_CHAR: u8 = 0x01; // scan set
    pub const LITERAL: u8 = 0x02; // literal
    pub const KEYWORD: u8 = 0x03; // literal
    pub const SCAN: u8 = 0x04; // scanner
    pub const EOF: u8 = 0x05;

    // Control flow (operand: relative offset)
    pub const JUMP: u8 = 0x10;
    pub const JUMP_IF_SUCCESS: u8 = 0x11;
    pub const JUMP_IF_FAILURE: u8 = 0x12;
    pub const LOOP: u8 = 0x13;

    // Position stack
    pub const PUSH_POS: u8 = 0x20;
    pub const CLEAR_POS: u8 = 0x21;
    pub const POP_POS: u8 = 0x22;
    pub const POP_PUSH_POS: u8 = 0x23;

    // Accumulators
    pub const CREATE_ACC: u8 = 0x30;
    pub const DELETE_ACC: u8 = 0x31;
    pub const PUSH: u8 = 0x32;
    pub const POP: u8 = 0x33;
    pub const LOAD_ACC: u8 = 0x34; // arity

    // Results
    pub const MAP: u8 = 0x40; // map function
    pub const LIFT: u8 = 0x41; // lift function
    pub const OPT: u8 = 0x42; // value
    pub const FAIL: u8 = 0x43; // label

    // Recursion
    pub const FORWARD: u8 = 0x50; // forward

    // Diagnostics
    pub const PRINT: u8 = 0x60; // label
}

/// Largest unsigned operand.
pub const MAX_OPERAND: u32 = 0x00FF_FFFF;

const MAX_OFFSET: i64 = 0x007F_FFFF;
const MIN_OFFSET: i64 = -0x0080_0000;

/// Encode an instruction from opcode and operand
#[inline]
pub fn encode(opcode: u8, operand: u32) -> u32 {
    ((opcode as u32) << 24) | (operand & MAX_OPERAND)
}

/// Decode opcode from instruction
#[inline]
pub fn opcode(instr: u32) -> u8 {
    (instr >> 24) as u8
}

/// Decode operand from instruction (24-bit unsigned)
#[inline]
pub fn operand(instr: u32) -> u32 {
    instr & MAX_OPERAND
}

/// Decode operand as signed offset
#[inline]
pub fn operand_signed(instr: u32) -> i32 {
    let raw = instr & MAX_OPERAND;
    // Sign-extend from 24 bits
    if raw & 0x0080_0000 != 0 {
        (raw | 0xFF00_0000) as i32
    } else {
        raw as i32
    }
}

/// Encode a signed offset into 24-bit operand
#[inline]
pub fn encode_signed(offset: i32) -> u32 {
    (offset as u32) & MAX_OPERAND
}

/// Relative offset from `from` to `to`, if it fits the signed operand.
pub fn jump_offset(from: usize, to: usize) -> Option<i32> {
    let offset = to as i64 - from as i64;
    if (MIN_OFFSET..=MAX_OFFSET).contains(&offset) {
        Some(offset as i32)
    } else {
        None
    }
}

/// Jump target of the instruction at `pc`.
#[inline]
pub fn target(pc: usize, instr: u32) -> usize {
    (pc as i64 + operand_signed(instr) as i64) as usize
}

/// Mnemonic for disassembly.
pub fn name(opcode: u8) -> &'static str {
    match opcode {
        op::ANY_CHAR => "ANY_CHAR",
        op::LITERAL => "LITERAL",
        op::KEYWORD => "KEYWORD",
        op::SCAN => "SCAN",
        op::EOF => "EOF",
        op::JUMP => "JUMP",
        op::JUMP_IF_SUCCESS => "JUMP_IF_SUCCESS",
        op::JUMP_IF_FAILURE => "JUMP_IF_FAILURE",
        op::LOOP => "LOOP",
        op::PUSH_POS => "PUSH_POS",
        op::CLEAR_POS => "CLEAR_POS",
        op::POP_POS => "POP_POS",
        op::POP_PUSH_POS => "POP_PUSH_POS",
        op::CREATE_ACC => "CREATE_ACC",
        op::DELETE_ACC => "DELETE_ACC",
        op::PUSH => "PUSH",
        op::POP => "POP",
        op::LOAD_ACC => "LOAD_ACC",
        op::MAP => "MAP",
        op::LIFT => "LIFT",
        op::OPT => "OPT",
        op::FAIL => "FAIL",
        op::FORWARD => "FORWARD",
        op::PRINT => "PRINT",
        _ => "???",
    }
}

/// Whether the operand of `opcode` is a relative jump offset.
pub fn is_jump(opcode: u8) -> bool {
    matches!(opcode, op::JUMP | op::JUMP_IF_SUCCESS | op::JUMP_IF_FAILURE | op::LOOP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let instr = encode(op::LITERAL, 0x12_3456);
        assert_eq!(opcode(instr), op::LITERAL);
        assert_eq!(operand(instr), 0x12_3456);
    }

    #[test]
    fn test_signed_operand() {
        for offset in [-1, -9, 0, 7, MAX_OFFSET as i32, MIN_OFFSET as i32] {
            let instr = encode(op::JUMP, encode_signed(offset));
            assert_eq!(opcode(instr), op::JUMP);
            assert_eq!(operand_signed(instr), offset);
        }
    }

    #[test]
    fn test_jump_offset_range() {
        assert_eq!(jump_offset(10, 4), Some(-6));
        assert_eq!(jump_offset(0, MAX_OFFSET as usize), Some(MAX_OFFSET as i32));
        assert_eq!(jump_offset(0, MAX_OFFSET as usize + 1), None);
        assert_eq!(target(10, encode(op::LOOP, encode_signed(-6))), 4);
    }
}
