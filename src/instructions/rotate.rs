//! 旋轉、移位與位元指令的處理模組
//!
//! RLCA/RRCA/RLA/RRA 以及 CB 擴充的 RLC..SRL, BIT, RES, SET

use super::ShiftOp;
use crate::cpu::Cpu;
use crate::error::Result;
use crate::mmu::Memory;
use crate::registers::{Flags, R8};

/// Returns the shifted value and the bit shifted out.
pub fn shift_result(op: ShiftOp, value: u8, carry_in: bool) -> (u8, bool) {
    let c = carry_in as u8;
    match op {
        ShiftOp::Rlc => (value.rotate_left(1), value & 0x80 != 0),
        ShiftOp::Rrc => (value.rotate_right(1), value & 0x01 != 0),
        ShiftOp::Rl => ((value << 1) | c, value & 0x80 != 0),
        ShiftOp::Rr => ((value >> 1) | (c << 7), value & 0x01 != 0),
        ShiftOp::Sla => (value << 1, value & 0x80 != 0),
        ShiftOp::Sra => ((value >> 1) | (value & 0x80), value & 0x01 != 0),
        ShiftOp::Swap => (value.rotate_left(4), false),
        ShiftOp::Srl => (value >> 1, value & 0x01 != 0),
    }
}

/// RLCA, RRCA, RLA, RRA: Z 一律清除
pub fn rotate_a<M: Memory>(cpu: &mut Cpu<M>, op: ShiftOp) {
    let a = cpu.registers.get_a();
    let (result, carry) = shift_result(op, a, cpu.flag(Flags::C));
    cpu.registers.set_a(result);

    let mut flags = Flags::empty();
    flags.set(Flags::C, carry);
    cpu.registers.set_flags(flags);
}

/// CB 移位/旋轉：Z 依結果設定
pub fn shift_r8<M: Memory>(cpu: &mut Cpu<M>, op: ShiftOp, r: R8) -> Result<()> {
    let value = cpu.read_r8(r)?;
    let (result, carry) = shift_result(op, value, cpu.flag(Flags::C));
    cpu.write_r8(r, result)?;

    let mut flags = Flags::empty();
    flags.set(Flags::Z, result == 0);
    flags.set(Flags::C, carry);
    cpu.registers.set_flags(flags);
    Ok(())
}

/// BIT b, r: Z = bit clear, H set, C preserved
pub fn bit<M: Memory>(cpu: &mut Cpu<M>, bit: u8, r: R8) -> Result<()> {
    let value = cpu.read_r8(r)?;
    cpu.registers.set_flag(Flags::Z, value & (1 << bit) == 0);
    cpu.registers.set_flag(Flags::N, false);
    cpu.registers.set_flag(Flags::H, true);
    Ok(())
}

pub fn res<M: Memory>(cpu: &mut Cpu<M>, bit: u8, r: R8) -> Result<()> {
    let value = cpu.read_r8(r)?;
    cpu.write_r8(r, value & !(1 << bit))
}

pub fn set<M: Memory>(cpu: &mut Cpu<M>, bit: u8, r: R8) -> Result<()> {
    let value = cpu.read_r8(r)?;
    cpu.write_r8(r, value | (1 << bit))
}
