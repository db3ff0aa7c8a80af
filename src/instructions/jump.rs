//! 跳轉指令的處理模組
//!
//! JP, JR, CALL, RET, RETI, RST。條件成立時多花一個內部週期。

use super::Cond;
use crate::cpu::Cpu;
use crate::error::Result;
use crate::mmu::Memory;
use crate::registers::Flags;

pub fn condition_met<M: Memory>(cpu: &Cpu<M>, cond: Option<Cond>) -> bool {
    match cond {
        None => true,
        Some(Cond::NZ) => !cpu.flag(Flags::Z),
        Some(Cond::Z) => cpu.flag(Flags::Z),
        Some(Cond::NC) => !cpu.flag(Flags::C),
        Some(Cond::C) => cpu.flag(Flags::C),
    }
}

/// JP [cc,] a16
pub fn jp<M: Memory>(cpu: &mut Cpu<M>, cond: Option<Cond>, target: u16) {
    if condition_met(cpu, cond) {
        cpu.delay(1);
        cpu.registers.set_pc(target);
    }
}

/// JP HL
pub fn jp_hl<M: Memory>(cpu: &mut Cpu<M>) {
    let hl = cpu.registers.get_hl();
    cpu.registers.set_pc(hl);
}

/// JR [cc,] e8, relative to the address after the operand
pub fn jr<M: Memory>(cpu: &mut Cpu<M>, cond: Option<Cond>, raw_offset: u8) {
    if condition_met(cpu, cond) {
        cpu.delay(1);
        let pc = cpu.registers.get_pc();
        cpu.registers
            .set_pc(pc.wrapping_add(raw_offset as i8 as i16 as u16));
    }
}

/// CALL [cc,] a16
pub fn call<M: Memory>(cpu: &mut Cpu<M>, cond: Option<Cond>, target: u16) -> Result<()> {
    if condition_met(cpu, cond) {
        cpu.delay(1);
        let ret = cpu.registers.get_pc();
        cpu.push_word(ret)?;
        cpu.registers.set_pc(target);
    }
    Ok(())
}

/// RET [cc]
pub fn ret<M: Memory>(cpu: &mut Cpu<M>, cond: Option<Cond>) -> Result<()> {
    if condition_met(cpu, cond) {
        let target = cpu.pop_word()?;
        cpu.delay(1);
        cpu.registers.set_pc(target);
    }
    Ok(())
}

/// RETI: 返回並立即啟用 IME
pub fn reti<M: Memory>(cpu: &mut Cpu<M>) -> Result<()> {
    ret(cpu, None)?;
    cpu.set_ime(true);
    Ok(())
}

/// RST n
pub fn rst<M: Memory>(cpu: &mut Cpu<M>, vector: u8) -> Result<()> {
    let ret = cpu.registers.get_pc();
    cpu.push_word(ret)?;
    cpu.registers.set_pc(vector as u16);
    Ok(())
}
