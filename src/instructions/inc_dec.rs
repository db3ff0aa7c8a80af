//! 增減指令 (INC, DEC) 的處理模組

use crate::cpu::Cpu;
use crate::error::Result;
use crate::mmu::Memory;
use crate::registers::{Flags, R8, R16};

/// INC r / INC (HL): C 不變
pub fn inc_r8<M: Memory>(cpu: &mut Cpu<M>, r: R8) -> Result<()> {
    let value = cpu.read_r8(r)?;
    let result = value.wrapping_add(1);
    cpu.write_r8(r, result)?;

    cpu.registers.set_flag(Flags::Z, result == 0);
    cpu.registers.set_flag(Flags::N, false);
    cpu.registers.set_flag(Flags::H, (value & 0x0F) == 0x0F);
    Ok(())
}

/// DEC r / DEC (HL): H set when the low nibble borrows; C unchanged.
pub fn dec_r8<M: Memory>(cpu: &mut Cpu<M>, r: R8) -> Result<()> {
    let value = cpu.read_r8(r)?;
    let result = value.wrapping_sub(1);
    cpu.write_r8(r, result)?;

    cpu.registers.set_flag(Flags::Z, result == 0);
    cpu.registers.set_flag(Flags::N, true);
    cpu.registers.set_flag(Flags::H, (value & 0x0F) < 1);
    Ok(())
}

pub fn inc_r16<M: Memory>(cpu: &mut Cpu<M>, r: R16) {
    let value = cpu.registers.get_r16(r);
    cpu.registers.set_r16(r, value.wrapping_add(1));
}

pub fn dec_r16<M: Memory>(cpu: &mut Cpu<M>, r: R16) {
    let value = cpu.registers.get_r16(r);
    cpu.registers.set_r16(r, value.wrapping_sub(1));
}
