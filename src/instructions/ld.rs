//! 載入指令 (LD) 的處理模組
//!
//! 這個模組負責處理所有 LD/LDH 指令的變體

use super::Indirect;
use crate::cpu::Cpu;
use crate::error::Result;
use crate::mmu::Memory;
use crate::registers::{Flags, R8, R16};

/// LD r, r' (任一方可以是 (HL))
pub fn load_r8<M: Memory>(cpu: &mut Cpu<M>, dst: R8, src: R8) -> Result<()> {
    let value = cpu.read_r8(src)?;
    cpu.write_r8(dst, value)
}

/// LD r, d8 / LD (HL), d8
pub fn load_r8_imm<M: Memory>(cpu: &mut Cpu<M>, dst: R8, value: u8) -> Result<()> {
    cpu.write_r8(dst, value)
}

/// LD rr, d16
pub fn load_r16_imm<M: Memory>(cpu: &mut Cpu<M>, dst: R16, value: u16) {
    cpu.registers.set_r16(dst, value);
}

// (HL+)/(HL-) 在存取後調整 HL
fn indirect_address<M: Memory>(cpu: &mut Cpu<M>, ind: Indirect) -> u16 {
    match ind {
        Indirect::BC => cpu.registers.get_bc(),
        Indirect::DE => cpu.registers.get_de(),
        Indirect::HLInc => {
            let hl = cpu.registers.get_hl();
            cpu.registers.set_hl(hl.wrapping_add(1));
            hl
        }
        Indirect::HLDec => {
            let hl = cpu.registers.get_hl();
            cpu.registers.set_hl(hl.wrapping_sub(1));
            hl
        }
    }
}

/// LD (BC|DE|HL+|HL-), A
pub fn store_a_indirect<M: Memory>(cpu: &mut Cpu<M>, ind: Indirect) -> Result<()> {
    let addr = indirect_address(cpu, ind);
    let a = cpu.registers.get_a();
    cpu.write(addr, a)
}

/// LD A, (BC|DE|HL+|HL-)
pub fn load_a_indirect<M: Memory>(cpu: &mut Cpu<M>, ind: Indirect) -> Result<()> {
    let addr = indirect_address(cpu, ind);
    let value = cpu.read(addr)?;
    cpu.registers.set_a(value);
    Ok(())
}

/// LD (a16), A / LDH (a8), A / LD (C), A
pub fn store_a_absolute<M: Memory>(cpu: &mut Cpu<M>, addr: u16) -> Result<()> {
    let a = cpu.registers.get_a();
    cpu.write(addr, a)
}

/// LD A, (a16) / LDH A, (a8) / LD A, (C)
pub fn load_a_absolute<M: Memory>(cpu: &mut Cpu<M>, addr: u16) -> Result<()> {
    let value = cpu.read(addr)?;
    cpu.registers.set_a(value);
    Ok(())
}

/// LD (a16), SP: low byte at a16, high byte at a16+1
pub fn store_sp_absolute<M: Memory>(cpu: &mut Cpu<M>, addr: u16) -> Result<()> {
    let sp = cpu.registers.get_sp();
    cpu.write(addr, sp as u8)?;
    cpu.write(addr.wrapping_add(1), (sp >> 8) as u8)
}

/// LD SP, HL
pub fn load_sp_hl<M: Memory>(cpu: &mut Cpu<M>) {
    let hl = cpu.registers.get_hl();
    cpu.registers.set_sp(hl);
}

/// SP + e8 with flags taken from the unsigned low-byte addition. Shared by
/// LD HL,SP+e8 and ADD SP,e8.
pub fn sp_plus_offset<M: Memory>(cpu: &mut Cpu<M>, raw_offset: u8) -> u16 {
    let sp = cpu.registers.get_sp();
    let offset = raw_offset as i8 as i16 as u16;

    let mut flags = Flags::empty();
    flags.set(Flags::H, (sp & 0x0F) + (raw_offset as u16 & 0x0F) > 0x0F);
    flags.set(Flags::C, (sp & 0xFF) + raw_offset as u16 > 0xFF);
    cpu.registers.set_flags(flags);

    sp.wrapping_add(offset)
}

/// LD HL, SP+e8
pub fn load_hl_sp_offset<M: Memory>(cpu: &mut Cpu<M>, raw_offset: u8) {
    let value = sp_plus_offset(cpu, raw_offset);
    cpu.registers.set_hl(value);
}
