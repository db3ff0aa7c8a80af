//! 算術與邏輯指令的處理模組
//!
//! ADD, ADC, SUB, SBC, AND, XOR, OR, CP 以及 16 位的 ADD HL/ADD SP

use super::AluOp;
use crate::cpu::Cpu;
use crate::mmu::Memory;
use crate::registers::{Flags, R16};

/// Result and full flag nibble of `a <op> value`, with `carry_in` feeding
/// ADC/SBC. CP yields SUB's flags; the caller discards the result.
pub fn alu_result(op: AluOp, a: u8, value: u8, carry_in: bool) -> (u8, Flags) {
    let c = carry_in as u8;
    let mut flags = Flags::empty();

    let result = match op {
        AluOp::Add | AluOp::Adc => {
            let c = if op == AluOp::Adc { c } else { 0 };
            let sum = a as u16 + value as u16 + c as u16;
            flags.set(Flags::H, (a & 0x0F) + (value & 0x0F) + c > 0x0F);
            flags.set(Flags::C, sum > 0xFF);
            sum as u8
        }
        AluOp::Sub | AluOp::Sbc | AluOp::Cp => {
            let c = if op == AluOp::Sbc { c } else { 0 };
            flags.insert(Flags::N);
            // 借位規則：被減數小於減數 (含進位) 時設定
            flags.set(Flags::H, (a & 0x0F) < (value & 0x0F) + c);
            flags.set(Flags::C, (a as u16) < value as u16 + c as u16);
            a.wrapping_sub(value).wrapping_sub(c)
        }
        AluOp::And => {
            flags.insert(Flags::H);
            a & value
        }
        AluOp::Xor => a ^ value,
        AluOp::Or => a | value,
    };

    flags.set(Flags::Z, result == 0);
    (result, flags)
}

/// 8 位算術/邏輯運算，結果寫回 A (CP 除外)
pub fn alu<M: Memory>(cpu: &mut Cpu<M>, op: AluOp, value: u8) {
    let a = cpu.registers.get_a();
    let (result, flags) = alu_result(op, a, value, cpu.flag(Flags::C));
    if op != AluOp::Cp {
        cpu.registers.set_a(result);
    }
    cpu.registers.set_flags(flags);
}

/// ADD HL, rr: Z preserved, H from bit 11, C from bit 15.
pub fn add_hl<M: Memory>(cpu: &mut Cpu<M>, src: R16) {
    let hl = cpu.registers.get_hl();
    let value = cpu.registers.get_r16(src);
    let (result, carry) = hl.overflowing_add(value);

    cpu.registers.set_flag(Flags::N, false);
    cpu.registers
        .set_flag(Flags::H, (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF);
    cpu.registers.set_flag(Flags::C, carry);
    cpu.registers.set_hl(result);
}

/// ADD SP, e8
pub fn add_sp_offset<M: Memory>(cpu: &mut Cpu<M>, raw_offset: u8) {
    let value = super::ld::sp_plus_offset(cpu, raw_offset);
    cpu.registers.set_sp(value);
}
