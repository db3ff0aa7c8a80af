//! 雜項指令的處理模組
//!
//! DAA, CPL, SCF, CCF

use crate::cpu::Cpu;
use crate::mmu::Memory;
use crate::registers::Flags;

/// 十進位調整 (BCD)，依 N/H/C 修正 A
pub fn daa<M: Memory>(cpu: &mut Cpu<M>) {
    let mut a = cpu.registers.get_a();
    let n = cpu.flag(Flags::N);
    let h = cpu.flag(Flags::H);
    let mut carry = cpu.flag(Flags::C);

    if !n {
        if carry || a > 0x99 {
            a = a.wrapping_add(0x60);
            carry = true;
        }
        if h || (a & 0x0F) > 0x09 {
            a = a.wrapping_add(0x06);
        }
    } else {
        if carry {
            a = a.wrapping_sub(0x60);
        }
        if h {
            a = a.wrapping_sub(0x06);
        }
    }

    cpu.registers.set_a(a);
    cpu.registers.set_flag(Flags::Z, a == 0);
    cpu.registers.set_flag(Flags::H, false);
    cpu.registers.set_flag(Flags::C, carry);
}

/// CPL: A = !A, N 與 H 設定，Z/C 不變
pub fn cpl<M: Memory>(cpu: &mut Cpu<M>) {
    let a = cpu.registers.get_a();
    cpu.registers.set_a(!a);
    cpu.registers.set_flag(Flags::N, true);
    cpu.registers.set_flag(Flags::H, true);
}

pub fn scf<M: Memory>(cpu: &mut Cpu<M>) {
    cpu.registers.set_flag(Flags::N, false);
    cpu.registers.set_flag(Flags::H, false);
    cpu.registers.set_flag(Flags::C, true);
}

pub fn ccf<M: Memory>(cpu: &mut Cpu<M>) {
    let c = cpu.flag(Flags::C);
    cpu.registers.set_flag(Flags::N, false);
    cpu.registers.set_flag(Flags::H, false);
    cpu.registers.set_flag(Flags::C, !c);
}
