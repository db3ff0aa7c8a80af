//! 堆疊指令的處理模組
//!
//! 這個模組負責處理 PUSH, POP 等堆疊操作指令

use crate::cpu::Cpu;
use crate::error::Result;
use crate::mmu::Memory;
use crate::registers::R16Stack;

/// 處理 PUSH 指令
pub fn push<M: Memory>(cpu: &mut Cpu<M>, pair: R16Stack) -> Result<()> {
    let value = cpu.registers.get_r16_stack(pair);
    cpu.push_word(value)
}

/// 處理 POP 指令 (POP AF 會遮蔽 F 的低 4 位)
pub fn pop<M: Memory>(cpu: &mut Cpu<M>, pair: R16Stack) -> Result<()> {
    let value = cpu.pop_word()?;
    cpu.registers.set_r16_stack(pair, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::cpu::Cpu;
    use crate::mmu::FlatMemory;

    #[test]
    fn test_push_af_pop_hl() {
        // PUSH AF; POP HL
        let mut cpu = Cpu::new(FlatMemory::with_program(0x0000, &[0xF5, 0xE1]));
        cpu.registers.set_sp(0xDFFE);
        cpu.registers.set_af(0x12B0);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.registers.get_hl(), 0x12B0);
        assert_eq!(cpu.registers.get_sp(), 0xDFFE);
        assert_eq!(cpu.cycles().t, 16 + 12);
    }
}
