//! 控制指令的處理模組
//!
//! DI/EI 只排程 IME 變更，於下一次 step 開頭生效

use crate::cpu::{Cpu, ImeToggle};
use crate::mmu::Memory;

/// 處理 DI 指令 (停用中斷)
pub fn di<M: Memory>(cpu: &mut Cpu<M>) {
    cpu.schedule_ime(ImeToggle::Disable);
}

/// 處理 EI 指令 (啟用中斷)
pub fn ei<M: Memory>(cpu: &mut Cpu<M>) {
    cpu.schedule_ime(ImeToggle::Enable);
}
