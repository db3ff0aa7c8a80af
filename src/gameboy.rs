// Game Boy 模擬器主結構
// CPU 擁有 MMU，MMU 擁有 PPU/APU；每執行一個指令就把消耗的週期餵給 PPU 的掃描線計數

use crate::config::Config;
use crate::cpu::{Cpu, StateReport};
use crate::error::Result;
use crate::mmu::Mmu;
use crate::ppu::{DOTS_PER_FRAME, FrameBuffer, Viewport};
use crate::rom;

#[derive(Debug)]
pub struct GameBoy {
    pub cpu: Cpu<Mmu>,
    viewport: Viewport,
}

impl GameBoy {
    pub fn new(rom: Vec<u8>, boot_rom: Option<Vec<u8>>) -> Self {
        GameBoy {
            cpu: Cpu::new(Mmu::new(rom, boot_rom)),
            viewport: Viewport::default(),
        }
    }

    /// Loads the cartridge (and boot ROM, if configured) from disk.
    pub fn from_config(config: &Config) -> Result<Self> {
        let rom_path = config.require_rom_path()?;
        let rom_data = rom::read_rom_file(rom_path)?;
        match rom::cartridge_title(&rom_data) {
            Some(title) => log::info!(
                "loaded ROM {} \"{}\" ({} bytes)",
                rom_path.display(),
                title,
                rom_data.len()
            ),
            None => log::info!("loaded ROM {} ({} bytes)", rom_path.display(), rom_data.len()),
        }

        let boot_rom = match &config.boot_rom_path {
            Some(path) => {
                let data = rom::read_rom_file(path)?;
                log::info!("loaded boot ROM {} ({} bytes)", path.display(), data.len());
                Some(data)
            }
            None => None,
        };

        let mut gb = GameBoy {
            cpu: Cpu::with_trace_capacity(Mmu::new(rom_data, boot_rom), config.trace_capacity),
            viewport: config.viewport.clamped(),
        };
        gb.cpu.set_debug(config.debug);
        Ok(gb)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn mmu(&self) -> &Mmu {
        &self.cpu.bus
    }

    // 執行一個 CPU 指令，回傳消耗的 T 週期並同步推進 PPU
    pub fn step(&mut self) -> Result<u64> {
        let before = self.cpu.cycles().t;
        let result = self.cpu.step();
        let elapsed = self.cpu.cycles().t - before;
        self.cpu.bus.ppu.advance(elapsed as u32);
        result.map(|_| elapsed)
    }

    /// Runs up to `count` instructions and stops at the first error.
    pub fn run_steps(&mut self, count: u64) -> Result<u64> {
        let mut elapsed = 0;
        for _ in 0..count {
            elapsed += self.step()?;
        }
        Ok(elapsed)
    }

    // 執行一個完整的幀 (70224 個時鐘循環)
    pub fn run_frame(&mut self) -> Result<()> {
        let mut frame_cycles = 0u64;
        while frame_cycles < DOTS_PER_FRAME as u64 {
            frame_cycles += self.step()?;
        }
        Ok(())
    }

    // 獲取當前畫面
    pub fn frame(&self) -> FrameBuffer {
        self.cpu.bus.ppu.render(self.viewport)
    }

    pub fn state_report(&self) -> StateReport {
        let mut report = self.cpu.state_report();
        let mmu = &self.cpu.bus;
        report.serial_output = mmu.serial_output().to_string();
        report.interrupts = Some(mmu.interrupts());
        report.ppu = Some(mmu.ppu.snapshot());
        report
    }
}
