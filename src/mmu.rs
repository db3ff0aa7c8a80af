// 記憶體管理單元 (MMU) - 負責 CPU 與記憶體/I/O 的通訊
// 每個位址只對應一個擁有者，其餘位址一律回傳 UnmappedAddress

use crate::apu::Apu;
use crate::error::{Access, Error, Result};
use crate::ppu::Ppu;
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

pub const BOOT_ROM_SIZE: usize = 0x100;
pub const WRAM_SIZE: usize = 0x2000;
pub const HRAM_SIZE: usize = 0x7F;

pub trait Memory {
    fn read_byte(&self, address: u16) -> Result<u8>;
    fn write_byte(&mut self, address: u16, value: u8) -> Result<()>;

    // 讀取字組 (little-endian)
    fn read_word(&self, address: u16) -> Result<u16> {
        let low = self.read_byte(address)?;
        let high = self.read_byte(address.wrapping_add(1))?;
        Ok(((high as u16) << 8) | (low as u16))
    }

    // 寫入字組 (little-endian)
    fn write_word(&mut self, address: u16, value: u16) -> Result<()> {
        self.write_byte(address, (value & 0xFF) as u8)?;
        self.write_byte(address.wrapping_add(1), (value >> 8) as u8)
    }
}

bitflags! {
    /// IE/IF 的中斷位元
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptFlags: u8 {
        const VBLANK = 0x01;
        const LCD_STAT = 0x02;
        const TIMER = 0x04;
        const SERIAL = 0x08;
        const JOYPAD = 0x10;
    }
}

impl fmt::Display for InterruptFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(InterruptFlags, &str); 5] = [
            (InterruptFlags::VBLANK, "VBlank"),
            (InterruptFlags::LCD_STAT, "LCDStat"),
            (InterruptFlags::TIMER, "Timer"),
            (InterruptFlags::SERIAL, "Serial"),
            (InterruptFlags::JOYPAD, "Joypad"),
        ];
        if self.is_empty() {
            return f.write_str("-");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// IE and IF as seen by a state report, raw and decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterruptSnapshot {
    pub ie: u8,
    pub if_reg: u8,
    pub enabled: String,
    pub requested: String,
}

impl InterruptSnapshot {
    pub fn new(ie: u8, if_reg: u8) -> Self {
        InterruptSnapshot {
            ie,
            if_reg,
            enabled: InterruptFlags::from_bits_truncate(ie).to_string(),
            requested: InterruptFlags::from_bits_truncate(if_reg).to_string(),
        }
    }
}

impl fmt::Display for InterruptSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IE={:02X} [{}] IF={:02X} [{}]",
            self.ie, self.enabled, self.if_reg, self.requested
        )
    }
}

/// 功能啟用狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableState {
    Enabled,
    Disabled,
}

#[derive(Debug)]
pub struct Mmu {
    boot_rom: Vec<u8>,            // 開機 ROM (0x0000-0x00FF 覆蓋層)
    boot_state: EnableState,      // 寫入 0xFF50 後永久關閉
    rom: Vec<u8>,                 // 卡帶 ROM (唯讀)
    wram: [u8; WRAM_SIZE],        // WRAM - 8KB 內部工作 RAM
    hram: [u8; HRAM_SIZE],        // HRAM - 127 位元組高位 RAM
    pub ie: u8,                   // 中斷啟用寄存器 (0xFFFF)
    pub if_reg: u8,               // 中斷標誌寄存器 (0xFF0F)
    pub serial_data: u8,          // SB (0xFF01)
    pub serial_control: u8,       // SC (0xFF02)
    serial_output: String,        // 串口輸出緩衝區 (用於測試 ROM)
    pub ppu: Ppu,
    pub apu: Apu,
}

impl Mmu {
    /// Builds the bus around a cartridge image. The boot overlay is only
    /// mapped when a boot ROM is supplied.
    pub fn new(rom: Vec<u8>, boot_rom: Option<Vec<u8>>) -> Self {
        let boot_state = if boot_rom.is_some() {
            EnableState::Enabled
        } else {
            EnableState::Disabled
        };

        Mmu {
            boot_rom: boot_rom.unwrap_or_default(),
            boot_state,
            rom,
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            ie: 0,
            if_reg: 0,
            serial_data: 0,
            serial_control: 0,
            serial_output: String::new(),
            ppu: Ppu::new(),
            apu: Apu::new(),
        }
    }

    pub fn boot_state(&self) -> EnableState {
        self.boot_state
    }

    pub fn interrupts(&self) -> InterruptSnapshot {
        InterruptSnapshot::new(self.ie, self.if_reg)
    }

    pub fn serial_output(&self) -> &str {
        &self.serial_output
    }

    pub fn take_serial_output(&mut self) -> String {
        std::mem::take(&mut self.serial_output)
    }

    // 超出卡帶長度的讀取回傳 0xFF (open bus)
    fn read_rom(&self, address: u16) -> u8 {
        self.rom.get(address as usize).copied().unwrap_or(0xFF)
    }

    fn unmapped(address: u16, access: Access) -> Error {
        log::error!("unmapped {} at 0x{:04X}", access, address);
        Error::UnmappedAddress {
            addr: address,
            access,
        }
    }

    fn write_serial_control(&mut self, value: u8) {
        self.serial_control = value;
        // 如果啟動了傳輸 (Bit 7 為 1)
        if value & 0x80 != 0 {
            let byte = self.serial_data;
            if (0x20..0x7F).contains(&byte) {
                self.serial_output.push(byte as char);
            } else if byte == 0x0A {
                self.serial_output.push('\n');
            }
            // 沒有連接設備：傳輸立即完成，清除 Bit 7 並觸發 Serial 中斷 (Bit 3)
            self.serial_control &= 0x7F;
            self.if_reg |= InterruptFlags::SERIAL.bits();
        }
    }
}

impl Memory for Mmu {
    fn read_byte(&self, address: u16) -> Result<u8> {
        let value = match address {
            0x0000..=0x00FF if self.boot_state == EnableState::Enabled => self
                .boot_rom
                .get(address as usize)
                .copied()
                .unwrap_or(0xFF),
            0x0000..=0x7FFF => self.read_rom(address),
            0x8000..=0x9FFF => self.ppu.read_byte(address), // VRAM
            0xC000..=0xDFFF => self.wram[(address - 0xC000) as usize], // WRAM
            0xE000..=0xFDFF => self.wram[(address - 0xE000) as usize], // Echo RAM
            0xFF01 => self.serial_data,
            0xFF02 => self.serial_control | 0x7E,
            0xFF0F => self.if_reg | 0xE0, // 高 3 位始終為 1
            0xFF10..=0xFF3F => self.apu.read_byte(address),
            0xFF40..=0xFF4B => self.ppu.read_byte(address),
            0xFF50 => 0xFF,
            0xFF80..=0xFFFE => self.hram[(address - 0xFF80) as usize], // HRAM
            0xFFFF => self.ie,
            _ => return Err(Self::unmapped(address, Access::Read)),
        };
        Ok(value)
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<()> {
        match address {
            0x0000..=0x7FFF => {
                log::warn!(
                    "dropped write of 0x{:02X} to read-only ROM at 0x{:04X}",
                    value,
                    address
                );
            }
            0x8000..=0x9FFF => self.ppu.write_byte(address, value),
            0xC000..=0xDFFF => self.wram[(address - 0xC000) as usize] = value,
            0xE000..=0xFDFF => self.wram[(address - 0xE000) as usize] = value,
            0xFF01 => self.serial_data = value,
            0xFF02 => self.write_serial_control(value),
            0xFF0F => self.if_reg = value & 0x1F,
            0xFF10..=0xFF3F => self.apu.write_byte(address, value),
            0xFF40..=0xFF4B => self.ppu.write_byte(address, value),
            0xFF50 => {
                if value != 0 && self.boot_state == EnableState::Enabled {
                    log::info!("boot ROM overlay disabled");
                    self.boot_state = EnableState::Disabled;
                }
            }
            0xFF80..=0xFFFE => self.hram[(address - 0xFF80) as usize] = value,
            0xFFFF => self.ie = value,
            _ => return Err(Self::unmapped(address, Access::Write)),
        }
        Ok(())
    }
}

/// 64 KiB of plain RAM with no routing. Lets the CPU run programs that
/// write anywhere, including the cartridge window.
#[derive(Debug, Clone)]
pub struct FlatMemory {
    bytes: Vec<u8>,
}

impl Default for FlatMemory {
    fn default() -> Self {
        FlatMemory::new()
    }
}

impl FlatMemory {
    pub fn new() -> Self {
        FlatMemory {
            bytes: vec![0; 0x10000],
        }
    }

    /// Copies `program` in starting at `origin`, wrapping at the top of the
    /// address space.
    pub fn with_program(origin: u16, program: &[u8]) -> Self {
        let mut memory = FlatMemory::new();
        memory.load(origin, program);
        memory
    }

    pub fn load(&mut self, origin: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            let address = origin.wrapping_add(offset as u16);
            self.bytes[address as usize] = byte;
        }
    }

    pub fn peek(&self, address: u16) -> u8 {
        self.bytes[address as usize]
    }
}

impl Memory for FlatMemory {
    fn read_byte(&self, address: u16) -> Result<u8> {
        Ok(self.bytes[address as usize])
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<()> {
        self.bytes[address as usize] = value;
        Ok(())
    }
}
