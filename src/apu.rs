// APU (Audio Processing Unit) - Game Boy 音訊處理器
// 只保存寄存器內容，不產生音訊樣本

pub const APU_START: u16 = 0xFF10;
pub const APU_END: u16 = 0xFF3F;
const APU_SIZE: usize = (APU_END - APU_START + 1) as usize;

/// 頻率掃描方向 (NR10 bit 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    Increase,
    Decrease,
}

/// 音量包絡方向 (NR12 bit 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeDirection {
    Attenuate,
    Amplify,
}

// 每個寄存器可寫入的位元；None 表示該位址不存在
const fn write_mask(addr: u16) -> Option<u8> {
    match addr {
        0xFF10 => Some(0x7F), // NR10 位 7 不存在
        0xFF11..=0xFF14 => Some(0xFF),
        0xFF15 => None, // NR20 不存在
        0xFF16..=0xFF1E => Some(0xFF),
        0xFF1F => None, // NR40 不存在
        0xFF20..=0xFF25 => Some(0xFF),
        0xFF26 => Some(0x8F), // NR52 位 4-6 不存在
        0xFF27..=0xFF2F => None,
        0xFF30..=0xFF3F => Some(0xFF), // Wave RAM
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Apu {
    registers: [u8; APU_SIZE],
}

impl Default for Apu {
    fn default() -> Self {
        Apu::new()
    }
}

impl Apu {
    pub fn new() -> Self {
        Apu {
            registers: [0; APU_SIZE],
        }
    }

    // 讀取 APU 寄存器
    pub fn read_byte(&self, addr: u16) -> u8 {
        match write_mask(addr) {
            Some(_) => self.registers[(addr - APU_START) as usize],
            None => 0xFF,
        }
    }

    // 寫入 APU 寄存器
    pub fn write_byte(&mut self, addr: u16, value: u8) {
        match write_mask(addr) {
            Some(mask) => self.registers[(addr - APU_START) as usize] = value & mask,
            None => log::trace!("ignored APU write 0x{:02X} to hole 0x{:04X}", value, addr),
        }
    }

    fn nr10(&self) -> u8 {
        self.read_byte(0xFF10)
    }

    fn nr12(&self) -> u8 {
        self.read_byte(0xFF12)
    }

    /// Sweep period in 1/128 s steps; 0 disables the sweep.
    pub fn sweep_time(&self) -> u8 {
        self.nr10() >> 4
    }

    pub fn sweep_direction(&self) -> SweepDirection {
        if self.nr10() & 0x08 != 0 {
            SweepDirection::Decrease
        } else {
            SweepDirection::Increase
        }
    }

    pub fn sweep_shift(&self) -> u8 {
        self.nr10() & 0x07
    }

    pub fn envelope_initial_volume(&self) -> u8 {
        self.nr12() >> 4
    }

    pub fn envelope_direction(&self) -> EnvelopeDirection {
        if self.nr12() & 0x08 != 0 {
            EnvelopeDirection::Amplify
        } else {
            EnvelopeDirection::Attenuate
        }
    }

    pub fn envelope_period(&self) -> u8 {
        self.nr12() & 0x07
    }

    // NR52 位 7：總開關
    pub fn is_enabled(&self) -> bool {
        self.read_byte(0xFF26) & 0x80 != 0
    }
}
