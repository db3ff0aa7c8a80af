use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Upper nibble of F. The lower nibble does not exist on hardware and
    /// always reads back as zero.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
    pub struct Flags: u8 {
        const Z = 0x80; // Zero
        const N = 0x40; // Subtract
        const H = 0x20; // Half-carry
        const C = 0x10; // Carry
    }
}

macro_rules! get_set {
    ($reg:ident, $get_name:ident, $set_name:ident, $size:ty) => {
        pub fn $get_name(&self) -> $size {
            self.$reg
        }

        pub fn $set_name(&mut self, val: $size) {
            self.$reg = val;
        }
    };
}

macro_rules! get_set_dual {
    ($reg1:ident, $reg2:ident, $get_name:ident, $set_name:ident) => {
        pub fn $get_name(&self) -> u16 {
            (self.$reg1 as u16) << 8 | self.$reg2 as u16
        }

        pub fn $set_name(&mut self, val: u16) {
            self.$reg1 = (val >> 8) as u8;
            self.$reg2 = val as u8;
        }
    };
}

/// 8-bit register operand as encoded in opcode bit fields
/// (000=B, 001=C, 010=D, 011=E, 100=H, 101=L, 110=(HL), 111=A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R8 {
    B,
    C,
    D,
    E,
    H,
    L,
    HlMem,
    A,
}

impl R8 {
    pub const fn from_bits(bits: u8) -> R8 {
        match bits & 0x07 {
            0 => R8::B,
            1 => R8::C,
            2 => R8::D,
            3 => R8::E,
            4 => R8::H,
            5 => R8::L,
            6 => R8::HlMem,
            _ => R8::A,
        }
    }
}

impl fmt::Display for R8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            R8::B => "B",
            R8::C => "C",
            R8::D => "D",
            R8::E => "E",
            R8::H => "H",
            R8::L => "L",
            R8::HlMem => "(HL)",
            R8::A => "A",
        };
        f.write_str(name)
    }
}

/// 16-bit pair operand for loads and arithmetic (bits 5-4: BC, DE, HL, SP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R16 {
    BC,
    DE,
    HL,
    SP,
}

impl R16 {
    pub const fn from_bits(bits: u8) -> R16 {
        match bits & 0x03 {
            0 => R16::BC,
            1 => R16::DE,
            2 => R16::HL,
            _ => R16::SP,
        }
    }
}

/// 16-bit pair operand for PUSH/POP (bits 5-4: BC, DE, HL, AF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R16Stack {
    BC,
    DE,
    HL,
    AF,
}

impl R16Stack {
    pub const fn from_bits(bits: u8) -> R16Stack {
        match bits & 0x03 {
            0 => R16Stack::BC,
            1 => R16Stack::DE,
            2 => R16Stack::HL,
            _ => R16Stack::AF,
        }
    }
}

impl fmt::Display for R16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            R16::BC => "BC",
            R16::DE => "DE",
            R16::HL => "HL",
            R16::SP => "SP",
        };
        f.write_str(name)
    }
}

impl fmt::Display for R16Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            R16Stack::BC => "BC",
            R16Stack::DE => "DE",
            R16Stack::HL => "HL",
            R16Stack::AF => "AF",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    f: Flags,
    h: u8,
    l: u8,
    sp: u16,
    pc: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Registers::new()
    }
}

impl Registers {
    /// Power-on state: everything zero, execution starts at 0x0000 where the
    /// boot ROM (or the cartridge, when no boot ROM is mapped) lives.
    pub fn new() -> Registers {
        Registers {
            a: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            f: Flags::empty(),
            h: 0,
            l: 0,
            sp: 0,
            pc: 0,
        }
    }

    get_set!(a, get_a, set_a, u8);
    get_set!(b, get_b, set_b, u8);
    get_set!(c, get_c, set_c, u8);
    get_set!(d, get_d, set_d, u8);
    get_set!(e, get_e, set_e, u8);
    get_set!(h, get_h, set_h, u8);
    get_set!(l, get_l, set_l, u8);
    get_set!(sp, get_sp, set_sp, u16);
    get_set!(pc, get_pc, set_pc, u16);
    get_set_dual!(b, c, get_bc, set_bc);
    get_set_dual!(d, e, get_de, set_de);
    get_set_dual!(h, l, get_hl, set_hl);

    pub fn get_f(&self) -> u8 {
        self.f.bits()
    }

    pub fn set_f(&mut self, val: u8) {
        self.f = Flags::from_bits_truncate(val & 0xF0);
    }

    pub fn flags(&self) -> Flags {
        self.f
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.f = flags;
    }

    pub fn flag(&self, flag: Flags) -> bool {
        self.f.contains(flag)
    }

    pub fn set_flag(&mut self, flag: Flags, on: bool) {
        self.f.set(flag, on);
    }

    pub fn get_af(&self) -> u16 {
        (self.a as u16) << 8 | self.f.bits() as u16
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = Flags::from_bits_truncate((val & 0x00F0) as u8);
    }

    /// Register half of an [`R8`]. `(HL)` is a memory operand and has to go
    /// through the CPU, so it yields `None` here.
    pub fn get_r8(&self, r: R8) -> Option<u8> {
        match r {
            R8::B => Some(self.b),
            R8::C => Some(self.c),
            R8::D => Some(self.d),
            R8::E => Some(self.e),
            R8::H => Some(self.h),
            R8::L => Some(self.l),
            R8::A => Some(self.a),
            R8::HlMem => None,
        }
    }

    /// Returns `false` for `(HL)`, which is not a register.
    pub fn set_r8(&mut self, r: R8, val: u8) -> bool {
        match r {
            R8::B => self.b = val,
            R8::C => self.c = val,
            R8::D => self.d = val,
            R8::E => self.e = val,
            R8::H => self.h = val,
            R8::L => self.l = val,
            R8::A => self.a = val,
            R8::HlMem => return false,
        }
        true
    }

    pub fn get_r16(&self, r: R16) -> u16 {
        match r {
            R16::BC => self.get_bc(),
            R16::DE => self.get_de(),
            R16::HL => self.get_hl(),
            R16::SP => self.sp,
        }
    }

    pub fn set_r16(&mut self, r: R16, val: u16) {
        match r {
            R16::BC => self.set_bc(val),
            R16::DE => self.set_de(val),
            R16::HL => self.set_hl(val),
            R16::SP => self.sp = val,
        }
    }

    pub fn get_r16_stack(&self, r: R16Stack) -> u16 {
        match r {
            R16Stack::BC => self.get_bc(),
            R16Stack::DE => self.get_de(),
            R16Stack::HL => self.get_hl(),
            R16Stack::AF => self.get_af(),
        }
    }

    pub fn set_r16_stack(&mut self, r: R16Stack, val: u16) {
        match r {
            R16Stack::BC => self.set_bc(val),
            R16Stack::DE => self.set_de(val),
            R16Stack::HL => self.set_hl(val),
            R16Stack::AF => self.set_af(val),
        }
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A={:02X} F={:02X} (ZNHC={:04b}) B={:02X} C={:02X} D={:02X} E={:02X} H={:02X} L={:02X} SP={:04X} PC={:04X}",
            self.a,
            self.f.bits(),
            self.f.bits() >> 4,
            self.b,
            self.c,
            self.d,
            self.e,
            self.h,
            self.l,
            self.sp,
            self.pc
        )
    }
}
