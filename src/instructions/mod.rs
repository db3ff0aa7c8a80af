//! 指令處理模組
//!
//! 兩張在編譯期建立的 256 格指令表 (主表與 0xCB 擴充表)，
//! 以及把解碼後的指令分派到各類處理器的直譯步驟。

pub mod arithmetic;
pub mod control;
pub mod inc_dec;
pub mod jump;
pub mod ld;
pub mod misc;
pub mod rotate;
pub mod stack;

use crate::cpu::Cpu;
use crate::error::{Error, Result};
use crate::mmu::Memory;
use crate::registers::{R8, R16, R16Stack};
use std::fmt;

pub const PREFIX_CB: u8 = 0xCB;

/// 條件碼 (bits 4-3: NZ, Z, NC, C)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    NZ,
    Z,
    NC,
    C,
}

impl Cond {
    pub const fn from_bits(bits: u8) -> Cond {
        match bits & 0x03 {
            0 => Cond::NZ,
            1 => Cond::Z,
            2 => Cond::NC,
            _ => Cond::C,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    pub const fn from_bits(bits: u8) -> AluOp {
        match bits & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl ShiftOp {
    pub const fn from_bits(bits: u8) -> ShiftOp {
        match bits & 0x07 {
            0 => ShiftOp::Rlc,
            1 => ShiftOp::Rrc,
            2 => ShiftOp::Rl,
            3 => ShiftOp::Rr,
            4 => ShiftOp::Sla,
            5 => ShiftOp::Sra,
            6 => ShiftOp::Swap,
            _ => ShiftOp::Srl,
        }
    }
}

/// A 的間接載入位址來源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indirect {
    BC,
    DE,
    HLInc,
    HLDec,
}

impl Indirect {
    pub const fn from_bits(bits: u8) -> Indirect {
        match bits & 0x03 {
            0 => Indirect::BC,
            1 => Indirect::DE,
            2 => Indirect::HLInc,
            _ => Indirect::HLDec,
        }
    }
}

/// 指令的操作與其運算元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Unimplemented,
    Prefix,
    Nop,

    // 載入
    LdR8R8(R8, R8),
    LdR8Imm(R8),
    LdR16Imm(R16),
    LdIndA(Indirect),
    LdAInd(Indirect),
    LdA16A,
    LdAA16,
    LdhA8A,
    LdhAA8,
    LdhCA,
    LdhAC,
    LdA16Sp,
    LdSpHl,
    LdHlSpE8,

    // 堆疊
    Push(R16Stack),
    Pop(R16Stack),

    // 算術/邏輯
    AluR8(AluOp, R8),
    AluImm(AluOp),
    AddHl(R16),
    AddSpE8,

    // 增減
    IncR8(R8),
    DecR8(R8),
    IncR16(R16),
    DecR16(R16),

    // A 旋轉與旗標操作
    RotateA(ShiftOp),
    Daa,
    Cpl,
    Scf,
    Ccf,

    // 跳轉
    Jp(Option<Cond>),
    JpHl,
    Jr(Option<Cond>),
    Call(Option<Cond>),
    Ret(Option<Cond>),
    Reti,
    Rst(u8),

    // 中斷控制
    Di,
    Ei,

    // CB 擴充指令
    Shift(ShiftOp, R8),
    Bit(u8, R8),
    Res(u8, R8),
    Set(u8, R8),
}

/// 運算元讀取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    None,
    D8,
    D16,
}

/// 指令表中的一格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,
    pub op: Operation,
    pub fetch: Fetch,
    /// Internal M-cycles on top of bus accesses. Branch-taken penalties are
    /// added by the jump handlers.
    pub delay: u8,
    /// Documented T-states (taken path for conditional branches).
    pub cycles: u8,
}

impl Instruction {
    const fn new(opcode: u8, op: Operation, fetch: Fetch, delay: u8, cycles: u8) -> Self {
        Instruction {
            opcode,
            op,
            fetch,
            delay,
            cycles,
        }
    }

    const fn unimplemented(opcode: u8) -> Self {
        Instruction::new(opcode, Operation::Unimplemented, Fetch::None, 0, 0)
    }

    pub fn is_implemented(&self) -> bool {
        self.op != Operation::Unimplemented
    }
}

/// 立即數
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    None,
    U8(u8),
    U16(u16),
}

impl Immediate {
    pub fn byte(self) -> u8 {
        match self {
            Immediate::U8(v) => v,
            Immediate::U16(v) => v as u8,
            Immediate::None => 0,
        }
    }

    pub fn word(self) -> u16 {
        match self {
            Immediate::U16(v) => v,
            Immediate::U8(v) => v as u16,
            Immediate::None => 0,
        }
    }
}

/// An instruction together with the operand bytes already read from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub pc: u16,
    pub prefixed: bool,
    pub instruction: &'static Instruction,
    pub immediate: Immediate,
}

const fn decode_primary(opcode: u8) -> Instruction {
    use Operation::*;
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = y >> 1;
    let hl = y == 6 || z == 6;

    match opcode {
        0x00 => Instruction::new(opcode, Nop, Fetch::None, 0, 4),
        0x08 => Instruction::new(opcode, LdA16Sp, Fetch::D16, 0, 20),
        0x10 => Instruction::unimplemented(opcode), // STOP
        0x18 => Instruction::new(opcode, Jr(None), Fetch::D8, 0, 12),
        0x20 | 0x28 | 0x30 | 0x38 => {
            Instruction::new(opcode, Jr(Some(Cond::from_bits(y))), Fetch::D8, 0, 12)
        }
        0x07 => Instruction::new(opcode, RotateA(ShiftOp::Rlc), Fetch::None, 0, 4),
        0x0F => Instruction::new(opcode, RotateA(ShiftOp::Rrc), Fetch::None, 0, 4),
        0x17 => Instruction::new(opcode, RotateA(ShiftOp::Rl), Fetch::None, 0, 4),
        0x1F => Instruction::new(opcode, RotateA(ShiftOp::Rr), Fetch::None, 0, 4),
        0x27 => Instruction::new(opcode, Daa, Fetch::None, 0, 4),
        0x2F => Instruction::new(opcode, Cpl, Fetch::None, 0, 4),
        0x37 => Instruction::new(opcode, Scf, Fetch::None, 0, 4),
        0x3F => Instruction::new(opcode, Ccf, Fetch::None, 0, 4),
        0x76 => Instruction::unimplemented(opcode), // HALT
        0xC3 => Instruction::new(opcode, Jp(None), Fetch::D16, 0, 16),
        0xC9 => Instruction::new(opcode, Ret(None), Fetch::None, 0, 16),
        0xCB => Instruction::new(opcode, Prefix, Fetch::None, 0, 4),
        0xCD => Instruction::new(opcode, Call(None), Fetch::D16, 0, 24),
        0xD9 => Instruction::new(opcode, Reti, Fetch::None, 0, 16),
        0xE0 => Instruction::new(opcode, LdhA8A, Fetch::D8, 0, 12),
        0xE2 => Instruction::new(opcode, LdhCA, Fetch::None, 0, 8),
        0xE8 => Instruction::new(opcode, AddSpE8, Fetch::D8, 2, 16),
        0xE9 => Instruction::new(opcode, JpHl, Fetch::None, 0, 4),
        0xEA => Instruction::new(opcode, LdA16A, Fetch::D16, 0, 16),
        0xF0 => Instruction::new(opcode, LdhAA8, Fetch::D8, 0, 12),
        0xF2 => Instruction::new(opcode, LdhAC, Fetch::None, 0, 8),
        0xF3 => Instruction::new(opcode, Di, Fetch::None, 0, 4),
        0xF8 => Instruction::new(opcode, LdHlSpE8, Fetch::D8, 1, 12),
        0xF9 => Instruction::new(opcode, LdSpHl, Fetch::None, 1, 8),
        0xFA => Instruction::new(opcode, LdAA16, Fetch::D16, 0, 16),
        0xFB => Instruction::new(opcode, Ei, Fetch::None, 0, 4),

        // x = 0 區塊
        _ if x == 0 && z == 1 && y & 1 == 0 => {
            Instruction::new(opcode, LdR16Imm(R16::from_bits(p)), Fetch::D16, 0, 12)
        }
        _ if x == 0 && z == 1 => Instruction::new(opcode, AddHl(R16::from_bits(p)), Fetch::None, 1, 8),
        _ if x == 0 && z == 2 && y & 1 == 0 => {
            Instruction::new(opcode, LdIndA(Indirect::from_bits(p)), Fetch::None, 0, 8)
        }
        _ if x == 0 && z == 2 => {
            Instruction::new(opcode, LdAInd(Indirect::from_bits(p)), Fetch::None, 0, 8)
        }
        _ if x == 0 && z == 3 && y & 1 == 0 => {
            Instruction::new(opcode, IncR16(R16::from_bits(p)), Fetch::None, 1, 8)
        }
        _ if x == 0 && z == 3 => Instruction::new(opcode, DecR16(R16::from_bits(p)), Fetch::None, 1, 8),
        _ if x == 0 && z == 4 => {
            Instruction::new(opcode, IncR8(R8::from_bits(y)), Fetch::None, 0, if y == 6 { 12 } else { 4 })
        }
        _ if x == 0 && z == 5 => {
            Instruction::new(opcode, DecR8(R8::from_bits(y)), Fetch::None, 0, if y == 6 { 12 } else { 4 })
        }
        _ if x == 0 && z == 6 => {
            Instruction::new(opcode, LdR8Imm(R8::from_bits(y)), Fetch::D8, 0, if y == 6 { 12 } else { 8 })
        }

        // x = 1: LD r, r'
        _ if x == 1 => Instruction::new(
            opcode,
            LdR8R8(R8::from_bits(y), R8::from_bits(z)),
            Fetch::None,
            0,
            if hl { 8 } else { 4 },
        ),

        // x = 2: ALU A, r
        _ if x == 2 => Instruction::new(
            opcode,
            AluR8(AluOp::from_bits(y), R8::from_bits(z)),
            Fetch::None,
            0,
            if z == 6 { 8 } else { 4 },
        ),

        // x = 3 區塊
        _ if x == 3 && z == 0 && y < 4 => {
            Instruction::new(opcode, Ret(Some(Cond::from_bits(y))), Fetch::None, 1, 20)
        }
        _ if x == 3 && z == 1 && y & 1 == 0 => {
            Instruction::new(opcode, Pop(R16Stack::from_bits(p)), Fetch::None, 0, 12)
        }
        _ if x == 3 && z == 2 && y < 4 => {
            Instruction::new(opcode, Jp(Some(Cond::from_bits(y))), Fetch::D16, 0, 16)
        }
        _ if x == 3 && z == 4 && y < 4 => {
            Instruction::new(opcode, Call(Some(Cond::from_bits(y))), Fetch::D16, 0, 24)
        }
        _ if x == 3 && z == 5 && y & 1 == 0 => {
            Instruction::new(opcode, Push(R16Stack::from_bits(p)), Fetch::None, 1, 16)
        }
        _ if x == 3 && z == 6 => Instruction::new(opcode, AluImm(AluOp::from_bits(y)), Fetch::D8, 0, 8),
        _ if x == 3 && z == 7 => Instruction::new(opcode, Rst(y * 8), Fetch::None, 1, 16),

        // 0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD
        _ => Instruction::unimplemented(opcode),
    }
}

const fn decode_extended(opcode: u8) -> Instruction {
    use Operation::*;
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let r = R8::from_bits(opcode);
    let hl = opcode & 0x07 == 6;

    match x {
        0 => Instruction::new(opcode, Shift(ShiftOp::from_bits(y), r), Fetch::None, 0, if hl { 16 } else { 8 }),
        1 => Instruction::new(opcode, Bit(y, r), Fetch::None, 0, if hl { 12 } else { 8 }),
        2 => Instruction::new(opcode, Res(y, r), Fetch::None, 0, if hl { 16 } else { 8 }),
        _ => Instruction::new(opcode, Set(y, r), Fetch::None, 0, if hl { 16 } else { 8 }),
    }
}

const fn build_primary() -> [Instruction; 256] {
    let mut table = [Instruction::unimplemented(0); 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode_primary(i as u8);
        i += 1;
    }
    table
}

const fn build_extended() -> [Instruction; 256] {
    let mut table = [Instruction::unimplemented(0); 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode_extended(i as u8);
        i += 1;
    }
    table
}

// 指令表常數
pub static PRIMARY: [Instruction; 256] = build_primary();
pub static EXTENDED: [Instruction; 256] = build_extended();

/// 主要的指令處理器
pub fn execute<M: Memory>(cpu: &mut Cpu<M>, decoded: &Decoded) -> Result<()> {
    use Operation::*;
    let imm = decoded.immediate;

    match decoded.instruction.op {
        Nop => {}
        // cpu::step 在解碼時就會擋下，這裡只防直接呼叫
        Unimplemented | Prefix => {
            let opcode = decoded.instruction.opcode;
            return Err(if decoded.prefixed {
                Error::UnimplementedExtendedOpcode {
                    prefix: PREFIX_CB,
                    opcode,
                    pc: decoded.pc,
                }
            } else {
                Error::UnimplementedOpcode {
                    opcode,
                    pc: decoded.pc,
                }
            });
        }

        // 載入指令
        LdR8R8(dst, src) => ld::load_r8(cpu, dst, src)?,
        LdR8Imm(dst) => ld::load_r8_imm(cpu, dst, imm.byte())?,
        LdR16Imm(dst) => ld::load_r16_imm(cpu, dst, imm.word()),
        LdIndA(ind) => ld::store_a_indirect(cpu, ind)?,
        LdAInd(ind) => ld::load_a_indirect(cpu, ind)?,
        LdA16A => ld::store_a_absolute(cpu, imm.word())?,
        LdAA16 => ld::load_a_absolute(cpu, imm.word())?,
        LdhA8A => ld::store_a_absolute(cpu, 0xFF00 | imm.byte() as u16)?,
        LdhAA8 => ld::load_a_absolute(cpu, 0xFF00 | imm.byte() as u16)?,
        LdhCA => {
            let addr = 0xFF00 | cpu.registers.get_c() as u16;
            ld::store_a_absolute(cpu, addr)?
        }
        LdhAC => {
            let addr = 0xFF00 | cpu.registers.get_c() as u16;
            ld::load_a_absolute(cpu, addr)?
        }
        LdA16Sp => ld::store_sp_absolute(cpu, imm.word())?,
        LdSpHl => ld::load_sp_hl(cpu),
        LdHlSpE8 => ld::load_hl_sp_offset(cpu, imm.byte()),

        // 堆疊指令
        Push(pair) => stack::push(cpu, pair)?,
        Pop(pair) => stack::pop(cpu, pair)?,

        // 算術指令
        AluR8(op, src) => {
            let value = cpu.read_r8(src)?;
            arithmetic::alu(cpu, op, value);
        }
        AluImm(op) => arithmetic::alu(cpu, op, imm.byte()),
        AddHl(src) => arithmetic::add_hl(cpu, src),
        AddSpE8 => arithmetic::add_sp_offset(cpu, imm.byte()),

        // 增減指令
        IncR8(r) => inc_dec::inc_r8(cpu, r)?,
        DecR8(r) => inc_dec::dec_r8(cpu, r)?,
        IncR16(r) => inc_dec::inc_r16(cpu, r),
        DecR16(r) => inc_dec::dec_r16(cpu, r),

        // 旋轉與雜項指令
        RotateA(op) => rotate::rotate_a(cpu, op),
        Daa => misc::daa(cpu),
        Cpl => misc::cpl(cpu),
        Scf => misc::scf(cpu),
        Ccf => misc::ccf(cpu),

        // 跳轉指令
        Jp(cond) => jump::jp(cpu, cond, imm.word()),
        JpHl => jump::jp_hl(cpu),
        Jr(cond) => jump::jr(cpu, cond, imm.byte()),
        Call(cond) => jump::call(cpu, cond, imm.word())?,
        Ret(cond) => jump::ret(cpu, cond)?,
        Reti => jump::reti(cpu)?,
        Rst(vector) => jump::rst(cpu, vector)?,

        // 控制指令
        Di => control::di(cpu),
        Ei => control::ei(cpu),

        // CB 擴充指令
        Shift(op, r) => rotate::shift_r8(cpu, op, r)?,
        Bit(bit, r) => rotate::bit(cpu, bit, r)?,
        Res(bit, r) => rotate::res(cpu, bit, r)?,
        Set(bit, r) => rotate::set(cpu, bit, r)?,
    }
    Ok(())
}

// -------- 反組譯 --------

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cond::NZ => "NZ",
            Cond::Z => "Z",
            Cond::NC => "NC",
            Cond::C => "C",
        };
        f.write_str(name)
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AluOp::Add => "ADD A,",
            AluOp::Adc => "ADC A,",
            AluOp::Sub => "SUB",
            AluOp::Sbc => "SBC A,",
            AluOp::And => "AND",
            AluOp::Xor => "XOR",
            AluOp::Or => "OR",
            AluOp::Cp => "CP",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ShiftOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShiftOp::Rlc => "RLC",
            ShiftOp::Rrc => "RRC",
            ShiftOp::Rl => "RL",
            ShiftOp::Rr => "RR",
            ShiftOp::Sla => "SLA",
            ShiftOp::Sra => "SRA",
            ShiftOp::Swap => "SWAP",
            ShiftOp::Srl => "SRL",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Indirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Indirect::BC => "(BC)",
            Indirect::DE => "(DE)",
            Indirect::HLInc => "(HL+)",
            Indirect::HLDec => "(HL-)",
        };
        f.write_str(name)
    }
}

fn cond_prefix(cond: Option<Cond>) -> String {
    match cond {
        Some(c) => format!("{c}, "),
        None => String::new(),
    }
}

// 有立即數時印出數值，否則印出 d8/d16/a16 等佔位符
fn disassemble(f: &mut fmt::Formatter<'_>, op: Operation, imm: Immediate) -> fmt::Result {
    use Operation::*;
    let known = imm != Immediate::None;
    let d8 = if known { format!("${:02X}", imm.byte()) } else { "d8".to_string() };
    let a8 = if known { format!("($FF{:02X})", imm.byte()) } else { "(a8)".to_string() };
    let d16 = if known { format!("${:04X}", imm.word()) } else { "d16".to_string() };
    let a16 = if known { format!("(${:04X})", imm.word()) } else { "(a16)".to_string() };
    let e8 = if known { format!("{:+}", imm.byte() as i8) } else { "e8".to_string() };

    match op {
        Unimplemented => write!(f, "???"),
        Prefix => write!(f, "PREFIX CB"),
        Nop => write!(f, "NOP"),
        LdR8R8(dst, src) => write!(f, "LD {dst}, {src}"),
        LdR8Imm(dst) => write!(f, "LD {dst}, {d8}"),
        LdR16Imm(dst) => write!(f, "LD {dst}, {d16}"),
        LdIndA(ind) => write!(f, "LD {ind}, A"),
        LdAInd(ind) => write!(f, "LD A, {ind}"),
        LdA16A => write!(f, "LD {a16}, A"),
        LdAA16 => write!(f, "LD A, {a16}"),
        LdhA8A => write!(f, "LDH {a8}, A"),
        LdhAA8 => write!(f, "LDH A, {a8}"),
        LdhCA => write!(f, "LD (C), A"),
        LdhAC => write!(f, "LD A, (C)"),
        LdA16Sp => write!(f, "LD {a16}, SP"),
        LdSpHl => write!(f, "LD SP, HL"),
        LdHlSpE8 => write!(f, "LD HL, SP{}", if known { e8 } else { "+e8".to_string() }),
        Push(pair) => write!(f, "PUSH {pair}"),
        Pop(pair) => write!(f, "POP {pair}"),
        AluR8(alu, src) => write!(f, "{alu} {src}"),
        AluImm(alu) => write!(f, "{alu} {d8}"),
        AddHl(src) => write!(f, "ADD HL, {src}"),
        AddSpE8 => write!(f, "ADD SP, {e8}"),
        IncR8(r) => write!(f, "INC {r}"),
        DecR8(r) => write!(f, "DEC {r}"),
        IncR16(r) => write!(f, "INC {r}"),
        DecR16(r) => write!(f, "DEC {r}"),
        RotateA(shift) => write!(f, "{shift}A"),
        Daa => write!(f, "DAA"),
        Cpl => write!(f, "CPL"),
        Scf => write!(f, "SCF"),
        Ccf => write!(f, "CCF"),
        Jp(cond) => write!(f, "JP {}{}", cond_prefix(cond), d16.replace("d16", "a16")),
        JpHl => write!(f, "JP HL"),
        Jr(cond) => write!(f, "JR {}{e8}", cond_prefix(cond)),
        Call(cond) => write!(f, "CALL {}{}", cond_prefix(cond), d16.replace("d16", "a16")),
        Ret(Some(cond)) => write!(f, "RET {cond}"),
        Ret(None) => write!(f, "RET"),
        Reti => write!(f, "RETI"),
        Rst(vector) => write!(f, "RST ${vector:02X}"),
        Di => write!(f, "DI"),
        Ei => write!(f, "EI"),
        Shift(shift, r) => write!(f, "{shift} {r}"),
        Bit(bit, r) => write!(f, "BIT {bit}, {r}"),
        Res(bit, r) => write!(f, "RES {bit}, {r}"),
        Set(bit, r) => write!(f, "SET {bit}, {r}"),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        disassemble(f, self.op, Immediate::None)
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        disassemble(f, self.instruction.op, self.immediate)
    }
}
