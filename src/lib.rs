//! Core of a DMG-class handheld emulator: SM83-style CPU interpreter, the
//! 64 KiB memory bus and background tile decoding.

pub mod apu;
pub mod config;
pub mod cpu;
pub mod error;
pub mod gameboy;
pub mod instructions;
pub mod logger;
pub mod mmu;
pub mod ppu;
pub mod registers;
pub mod rom;
pub mod runner;
#[cfg(feature = "display")]
pub mod sdl3;
pub mod trace;

pub use config::{Args, Config};
pub use cpu::{Cpu, StateReport};
pub use error::{Error, Result};
pub use gameboy::GameBoy;
pub use mmu::{FlatMemory, Memory, Mmu};
