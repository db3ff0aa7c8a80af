// PPU (Picture Processing Unit) - Game Boy 圖形處理器
// 只負責 VRAM/LCD 寄存器存取與背景圖塊解碼，不模擬模式狀態機

use crate::mmu::EnableState;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const VRAM_SIZE: usize = 0x2000;
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
pub const DOTS_PER_LINE: u32 = 456;
pub const LINES_PER_FRAME: u32 = 154;
pub const DOTS_PER_FRAME: u32 = DOTS_PER_LINE * LINES_PER_FRAME;

/// 四階灰度 (0 = 白, 3 = 黑)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Shade {
    #[default]
    White = 0,
    LightGray = 1,
    DarkGray = 2,
    Black = 3,
}

impl Shade {
    pub fn from_bits(bits: u8) -> Shade {
        match bits & 0x03 {
            0 => Shade::White,
            1 => Shade::LightGray,
            2 => Shade::DarkGray,
            _ => Shade::Black,
        }
    }

    /// Classic DMG grey levels.
    pub fn rgb(self) -> (u8, u8, u8) {
        let level = match self {
            Shade::White => 0xFF,
            Shade::LightGray => 0xAA,
            Shade::DarkGray => 0x55,
            Shade::Black => 0x00,
        };
        (level, level, level)
    }
}

/// Tile 數據定址模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileAddressingMode {
    /// 0x8000-0x8FFF，無符號索引 (0-255)
    Mode8000,
    /// 0x8800-0x97FF，帶符號索引 (-128 到 127)，基址 0x9000
    Mode8800,
}

/// 背景地圖地址
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMapAddress {
    /// 0x9800-0x9BFF
    Map9800,
    /// 0x9C00-0x9FFF
    Map9C00,
}

impl TileMapAddress {
    pub fn base(self) -> u16 {
        match self {
            TileMapAddress::Map9800 => 0x9800,
            TileMapAddress::Map9C00 => 0x9C00,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
}

/// 背景圖為 256×256，視窗每軸最多 256 像素
pub const MAX_VIEWPORT: usize = 256;

impl Viewport {
    pub fn is_valid(&self) -> bool {
        (1..=MAX_VIEWPORT).contains(&self.width) && (1..=MAX_VIEWPORT).contains(&self.height)
    }

    /// Forces both axes into `1..=MAX_VIEWPORT`.
    pub fn clamped(self) -> Viewport {
        Viewport {
            width: self.width.clamp(1, MAX_VIEWPORT),
            height: self.height.clamp(1, MAX_VIEWPORT),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
        }
    }
}

/// A rendered frame, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Shade>,
}

impl FrameBuffer {
    pub fn blank(viewport: Viewport) -> Self {
        let viewport = viewport.clamped();
        FrameBuffer {
            width: viewport.width,
            height: viewport.height,
            pixels: vec![Shade::White; viewport.width * viewport.height],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Shade> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    // 展開為 RGBA8888，供顯示前端上傳材質
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.pixels.len() * 4);
        for shade in &self.pixels {
            let (r, g, b) = shade.rgb();
            rgba.extend_from_slice(&[r, g, b, 0xFF]);
        }
        rgba
    }
}

/// Splits one tile row into eight 2-bit color indices, leftmost pixel
/// (bit 7) first.
pub fn decode_tile_row(low: u8, high: u8) -> [u8; 8] {
    let mut row = [0u8; 8];
    for (column, color) in row.iter_mut().enumerate() {
        let bit = 7 - column;
        let low_bit = (low >> bit) & 0x01;
        let high_bit = (high >> bit) & 0x01;
        *color = (high_bit << 1) | low_bit;
    }
    row
}

/// Start address of a tile's 16 bytes.
pub fn tile_data_address(index: u8, mode: TileAddressingMode) -> u16 {
    match mode {
        TileAddressingMode::Mode8000 => 0x8000 + (index as u16) * 16,
        TileAddressingMode::Mode8800 => (0x9000i32 + (index as i8 as i32) * 16) as u16,
    }
}

/// LCD register values captured for a state report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PpuSnapshot {
    pub lcdc: u8,
    pub stat: u8,
    pub scx: u8,
    pub scy: u8,
    pub ly: u8,
    pub lyc: u8,
    pub bgp: u8,
    pub dots: u32,
}

impl fmt::Display for PpuSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LCDC={:02X} STAT={:02X} SCX={:02X} SCY={:02X} LY={:02X} LYC={:02X} BGP={:02X} dots={}",
            self.lcdc, self.stat, self.scx, self.scy, self.ly, self.lyc, self.bgp, self.dots
        )
    }
}

#[derive(Debug, Clone)]
pub struct Ppu {
    vram: Vec<u8>, // VRAM - 8KB 視訊 RAM

    // LCD 控制寄存器
    pub lcdc: u8, // 0xFF40 - LCD 控制
    pub stat: u8, // 0xFF41 - LCD 狀態 (只保存可寫的位 3-6)
    pub scy: u8,  // 0xFF42 - 背景滾動 Y
    pub scx: u8,  // 0xFF43 - 背景滾動 X
    pub lyc: u8,  // 0xFF45 - LY 比較
    pub dma: u8,  // 0xFF46 - DMA 傳輸
    pub bgp: u8,  // 0xFF47 - 背景調色板
    pub obp0: u8, // 0xFF48 - 精靈調色板 0
    pub obp1: u8, // 0xFF49 - 精靈調色板 1
    pub wy: u8,   // 0xFF4A - 視窗 Y 位置
    pub wx: u8,   // 0xFF4B - 視窗 X 位置

    dots: u32, // 幀內點計數器，LY 由此推導
}

impl Default for Ppu {
    fn default() -> Self {
        Ppu::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Ppu {
            vram: vec![0; VRAM_SIZE],
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            lyc: 0,
            dma: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            dots: 0,
        }
    }

    // 讀取 VRAM 或 LCD 寄存器
    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize],
            0xFF40 => self.lcdc,
            0xFF41 => {
                // 位 7 始終為 1，位 2 為 LY==LYC，模式位讀為 0
                let coincidence = if self.ly() == self.lyc { 0x04 } else { 0 };
                0x80 | (self.stat & 0x78) | coincidence
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly(),
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    // 寫入 VRAM 或 LCD 寄存器
    pub fn write_byte(&mut self, addr: u16, value: u8) {
        match addr {
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize] = value,
            0xFF40 => self.lcdc = value,
            0xFF41 => self.stat = value & 0x78,
            0xFF42 => self.scy = value,
            0xFF43 => self.scx = value,
            0xFF44 => self.dots = 0, // 寫入 LY 會重置掃描線計數
            0xFF45 => self.lyc = value,
            0xFF46 => self.dma = value,
            0xFF47 => self.bgp = value,
            0xFF48 => self.obp0 = value,
            0xFF49 => self.obp1 = value,
            0xFF4A => self.wy = value,
            0xFF4B => self.wx = value,
            _ => {}
        }
    }

    /// Feeds elapsed T-states into the scanline counter.
    pub fn advance(&mut self, dots: u32) {
        self.dots = (self.dots + dots % DOTS_PER_FRAME) % DOTS_PER_FRAME;
    }

    pub fn dots(&self) -> u32 {
        self.dots
    }

    pub fn snapshot(&self) -> PpuSnapshot {
        PpuSnapshot {
            lcdc: self.lcdc,
            stat: self.read_byte(0xFF41),
            scx: self.scx,
            scy: self.scy,
            ly: self.ly(),
            lyc: self.lyc,
            bgp: self.bgp,
            dots: self.dots,
        }
    }

    pub fn ly(&self) -> u8 {
        (self.dots / DOTS_PER_LINE) as u8
    }

    // 檢查背景是否啟用
    pub fn bg_state(&self) -> EnableState {
        if (self.lcdc & 0x01) != 0 {
            EnableState::Enabled
        } else {
            EnableState::Disabled
        }
    }

    // 獲取背景圖塊定址模式
    pub fn get_tile_addressing_mode(&self) -> TileAddressingMode {
        match self.lcdc & 0x10 {
            0 => TileAddressingMode::Mode8800,
            _ => TileAddressingMode::Mode8000,
        }
    }

    // 獲取背景地圖地址
    pub fn get_bg_map_address(&self) -> TileMapAddress {
        match self.lcdc & 0x08 {
            0 => TileMapAddress::Map9800,
            _ => TileMapAddress::Map9C00,
        }
    }

    // 將調色板值轉換為顏色
    pub fn get_palette_color(palette: u8, color_index: u8) -> Shade {
        Shade::from_bits(palette >> ((color_index & 0x03) * 2))
    }

    fn vram_at(&self, addr: u16) -> u8 {
        self.vram[(addr as usize - 0x8000) % VRAM_SIZE]
    }

    /// Background color index (before the palette) at viewport (x, y).
    pub fn color_index(&self, x: usize, y: usize) -> u8 {
        let bg_x = (x + self.scx as usize) % 256;
        let bg_y = (y + self.scy as usize) % 256;

        let cell = (bg_y / 8) * 32 + (bg_x / 8);
        let tile_index = self.vram_at(self.get_bg_map_address().base() + cell as u16);

        let tile = tile_data_address(tile_index, self.get_tile_addressing_mode());
        let row_addr = tile + ((bg_y % 8) as u16) * 2;
        let low = self.vram_at(row_addr);
        let high = self.vram_at(row_addr + 1);

        decode_tile_row(low, high)[bg_x % 8]
    }

    /// Resolved background shade at viewport (x, y). Pure read.
    pub fn pixel(&self, x: usize, y: usize) -> Shade {
        if self.bg_state() == EnableState::Disabled {
            return Shade::White;
        }
        Self::get_palette_color(self.bgp, self.color_index(x, y))
    }

    pub fn render(&self, viewport: Viewport) -> FrameBuffer {
        let mut frame = FrameBuffer::blank(viewport);
        if self.bg_state() == EnableState::Disabled {
            return frame;
        }
        for y in 0..frame.height {
            for x in 0..frame.width {
                frame.pixels[y * frame.width + x] = self.pixel(x, y);
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn write_tile(ppu: &mut Ppu, base: u16, rows: &[(u8, u8)]) {
        for (row, &(low, high)) in rows.iter().enumerate() {
            ppu.write_byte(base + row as u16 * 2, low);
            ppu.write_byte(base + row as u16 * 2 + 1, high);
        }
    }

    #[test]
    fn test_decode_tile_row_msb_first() {
        assert_eq!(decode_tile_row(0x80, 0x80), [3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode_tile_row(0x01, 0x00), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(decode_tile_row(0x00, 0x40), [0, 2, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_tile_data_address_modes() {
        use TileAddressingMode::*;
        assert_eq!(tile_data_address(0, Mode8000), 0x8000);
        assert_eq!(tile_data_address(0xFF, Mode8000), 0x8FF0);
        assert_eq!(tile_data_address(0, Mode8800), 0x9000);
        assert_eq!(tile_data_address(0x7F, Mode8800), 0x97F0);
        assert_eq!(tile_data_address(0x80, Mode8800), 0x8800);
        assert_eq!(tile_data_address(0xFF, Mode8800), 0x8FF0);
    }

    #[test]
    fn test_top_left_tile_pixel() {
        let mut ppu = Ppu::new();
        ppu.write_byte(0xFF40, 0x91); // LCD on, 0x8000 定址, 0x9800 地圖, BG on
        ppu.write_byte(0xFF47, 0xE4);
        write_tile(&mut ppu, 0x8000, &[(0x80, 0x80)]);

        assert_eq!(ppu.color_index(0, 0), 3);
        assert_eq!(ppu.pixel(0, 0), Shade::Black);
        for x in 1..8 {
            assert_eq!(ppu.color_index(x, 0), 0);
            assert_eq!(ppu.pixel(x, 0), Shade::White);
        }
    }

    #[test]
    fn test_signed_addressing_reads_negative_tile() {
        let mut ppu = Ppu::new();
        ppu.write_byte(0xFF40, 0x81); // bit 4 clear: 0x8800 定址
        ppu.write_byte(0xFF47, 0xE4);
        ppu.write_byte(0x9800, 0xFF); // tile -1 => 0x8FF0
        write_tile(&mut ppu, 0x8FF0, &[(0xFF, 0x00)]);
        assert_eq!(ppu.pixel(0, 0), Shade::LightGray);

        ppu.write_byte(0x9800, 0x00); // tile 0 => 0x9000
        write_tile(&mut ppu, 0x9000, &[(0x00, 0xFF)]);
        assert_eq!(ppu.pixel(3, 0), Shade::DarkGray);
    }

    #[test]
    fn test_scroll_wraps_and_map_select() {
        let mut ppu = Ppu::new();
        ppu.write_byte(0xFF40, 0x99); // 0x9C00 地圖
        ppu.write_byte(0xFF47, 0xE4);
        // 地圖最後一格 (31, 31) 使用 tile 1
        ppu.write_byte(0x9C00 + 31 * 32 + 31, 1);
        let mut rows = [(0u8, 0u8); 8];
        rows[7] = (0x01, 0x01);
        write_tile(&mut ppu, 0x8010, &rows);

        ppu.write_byte(0xFF43, 0xFF);
        ppu.write_byte(0xFF42, 0xFF);
        assert_eq!(ppu.pixel(0, 0), Shade::Black);
        assert_eq!(ppu.pixel(1, 1), Shade::White);
    }

    #[test]
    fn test_palette_slots() {
        for index in 0..4u8 {
            let palette = 0b11 << (index * 2);
            assert_eq!(Ppu::get_palette_color(palette, index), Shade::Black);
            assert_eq!(
                Ppu::get_palette_color(palette, (index + 1) % 4),
                Shade::White
            );
        }
    }

    #[test]
    fn test_bg_disabled_is_white() {
        let mut ppu = Ppu::new();
        ppu.write_byte(0xFF40, 0x90);
        ppu.write_byte(0xFF47, 0xFF);
        write_tile(&mut ppu, 0x8000, &[(0xFF, 0xFF)]);
        assert_eq!(ppu.pixel(0, 0), Shade::White);
        let frame = ppu.render(Viewport::default());
        assert!(frame.pixels.iter().all(|&s| s == Shade::White));
    }

    #[test]
    fn test_render_matches_pixel() {
        let mut ppu = Ppu::new();
        ppu.write_byte(0xFF40, 0x91);
        ppu.write_byte(0xFF47, 0x1B);
        write_tile(&mut ppu, 0x8000, &[(0xF0, 0x3C); 8]);
        let viewport = Viewport {
            width: 16,
            height: 4,
        };
        let frame = ppu.render(viewport);
        assert_eq!(frame.pixels.len(), 64);
        for y in 0..4 {
            for x in 0..16 {
                assert_eq!(frame.get(x, y), Some(ppu.pixel(x, y)));
            }
        }
        assert_eq!(frame.get(16, 0), None);
        // 0xF0/0x3C 第一欄 = color 1，經 0x1B 調色板 => DarkGray
        assert_eq!(frame.get(0, 0), Some(Shade::DarkGray));
        assert_eq!(&frame.to_rgba()[..4], &[0x55, 0x55, 0x55, 0xFF]);
    }

    #[test]
    fn test_ly_follows_dots() {
        let mut ppu = Ppu::new();
        assert_eq!(ppu.read_byte(0xFF44), 0);
        ppu.advance(455);
        assert_eq!(ppu.ly(), 0);
        ppu.advance(1);
        assert_eq!(ppu.ly(), 1);
        ppu.advance(DOTS_PER_LINE * 152);
        assert_eq!(ppu.ly(), 153);
        ppu.advance(DOTS_PER_LINE);
        assert_eq!(ppu.ly(), 0);

        ppu.advance(DOTS_PER_LINE * 10);
        ppu.write_byte(0xFF44, 0x55);
        assert_eq!(ppu.ly(), 0);
    }

    #[test]
    fn test_stat_reads_coincidence() {
        let mut ppu = Ppu::new();
        ppu.write_byte(0xFF41, 0xFF);
        assert_eq!(ppu.read_byte(0xFF41), 0x80 | 0x78 | 0x04);
        ppu.write_byte(0xFF45, 2);
        assert_eq!(ppu.read_byte(0xFF41) & 0x04, 0);
        ppu.advance(DOTS_PER_LINE * 2);
        assert_eq!(ppu.read_byte(0xFF41) & 0x04, 0x04);
    }

    #[test]
    fn test_oversized_viewport_is_clamped() {
        let mut ppu = Ppu::new();
        ppu.write_byte(0xFF40, 0x91);
        let huge = Viewport {
            width: usize::MAX,
            height: 2,
        };
        assert!(!huge.is_valid());
        let frame = ppu.render(huge);
        assert_eq!((frame.width, frame.height), (MAX_VIEWPORT, 2));
        assert_eq!(frame.pixels.len(), MAX_VIEWPORT * 2);

        let empty = FrameBuffer::blank(Viewport {
            width: 0,
            height: 0,
        });
        assert_eq!((empty.width, empty.height), (1, 1));
        assert!(Viewport::default().is_valid());
    }

    #[test]
    fn test_snapshot_reads_registers() {
        let mut ppu = Ppu::new();
        ppu.write_byte(0xFF40, 0x91);
        ppu.write_byte(0xFF42, 0x10);
        ppu.write_byte(0xFF43, 0x20);
        ppu.write_byte(0xFF45, 1);
        ppu.write_byte(0xFF47, 0xE4);
        ppu.advance(DOTS_PER_LINE + 4);
        let snapshot = ppu.snapshot();
        assert_eq!(snapshot.lcdc, 0x91);
        assert_eq!((snapshot.scy, snapshot.scx), (0x10, 0x20));
        assert_eq!(snapshot.ly, 1);
        assert_eq!(snapshot.stat, 0x84);
        assert_eq!(snapshot.dots, DOTS_PER_LINE + 4);
        assert_eq!(
            snapshot.to_string(),
            "LCDC=91 STAT=84 SCX=20 SCY=10 LY=01 LYC=01 BGP=E4 dots=460"
        );
    }

    proptest! {
        #[test]
        fn prop_tile_row_recombines(low: u8, high: u8) {
            let row = decode_tile_row(low, high);
            let mut l = 0u8;
            let mut h = 0u8;
            for (column, &color) in row.iter().enumerate() {
                prop_assert!(color < 4);
                l |= (color & 1) << (7 - column);
                h |= (color >> 1) << (7 - column);
            }
            prop_assert_eq!((l, h), (low, high));
        }
    }
}
