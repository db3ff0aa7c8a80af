use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

const TITLE_START: usize = 0x0134;
const TITLE_END: usize = 0x0143;

/// Reads a cartridge or boot ROM image into memory.
pub fn read_rom_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| Error::RomLoad {
        path: path.to_path_buf(),
        source,
    })
}

// 卡帶標題只用於記錄，不影響映射
pub fn cartridge_title(rom_data: &[u8]) -> Option<String> {
    let bytes = rom_data.get(TITLE_START..TITLE_END)?;
    let title: String = bytes
        .iter()
        .take_while(|&&b| b != 0)
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| b as char)
        .collect();
    let title = title.trim_end().to_string();
    if title.is_empty() { None } else { Some(title) }
}
