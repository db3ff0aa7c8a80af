//! Runtime configuration: an optional JSON file overridden by command-line flags.

use crate::error::{Error, Result};
use crate::ppu::Viewport;
use crate::trace::DEFAULT_TRACE_CAPACITY;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "rust_gb")]
#[command(about = "DMG CPU/MMU/PPU core with an optional SDL3 window", long_about = None)]
pub struct Args {
    /// Path to the cartridge ROM
    #[arg(short = 'f', long)]
    pub rom: Option<PathBuf>,

    /// Path to a 256-byte boot ROM mapped over 0x0000-0x00FF
    #[arg(short, long)]
    pub boot: Option<PathBuf>,

    /// Log every decoded instruction
    #[arg(long)]
    pub debug: bool,

    /// JSON config file; flags given on the command line win
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop after this many instructions
    #[arg(long)]
    pub max_steps: Option<u64>,

    /// Run without a window even when the display feature is built in
    #[arg(long)]
    pub headless: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rom_path: Option<PathBuf>,
    pub boot_rom_path: Option<PathBuf>,
    pub debug: bool,
    pub trace_capacity: usize,
    pub step_delay_us: u64,
    pub viewport: Viewport,
    pub max_steps: Option<u64>,
    pub headless: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rom_path: None,
            boot_rom_path: None,
            debug: false,
            trace_capacity: DEFAULT_TRACE_CAPACITY,
            step_delay_us: 0,
            viewport: Viewport::default(),
            max_steps: None,
            headless: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        if !config.viewport.is_valid() {
            return Err(Error::InvalidViewport {
                path: path.to_path_buf(),
                width: config.viewport.width,
                height: config.viewport.height,
            });
        }
        Ok(config)
    }

    /// Builds the effective config: file values first, then flags on top.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        config.apply_args(args);
        config.require_rom_path()?;
        Ok(config)
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(rom) = &args.rom {
            self.rom_path = Some(rom.clone());
        }
        if let Some(boot) = &args.boot {
            self.boot_rom_path = Some(boot.clone());
        }
        if let Some(max_steps) = args.max_steps {
            self.max_steps = Some(max_steps);
        }
        self.debug |= args.debug;
        self.headless |= args.headless;
    }

    pub fn require_rom_path(&self) -> Result<&Path> {
        self.rom_path.as_deref().ok_or(Error::MissingRom)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_micros(self.step_delay_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("rust_gb_{}_{}.json", name, std::process::id()));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from(["rust_gb", "-f", "game.gb", "-b", "dmg.bin", "--debug"]).unwrap();
        assert_eq!(args.rom, Some(PathBuf::from("game.gb")));
        assert_eq!(args.boot, Some(PathBuf::from("dmg.bin")));
        assert!(args.debug);

        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.trace_capacity, 64);
        assert_eq!(config.step_delay(), Duration::ZERO);
        assert_eq!(config.viewport, Viewport::default());
    }

    #[test]
    fn test_missing_rom_is_fatal() {
        let args = Args::try_parse_from(["rust_gb", "--debug"]).unwrap();
        assert!(matches!(Config::from_args(&args), Err(Error::MissingRom)));
    }

    #[test]
    fn test_flags_override_file() {
        let path = temp_config(
            "override",
            r#"{ "rom_path": "from_file.gb", "step_delay_us": 50, "max_steps": 10 }"#,
        );
        let args = Args::try_parse_from([
            "rust_gb",
            "--config",
            path.to_str().unwrap(),
            "--rom",
            "from_flag.gb",
        ])
        .unwrap();
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.rom_path, Some(PathBuf::from("from_flag.gb")));
        assert_eq!(config.step_delay(), Duration::from_micros(50));
        assert_eq!(config.max_steps, Some(10));
        assert_eq!(config.trace_capacity, DEFAULT_TRACE_CAPACITY);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_rom_from_file_only() {
        let path = temp_config("file_rom", r#"{ "rom_path": "only.gb" }"#);
        let args = Args::try_parse_from(["rust_gb", "--config", path.to_str().unwrap()]).unwrap();
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.require_rom_path().unwrap(), Path::new("only.gb"));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_oversized_viewport_is_rejected() {
        let path = temp_config(
            "huge_viewport",
            r#"{ "rom_path": "game.gb", "viewport": { "width": 18446744073709551615, "height": 2 } }"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidViewport { width: usize::MAX, height: 2, .. }
        ));
        fs::remove_file(&path).unwrap();

        let path = temp_config("zero_viewport", r#"{ "viewport": { "width": 0, "height": 144 } }"#);
        let args = Args::try_parse_from(["rust_gb", "-f", "game.gb", "--config", path.to_str().unwrap()]).unwrap();
        assert!(matches!(
            Config::from_args(&args),
            Err(Error::InvalidViewport { width: 0, height: 144, .. })
        ));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_custom_viewport_within_bounds() {
        let path = temp_config("small_viewport", r#"{ "viewport": { "width": 256, "height": 1 } }"#);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.viewport, Viewport { width: 256, height: 1 });
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let path = temp_config("bad", "{ not json");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        fs::remove_file(&path).unwrap();
    }
}
