use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Direction of a bus access, carried by [`Error::UnmappedAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => f.write_str("read"),
            Access::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unmapped address 0x{addr:04X} ({access})")]
    UnmappedAddress { addr: u16, access: Access },

    #[error("unimplemented opcode 0x{opcode:02X} at PC=0x{pc:04X}")]
    UnimplementedOpcode { opcode: u8, pc: u16 },

    #[error("unimplemented extended opcode 0x{prefix:02X} 0x{opcode:02X} at PC=0x{pc:04X}")]
    UnimplementedExtendedOpcode { prefix: u8, opcode: u8, pc: u16 },

    #[error("failed to load ROM {}: {source}", path.display())]
    RomLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid viewport {width}x{height} in {} (each axis must be 1..=256)", path.display())]
    InvalidViewport {
        path: PathBuf,
        width: usize,
        height: usize,
    },

    #[error("no ROM given (use --rom or set rom_path in the config file)")]
    MissingRom,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_hex_context() {
        let err = Error::UnmappedAddress {
            addr: 0xA123,
            access: Access::Write,
        };
        assert_eq!(err.to_string(), "unmapped address 0xA123 (write)");

        let err = Error::UnimplementedExtendedOpcode {
            prefix: 0xCB,
            opcode: 0x07,
            pc: 0x0150,
        };
        assert_eq!(
            err.to_string(),
            "unimplemented extended opcode 0xCB 0x07 at PC=0x0150"
        );
    }

    #[test]
    fn test_io_errors_convert() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "gone");
    }
}
