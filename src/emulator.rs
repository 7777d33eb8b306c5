//! The CHIP-8 interpreter core, as described at https://en.wikipedia.org/wiki/CHIP-8#Virtual_machine_description.

use std::fs;
use std::path::Path;

pub mod debugger;
pub mod display;
pub mod emulator;
pub mod error;
pub mod input;
pub mod instruction;
pub mod keypad;
pub mod output;
pub mod scheduler;
pub mod timer;
pub mod tone;

pub use emulator::Emulator;

use error::LoadError;

/// Read a program image from disk. An empty file is rejected here, before any machine is touched.
pub fn read_program<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, LoadError> {
    let path = path.as_ref();
    let program = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if program.is_empty() {
        return Err(LoadError::Empty);
    }
    log::info!("Read {} bytes from {:?}", program.len(), path);
    Ok(program)
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::env;
    use std::process;

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("chip8-vm-{}-{}", process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_program_bytes() {
        let path = temp_file("program.ch8", &[0x00, 0xE0, 0x12, 0x00]);
        assert_eq!(read_program(&path).unwrap(), vec![0x00, 0xE0, 0x12, 0x00]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_program_names_its_path() {
        let err = read_program("/definitely/not/here.ch8").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("here.ch8"));
    }

    #[test]
    fn empty_program_is_rejected() {
        let path = temp_file("empty.ch8", &[]);
        assert!(matches!(read_program(&path), Err(LoadError::Empty)));
        fs::remove_file(path).unwrap();
    }
}
