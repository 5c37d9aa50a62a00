use crate::error::{Address, CpuError};

/// Number of addressable cells.
pub const MEMORY_SIZE: usize = 256;

#[derive(Debug, Clone)]
pub struct Memory {
    data: [u8; MEMORY_SIZE], // 256 bytes, no wraparound
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            data: [0; MEMORY_SIZE],
        }
    }

    pub fn read(&self, address: usize) -> Result<u8, CpuError> {
        self.data
            .get(address)
            .copied()
            .ok_or(CpuError::AddressOutOfRange(Address::Memory(address)))
    }

    pub fn write(&mut self, address: usize, value: u8) -> Result<(), CpuError> {
        let cell = self
            .data
            .get_mut(address)
            .ok_or(CpuError::AddressOutOfRange(Address::Memory(address)))?;
        *cell = value;
        Ok(())
    }

    // Copy a program image in starting at `start_address`; nothing is written
    // unless the whole image fits.
    pub fn load(&mut self, data: &[u8], start_address: usize) -> Result<(), CpuError> {
        let end = start_address + data.len();
        if end > MEMORY_SIZE {
            return Err(CpuError::AddressOutOfRange(Address::Memory(end - 1)));
        }
        self.data[start_address..end].copy_from_slice(data);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.data = [0; MEMORY_SIZE];
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_in_bounds() {
        let mut memory = Memory::new();
        memory.write(0xFF, 0x42).unwrap();
        assert_eq!(memory.read(0xFF), Ok(0x42));
        assert_eq!(memory.read(0x00), Ok(0x00));
    }

    #[test]
    fn test_out_of_range_access_fails() {
        let mut memory = Memory::new();
        assert_eq!(
            memory.read(256),
            Err(CpuError::AddressOutOfRange(Address::Memory(256)))
        );
        assert_eq!(
            memory.write(300, 1),
            Err(CpuError::AddressOutOfRange(Address::Memory(300)))
        );
    }

    #[test]
    fn test_load_rejects_oversized_image() {
        let mut memory = Memory::new();
        let image = vec![0xAA; 257];
        assert!(memory.load(&image, 0).is_err());
        // nothing was copied
        assert_eq!(memory.read(0), Ok(0));

        memory.load(&[1, 2, 3], 253).unwrap();
        assert_eq!(memory.read(255), Ok(3));
    }
}
