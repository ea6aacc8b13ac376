use byteorder::ByteOrder;

use super::Endian;

/// A contiguous block of byte-addressable memory.
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new(length: u32) -> Memory {
        Memory {
            data: vec![0; length as usize],
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn check_range(&self, address: u32, length: u32) -> bool {
        let len = self.data.len() as u64;
        u64::from(address) + u64::from(length) <= len
    }

    fn slice(&self, address: u32, length: u32) -> Result<&[u8], ()> {
        if self.check_range(address, length) {
            Ok(&self.data[address as usize..(address + length) as usize])
        } else {
            Err(())
        }
    }

    fn slice_mut(&mut self, address: u32, length: u32) -> Result<&mut [u8], ()> {
        if self.check_range(address, length) {
            Ok(&mut self.data[address as usize..(address + length) as usize])
        } else {
            Err(())
        }
    }

    /// Copies `bytes` into the memory starting at `address`. Used by the
    /// loader to place an image segment.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> Result<(), ()> {
        self.slice_mut(address, bytes.len() as u32)?
            .copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_byte(&self, address: u32) -> Result<u8, ()> {
        Ok(self.slice(address, 1)?[0])
    }

    pub fn read_word(&self, address: u32) -> Result<u32, ()> {
        Ok(Endian::read_u32(self.slice(address, 4)?))
    }

    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), ()> {
        self.slice_mut(address, 1)?[0] = value;
        Ok(())
    }

    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), ()> {
        Endian::write_u32(self.slice_mut(address, 4)?, value);
        Ok(())
    }
}

impl<'a> From<&'a [u8]> for Memory {
    fn from(s: &'a [u8]) -> Memory {
        Memory { data: Vec::from(s) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_access_is_little_endian() {
        let mut memory = Memory::new(8);
        memory.write_word(0, 0x0403_0201).unwrap();
        assert_eq!(&memory.data()[..4], &[1, 2, 3, 4]);
        assert_eq!(memory.read_word(0), Ok(0x0403_0201));
        assert_eq!(memory.read_byte(2), Ok(3));
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut memory = Memory::new(4);
        assert_eq!(memory.read_word(1), Err(()));
        assert_eq!(memory.read_byte(4), Err(()));
        assert_eq!(memory.write_word(2, 0), Err(()));
        assert!(memory.check_range(0, 4));
        assert!(!memory.check_range(4, 1));
    }

    #[test]
    fn load_places_segment() {
        let mut memory = Memory::new(16);
        memory.load(4, &[9, 8, 7]).unwrap();
        assert_eq!(&memory.data()[4..7], &[9, 8, 7]);
        assert_eq!(memory.load(14, &[1, 2, 3]), Err(()));
    }
}
