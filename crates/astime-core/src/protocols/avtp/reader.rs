use super::error::AvtpError;

pub struct AvtpReader<'a> {
    payload: &'a [u8],
}

impl<'a> AvtpReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn require_len(&self, needed: usize) -> Result<(), AvtpError> {
        if self.payload.len() < needed {
            return Err(AvtpError::TooShort {
                needed,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, AvtpError> {
        self.payload
            .get(offset)
            .copied()
            .ok_or(AvtpError::TooShort {
                needed: offset + 1,
                actual: self.payload.len(),
            })
    }

    pub fn read_u16_be(&self, range: std::ops::Range<usize>) -> Result<u16, AvtpError> {
        let bytes: [u8; 2] = self.read_array(range)?;
        Ok(u16::from_be_bytes(bytes))
    }

    pub fn read_u32_be(&self, range: std::ops::Range<usize>) -> Result<u32, AvtpError> {
        let bytes: [u8; 4] = self.read_array(range)?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn read_array<const N: usize>(
        &self,
        range: std::ops::Range<usize>,
    ) -> Result<[u8; N], AvtpError> {
        let bytes = self.payload.get(range.clone()).ok_or(AvtpError::TooShort {
            needed: range.end,
            actual: self.payload.len(),
        })?;
        bytes.try_into().map_err(|_| AvtpError::TooShort {
            needed: N,
            actual: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::AvtpReader;
    use crate::protocols::avtp::error::AvtpError;

    #[test]
    fn read_u32_be_ok() {
        let payload = [0x00, 0x12, 0x34, 0x56, 0x78];
        let reader = AvtpReader::new(&payload);
        assert_eq!(reader.read_u32_be(1..5).unwrap(), 0x1234_5678);
    }

    #[test]
    fn read_u16_be_out_of_range() {
        let payload = [0x01];
        let reader = AvtpReader::new(&payload);
        let err = reader.read_u16_be(0..2).unwrap_err();
        assert!(matches!(err, AvtpError::TooShort { needed: 2, actual: 1 }));
    }

    #[test]
    fn read_u8_past_end() {
        let reader = AvtpReader::new(&[]);
        assert!(reader.read_u8(0).is_err());
    }
}
