use crate::error::{CastError, Result};
use crate::utils::{BitReader, BitWriter};

/// Sampling-frequency index table shared by ADTS and AudioSpecificConfig.
const SAMPLE_RATE_TABLE: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// Returns the 4-bit sampling-frequency index for a sample rate.
pub fn sample_rate_index(sample_rate: u32) -> Result<u8> {
    SAMPLE_RATE_TABLE
        .iter()
        .position(|&r| r == sample_rate)
        .map(|i| i as u8)
        .ok_or_else(|| {
            CastError::InvalidConfig(format!("no sampling frequency index for {}", sample_rate))
        })
}

/// Returns the sample rate for a 4-bit sampling-frequency index.
pub fn sample_rate_for_index(index: u8) -> Result<u32> {
    SAMPLE_RATE_TABLE
        .get(index as usize)
        .copied()
        .ok_or_else(|| CastError::InvalidData(format!("bad sampling frequency index {}", index)))
}

/// MPEG-4 AudioSpecificConfig, the bit-packed description of an AAC stream.
///
/// Encoders usually surface these bytes as codec extra data; when they do
/// not, the muxer synthesizes them from the track configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    /// MPEG-4 audio object type (2 = AAC-LC, 5 = SBR, 29 = PS)
    pub object_type: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel configuration (1 = mono, 2 = stereo)
    pub channel_config: u8,
}

impl AudioSpecificConfig {
    /// Creates a config, validating the sample rate against the index table.
    pub fn new(object_type: u8, sample_rate: u32, channel_config: u8) -> Result<Self> {
        sample_rate_index(sample_rate)?;
        Ok(Self {
            object_type,
            sample_rate,
            channel_config,
        })
    }

    /// Parses the leading bits of an AudioSpecificConfig byte sequence.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(data);
        let object_type = reader.read_bits(5)? as u8;
        let freq_index = reader.read_bits(4)? as u8;
        let sample_rate = if freq_index == 15 {
            reader.read_bits(24)?
        } else {
            sample_rate_for_index(freq_index)?
        };
        let channel_config = reader.read_bits(4)? as u8;
        Ok(Self {
            object_type,
            sample_rate,
            channel_config,
        })
    }

    /// Serializes the config, including the GASpecificConfig tail bits.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new();
        self.write_bits(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Writes the config bits into an ongoing bitstream (used by LATM's
    /// StreamMuxConfig, which embeds the config unaligned).
    pub fn write_bits(&self, writer: &mut BitWriter) -> Result<()> {
        writer.put_uint(self.object_type as u32, 5)?;
        writer.put_uint(sample_rate_index(self.sample_rate)? as u32, 4)?;
        writer.put_uint(self.channel_config as u32, 4)?;
        // GASpecificConfig: frameLengthFlag, dependsOnCoreCoder, extensionFlag
        writer.put_bool(false);
        writer.put_bool(false);
        writer.put_bool(false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_index_table() {
        assert_eq!(sample_rate_index(44_100).unwrap(), 4);
        assert_eq!(sample_rate_index(48_000).unwrap(), 3);
        assert_eq!(sample_rate_index(8_000).unwrap(), 11);
        assert!(sample_rate_index(44_000).is_err());
    }

    #[test]
    fn test_asc_bytes_lc_stereo() {
        let asc = AudioSpecificConfig::new(2, 44_100, 2).unwrap();
        // 00010 0100 0010 000 -> 0x12 0x10
        assert_eq!(asc.to_bytes().unwrap(), vec![0x12, 0x10]);
    }

    #[test]
    fn test_asc_parse_round_trip() {
        let asc = AudioSpecificConfig::new(2, 48_000, 1).unwrap();
        let parsed = AudioSpecificConfig::parse(&asc.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, asc);
    }
}
