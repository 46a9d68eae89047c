use super::asc::sample_rate_index;
use crate::config::AudioConfig;
use crate::error::Result;

/// ADTS per-frame header for AAC-LC transport, 7 bytes without CRC.
#[derive(Debug)]
pub struct AdtsHeader {
    /// 12-bit sync word, always 0xFFF
    pub sync_word: u32,
    /// 0 = MPEG-4, 1 = MPEG-2
    pub id: u8,
    /// Always 0
    pub layer: u8,
    /// True when no CRC follows the header
    pub protection_absent: bool,
    /// 2-bit profile: MPEG-4 audio object type minus one
    pub profile: u8,
    /// 4-bit sampling-frequency index
    pub sample_rate_index: u8,
    /// 3-bit channel configuration
    pub channel_configuration: u8,
    /// 13-bit total frame length including this header
    pub frame_length: u16,
    /// 11-bit buffer fullness; 0x7FF signals variable bitrate
    pub buffer_fullness: u16,
    /// Number of raw data blocks minus one
    pub number_of_raw_blocks: u8,
}

impl AdtsHeader {
    /// Builds the header for one AAC frame of `payload_len` bytes.
    pub fn for_frame(config: &AudioConfig, payload_len: usize) -> Result<Self> {
        Ok(Self {
            sync_word: 0xFFF,
            id: 0,
            layer: 0,
            protection_absent: true,
            profile: config.aac_profile().audio_object_type() - 1,
            sample_rate_index: sample_rate_index(config.sample_rate)?,
            channel_configuration: config.channel_count,
            frame_length: (7 + payload_len) as u16,
            buffer_fullness: 0x7FF,
            number_of_raw_blocks: 0,
        })
    }

    /// Serializes the 7 header bytes.
    pub fn to_bytes(&self) -> [u8; 7] {
        let mut bytes = [0u8; 7];

        // Sync word straddles the first two bytes
        bytes[0] = (self.sync_word >> 4) as u8;
        bytes[1] = ((self.sync_word & 0xF) << 4) as u8
            | ((self.id & 0x1) << 3)
            | ((self.layer & 0x3) << 1)
            | (self.protection_absent as u8);

        bytes[2] = (self.profile << 6)
            | ((self.sample_rate_index & 0xF) << 2)
            | ((self.channel_configuration >> 2) & 0x1);

        bytes[3] = ((self.channel_configuration & 0x3) << 6)
            | ((self.frame_length >> 11) & 0x3) as u8;

        bytes[4] = ((self.frame_length >> 3) & 0xFF) as u8;

        bytes[5] =
            ((self.frame_length & 0x7) << 5) as u8 | ((self.buffer_fullness >> 6) & 0x1F) as u8;

        bytes[6] = ((self.buffer_fullness & 0x3F) << 2) as u8 | (self.number_of_raw_blocks & 0x3);

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AacProfile;

    #[test]
    fn test_adts_header_bytes() {
        let config = AudioConfig {
            sample_rate: 44_100,
            channel_count: 2,
            profile: Some(AacProfile::Lc),
            ..AudioConfig::default()
        };
        let header = AdtsHeader::for_frame(&config, 1024).unwrap();
        let bytes = header.to_bytes();

        assert_eq!(bytes[0], 0xFF);
        assert_eq!(bytes[1], 0xF1); // MPEG-4, layer 0, no CRC
        assert_eq!(bytes[2] >> 6, 1); // LC profile (object type 2 minus 1)
        assert_eq!((bytes[2] >> 2) & 0xF, 4); // 44.1 kHz

        // 13-bit frame length = 7 + 1024
        let frame_length = (((bytes[3] & 0x3) as u16) << 11)
            | ((bytes[4] as u16) << 3)
            | ((bytes[5] as u16) >> 5);
        assert_eq!(frame_length, 1031);
    }

    #[test]
    fn test_adts_mono_channel_bits() {
        let config = AudioConfig {
            channel_count: 1,
            ..AudioConfig::default()
        };
        let header = AdtsHeader::for_frame(&config, 16).unwrap();
        let bytes = header.to_bytes();
        let channels = ((bytes[2] & 0x1) << 2) | (bytes[3] >> 6);
        assert_eq!(channels, 1);
    }
}
