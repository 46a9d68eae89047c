use super::asc::AudioSpecificConfig;
use crate::error::Result;
use crate::utils::BitWriter;

/// How many AudioMuxElements may reference the previous StreamMuxConfig
/// before it is repeated in-band.
const CONFIG_REPEAT_PERIOD: u32 = 20;

/// LATM AudioMuxElement writer for the non-LC AAC profiles.
///
/// Produces one AudioMuxElement per AAC frame. The StreamMuxConfig is
/// embedded in the first element and repeated periodically; elements in
/// between set `useSameStreamMuxConfig` instead.
pub struct LatmWrapper {
    asc: AudioSpecificConfig,
    frames_since_config: u32,
}

impl LatmWrapper {
    /// Creates a wrapper for a stream described by `asc`.
    pub fn new(asc: AudioSpecificConfig) -> Self {
        Self {
            asc,
            frames_since_config: 0,
        }
    }

    /// Resets the config repetition latch, forcing the next element to
    /// carry a StreamMuxConfig.
    pub fn reset(&mut self) {
        self.frames_since_config = 0;
    }

    /// Wraps one raw AAC frame into an AudioMuxElement.
    pub fn wrap(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new();

        let send_config = self.frames_since_config == 0;
        writer.put_bool(!send_config); // useSameStreamMuxConfig
        if send_config {
            self.write_stream_mux_config(&mut writer)?;
            self.frames_since_config = CONFIG_REPEAT_PERIOD;
        }
        self.frames_since_config -= 1;

        // PayloadLengthInfo for frameLengthType 0: 255-valued bytes plus a
        // terminating remainder
        let mut remaining = payload.len();
        while remaining >= 255 {
            writer.put_uint(255, 8)?;
            remaining -= 255;
        }
        writer.put_uint(remaining as u32, 8)?;

        // PayloadMux
        writer.put_bytes(payload);

        Ok(writer.into_bytes())
    }

    fn write_stream_mux_config(&self, writer: &mut BitWriter) -> Result<()> {
        writer.put_bool(false); // audioMuxVersion
        writer.put_bool(true); // allStreamsSameTimeFraming
        writer.put_uint(0, 6)?; // numSubFrames
        writer.put_uint(0, 4)?; // numProgram
        writer.put_uint(0, 3)?; // numLayer
        self.asc.write_bits(writer)?;
        writer.put_uint(0, 3)?; // frameLengthType
        writer.put_uint(0xFF, 8)?; // latmBufferFullness
        writer.put_bool(false); // otherDataPresent
        writer.put_bool(false); // crcCheckPresent
        Ok(())
    }
}
