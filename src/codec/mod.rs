//! # Codec Payload Wrapping
//!
//! This module provides the per-codec payload transformations the muxers
//! apply between an encoder's output and the container bytes:
//!
//! - **AAC**: ADTS framing for AAC-LC, LATM audio-mux elements for the
//!   HE profiles, AudioSpecificConfig synthesis and parsing
//! - **H.264/AVC**: access-unit delimiter insertion, parameter-set
//!   prefixing, AVCDecoderConfigurationRecord for FLV sequence headers
//! - **H.265/HEVC**: the HEVC equivalents of the above
//! - **Opus**: the MPEG-TS control-header framing
//!
//! The muxers own the policy of *when* to apply these; this module owns the
//! bytes.

#[doc = "AAC payload framing: ADTS, LATM and AudioSpecificConfig"]
pub mod aac;

#[doc = "H.264/AVC payload handling: NAL types, AUD, decoder configuration record"]
pub mod h264;

#[doc = "H.265/HEVC payload handling: NAL types, AUD, decoder configuration record"]
pub mod h265;

#[doc = "Opus control-header framing for MPEG-TS"]
pub mod opus;
