//! Wire format of the Eclypse control and data channels.
//!
//! Control words are little-endian `u32`s laid out as `[tag:4][payload:28]`.
//! The data channel carries back-to-back sample units with no framing, so
//! alignment is purely positional from the first byte of the stream.
//!
//! Nothing here does I/O.

use eclypse_messages::{Hertz, IqSample, Ppm, SampleEncoding, SampleRate};

use crate::error::{Error, Result};

/// Number of payload bits in a control word.
pub const PAYLOAD_BITS: u32 = 28;

/// Mask selecting the payload bits of a control word.
pub const PAYLOAD_MASK: u32 = (1 << PAYLOAD_BITS) - 1;

/// Command carried in the top four bits of a control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlTag {
    /// Payload is the corrected center frequency in Hz.
    Frequency,
    /// Payload is a [`SampleRate`] code.
    Rate,
}

impl ControlTag {
    pub const fn bits(self) -> u32 {
        match self {
            ControlTag::Frequency => 0,
            ControlTag::Rate => 1,
        }
    }

    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(ControlTag::Frequency),
            1 => Some(ControlTag::Rate),
            _ => None,
        }
    }
}

/// A packed control command, ready to be written to the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlWord(u32);

impl ControlWord {
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Decoded tag, or `None` for tag bits this client never sends.
    pub const fn tag(self) -> Option<ControlTag> {
        ControlTag::from_bits(self.0 >> PAYLOAD_BITS)
    }

    pub const fn payload(self) -> u32 {
        self.0 & PAYLOAD_MASK
    }

    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

impl std::fmt::Display for ControlWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<ControlWord> for u32 {
    fn from(word: ControlWord) -> Self {
        word.0
    }
}

/// Pack `tag` and `payload` into a control word.
///
/// Fails with [`Error::PayloadOverflow`] if `payload` needs more than
/// 28 bits.
pub fn encode_control_word(tag: ControlTag, payload: u32) -> Result<ControlWord> {
    if payload > PAYLOAD_MASK {
        return Err(Error::PayloadOverflow(payload));
    }
    Ok(ControlWord(tag.bits() << PAYLOAD_BITS | payload))
}

/// Apply `correction` to `requested` and truncate to whole hertz.
///
/// The result must fit the 28-bit payload; larger (or negative, or
/// non-finite) values fail with [`Error::FrequencyOutOfRange`] instead of
/// being wrapped.
pub fn corrected_frequency(requested: Hertz, correction: Ppm) -> Result<u32> {
    let corrected = correction.factor() * requested.as_hz() as f64;
    let out_of_range = || Error::FrequencyOutOfRange {
        requested: requested.as_hz(),
        corrected,
    };

    if !corrected.is_finite() || corrected < 0.0 {
        return Err(out_of_range());
    }
    let hz = corrected.trunc();
    if hz > f64::from(PAYLOAD_MASK) {
        return Err(out_of_range());
    }
    Ok(hz as u32)
}

/// Build the set-frequency command for `requested` corrected by `correction`.
pub fn encode_frequency(requested: Hertz, correction: Ppm) -> Result<ControlWord> {
    let hz = corrected_frequency(requested, correction)?;
    encode_control_word(ControlTag::Frequency, hz)
}

/// Build the set-rate command for `rate`.
///
/// Fails with [`Error::UnsupportedSampleRate`] for anything outside the
/// device's fixed rate table.
pub fn encode_rate(rate: Hertz) -> Result<ControlWord> {
    let rate = SampleRate::from_hz(rate.as_hz())
        .ok_or(Error::UnsupportedSampleRate(rate.as_hz()))?;
    encode_control_word(ControlTag::Rate, rate.code())
}

/// Decode every complete sample unit in `buf`.
///
/// Returns the samples and the unconsumed tail, which is always shorter
/// than one unit. Decoding `a` and then `residue ++ b` yields the same
/// samples as decoding `a ++ b` in one call.
///
/// `I16Pair` values are not rescaled: an I of `-1234` decodes to
/// `-1234.0`.
pub fn decode_samples(buf: &[u8], encoding: SampleEncoding) -> (Vec<IqSample>, &[u8]) {
    let width = encoding.unit_width();
    let whole = buf.len() - buf.len() % width;
    let (units, residue) = buf.split_at(whole);

    let samples = match encoding {
        SampleEncoding::F32Pair => units
            .chunks_exact(width)
            .map(|c| {
                IqSample::new(
                    f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                    f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                )
            })
            .collect(),
        SampleEncoding::I16Pair => units
            .chunks_exact(width)
            .map(|c| {
                IqSample::new(
                    f32::from(i16::from_le_bytes([c[0], c[1]])),
                    f32::from(i16::from_le_bytes([c[2], c[3]])),
                )
            })
            .collect(),
    };

    (samples, residue)
}

/// Serialize samples in `encoding`.
///
/// `I16Pair` components are truncated toward zero and saturate at the
/// `i16` limits.
pub fn encode_samples(samples: &[IqSample], encoding: SampleEncoding) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * encoding.unit_width());
    for sample in samples {
        match encoding {
            SampleEncoding::F32Pair => {
                out.extend_from_slice(&sample.re.to_le_bytes());
                out.extend_from_slice(&sample.im.to_le_bytes());
            }
            SampleEncoding::I16Pair => {
                out.extend_from_slice(&(sample.re as i16).to_le_bytes());
                out.extend_from_slice(&(sample.im as i16).to_le_bytes());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(n: usize) -> Vec<IqSample> {
        (0..n)
            .map(|k| {
                let phase = k as f32 * 0.37;
                IqSample::new(phase.cos() * 1000.0, phase.sin() * -1000.0)
            })
            .collect()
    }

    #[test]
    fn control_word_layout() {
        let word = encode_control_word(ControlTag::Rate, 5).unwrap();
        assert_eq!(word.value(), 0x1000_0005);
        assert_eq!(word.tag(), Some(ControlTag::Rate));
        assert_eq!(word.payload(), 5);
        assert_eq!(word.to_le_bytes(), [0x05, 0x00, 0x00, 0x10]);
        assert_eq!(ControlWord::from_le_bytes(word.to_le_bytes()), word);
    }

    #[test]
    fn control_word_accepts_largest_payload() {
        let word = encode_control_word(ControlTag::Frequency, PAYLOAD_MASK).unwrap();
        assert_eq!(word.value(), 0x0FFF_FFFF);
        assert_eq!(word.tag(), Some(ControlTag::Frequency));
    }

    #[test]
    fn control_word_rejects_payload_overflow() {
        let err = encode_control_word(ControlTag::Frequency, 1 << 28).unwrap_err();
        assert!(matches!(err, Error::PayloadOverflow(0x1000_0000)));
        let err = encode_control_word(ControlTag::Rate, u32::MAX).unwrap_err();
        assert!(matches!(err, Error::PayloadOverflow(u32::MAX)));
    }

    #[test]
    fn control_word_display() {
        let word = encode_control_word(ControlTag::Rate, 5).unwrap();
        assert_eq!(word.to_string(), "0x10000005");
    }

    #[test]
    fn every_supported_rate_encodes_with_rate_tag() {
        for rate in SampleRate::ALL {
            let word = encode_rate(rate.into()).unwrap();
            assert_eq!(word.value() >> 28, 0b0001, "tag for {:?}", rate);
            assert_eq!(word.payload(), rate.code(), "code for {:?}", rate);
        }
    }

    #[test]
    fn rate_768k_encodes_to_known_word() {
        assert_eq!(encode_rate(Hertz(768_000)).unwrap().value(), 0x1000_0005);
    }

    #[test]
    fn unsupported_rates_are_rejected() {
        for hz in [0, 1, 22_050, 44_100, 250_000, 2_048_000, 3_072_000] {
            let err = encode_rate(Hertz(hz)).unwrap_err();
            assert!(
                matches!(err, Error::UnsupportedSampleRate(r) if r == hz),
                "expected UnsupportedSampleRate for {}",
                hz
            );
        }
    }

    #[test]
    fn frequency_payload_reproduces_corrected_value() {
        let cases = [
            (Hertz(0), Ppm(0.0)),
            (Hertz(1), Ppm(0.0)),
            (Hertz::mhz(100), Ppm(0.0)),
            (Hertz::mhz(100), Ppm(12.5)),
            (Hertz::mhz(144), Ppm(-3.0)),
            (Hertz(268_435_455), Ppm(0.0)),
            (Hertz::mhz(200), Ppm(-250.0)),
        ];
        for (freq, corr) in cases {
            let expected = corrected_frequency(freq, corr).unwrap();
            let word = encode_frequency(freq, corr).unwrap();
            assert_eq!(word.payload(), expected, "{} {}", freq, corr);
            assert_eq!(word.value() >> 28, 0, "tag bits for {} {}", freq, corr);
        }
    }

    #[test]
    fn zero_correction_is_identity() {
        let word = encode_frequency(Hertz::mhz(100), Ppm::ZERO).unwrap();
        assert_eq!(word.value(), 100_000_000);
    }

    #[test]
    fn correction_is_truncated_to_whole_hertz() {
        let hz = corrected_frequency(Hertz::mhz(100), Ppm(-10.0)).unwrap();
        assert!((99_998_999..=99_999_000).contains(&hz), "got {}", hz);
        let hz = corrected_frequency(Hertz(3), Ppm(100_000.0)).unwrap();
        assert_eq!(hz, 3);
    }

    #[test]
    fn hydrogen_line_does_not_fit_in_payload() {
        let err = encode_frequency(Hertz(1_420_405_000), Ppm::ZERO).unwrap_err();
        match err {
            Error::FrequencyOutOfRange { requested, corrected } => {
                assert_eq!(requested, 1_420_405_000);
                assert_eq!(corrected, 1_420_405_000.0);
            }
            other => panic!("expected FrequencyOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn correction_can_push_frequency_out_of_range() {
        assert!(encode_frequency(Hertz(268_435_455), Ppm::ZERO).is_ok());
        let err = encode_frequency(Hertz(268_435_455), Ppm(1.0)).unwrap_err();
        assert!(matches!(err, Error::FrequencyOutOfRange { .. }));
    }

    #[test]
    fn negative_corrected_frequency_is_rejected() {
        let err = encode_frequency(Hertz::mhz(100), Ppm(-2_000_000.0)).unwrap_err();
        assert!(matches!(err, Error::FrequencyOutOfRange { .. }));
    }

    #[test]
    fn non_finite_correction_is_rejected() {
        let err = encode_frequency(Hertz::mhz(100), Ppm(f64::NAN)).unwrap_err();
        assert!(matches!(err, Error::FrequencyOutOfRange { .. }));
        let err = encode_frequency(Hertz::mhz(100), Ppm(f64::INFINITY)).unwrap_err();
        assert!(matches!(err, Error::FrequencyOutOfRange { .. }));
    }

    #[test]
    fn decode_f32_pair() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0.5f32.to_le_bytes());
        buf.extend_from_slice(&(-0.5f32).to_le_bytes());
        buf.extend_from_slice(&1.0f32.to_le_bytes());
        buf.extend_from_slice(&(-1.0f32).to_le_bytes());

        let (samples, residue) = decode_samples(&buf, SampleEncoding::F32Pair);
        assert_eq!(
            samples,
            vec![IqSample::new(0.5, -0.5), IqSample::new(1.0, -1.0)]
        );
        assert!(residue.is_empty());
    }

    #[test]
    fn decode_i16_pair_is_unscaled() {
        let buf = [0xFF, 0x7F, 0x00, 0x80, 0x2E, 0xFB, 0x01, 0x00];
        let (samples, residue) = decode_samples(&buf, SampleEncoding::I16Pair);
        assert_eq!(
            samples,
            vec![
                IqSample::new(32767.0, -32768.0),
                IqSample::new(-1234.0, 1.0)
            ]
        );
        assert!(residue.is_empty());
    }

    #[test]
    fn decode_keeps_partial_unit_as_residue() {
        let buf = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let (samples, residue) = decode_samples(&buf, SampleEncoding::F32Pair);
        assert_eq!(samples.len(), 1);
        assert_eq!(residue, &[9, 10]);

        let (samples, residue) = decode_samples(&buf[..3], SampleEncoding::I16Pair);
        assert!(samples.is_empty());
        assert_eq!(residue, &[1, 2, 3]);
    }

    #[test]
    fn decode_empty_buffer() {
        let (samples, residue) = decode_samples(&[], SampleEncoding::F32Pair);
        assert!(samples.is_empty());
        assert!(residue.is_empty());
    }

    #[test]
    fn decode_is_deterministic() {
        let bytes = encode_samples(&synthetic(17), SampleEncoding::F32Pair);
        let first = decode_samples(&bytes[..100], SampleEncoding::F32Pair);
        let second = decode_samples(&bytes[..100], SampleEncoding::F32Pair);
        assert_eq!(first, second);
    }

    #[test]
    fn split_decoding_matches_whole_decoding_at_every_split() {
        for encoding in [SampleEncoding::F32Pair, SampleEncoding::I16Pair] {
            let mut bytes = encode_samples(&synthetic(9), encoding);
            bytes.extend_from_slice(&[0xAA, 0xBB]);
            let (whole, whole_residue) = decode_samples(&bytes, encoding);

            for split in 0..=bytes.len() {
                let (mut samples, residue) = decode_samples(&bytes[..split], encoding);
                let mut carried = residue.to_vec();
                carried.extend_from_slice(&bytes[split..]);
                let (rest, final_residue) = decode_samples(&carried, encoding);
                samples.extend(rest);

                assert_eq!(samples, whole, "{} split at {}", encoding, split);
                assert_eq!(final_residue, whole_residue, "{} split at {}", encoding, split);
            }
        }
    }

    #[test]
    fn f32_round_trip_is_bit_exact() {
        let mut samples = synthetic(64);
        samples.push(IqSample::new(f32::MIN_POSITIVE, -0.0));
        samples.push(IqSample::new(f32::MAX, f32::MIN));

        let bytes = encode_samples(&samples, SampleEncoding::F32Pair);
        assert_eq!(bytes.len(), samples.len() * 8);
        let (decoded, residue) = decode_samples(&bytes, SampleEncoding::F32Pair);
        assert!(residue.is_empty());
        for (a, b) in samples.iter().zip(&decoded) {
            assert_eq!(a.re.to_bits(), b.re.to_bits());
            assert_eq!(a.im.to_bits(), b.im.to_bits());
        }
    }

    #[test]
    fn i16_round_trip_is_exact_for_integral_samples() {
        let samples: Vec<IqSample> = [(0, 0), (1, -1), (32767, -32768), (-1234, 4321)]
            .into_iter()
            .map(|(i, q)| IqSample::new(i as f32, q as f32))
            .collect();

        let bytes = encode_samples(&samples, SampleEncoding::I16Pair);
        assert_eq!(bytes.len(), samples.len() * 4);
        let (decoded, residue) = decode_samples(&bytes, SampleEncoding::I16Pair);
        assert!(residue.is_empty());
        assert_eq!(decoded, samples);
    }

    #[test]
    fn i16_encoding_saturates() {
        let bytes = encode_samples(&[IqSample::new(1e9, -1e9)], SampleEncoding::I16Pair);
        assert_eq!(bytes, vec![0xFF, 0x7F, 0x00, 0x80]);
    }
}
