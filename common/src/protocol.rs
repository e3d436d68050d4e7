use crate::{
    error::{AckStatus, ProtocolError},
    types::GainSelector,
};

pub const SOF: u8 = b'#';
pub const EOF: u8 = b'!';
pub const CHECKSUM_DIGITS: usize = 3;
/// SOF, command byte, checksum digits and EOF.
pub const FRAME_OVERHEAD: usize = 3 + CHECKSUM_DIGITS;

const ACK_TAG: u8 = b'E';
const CURRENT_TAG: u8 = b'c';
const DESIRED_TAG: u8 = b'd';

/// Mod-256 byte sum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

pub fn checksum_digits(sum: u8) -> [u8; CHECKSUM_DIGITS] {
    [b'0' + sum / 100, b'0' + (sum / 10) % 10, b'0' + sum % 10]
}

/// Writes `#`, `body`, the checksum of `body` and `!`.
pub fn write_frame(out: &mut Vec<u8>, body: &[u8]) {
    out.push(SOF);
    out.extend_from_slice(body);
    out.extend_from_slice(&checksum_digits(checksum(body)));
    out.push(EOF);
}

/// One positional field in a request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `+` or `-`.
    Sign,
    /// Fixed count of ASCII decimal digits.
    Digits(usize),
    /// Gain selector byte, `p`, `i` or `d`.
    Selector,
    /// Fixed-width decimal text such as `1.23`.
    Decimal(usize),
}

impl Field {
    pub const fn width(self) -> usize {
        match self {
            Self::Sign | Self::Selector => 1,
            Self::Digits(width) | Self::Decimal(width) => width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldValue {
    Sign(i32),
    Digits(u32),
    Selector(GainSelector),
    Decimal(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchema {
    pub fields: &'static [Field],
}

impl FrameSchema {
    pub const fn data_len(&self) -> usize {
        let mut len = 0;
        let mut index = 0;
        while index < self.fields.len() {
            len += self.fields[index].width();
            index += 1;
        }
        len
    }

    pub const fn total_len(&self) -> usize {
        FRAME_OVERHEAD + self.data_len()
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<FieldValue>, ProtocolError> {
        let mut values = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for field in self.fields {
            let raw = data
                .get(offset..offset + field.width())
                .ok_or(ProtocolError::Framing)?;
            offset += field.width();
            values.push(decode_field(*field, raw)?);
        }
        Ok(values)
    }
}

fn decode_field(field: Field, raw: &[u8]) -> Result<FieldValue, ProtocolError> {
    match field {
        Field::Sign => match raw {
            [b'+'] => Ok(FieldValue::Sign(1)),
            [b'-'] => Ok(FieldValue::Sign(-1)),
            _ => Err(ProtocolError::ValueOutOfRange),
        },
        Field::Digits(_) => parse_digits(raw)
            .map(FieldValue::Digits)
            .ok_or(ProtocolError::ValueOutOfRange),
        Field::Selector => raw
            .first()
            .copied()
            .and_then(GainSelector::from_byte)
            .map(FieldValue::Selector)
            .ok_or(ProtocolError::ValueOutOfRange),
        Field::Decimal(_) => std::str::from_utf8(raw)
            .ok()
            .and_then(|text| text.parse::<f32>().ok())
            .filter(|value| value.is_finite())
            .map(FieldValue::Decimal)
            .ok_or(ProtocolError::ValueOutOfRange),
    }
}

fn parse_digits(raw: &[u8]) -> Option<u32> {
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        raw.iter()
            .fold(0u32, |value, digit| value * 10 + u32::from(digit - b'0')),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    GetCurrent,
    GetDesired,
    SetDesired,
    SetGain,
    ToggleVerbose,
}

impl CommandKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'C' => Some(Self::GetCurrent),
            b'D' => Some(Self::GetDesired),
            b'M' => Some(Self::SetDesired),
            b'S' => Some(Self::SetGain),
            b'V' => Some(Self::ToggleVerbose),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::GetCurrent => b'C',
            Self::GetDesired => b'D',
            Self::SetDesired => b'M',
            Self::SetGain => b'S',
            Self::ToggleVerbose => b'V',
        }
    }

    pub const fn schema(self) -> FrameSchema {
        match self {
            Self::GetCurrent | Self::GetDesired | Self::ToggleVerbose => FrameSchema { fields: &[] },
            Self::SetDesired => FrameSchema {
                fields: &[Field::Sign, Field::Digits(2)],
            },
            Self::SetGain => FrameSchema {
                fields: &[Field::Selector, Field::Decimal(4)],
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    GetCurrent,
    GetDesired,
    SetDesired(i32),
    SetGain(GainSelector, f32),
    ToggleVerbose,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::GetCurrent => CommandKind::GetCurrent,
            Self::GetDesired => CommandKind::GetDesired,
            Self::SetDesired(_) => CommandKind::SetDesired,
            Self::SetGain(..) => CommandKind::SetGain,
            Self::ToggleVerbose => CommandKind::ToggleVerbose,
        }
    }

    /// Validates a complete request frame and decodes it.
    ///
    /// Checks run in wire order: delimiters, command byte, length for that
    /// command, checksum, then the payload fields.
    pub fn parse(frame: &[u8]) -> Result<Self, ProtocolError> {
        let body = frame_body(frame)?;
        let cmd = body[0];
        let kind = CommandKind::from_byte(cmd).ok_or(ProtocolError::InvalidCommand(cmd))?;
        let schema = kind.schema();
        if frame.len() != schema.total_len() {
            return Err(ProtocolError::Framing);
        }

        let payload = &body[..1 + schema.data_len()];
        verify_checksum(payload, &body[payload.len()..])?;

        let values = schema.decode(&payload[1..])?;
        Ok(match (kind, values.as_slice()) {
            (CommandKind::GetCurrent, []) => Self::GetCurrent,
            (CommandKind::GetDesired, []) => Self::GetDesired,
            (CommandKind::ToggleVerbose, []) => Self::ToggleVerbose,
            (CommandKind::SetDesired, [FieldValue::Sign(sign), FieldValue::Digits(magnitude)]) => {
                Self::SetDesired(sign * *magnitude as i32)
            }
            (CommandKind::SetGain, [FieldValue::Selector(selector), FieldValue::Decimal(value)]) => {
                Self::SetGain(*selector, *value)
            }
            _ => return Err(ProtocolError::Framing),
        })
    }

    /// Builds the request frame for this command.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut body = vec![self.kind().as_byte()];
        match *self {
            Self::GetCurrent | Self::GetDesired | Self::ToggleVerbose => {}
            Self::SetDesired(temp_c) => {
                if temp_c.unsigned_abs() > 99 {
                    return Err(ProtocolError::ValueOutOfRange);
                }
                body.extend_from_slice(&signed_two_digits(temp_c));
            }
            Self::SetGain(selector, value) => {
                body.push(selector.as_byte());
                body.extend_from_slice(&format_gain(value).ok_or(ProtocolError::ValueOutOfRange)?);
            }
        }

        let mut frame = Vec::with_capacity(body.len() + FRAME_OVERHEAD);
        write_frame(&mut frame, &body);
        Ok(frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Current(i32),
    Desired(i32),
    Ack(AckStatus),
}

impl Response {
    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Self::Current(temp_c) => encode_temperature(out, CURRENT_TAG, temp_c),
            Self::Desired(temp_c) => encode_temperature(out, DESIRED_TAG, temp_c),
            Self::Ack(status) => write_frame(out, &[ACK_TAG, status.as_byte()]),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9);
        self.encode(&mut out);
        out
    }

    /// Decodes a response frame as sent by the node.
    pub fn parse(frame: &[u8]) -> Result<Self, ProtocolError> {
        let body = frame_body(frame)?;
        if body.len() <= CHECKSUM_DIGITS {
            return Err(ProtocolError::Framing);
        }
        let (payload, digits) = body.split_at(body.len() - CHECKSUM_DIGITS);
        verify_checksum(payload, digits)?;

        match *payload {
            [ACK_TAG, status] => AckStatus::from_byte(status)
                .map(Self::Ack)
                .ok_or(ProtocolError::InvalidCommand(status)),
            [tag @ (CURRENT_TAG | DESIRED_TAG), sign, tens, ones] => {
                let sign = match sign {
                    b'+' => 1,
                    b'-' => -1,
                    _ => return Err(ProtocolError::ValueOutOfRange),
                };
                let magnitude =
                    parse_digits(&[tens, ones]).ok_or(ProtocolError::ValueOutOfRange)?;
                let temp_c = sign * magnitude as i32;
                Ok(if tag == CURRENT_TAG {
                    Self::Current(temp_c)
                } else {
                    Self::Desired(temp_c)
                })
            }
            [tag, ..] => Err(ProtocolError::InvalidCommand(tag)),
            [] => Err(ProtocolError::Framing),
        }
    }
}

/// Checks the delimiters and returns the bytes between them.
fn frame_body(frame: &[u8]) -> Result<&[u8], ProtocolError> {
    match frame {
        [SOF, body @ .., EOF] if !body.is_empty() => Ok(body),
        _ => Err(ProtocolError::Framing),
    }
}

fn verify_checksum(payload: &[u8], digits: &[u8]) -> Result<(), ProtocolError> {
    let computed = checksum(payload);
    let received = parse_digits(digits)
        .filter(|_| digits.len() == CHECKSUM_DIGITS)
        .map(|value| value as u16);
    if received == Some(u16::from(computed)) {
        Ok(())
    } else {
        Err(ProtocolError::Checksum { received, computed })
    }
}

fn encode_temperature(out: &mut Vec<u8>, tag: u8, temp_c: i32) {
    let [sign, tens, ones] = signed_two_digits(temp_c);
    write_frame(out, &[tag, sign, tens, ones]);
}

/// Sign plus two digits; magnitudes past 99 saturate.
fn signed_two_digits(temp_c: i32) -> [u8; 3] {
    let sign = if temp_c < 0 { b'-' } else { b'+' };
    let magnitude = temp_c.unsigned_abs().min(99) as u8;
    [sign, b'0' + magnitude / 10, b'0' + magnitude % 10]
}

/// Renders a gain as exactly four characters, e.g. `1.23`, `12.5` or `0100`.
pub fn format_gain(value: f32) -> Option<[u8; 4]> {
    if !value.is_finite() {
        return None;
    }
    [
        format!("{value:.2}"),
        format!("{value:.1}"),
        format!("{value:04.0}"),
    ]
    .into_iter()
    .find(|text| text.len() == 4)
    .and_then(|text| text.as_bytes().try_into().ok())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn schema_lengths_match_wire_table() {
        assert_eq!(CommandKind::GetCurrent.schema().total_len(), 6);
        assert_eq!(CommandKind::GetDesired.schema().total_len(), 6);
        assert_eq!(CommandKind::ToggleVerbose.schema().total_len(), 6);
        assert_eq!(CommandKind::SetDesired.schema().total_len(), 9);
        assert_eq!(CommandKind::SetGain.schema().total_len(), 11);
    }

    #[test]
    fn checksum_digits_are_zero_padded() {
        assert_eq!(checksum_digits(b'C'), *b"067");
        assert_eq!(checksum_digits(5), *b"005");
        assert_eq!(checksum_digits(255), *b"255");
    }

    #[test]
    fn parses_query_frames() {
        assert_eq!(FRAME_OVERHEAD, 6);
        assert_eq!(Command::parse(b"#C067!"), Ok(Command::GetCurrent));
        assert_eq!(Command::parse(b"#D068!"), Ok(Command::GetDesired));
        assert_eq!(Command::parse(b"#V086!"), Ok(Command::ToggleVerbose));
    }

    #[test]
    fn parses_set_desired() {
        assert_eq!(Command::parse(b"#M+30219!"), Ok(Command::SetDesired(30)));
    }

    #[test]
    fn parses_negative_set_desired() {
        let frame = Command::SetDesired(-7).encode().unwrap();
        assert_eq!(frame, b"#M-07225!".to_vec());
        assert_eq!(Command::parse(&frame), Ok(Command::SetDesired(-7)));
    }

    #[test]
    fn parses_set_gain() {
        assert_eq!(
            Command::parse(b"#Sp1.23135!"),
            Ok(Command::SetGain(GainSelector::Kp, 1.23))
        );
    }

    #[test]
    fn unknown_command_wins_over_checksum() {
        assert_eq!(
            Command::parse(b"#Xt196!"),
            Err(ProtocolError::InvalidCommand(b'X'))
        );
    }

    #[test]
    fn short_frame_is_framing_error() {
        assert_eq!(Command::parse(b"#V86!"), Err(ProtocolError::Framing));
        assert_eq!(Command::parse(b"#!"), Err(ProtocolError::Framing));
        assert_eq!(Command::parse(b""), Err(ProtocolError::Framing));
    }

    #[test]
    fn missing_delimiters_are_framing_errors() {
        assert_eq!(Command::parse(b"V086!!"), Err(ProtocolError::Framing));
        assert_eq!(Command::parse(b"#V0860"), Err(ProtocolError::Framing));
    }

    #[test]
    fn early_eof_in_set_frame_is_framing_error() {
        assert_eq!(Command::parse(b"#M+3!"), Err(ProtocolError::Framing));
    }

    #[test]
    fn wrong_checksum_reports_both_values() {
        assert_eq!(
            Command::parse(b"#V085!"),
            Err(ProtocolError::Checksum {
                received: Some(85),
                computed: 86,
            })
        );
    }

    #[test]
    fn non_digit_checksum_is_checksum_error() {
        assert_eq!(
            Command::parse(b"#V0x6!"),
            Err(ProtocolError::Checksum {
                received: None,
                computed: 86,
            })
        );
    }

    #[test]
    fn bad_sign_is_out_of_range() {
        // '3' + '3' + '0' + 'M' = 51 + 51 + 48 + 77
        assert_eq!(
            Command::parse(b"#M330227!"),
            Err(ProtocolError::ValueOutOfRange)
        );
    }

    #[test]
    fn unknown_gain_selector_is_out_of_range() {
        let body = b"Sx1.00";
        let mut frame = Vec::new();
        write_frame(&mut frame, body);
        assert_eq!(Command::parse(&frame), Err(ProtocolError::ValueOutOfRange));
    }

    #[test]
    fn encodes_responses() {
        assert_eq!(Response::Ack(AckStatus::Ok).to_bytes(), b"#Eo180!".to_vec());
        assert_eq!(Response::Ack(AckStatus::Framing).to_bytes(), b"#Ef171!".to_vec());
        assert_eq!(Response::Ack(AckStatus::Checksum).to_bytes(), b"#Es184!".to_vec());
        assert_eq!(Response::Ack(AckStatus::InvalidCommand).to_bytes(), b"#Ei174!".to_vec());
        // 'c' + '+' + '2' + '8' = 99 + 43 + 50 + 56 = 248
        assert_eq!(Response::Current(28).to_bytes(), b"#c+28248!".to_vec());
        // 'd' + '-' + '0' + '5' = 100 + 45 + 48 + 53 = 246
        assert_eq!(Response::Desired(-5).to_bytes(), b"#d-05246!".to_vec());
    }

    #[test]
    fn temperature_magnitude_saturates_at_two_digits() {
        assert_eq!(Response::Current(127).to_bytes()[2..5], *b"+99");
        assert_eq!(Response::Current(-128).to_bytes()[2..5], *b"-99");
    }

    #[test]
    fn parses_responses() {
        assert_eq!(Response::parse(b"#c+28248!"), Ok(Response::Current(28)));
        assert_eq!(Response::parse(b"#d-05246!"), Ok(Response::Desired(-5)));
        assert_eq!(Response::parse(b"#Es184!"), Ok(Response::Ack(AckStatus::Checksum)));
    }

    #[test]
    fn formats_gains_in_four_characters() {
        assert_eq!(format_gain(1.23), Some(*b"1.23"));
        assert_eq!(format_gain(12.5), Some(*b"12.5"));
        assert_eq!(format_gain(0.05), Some(*b"0.05"));
        assert_eq!(format_gain(100.0), Some(*b"0100"));
        assert_eq!(format_gain(12_345.0), None);
        assert_eq!(format_gain(f32::INFINITY), None);
    }

    #[test]
    fn encode_rejects_unrepresentable_desired() {
        assert_eq!(
            Command::SetDesired(100).encode(),
            Err(ProtocolError::ValueOutOfRange)
        );
    }
}
