/*!
  Numeric literals.

  A literal is an optional sign followed by alphanumeric digits. The base is chosen by a `0x`,
  `0b` or `0d` prefix, or failing that by a trailing `x`, `b` or `d` marker, and is otherwise
  ten. A prefix only wins when the digits after it are valid in its base, so `0DAx` is hex.
  Each operand width accepts both its signed and its unsigned range, so `-1` and `255` are
  both valid bytes and encode to the same bits.
*/

use nom::{
  character::complete::{alphanumeric1, one_of},
  combinator::{all_consuming, opt},
  sequence::pair,
  IResult
};

use crate::bytecode::{Byte, Short, Word};

fn signed_body(text: &str) -> IResult<&str, (Option<char>, &str)> {
  all_consuming(pair(opt(one_of("+-")), alphanumeric1))(text)
}

fn radix_of(marker: char) -> Option<u32> {
  match marker.to_ascii_lowercase() {
    'x' => Some(16),
    'b' => Some(2),
    'd' => Some(10),
    _   => None
  }
}

/// The ways `body` can be split into digits and a base, most specific first: a prefix, then
/// a trailing marker, then plain decimal.
fn readings(body: &str) -> Vec<(&str, u32)> {
  let bytes        = body.as_bytes();
  let mut readings = Vec::with_capacity(3);

  if bytes.len() > 2 && bytes[0] == b'0' {
    if let Some(radix) = radix_of(bytes[1] as char) {
      readings.push((&body[2..], radix));
    }
  }

  if bytes.len() > 1 {
    if let Some(radix) = radix_of(bytes[bytes.len() - 1] as char) {
      readings.push((&body[..body.len() - 1], radix));
    }
  }

  readings.push((body, 10));
  readings
}

/// Parses a literal into a value no narrower than any operand width. The first reading whose
/// digits are valid in its base wins.
pub fn parse_integer(text: &str) -> Option<i64> {
  let (_, (sign, body)) = signed_body(text).ok()?;
  let magnitude         = readings(body)
                            .into_iter()
                            .find_map(|(digits, radix)| i64::from_str_radix(digits, radix).ok())?;

  match sign {
    Some('-') => Some(-magnitude),
    _         => Some(magnitude)
  }
}

fn parse_ranged(text: &str, min: i64, max: i64) -> Option<i64> {
  parse_integer(text).filter(|value| (min..=max).contains(value))
}

pub fn parse_word(text: &str) -> Option<Word> {
  parse_ranged(text, i32::MIN as i64, u32::MAX as i64).map(|value| value as Word)
}

pub fn parse_short(text: &str) -> Option<Short> {
  parse_ranged(text, i16::MIN as i64, u16::MAX as i64).map(|value| value as Short)
}

pub fn parse_byte(text: &str) -> Option<Byte> {
  parse_ranged(text, i8::MIN as i64, u8::MAX as i64).map(|value| value as Byte)
}
