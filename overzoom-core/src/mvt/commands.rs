//! Command and parameter integers of the MVT geometry stream.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    MoveTo = 1,
    LineTo = 2,
    ClosePath = 7,
}

impl Command {
    /// Split a command integer into its command and repeat count.
    pub(crate) fn parse(integer: u32) -> Option<(Self, u32)> {
        let command = match integer & 0x7 {
            1 => Self::MoveTo,
            2 => Self::LineTo,
            7 => Self::ClosePath,
            _ => return None,
        };
        Some((command, integer >> 3))
    }

    pub(crate) fn integer(self, count: u32) -> u32 {
        (self as u32 & 0x7) | (count << 3)
    }
}

/// Zigzag-encode a cursor delta.
#[allow(clippy::cast_sign_loss)]
pub(crate) fn encode_parameter(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn decode_parameter(value: u32) -> i64 {
    i64::from((value >> 1) as i32 ^ -((value & 1) as i32))
}
