//! Foreign status codes.
//!
//! Every fallible foreign call reports a one-byte status. `0` is success;
//! the remaining codes are stable across both ABIs. Unknown codes are kept
//! verbatim so a newer library never turns into a decode failure.

use std::borrow::Cow;
use std::fmt;

/// One-byte status reported in a foreign result record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Status(pub u8);

impl Status {
    /// The call succeeded and the payload handle is usable.
    pub const SUCCESS: Status = Status(0);
    /// Generic failure.
    pub const FAILURE: Status = Status(1);
    /// The foreign side caught an exception.
    pub const EXCEPTION: Status = Status(2);
    /// Double public key input had the wrong length.
    pub const BAD_DPK_SIZE: Status = Status(10);
    /// Address or string encoding not recognised.
    pub const UNKNOWN_ENCODING: Status = Status(11);
    /// Value outside the valid range.
    pub const VALUE_OUTSIDE_RANGE: Status = Status(12);
    /// Operation did not run to completion.
    pub const DID_NOT_RUN_TO_COMPLETION: Status = Status(13);
    /// An input amount was invalid.
    pub const IN_AMOUNT_ERROR: Status = Status(14);
    /// An output amount was invalid.
    pub const OUT_AMOUNT_ERROR: Status = Status(15);
    /// Output type not supported.
    pub const BAD_OUT_TYPE: Status = Status(16);
    /// Memo exceeds the maximum length.
    pub const MEMO_TOO_LONG: Status = Status(17);
    /// The foreign allocator failed.
    pub const MEM_ALLOC_FAILED: Status = Status(18);

    /// Raw status byte.
    pub fn code(self) -> u8 {
        self.0
    }

    /// Whether this is [`Status::SUCCESS`].
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Human-readable message for this status.
    pub fn message(self) -> Cow<'static, str> {
        let known = match self.0 {
            0 => "Success",
            1 => "Failure",
            2 => "Exception occurred",
            10 => "Bad double public key size",
            11 => "Unknown encoding",
            12 => "Value outside the valid range",
            13 => "Did not run to completion",
            14 => "Input amount error",
            15 => "Output amount error",
            16 => "Bad output type",
            17 => "Memo too long",
            18 => "Memory allocation failed",
            code => return Cow::Owned(format!("Unknown error (code: {code})")),
        };
        Cow::Borrowed(known)
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        Status(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.message())
    }
}
