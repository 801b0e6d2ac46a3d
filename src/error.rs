/// Vendor error code as reported by `+CME ERROR: <n>`, `+CMS ERROR: <n>`
/// or `ERROR: <n>`, plus two driver generated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCode(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCategory {
    General,
    Sim,
    Network,
    /// Failure to perform a GPRS attach
    Gprs,
    /// Failure to activate a context
    Context,
    EasyGprs,
    Ftp,
    Survey,
    Supplementary,
    Operator,
    Sms,
    Ssl,
    Synthetic,
    Unknown,
}

impl ErrorCode {
    /// No response within the allotted time.
    pub const TIMEOUT: Self = Self(65534);
    /// A bare `ERROR` without a numeric code, or a code that could not be
    /// parsed.
    pub const MESSAGE: Self = Self(65535);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn value(&self) -> u16 {
        self.0
    }

    pub fn is_synthetic(&self) -> bool {
        *self == Self::TIMEOUT || *self == Self::MESSAGE
    }

    pub fn category(&self) -> ErrorCategory {
        match self.0 {
            10..=18 | 770 => ErrorCategory::Sim,
            0..=27 | 100 => ErrorCategory::General,
            30..=47 => ErrorCategory::Network,
            103..=113 => ErrorCategory::Gprs,
            132..=150 => ErrorCategory::Context,
            257..=264 => ErrorCategory::Supplementary,
            300..=500 => ErrorCategory::Sms,
            550..=568 => ErrorCategory::EasyGprs,
            615 | 623 | 643 => ErrorCategory::Ftp,
            657..=660 => ErrorCategory::Survey,
            680..=683 => ErrorCategory::Operator,
            684 | 1001 | 1003 | 1008 => ErrorCategory::Ssl,
            65534 | 65535 => ErrorCategory::Synthetic,
            _ => ErrorCategory::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self.0 {
            0 => "phone failure",
            1 => "no connection to phone",
            2 => "phone-adaptor link reserved",
            3 => "operation not allowed",
            4 => "operation not supported",
            5 => "PH-SIM PIN required",
            10 => "SIM not inserted",
            11 => "SIM PIN required",
            12 => "SIM PUK required",
            13 => "SIM failure",
            14 => "SIM busy",
            15 => "SIM wrong",
            16 => "incorrect password",
            17 => "SIM PIN2 required",
            18 => "SIM PUK2 required",
            20 => "memory full",
            21 => "invalid index",
            22 => "not found",
            23 => "memory failure",
            24 => "text string too long",
            25 => "invalid characters in text string",
            26 => "dial string too long",
            27 => "invalid characters in dial string",
            30 => "no network service",
            31 => "network time-out",
            32 => "network not allowed, emergency calls only",
            40 => "network personalization PIN required",
            41 => "network personalization PUK required",
            42 => "network subset personalization PIN required",
            43 => "network subset personalization PUK required",
            44 => "service provider personalization PIN required",
            45 => "service provider personalization PUK required",
            46 => "corporate personalization PIN required",
            47 => "corporate personalization PUK required",
            100 => "unknown",
            770 => "SIM invalid",
            103 => "illegal MS",
            106 => "illegal ME",
            107 => "GPRS service not allowed",
            111 => "PLMN not allowed",
            112 => "location area not allowed",
            113 => "roaming not allowed in this location area",
            132 => "service option not supported",
            133 => "requested service option not subscribed",
            134 => "service option temporarily out of order",
            148 => "unspecified GPRS error",
            149 => "PDP authentication failure",
            150 => "invalid mobile class",
            550 => "generic undocumented error",
            551 => "wrong state",
            552 => "wrong mode",
            553 => "context already activated",
            554 => "stack already active",
            555 => "activation failed",
            556 => "context not opened",
            557 => "cannot setup socket",
            558 => "cannot resolve DN",
            559 => "time-out in opening socket",
            560 => "cannot open socket",
            561 => "remote disconnected or time-out",
            562 => "connection failed",
            563 => "tx error",
            564 => "already listening",
            568 => "wrong PDP",
            615 => "FTP not connected",
            623 => "FTP write data closed",
            643 => "FTP communication timeout",
            657 => "network survey error (no carrier)",
            658 => "network survey error (busy)",
            659 => "network survey error (wrong request)",
            660 => "network survey error (aborted)",
            257 => "network rejected request",
            258 => "retry operation",
            259 => "invalid deflected to number",
            260 => "deflected to own number",
            261 => "unknown subscriber",
            262 => "service not available",
            263 => "unknown class specified",
            264 => "unknown network message",
            680 => "LU processing",
            681 => "network search aborted",
            682 => "PTM mode",
            683 => "active call state",
            684 => "SSL already activated",
            300 => "ME failure",
            301 => "SMS service of ME reserved",
            302 => "operation not allowed",
            303 => "operation not supported",
            304 => "invalid PDU mode parameter",
            305 => "invalid text mode parameter",
            310 => "SIM not inserted",
            311 => "SIM PIN required",
            312 => "PH-SIM PIN required",
            313 => "SIM failure",
            314 => "SIM busy",
            315 => "SIM wrong",
            316 => "SIM PUK required",
            317 => "SIM PIN2 required",
            318 => "SIM PUK2 required",
            320 => "memory failure",
            321 => "invalid memory index",
            322 => "memory full",
            330 => "SMSC address unknown",
            331 => "no network service",
            332 => "network time-out",
            340 => "no +CNMA acknowledgement expected",
            500 => "unknown error",
            1001 => "SSL certs and keys wrong or not stored",
            1003 => "SSL already activated",
            1008 => "SSL not connected",
            65534 => "timeout running command",
            65535 => "ERROR without code",
            _ => "unlisted error code",
        }
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::MESSAGE
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.0, self.description())
    }
}

/// Failure of a single exchange with the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// None of the expected patterns arrived before the deadline
    Timeout,
    /// The modem answered a bare `ERROR`
    Message,
    /// The modem answered with a numeric error code
    Code(ErrorCode),
    /// The serial link reported an I/O error
    Transport,
    /// The response did not have the expected shape
    Parse,
    /// The serialized command does not fit the command buffer
    CommandTooLong,
    /// Declared and received byte counts differ
    BadLength,
    /// A different, known response arrived in place of the expected one
    Unexpected,
    /// The socket is not in a state that allows the operation
    InvalidState,
    /// The local file reported an error
    File,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(ErrorCode(11).category(), ErrorCategory::Sim);
        assert_eq!(ErrorCode(3).category(), ErrorCategory::General);
        assert_eq!(ErrorCode(31).category(), ErrorCategory::Network);
        assert_eq!(ErrorCode(149).category(), ErrorCategory::Context);
        assert_eq!(ErrorCode(560).category(), ErrorCategory::EasyGprs);
        assert_eq!(ErrorCode(623).category(), ErrorCategory::Ftp);
        assert_eq!(ErrorCode(322).category(), ErrorCategory::Sms);
        assert_eq!(ErrorCode(1008).category(), ErrorCategory::Ssl);
        assert_eq!(ErrorCode::TIMEOUT.category(), ErrorCategory::Synthetic);
        assert_eq!(ErrorCode(9999).category(), ErrorCategory::Unknown);
    }

    #[test]
    fn synthetic_codes() {
        assert!(ErrorCode::TIMEOUT.is_synthetic());
        assert!(ErrorCode::MESSAGE.is_synthetic());
        assert!(!ErrorCode(555).is_synthetic());
        assert_eq!(ErrorCode(555).description(), "activation failed");
    }
}
