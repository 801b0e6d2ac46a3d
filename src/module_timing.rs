use embassy_time::Duration;

/// Low time of the power key before the switch on pulse
pub fn pwr_on_delay() -> Duration {
    Duration::from_millis(500)
}

/// High time of the power key to switch the module on
pub fn pwr_on_time() -> Duration {
    Duration::from_millis(1500)
}

/// High time of the power key to switch on modules of the V2 family, used
/// when the short pulse gets no answer
pub fn pwr_on_time_v2() -> Duration {
    Duration::from_millis(7000)
}

/// High time of the power key to trigger a graceful switch off
pub fn pwr_off_time() -> Duration {
    Duration::from_millis(2500)
}

/// Time allowed for the numeric part of an `ERROR: <n>` result
pub fn error_code_timeout() -> Duration {
    Duration::from_secs(3)
}

/// Time allowed for a `>`, `>>>` or `<<<` prompt or a data header
pub fn prompt_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Time allowed for raw payload bytes following a data header
pub fn payload_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Time allowed for `OK` after a streamed payload
pub fn payload_ack_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Time allowed for a SMS to be accepted by the network
pub fn sms_send_timeout() -> Duration {
    Duration::from_secs(60)
}
