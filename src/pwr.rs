//! Power key sequencing.
//!
//! The module is switched on and off by pulsing its `ON_OFF` line, which the
//! host drives through an [`OutputPin`]. Use [`NoPin`](crate::config::NoPin)
//! when the line is not wired.
use embassy_time::Timer;
use embedded_hal::digital::OutputPin;

use crate::module_timing::{pwr_off_time, pwr_on_delay, pwr_on_time, pwr_on_time_v2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinError;

/// Length of the switch on pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerPulse {
    #[default]
    Standard,
    /// Longer pulse required by the V2 family
    V2,
}

pub async fn power_on<P: OutputPin>(pin: &mut P, pulse: PowerPulse) -> Result<(), PinError> {
    debug!("[Power] switching module on");
    pin.set_low().map_err(|_| PinError)?;
    Timer::after(pwr_on_delay()).await;
    pin.set_high().map_err(|_| PinError)?;
    Timer::after(match pulse {
        PowerPulse::Standard => pwr_on_time(),
        PowerPulse::V2 => pwr_on_time_v2(),
    })
    .await;
    pin.set_low().map_err(|_| PinError)?;
    Ok(())
}

pub async fn power_off<P: OutputPin>(pin: &mut P) -> Result<(), PinError> {
    debug!("[Power] switching module off");
    pin.set_high().map_err(|_| PinError)?;
    Timer::after(pwr_off_time()).await;
    pin.set_low().map_err(|_| PinError)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoPin;
    use embedded_hal::digital::ErrorType;

    #[derive(Default)]
    struct RecordingPin {
        levels: std::vec::Vec<bool>,
    }

    impl ErrorType for RecordingPin {
        type Error = core::convert::Infallible;
    }

    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.levels.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.levels.push(true);
            Ok(())
        }
    }

    #[tokio::test]
    async fn power_off_pulses_high_then_low() {
        let mut pin = RecordingPin::default();
        power_off(&mut pin).await.unwrap();
        assert_eq!(pin.levels, [true, false]);
    }

    #[tokio::test]
    async fn no_pin_is_accepted() {
        assert_eq!(power_off(&mut NoPin).await, Ok(()));
    }
}
