//! Protocol driver for the HP663XA bench power supplies.
//!
//! The instruments speak newline-terminated ASCII commands and answer
//! queries with a fixed-width numeric field terminated by CR/LF.

use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::link::InstrumentLink;

/// Upper bound on a query response: a fixed-width numeric field plus its
/// CR/LF terminator, with a couple of spare bytes.
const RESPONSE_MAX: usize = 11;

/// Settling time after a device clear before the next command is safe.
const CLEAR_SETTLE: Duration = Duration::from_secs(1);

/// Values the supply can report back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    OutputVoltage,
    OutputCurrent,
}

impl Measurement {
    fn query(self) -> &'static str {
        match self {
            Measurement::OutputVoltage => "VOUT?",
            Measurement::OutputCurrent => "IOUT?",
        }
    }
}

/// Driver for one HP663XA supply behind a link `L`.
pub struct Hp663x<L: InstrumentLink> {
    link: L,
}

impl<L: InstrumentLink> Hp663x<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// Access the underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable access to the underlying link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Disable the output, reset the supply and issue a device clear.
    pub fn reset_and_clear(&mut self) -> Result<(), L::Error> {
        self.link.write("OUT 0;RST;CLR\n").map_err(Error::Link)
    }

    /// Bring the supply to a clean state at the start of a session.
    pub fn initialize(&mut self, reset: bool) -> Result<(), L::Error> {
        if reset {
            self.reset_and_clear()?;
            thread::sleep(CLEAR_SETTLE);
        }
        Ok(())
    }

    /// Reset the supply at the end of a session unless the operator asked
    /// to keep its settings.
    pub fn shutdown(&mut self, reset: bool) -> Result<(), L::Error> {
        if reset {
            self.reset_and_clear()?;
        }
        Ok(())
    }

    /// Program the full operating point in one compound command.
    pub fn configure(
        &mut self,
        volt: f64,
        amp: f64,
        limiter_volt: f64,
        ocp: bool,
    ) -> Result<(), L::Error> {
        let command = format!(
            "VSET {volt:.4};ISET {amp:.4};OVSET {limiter_volt:.4};OCP {}\n",
            i32::from(ocp)
        );
        self.link.write(&command).map_err(Error::Link)
    }

    /// Update only the voltage setpoint; issued on every ramp tick.
    pub fn set_voltage(&mut self, volt: f64) -> Result<(), L::Error> {
        self.link
            .write(&format!("VSET {volt:.4}\n"))
            .map_err(Error::Link)
    }

    /// Query one measured value and decode the reply.
    pub fn read_measurement(&mut self, kind: Measurement) -> Result<f64, L::Error> {
        self.link
            .write(&format!("{}\n", kind.query()))
            .map_err(Error::Link)?;
        let raw = self.link.read(RESPONSE_MAX).map_err(Error::Link)?;
        Self::decode_numeric(&raw)
    }

    /// Strip the CR/LF terminator and parse the numeric field. The
    /// terminator may sit anywhere in the buffer, so it is located rather
    /// than assumed at a fixed offset.
    fn decode_numeric(raw: &[u8]) -> Result<f64, L::Error> {
        let text = std::str::from_utf8(raw).map_err(|_| Error::Decode(format!("{raw:?}")))?;
        let Some(end) = text.find("\r\n") else {
            return Err(Error::Decode(text.to_string()));
        };
        let field = text[..end].trim();
        field
            .parse::<f64>()
            .map_err(|_| Error::Decode(field.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_link::MockLink;

    #[test]
    fn configure_sends_one_compound_command() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.configure(12.0, 1.0, 50.0, true).unwrap();
        assert_eq!(
            psu.link.written(),
            ["VSET 12.0000;ISET 1.0000;OVSET 50.0000;OCP 1\n"]
        );
    }

    #[test]
    fn ocp_flag_encoded_as_zero_or_one() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.configure(5.0, 0.5, 25.0, false).unwrap();
        assert_eq!(
            psu.link.written(),
            ["VSET 5.0000;ISET 0.5000;OVSET 25.0000;OCP 0\n"]
        );
    }

    #[test]
    fn set_voltage_formats_four_decimals() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.set_voltage(7.35).unwrap();
        assert_eq!(psu.link.written(), ["VSET 7.3500\n"]);
    }

    #[test]
    fn reset_and_clear_command() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.reset_and_clear().unwrap();
        assert_eq!(psu.link.written(), ["OUT 0;RST;CLR\n"]);
    }

    #[test]
    fn shutdown_without_reset_is_silent() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.shutdown(false).unwrap();
        assert!(psu.link.written().is_empty());
    }

    #[test]
    fn read_measurement_decodes_fixed_width_reply() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.link.push_response(" 12.0090\r\n");
        let volt = psu.read_measurement(Measurement::OutputVoltage).unwrap();
        assert_eq!(volt, 12.009);
        assert_eq!(psu.link.written(), ["VOUT?\n"]);
    }

    #[test]
    fn current_query_uses_iout() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.link.push_response(" 0.5004\r\n");
        let amp = psu.read_measurement(Measurement::OutputCurrent).unwrap();
        assert_eq!(amp, 0.5004);
        assert_eq!(psu.link.written(), ["IOUT?\n"]);
    }

    #[test]
    fn missing_terminator_is_a_decode_error() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.link.push_response(" 12.0090");
        let err = psu
            .read_measurement(Measurement::OutputVoltage)
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn non_numeric_field_is_a_decode_error() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.link.push_response("ERR 201\r\n");
        let err = psu
            .read_measurement(Measurement::OutputVoltage)
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn link_failure_surfaces_as_link_error() {
        let mut psu = Hp663x::new(MockLink::new());
        psu.link.fail_read_at(1);
        let err = psu
            .read_measurement(Measurement::OutputVoltage)
            .unwrap_err();
        assert!(matches!(err, Error::Link(_)));
    }
}
