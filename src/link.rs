//! Transport seam between the protocol driver and the GPIB bus.

use std::ffi::CString;
use std::io::{Read, Write};
use std::time::Duration;

use visa_rs::io_to_vs_err;
use visa_rs::prelude::*;

/// A byte-level connection to one instrument on the bus.
///
/// The protocol driver is generic over this trait so that it can be
/// exercised against a scripted link instead of real hardware.
pub trait InstrumentLink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send one command string to the instrument.
    fn write(&mut self, command: &str) -> std::result::Result<(), Self::Error>;

    /// Read at most `max_len` bytes of response.
    fn read(&mut self, max_len: usize) -> std::result::Result<Vec<u8>, Self::Error>;
}

/// GPIB link backed by a VISA session.
///
/// Dropping the value closes the session, so a `VisaLink` in scope is
/// always open.
pub struct VisaLink {
    // The resource manager must outlive the session it opened.
    _rm: DefaultRM,
    session: Instrument,
}

impl VisaLink {
    /// Open the instrument at `address` on GPIB board `board`.
    pub fn open(board: u8, address: u8, timeout: Duration) -> visa_rs::Result<Self> {
        let resource = CString::new(format!("GPIB{board}::{address}::INSTR"))
            .expect("GPIB resource string contains no NUL");
        let rm = DefaultRM::new()?;
        let session = rm.open(&resource.into(), AccessMode::NO_LOCK, timeout)?;
        Ok(Self { _rm: rm, session })
    }
}

impl InstrumentLink for VisaLink {
    type Error = visa_rs::Error;

    fn write(&mut self, command: &str) -> std::result::Result<(), Self::Error> {
        self.session
            .write_all(command.as_bytes())
            .map_err(io_to_vs_err)
    }

    fn read(&mut self, max_len: usize) -> std::result::Result<Vec<u8>, Self::Error> {
        let mut buf = vec![0u8; max_len];
        let n = (&self.session).read(&mut buf).map_err(io_to_vs_err)?;
        buf.truncate(n);
        Ok(buf)
    }
}
