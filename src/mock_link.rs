//! Scripted instrument link used by unit tests in place of the GPIB bus.

use std::collections::VecDeque;

use thiserror::Error;

use crate::link::InstrumentLink;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MockLinkError {
    #[error("simulated bus write failure")]
    WriteFault,
    #[error("simulated bus read failure")]
    ReadFault,
    #[error("no scripted response left")]
    Exhausted,
}

/// Records every written command and serves scripted read responses.
#[derive(Debug, Default)]
pub struct MockLink {
    written: Vec<String>,
    responses: VecDeque<Vec<u8>>,
    default_response: Option<Vec<u8>>,
    fail_write_at: Option<usize>,
    fail_read_at: Option<usize>,
    writes: usize,
    reads: usize,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response, served before the default response.
    pub fn push_response(&mut self, response: &str) {
        self.responses.push_back(response.as_bytes().to_vec());
    }

    /// Response served whenever the queue is empty.
    pub fn set_default_response(&mut self, response: &str) {
        self.default_response = Some(response.as_bytes().to_vec());
    }

    /// Make the `n`-th write fail, counting from 1.
    pub fn fail_write_at(&mut self, n: usize) {
        self.fail_write_at = Some(n);
    }

    /// Make the `n`-th read fail, counting from 1.
    pub fn fail_read_at(&mut self, n: usize) {
        self.fail_read_at = Some(n);
    }

    /// Every command written so far, in order.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl InstrumentLink for MockLink {
    type Error = MockLinkError;

    fn write(&mut self, command: &str) -> Result<(), Self::Error> {
        self.writes += 1;
        if self.fail_write_at == Some(self.writes) {
            return Err(MockLinkError::WriteFault);
        }
        self.written.push(command.to_owned());
        Ok(())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, Self::Error> {
        self.reads += 1;
        if self.fail_read_at == Some(self.reads) {
            return Err(MockLinkError::ReadFault);
        }
        let mut response = match self.responses.pop_front() {
            Some(r) => r,
            None => self
                .default_response
                .clone()
                .ok_or(MockLinkError::Exhausted)?,
        };
        response.truncate(max_len);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_queued_then_default_responses() {
        let mut link = MockLink::new();
        link.push_response("first\r\n");
        link.set_default_response("rest\r\n");
        assert_eq!(link.read(16).unwrap(), b"first\r\n");
        assert_eq!(link.read(16).unwrap(), b"rest\r\n");
        assert_eq!(link.read(16).unwrap(), b"rest\r\n");
    }

    #[test]
    fn read_without_script_is_an_error() {
        let mut link = MockLink::new();
        assert_eq!(link.read(16), Err(MockLinkError::Exhausted));
    }

    #[test]
    fn injected_faults_fire_at_the_requested_operation() {
        let mut link = MockLink::new();
        link.set_default_response("ok\r\n");
        link.fail_read_at(2);
        assert!(link.read(16).is_ok());
        assert_eq!(link.read(16), Err(MockLinkError::ReadFault));
        assert!(link.read(16).is_ok());

        link.fail_write_at(1);
        assert_eq!(link.write("VSET 1.0000\n"), Err(MockLinkError::WriteFault));
        assert!(link.write("VSET 2.0000\n").is_ok());
        assert_eq!(link.written(), ["VSET 2.0000\n"]);
    }

    #[test]
    fn responses_are_clipped_to_the_read_limit() {
        let mut link = MockLink::new();
        link.push_response("0123456789abcdef");
        assert_eq!(link.read(4).unwrap(), b"0123");
    }
}
